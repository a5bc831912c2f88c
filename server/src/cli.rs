//! Command-line surface: `server <port> <policy>`. Built with the clap
//! 2.x builder API.

use clap::{App, Arg};
use common::ErrorKind;
use streamcore::Policy;

pub struct ServerArgs {
    pub port: u16,
    pub policy: Policy,
}

pub fn parse<I, T>(args: I) -> Result<ServerArgs, ErrorKind>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = App::new("Streaming Server")
        .version("1.0")
        .author("Bush Hammer Industries")
        .about("Bandwidth-aware, multi-client media streaming server")
        .arg(
            Arg::with_name("PORT")
                .help("Server port (1-65535); also binds PORT+1 for stream delivery")
                .required(true),
        )
        .arg(
            Arg::with_name("POLICY")
                .help("Scheduling policy: FCFS or RR")
                .required(true),
        )
        .get_matches_from_safe(args)
        .map_err(|e| ErrorKind::Input(e.message))?;

    let port_str = matches.value_of("PORT").unwrap();
    let policy_str = matches.value_of("POLICY").unwrap();

    let port: u16 = port_str
        .parse()
        .map_err(|_| ErrorKind::Input(format!("invalid port: {}", port_str)))?;
    if port == 0 {
        return Err(ErrorKind::Input("port must be in 1..65535".to_string()));
    }

    let policy = Policy::parse(policy_str)
        .ok_or_else(|| ErrorKind::Input(format!("invalid policy (expected FCFS or RR): {}", policy_str)))?;

    Ok(ServerArgs { port, policy })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_arguments() {
        let args = parse(vec!["server", "8080", "FCFS"]).unwrap();
        assert_eq!(args.port, 8080);
        assert_eq!(args.policy, Policy::Fcfs);
    }

    #[test]
    fn rejects_zero_port() {
        assert!(parse(vec!["server", "0", "FCFS"]).is_err());
    }

    #[test]
    fn rejects_unknown_policy() {
        assert!(parse(vec!["server", "8080", "round-robin"]).is_err());
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(parse(vec!["server", "abc", "RR"]).is_err());
    }
}
