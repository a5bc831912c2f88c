//! Command-line surface:
//! `client <server-ip> <port> <resolution> <transport>`.

use clap::{App, Arg};
use common::ErrorKind;
use streamcore::config::{Resolution, Transport};

pub struct ClientArgs {
    pub server_ip: String,
    pub port: u16,
    pub resolution: Resolution,
    pub transport: Transport,
}

pub fn parse<I, T>(args: I) -> Result<ClientArgs, ErrorKind>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = App::new("Streaming Client")
        .version("1.0")
        .author("Bush Hammer Industries")
        .about("Negotiates with and streams from the bandwidth-aware media server")
        .arg(Arg::with_name("SERVER_IP").help("Server address").required(true))
        .arg(Arg::with_name("PORT").help("Server negotiation port").required(true))
        .arg(
            Arg::with_name("RESOLUTION")
                .help("Desired resolution: 480p, 720p, or 1080p")
                .required(true),
        )
        .arg(
            Arg::with_name("TRANSPORT")
                .help("Delivery transport: TCP or UDP")
                .required(true),
        )
        .get_matches_from_safe(args)
        .map_err(|e| ErrorKind::Input(e.message))?;

    let server_ip = matches.value_of("SERVER_IP").unwrap().to_string();

    let port_str = matches.value_of("PORT").unwrap();
    let port: u16 = port_str
        .parse()
        .map_err(|_| ErrorKind::Input(format!("invalid port: {}", port_str)))?;
    if port == 0 {
        return Err(ErrorKind::Input("port must be in 1..65535".to_string()));
    }

    let resolution_str = matches.value_of("RESOLUTION").unwrap();
    if !matches!(resolution_str, "480p" | "720p" | "1080p") {
        return Err(ErrorKind::Input(format!(
            "unsupported resolution (expected 480p, 720p, or 1080p): {}",
            resolution_str
        )));
    }
    let resolution = Resolution::parse(resolution_str);

    let transport_str = matches.value_of("TRANSPORT").unwrap();
    let transport = Transport::parse(&transport_str.to_ascii_uppercase())
        .ok_or_else(|| ErrorKind::Input(format!("unsupported transport (expected TCP or UDP): {}", transport_str)))?;

    Ok(ClientArgs {
        server_ip,
        port,
        resolution,
        transport,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_arguments() {
        let args = parse(vec!["client", "127.0.0.1", "8080", "720p", "TCP"]).unwrap();
        assert_eq!(args.server_ip, "127.0.0.1");
        assert_eq!(args.port, 8080);
        assert_eq!(args.transport, Transport::Tcp);
    }

    #[test]
    fn rejects_unknown_resolution() {
        assert!(parse(vec!["client", "127.0.0.1", "8080", "2160p", "TCP"]).is_err());
    }

    #[test]
    fn rejects_unknown_transport() {
        assert!(parse(vec!["client", "127.0.0.1", "8080", "720p", "QUIC"]).is_err());
    }

    #[test]
    fn transport_is_case_insensitive() {
        let args = parse(vec!["client", "127.0.0.1", "8080", "480p", "udp"]).unwrap();
        assert_eq!(args.transport, Transport::Udp);
    }
}
