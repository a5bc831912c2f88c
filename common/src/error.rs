use std::io;

/// The error kinds from the error-handling design: every failure a session
/// can hit is one of these, and none of them are allowed to escape past
/// the session that raised them.
#[derive(thiserror::Error, Debug)]
pub enum ErrorKind {
    #[error("invalid input: {0}")]
    Input(String),

    #[error("no free client slot")]
    Capacity,

    #[error("operation timed out")]
    TransportTimeout,

    #[error("operation would block")]
    TransportWouldBlock,

    #[error("transport error: {0}")]
    TransportFatal(#[source] io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CoreError = ErrorKind;

impl From<io::Error> for ErrorKind {
    #[inline]
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock => ErrorKind::TransportWouldBlock,
            io::ErrorKind::TimedOut => ErrorKind::TransportTimeout,
            _ => ErrorKind::TransportFatal(err),
        }
    }
}

impl ErrorKind {
    /// True for the two kinds a retry loop should treat as "try again",
    /// as opposed to a fatal abort.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::TransportWouldBlock | ErrorKind::TransportTimeout
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn would_block_io_error_maps_to_would_block() {
        let io_err = io::Error::new(io::ErrorKind::WouldBlock, "nope");
        let err: ErrorKind = io_err.into();
        assert!(matches!(err, ErrorKind::TransportWouldBlock));
        assert!(err.is_retryable());
    }

    #[test]
    fn timed_out_io_error_maps_to_timeout() {
        let io_err = io::Error::new(io::ErrorKind::TimedOut, "nope");
        let err: ErrorKind = io_err.into();
        assert!(matches!(err, ErrorKind::TransportTimeout));
        assert!(err.is_retryable());
    }

    #[test]
    fn other_io_error_maps_to_fatal_and_is_not_retryable() {
        let io_err = io::Error::new(io::ErrorKind::BrokenPipe, "pipe broke");
        let err: ErrorKind = io_err.into();
        assert!(matches!(err, ErrorKind::TransportFatal(_)));
        assert!(!err.is_retryable());
    }
}
