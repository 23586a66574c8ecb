use thiserror::Error;

/// Closed failure taxonomy raised from the socket and protocol layers.
///
/// Everything blocking maps into one of these: deadline expiry, peer close,
/// malformed TLS/FTP framing, raw syscall failure, or external cancellation.
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("operation timed out")]
    Timeout,

    #[error("end of stream")]
    EndOfStream,

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("system error: {0}")]
    System(std::io::Error),

    #[error("interrupted")]
    Interrupted,
}

impl From<std::io::Error> for NetworkError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => NetworkError::Timeout,
            std::io::ErrorKind::UnexpectedEof => NetworkError::EndOfStream,
            _ => NetworkError::System(e),
        }
    }
}

impl From<tokio::time::error::Elapsed> for NetworkError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        NetworkError::Timeout
    }
}

impl NetworkError {
    /// True when the session should unwind without attempting a reply.
    pub fn is_silent(&self) -> bool {
        matches!(self, NetworkError::EndOfStream | NetworkError::Interrupted)
    }
}
