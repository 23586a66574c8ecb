use crate::core_fs::FsError;
use crate::core_network::error::NetworkError;
use crate::core_network::reply::ReplyCode;
use thiserror::Error;

/// Tagged result of one command handler, consumed by the dispatch envelope.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Reply with the descriptor's `Syntax:` string and continue.
    #[error("syntax error")]
    Syntax,

    /// Handler already replied; skip the POST hooks.
    #[error("post hooks skipped")]
    NoPostScript,

    /// Admission or policy failure: reply and continue the session.
    #[error("{1}")]
    Failed(ReplyCode, String),

    /// I/O failure crossing the handler: unwinds the session.
    #[error(transparent)]
    Network(#[from] NetworkError),
}

impl From<FsError> for CommandError {
    fn from(e: FsError) -> Self {
        let (code, message) = e.to_reply();
        CommandError::Failed(code, message)
    }
}

impl CommandError {
    pub fn failed(code: ReplyCode, message: impl Into<String>) -> Self {
        CommandError::Failed(code, message.into())
    }
}
