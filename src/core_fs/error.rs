use crate::core_network::reply::ReplyCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("File not found")]
    NotFound,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Not a directory")]
    NotDirectory,

    #[error("File exists")]
    Exists,

    #[error("Filesystem error: {0}")]
    Io(std::io::Error),
}

impl From<std::io::Error> for FsError {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::NotFound => FsError::NotFound,
            std::io::ErrorKind::PermissionDenied => FsError::PermissionDenied,
            std::io::ErrorKind::AlreadyExists => FsError::Exists,
            _ => FsError::Io(e),
        }
    }
}

impl FsError {
    pub fn to_reply(&self) -> (ReplyCode, String) {
        match self {
            FsError::NotFound => (ReplyCode::ACTION_NOT_OKAY, "File not found.".to_string()),
            FsError::PermissionDenied => {
                (ReplyCode::ACTION_NOT_OKAY, "Permission denied.".to_string())
            }
            FsError::NotDirectory => (ReplyCode::ACTION_NOT_OKAY, "Not a directory.".to_string()),
            FsError::Exists => (ReplyCode::ACTION_NOT_OKAY, "File exists.".to_string()),
            FsError::Io(e) => (
                ReplyCode::LOCAL_ERROR,
                format!("Requested action aborted. Local error in processing: {}.", e),
            ),
        }
    }
}
