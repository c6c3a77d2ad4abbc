use std::io;
use thiserror::Error;

use crate::{auth::Denied, protocol::ErrorKind};

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O: {0}")]
    IO(String),
    #[error("{kind}: {message}")]
    Status { kind: ErrorKind, message: String },
    #[error("Bad message: {0}")]
    BadMessage(String),
    #[error("Unexpected EOF on stream")]
    UnexpectedEof,
    #[error("Config: {0}")]
    Config(String),
    #[error("Connection closed")]
    Closed,
}

impl Error {
    pub fn status<M: Into<String>>(kind: ErrorKind, message: M) -> Self {
        Self::Status {
            kind,
            message: message.into(),
        }
    }

    /// Kind and text reported to the remote side. Anything that is not
    /// already classified is a file system fault.
    pub fn into_status(self) -> (ErrorKind, String) {
        match self {
            Self::Status { kind, message } => (kind, message),
            Self::IO(message) => (ErrorKind::FileSystemError, message),
            other => (ErrorKind::Unknown, other.to_string()),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::UnexpectedEof,
            _ => Self::IO(err.to_string()),
        }
    }
}

impl From<Denied> for Error {
    fn from(denied: Denied) -> Self {
        Self::status(ErrorKind::PermissionDenied, denied.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::BadMessage(format!("json: {err}"))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::BadMessage(format!("base64: {err}"))
    }
}

#[cfg(test)]
mod test_error {
    use super::*;

    #[test]
    fn test_io_error_is_file_system_error() {
        let err = Error::from(io::Error::new(io::ErrorKind::PermissionDenied, "access is denied"));
        let (kind, message) = err.into_status();
        assert_eq!(kind, ErrorKind::FileSystemError);
        assert!(message.contains("access is denied"));
    }

    #[test]
    fn test_status_is_preserved() {
        let err = Error::status(ErrorKind::FolderAlreadyExists, "Folder already exists");
        assert_eq!(
            err.into_status(),
            (
                ErrorKind::FolderAlreadyExists,
                "Folder already exists".to_owned()
            )
        );
    }

    #[test]
    fn test_denied_is_permission_denied() {
        let (kind, message) = Error::from(Denied::UnknownKey).into_status();
        assert_eq!(kind, ErrorKind::PermissionDenied);
        assert_eq!(message, "Permission denied");
    }
}
