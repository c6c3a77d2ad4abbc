use std::io;
use thiserror::Error;
use tokio::sync::mpsc::error::SendError as MpscSendError;

use crate::error;
use crate::protocol::{ErrorKind, ResponseStatus};

/// Enum for client errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The server answered with an error status
    #[error("{kind}: {message}")]
    Status { kind: ErrorKind, message: String },
    /// The request could not be handed to the transport
    #[error("Connection: {0}")]
    Connection(String),
    /// Nothing arrived for the request before the deadline
    #[error("No response")]
    NoResponse,
    /// Some responses arrived but not the final one; the partial result is
    /// unusable
    #[error("Timeout after {received} responses")]
    Timeout { received: usize },
    /// A response of the wrong type arrived for a request
    #[error("Unexpected packet")]
    UnexpectedPacket,
    /// Occurs when the server behaves differently from the protocol
    #[error("{0}")]
    UnexpectedBehavior(String),
    /// Any errors related to local I/O
    #[error("I/O: {0}")]
    IO(String),
}

impl Error {
    /// Kind reported by the server, if the server reported one
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Status { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<&ResponseStatus> for Error {
    fn from(status: &ResponseStatus) -> Self {
        Self::Status {
            kind: status.error_kind.unwrap_or(ErrorKind::Unknown),
            message: status.error_message.clone().unwrap_or_default(),
        }
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Self::IO(error.to_string())
    }
}

impl<T> From<MpscSendError<T>> for Error {
    fn from(err: MpscSendError<T>) -> Self {
        Self::Connection(format!("SendError: {err}"))
    }
}

impl From<error::Error> for Error {
    fn from(error: error::Error) -> Self {
        match error {
            error::Error::IO(message) => Self::IO(message),
            error::Error::Status { kind, message } => Self::Status { kind, message },
            closed @ (error::Error::Closed | error::Error::UnexpectedEof) => {
                Self::Connection(closed.to_string())
            }
            other => Self::UnexpectedBehavior(other.to_string()),
        }
    }
}
