use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes carried by [`ResponseStatus`]
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    #[error("Unknown")]
    Unknown,
    #[error("Directory does not exist")]
    DirectoryDoesNotExist,
    #[error("File does not exist")]
    FileDoesNotExist,
    #[error("File system error")]
    FileSystemError,
    #[error("Folder already exists")]
    FolderAlreadyExists,
    #[error("Permission denied")]
    PermissionDenied,
}

/// Status block nested in every response. `request_id` is the id of the
/// request being answered, not the id of the response itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseStatus {
    #[serde(rename = "MessageId")]
    pub request_id: String,
    pub is_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    #[serde(default, rename = "ErrorCode", skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ResponseStatus {
    /// Final, successful status for `request_id`
    pub fn ok<T: Into<String>>(request_id: T) -> Self {
        Self {
            request_id: request_id.into(),
            is_more: false,
            sequence: None,
            error_kind: None,
            error_message: None,
        }
    }

    pub fn section<T: Into<String>>(request_id: T, sequence: u64, is_more: bool) -> Self {
        Self {
            sequence: Some(sequence),
            is_more,
            ..Self::ok(request_id)
        }
    }

    /// Final status reporting a failure
    pub fn error<T: Into<String>, M: Into<String>>(request_id: T, kind: ErrorKind, msg: M) -> Self {
        Self {
            error_kind: Some(kind),
            error_message: Some(msg.into()),
            ..Self::ok(request_id)
        }
    }

    pub const fn is_error(&self) -> bool {
        self.error_kind.is_some()
    }
}

#[cfg(test)]
mod test_status {
    use super::*;

    #[test]
    fn test_status_json_names() {
        let status = ResponseStatus::error("req-1", ErrorKind::PermissionDenied, "Permission denied");
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(
            json,
            r#"{"MessageId":"req-1","IsMore":false,"ErrorCode":"PermissionDenied","ErrorMessage":"Permission denied"}"#
        );
    }

    #[test]
    fn test_status_without_error_decodes() {
        let status: ResponseStatus =
            serde_json::from_str(r#"{"MessageId":"req-1","IsMore":true,"Sequence":4}"#).unwrap();
        assert_eq!(status, ResponseStatus::section("req-1", 4, true));
        assert!(!status.is_error());
    }
}
