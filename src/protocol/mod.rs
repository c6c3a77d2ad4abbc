mod content;
mod create_folder;
mod delete;
mod descriptor;
mod drives;
mod envelope;
mod file;
mod folder;
mod move_path;
mod status;
mod write;

use crate::error::Error;

pub use self::{
    content::{GetFileContentRequest, GetFileContentResponse, DEFAULT_SECTION_BYTES},
    create_folder::{CreateFolderRequest, CreateFolderResponse},
    delete::{DeleteRequest, DeleteResponse},
    descriptor::{Drive, FileDescriptor, FolderDescriptor, FolderErrors},
    drives::{GetDrivesRequest, GetDrivesResponse},
    envelope::{Envelope, Parameter},
    file::{GetFileRequest, GetFileResponse},
    folder::{GetFolderRequest, GetFolderResponse},
    move_path::{MoveRequest, MoveResponse},
    status::{ErrorKind, ResponseStatus},
    write::{WriteFileRequest, WriteFileResponse},
};

pub const GET_DRIVES_REQUEST: &str = "GetDrivesRequest";
pub const GET_DRIVES_RESPONSE: &str = "GetDrivesResponse";
pub const GET_FOLDER_REQUEST: &str = "GetFolderRequest";
pub const GET_FOLDER_RESPONSE: &str = "GetFolderResponse";
pub const GET_FILE_REQUEST: &str = "GetFileRequest";
pub const GET_FILE_RESPONSE: &str = "GetFileResponse";
pub const GET_FILE_CONTENT_REQUEST: &str = "GetFileContentRequest";
pub const GET_FILE_CONTENT_RESPONSE: &str = "GetFileContentResponse";
pub const WRITE_FILE_REQUEST: &str = "WriteFileRequest";
pub const WRITE_FILE_RESPONSE: &str = "WriteFileResponse";
pub const DELETE_REQUEST: &str = "DeleteRequest";
pub const DELETE_RESPONSE: &str = "DeleteResponse";
pub const MOVE_REQUEST: &str = "MoveRequest";
pub const MOVE_RESPONSE: &str = "MoveResponse";
pub const CREATE_FOLDER_REQUEST: &str = "CreateFolderRequest";
pub const CREATE_FOLDER_RESPONSE: &str = "CreateFolderResponse";

/// Parameter names used on the wire
pub(crate) mod param {
    pub const SECURITY_KEY: &str = "SecurityKey";
    pub const RESPONSE: &str = "Response";
    pub const PATH: &str = "Path";
    pub const GET_FILES: &str = "GetFiles";
    pub const RECURSE_SUB_FOLDERS: &str = "RecurseSubFolders";
    pub const SECTION_BYTES: &str = "SectionBytes";
    pub const SESSION_ID: &str = "SessionId";
    pub const FILE: &str = "File";
    pub const FOLDER: &str = "Folder";
    pub const DRIVES: &str = "Drives";
    pub const CONTENT: &str = "Content";
    pub const IS_MORE: &str = "IsMore";
    pub const OLD_PATH: &str = "OldPath";
    pub const NEW_PATH: &str = "NewPath";
}

pub(crate) trait RequestId: Sized {
    fn get_request_id(&self) -> &str;
}

macro_rules! impl_request_id {
    ($packet:ty) => {
        impl RequestId for $packet {
            fn get_request_id(&self) -> &str {
                &self.id
            }
        }
    };
}

macro_rules! impl_packet_for {
    ($variant:ident, $name:ident, $packet:ty) => {
        impl From<$name> for $packet {
            fn from(input: $name) -> Self {
                Self::$variant(input)
            }
        }
    };
}

pub(crate) use impl_packet_for;
pub(crate) use impl_request_id;

/// Every message a client may send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetDrives(GetDrivesRequest),
    GetFolder(GetFolderRequest),
    GetFile(GetFileRequest),
    GetFileContent(GetFileContentRequest),
    WriteFile(WriteFileRequest),
    Delete(DeleteRequest),
    Move(MoveRequest),
    CreateFolder(CreateFolderRequest),
}

impl Request {
    pub fn get_request_id(&self) -> &str {
        match self {
            Self::GetDrives(request) => request.get_request_id(),
            Self::GetFolder(request) => request.get_request_id(),
            Self::GetFile(request) => request.get_request_id(),
            Self::GetFileContent(request) => request.get_request_id(),
            Self::WriteFile(request) => request.get_request_id(),
            Self::Delete(request) => request.get_request_id(),
            Self::Move(request) => request.get_request_id(),
            Self::CreateFolder(request) => request.get_request_id(),
        }
    }

    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::GetDrives(_) => GET_DRIVES_REQUEST,
            Self::GetFolder(_) => GET_FOLDER_REQUEST,
            Self::GetFile(_) => GET_FILE_REQUEST,
            Self::GetFileContent(_) => GET_FILE_CONTENT_REQUEST,
            Self::WriteFile(_) => WRITE_FILE_REQUEST,
            Self::Delete(_) => DELETE_REQUEST,
            Self::Move(_) => MOVE_REQUEST,
            Self::CreateFolder(_) => CREATE_FOLDER_REQUEST,
        }
    }

    pub fn security_key(&self) -> &str {
        match self {
            Self::GetDrives(request) => &request.security_key,
            Self::GetFolder(request) => &request.security_key,
            Self::GetFile(request) => &request.security_key,
            Self::GetFileContent(request) => &request.security_key,
            Self::WriteFile(request) => &request.security_key,
            Self::Delete(request) => &request.security_key,
            Self::Move(request) => &request.security_key,
            Self::CreateFolder(request) => &request.security_key,
        }
    }
}

impl TryFrom<&Envelope> for Request {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        debug!("request type {}", envelope.type_tag);

        let request = match envelope.type_tag.as_str() {
            GET_DRIVES_REQUEST => Self::GetDrives(envelope.try_into()?),
            GET_FOLDER_REQUEST => Self::GetFolder(envelope.try_into()?),
            GET_FILE_REQUEST => Self::GetFile(envelope.try_into()?),
            GET_FILE_CONTENT_REQUEST => Self::GetFileContent(envelope.try_into()?),
            WRITE_FILE_REQUEST => Self::WriteFile(envelope.try_into()?),
            DELETE_REQUEST => Self::Delete(envelope.try_into()?),
            MOVE_REQUEST => Self::Move(envelope.try_into()?),
            CREATE_FOLDER_REQUEST => Self::CreateFolder(envelope.try_into()?),
            other => return Err(Error::BadMessage(format!("unknown request type {other}"))),
        };

        Ok(request)
    }
}

impl TryFrom<Request> for Envelope {
    type Error = Error;

    fn try_from(request: Request) -> Result<Self, Self::Error> {
        match request {
            Request::GetDrives(request) => request.try_into(),
            Request::GetFolder(request) => request.try_into(),
            Request::GetFile(request) => request.try_into(),
            Request::GetFileContent(request) => request.try_into(),
            Request::WriteFile(request) => request.try_into(),
            Request::Delete(request) => request.try_into(),
            Request::Move(request) => request.try_into(),
            Request::CreateFolder(request) => request.try_into(),
        }
    }
}

/// Every message a server may send back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    GetDrives(GetDrivesResponse),
    GetFolder(GetFolderResponse),
    GetFile(GetFileResponse),
    GetFileContent(GetFileContentResponse),
    WriteFile(WriteFileResponse),
    Delete(DeleteResponse),
    Move(MoveResponse),
    CreateFolder(CreateFolderResponse),
}

impl Response {
    pub const fn status(&self) -> &ResponseStatus {
        match self {
            Self::GetDrives(response) => &response.status,
            Self::GetFolder(response) => &response.status,
            Self::GetFile(response) => &response.status,
            Self::GetFileContent(response) => &response.status,
            Self::WriteFile(response) => &response.status,
            Self::Delete(response) => &response.status,
            Self::Move(response) => &response.status,
            Self::CreateFolder(response) => &response.status,
        }
    }

    /// Id of the request this response answers
    pub fn request_id(&self) -> &str {
        &self.status().request_id
    }

    pub fn id(&self) -> &str {
        match self {
            Self::GetDrives(response) => &response.id,
            Self::GetFolder(response) => &response.id,
            Self::GetFile(response) => &response.id,
            Self::GetFileContent(response) => &response.id,
            Self::WriteFile(response) => &response.id,
            Self::Delete(response) => &response.id,
            Self::Move(response) => &response.id,
            Self::CreateFolder(response) => &response.id,
        }
    }

    pub const fn type_tag(&self) -> &'static str {
        match self {
            Self::GetDrives(_) => GET_DRIVES_RESPONSE,
            Self::GetFolder(_) => GET_FOLDER_RESPONSE,
            Self::GetFile(_) => GET_FILE_RESPONSE,
            Self::GetFileContent(_) => GET_FILE_CONTENT_RESPONSE,
            Self::WriteFile(_) => WRITE_FILE_RESPONSE,
            Self::Delete(_) => DELETE_RESPONSE,
            Self::Move(_) => MOVE_RESPONSE,
            Self::CreateFolder(_) => CREATE_FOLDER_RESPONSE,
        }
    }

    /// The paired failure response for a request of type `request_type`.
    /// Returns `None` when the tag is not a known request.
    pub fn error(
        request_type: &str,
        request_id: &str,
        session_id: Option<&str>,
        kind: ErrorKind,
        msg: &str,
    ) -> Option<Self> {
        let status = ResponseStatus::error(request_id, kind, msg);

        let response = match request_type {
            GET_DRIVES_REQUEST => GetDrivesResponse::new(status, Vec::new()).into(),
            GET_FOLDER_REQUEST => GetFolderResponse::new(status, None).into(),
            GET_FILE_REQUEST => GetFileResponse::new(status, None).into(),
            GET_FILE_CONTENT_REQUEST => GetFileContentResponse::new(status, Vec::new()).into(),
            WRITE_FILE_REQUEST => {
                WriteFileResponse::new(status, session_id.unwrap_or_default()).into()
            }
            DELETE_REQUEST => DeleteResponse::new(status).into(),
            MOVE_REQUEST => MoveResponse::new(status).into(),
            CREATE_FOLDER_REQUEST => CreateFolderResponse::new(status).into(),
            _ => return None,
        };

        Some(response)
    }
}

impl TryFrom<&Envelope> for Response {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        debug!("response type {}", envelope.type_tag);

        let response = match envelope.type_tag.as_str() {
            GET_DRIVES_RESPONSE => Self::GetDrives(envelope.try_into()?),
            GET_FOLDER_RESPONSE => Self::GetFolder(envelope.try_into()?),
            GET_FILE_RESPONSE => Self::GetFile(envelope.try_into()?),
            GET_FILE_CONTENT_RESPONSE => Self::GetFileContent(envelope.try_into()?),
            WRITE_FILE_RESPONSE => Self::WriteFile(envelope.try_into()?),
            DELETE_RESPONSE => Self::Delete(envelope.try_into()?),
            MOVE_RESPONSE => Self::Move(envelope.try_into()?),
            CREATE_FOLDER_RESPONSE => Self::CreateFolder(envelope.try_into()?),
            other => return Err(Error::BadMessage(format!("unknown response type {other}"))),
        };

        Ok(response)
    }
}

impl TryFrom<Response> for Envelope {
    type Error = Error;

    fn try_from(response: Response) -> Result<Self, Self::Error> {
        match response {
            Response::GetDrives(response) => response.try_into(),
            Response::GetFolder(response) => response.try_into(),
            Response::GetFile(response) => response.try_into(),
            Response::GetFileContent(response) => response.try_into(),
            Response::WriteFile(response) => response.try_into(),
            Response::Delete(response) => response.try_into(),
            Response::Move(response) => response.try_into(),
            Response::CreateFolder(response) => response.try_into(),
        }
    }
}

/// Encodes the status block shared by every response
pub(crate) fn response_envelope(
    id: String,
    type_tag: &str,
    status: &ResponseStatus,
) -> Result<Envelope, Error> {
    let mut envelope = Envelope::new(id, type_tag);
    envelope.put_blob(param::RESPONSE, Some(status))?;
    Ok(envelope)
}

pub(crate) fn request_envelope(id: String, type_tag: &str, security_key: String) -> Envelope {
    let mut envelope = Envelope::new(id, type_tag);
    envelope.put(param::SECURITY_KEY, security_key);
    envelope
}

#[cfg(test)]
mod test_protocol {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn file() -> FileDescriptor {
        FileDescriptor {
            name: "a.txt".to_owned(),
            path: "/data/a.txt".to_owned(),
            length: 2_500_000,
            created_at_utc: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            updated_at_utc: Some(Utc.with_ymd_and_hms(2024, 3, 2, 11, 30, 0).unwrap()),
            read_only: false,
            attributes: "Normal".to_owned(),
            unix_file_mode: "rw-r--r--".to_owned(),
        }
    }

    fn folder() -> FolderDescriptor {
        FolderDescriptor {
            name: "data".to_owned(),
            path: "/data".to_owned(),
            length: 2_500_000,
            folders: vec![FolderDescriptor {
                name: "locked".to_owned(),
                path: "/data/locked".to_owned(),
                errors: Some(FolderErrors {
                    error_reading_files: true,
                    ..FolderErrors::default()
                }),
                ..FolderDescriptor::default()
            }],
            files: vec![file()],
            unix_file_mode: "rwxr-xr-x".to_owned(),
            errors: None,
        }
    }

    fn requests() -> Vec<Request> {
        vec![
            GetDrivesRequest::new("key").into(),
            GetFolderRequest::new("key", "/data", true, false).into(),
            GetFileRequest::new("key", "/data/a.txt").into(),
            GetFileContentRequest::new("key", "/data/a.txt", 1_000_000).into(),
            WriteFileRequest::new("key", "session-1", file(), vec![0, 1, 2, 255], true).into(),
            WriteFileRequest::new("key", "session-1", file(), Vec::new(), false).into(),
            DeleteRequest::new("key", "/data/a.txt").into(),
            MoveRequest::new("key", "/data/a.txt", "/data/b.txt").into(),
            CreateFolderRequest::new("key", "/data/new").into(),
        ]
    }

    fn responses() -> Vec<Response> {
        let ok = || ResponseStatus::ok("req-1");
        vec![
            GetDrivesResponse::new(
                ok(),
                vec![Drive {
                    name: "/".to_owned(),
                    path: "/".to_owned(),
                }],
            )
            .into(),
            GetDrivesResponse::new(ok(), Vec::new()).into(),
            GetFolderResponse::new(ok(), Some(folder())).into(),
            GetFolderResponse::new(
                ResponseStatus::error("req-1", ErrorKind::PermissionDenied, "Permission denied"),
                None,
            )
            .into(),
            GetFileResponse::new(ok(), Some(file())).into(),
            GetFileContentResponse::new(ResponseStatus::section("req-1", 3, true), vec![9; 700])
                .into(),
            GetFileContentResponse::new(ResponseStatus::section("req-1", 0, false), Vec::new())
                .into(),
            WriteFileResponse::new(ok(), "session-1").into(),
            DeleteResponse::new(ok()).into(),
            MoveResponse::new(ok()).into(),
            CreateFolderResponse::new(ResponseStatus::error(
                "req-1",
                ErrorKind::FolderAlreadyExists,
                "Folder already exists",
            ))
            .into(),
        ]
    }

    #[test]
    fn test_request_round_trip() {
        for request in requests() {
            let envelope = Envelope::try_from(request.clone()).unwrap();
            assert_eq!(envelope.type_tag, request.type_tag());
            assert_eq!(Request::try_from(&envelope).unwrap(), request);
        }
    }

    #[test]
    fn test_response_round_trip() {
        for response in responses() {
            let envelope = Envelope::try_from(response.clone()).unwrap();
            assert_eq!(envelope.type_tag, response.type_tag());
            assert_eq!(Response::try_from(&envelope).unwrap(), response);
        }
    }

    #[test]
    fn test_response_echoes_request_id() {
        let request = GetFileRequest::new("key", "/data/a.txt");
        let response = GetFileResponse::new(ResponseStatus::ok(&request.id), None);

        assert_ne!(response.id, request.id);
        assert_eq!(Response::from(response).request_id(), request.id);
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let envelope = Envelope::new("1", "FormatDiskRequest");
        assert!(matches!(
            Request::try_from(&envelope),
            Err(Error::BadMessage(_))
        ));
    }

    #[test]
    fn test_paired_error_response() {
        let response = Response::error(
            WRITE_FILE_REQUEST,
            "req-9",
            Some("session-9"),
            ErrorKind::Unknown,
            "bad",
        )
        .unwrap();

        assert_eq!(response.type_tag(), WRITE_FILE_RESPONSE);
        assert_eq!(response.request_id(), "req-9");
        assert!(Response::error("Nope", "req-9", None, ErrorKind::Unknown, "bad").is_none());
    }
}
