use super::{
    impl_packet_for, impl_request_id, param, request_envelope, response_envelope, Envelope,
    FolderDescriptor, Request, RequestId, Response, ResponseStatus, GET_FOLDER_REQUEST,
    GET_FOLDER_RESPONSE,
};
use crate::{error::Error, utils::new_id};

/// Implementation for `GetFolderRequest`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFolderRequest {
    pub id: String,
    pub security_key: String,
    pub path: String,
    pub get_files: bool,
    pub recurse_sub_folders: bool,
}

impl GetFolderRequest {
    pub fn new<K: Into<String>, P: Into<String>>(
        security_key: K,
        path: P,
        get_files: bool,
        recurse_sub_folders: bool,
    ) -> Self {
        Self {
            id: new_id(),
            security_key: security_key.into(),
            path: path.into(),
            get_files,
            recurse_sub_folders,
        }
    }
}

impl_request_id!(GetFolderRequest);
impl_packet_for!(GetFolder, GetFolderRequest, Request);

impl TryFrom<GetFolderRequest> for Envelope {
    type Error = Error;

    fn try_from(request: GetFolderRequest) -> Result<Self, Self::Error> {
        let mut envelope = request_envelope(request.id, GET_FOLDER_REQUEST, request.security_key);
        envelope.put(param::PATH, request.path);
        envelope.put_bool(param::GET_FILES, request.get_files);
        envelope.put_bool(param::RECURSE_SUB_FOLDERS, request.recurse_sub_folders);
        Ok(envelope)
    }
}

impl TryFrom<&Envelope> for GetFolderRequest {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            security_key: envelope.required(param::SECURITY_KEY)?.to_owned(),
            path: envelope.required(param::PATH)?.to_owned(),
            get_files: envelope.required_bool(param::GET_FILES)?,
            recurse_sub_folders: envelope.required_bool(param::RECURSE_SUB_FOLDERS)?,
        })
    }
}

/// Implementation for `GetFolderResponse`. `folder` is `None` on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFolderResponse {
    pub id: String,
    pub status: ResponseStatus,
    pub folder: Option<FolderDescriptor>,
}

impl GetFolderResponse {
    pub fn new(status: ResponseStatus, folder: Option<FolderDescriptor>) -> Self {
        Self {
            id: new_id(),
            status,
            folder,
        }
    }
}

impl_packet_for!(GetFolder, GetFolderResponse, Response);

impl TryFrom<GetFolderResponse> for Envelope {
    type Error = Error;

    fn try_from(response: GetFolderResponse) -> Result<Self, Self::Error> {
        let mut envelope = response_envelope(response.id, GET_FOLDER_RESPONSE, &response.status)?;
        envelope.put_blob(param::FOLDER, response.folder.as_ref())?;
        Ok(envelope)
    }
}

impl TryFrom<&Envelope> for GetFolderResponse {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            status: envelope.required_blob(param::RESPONSE)?,
            folder: envelope.blob(param::FOLDER)?,
        })
    }
}
