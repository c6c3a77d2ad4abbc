use super::{
    impl_packet_for, impl_request_id, param, request_envelope, response_envelope, Envelope,
    FileDescriptor, Request, RequestId, Response, ResponseStatus, GET_FILE_REQUEST,
    GET_FILE_RESPONSE,
};
use crate::{error::Error, utils::new_id};

/// Implementation for `GetFileRequest`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFileRequest {
    pub id: String,
    pub security_key: String,
    pub path: String,
}

impl GetFileRequest {
    pub fn new<K: Into<String>, P: Into<String>>(security_key: K, path: P) -> Self {
        Self {
            id: new_id(),
            security_key: security_key.into(),
            path: path.into(),
        }
    }
}

impl_request_id!(GetFileRequest);
impl_packet_for!(GetFile, GetFileRequest, Request);

impl TryFrom<GetFileRequest> for Envelope {
    type Error = Error;

    fn try_from(request: GetFileRequest) -> Result<Self, Self::Error> {
        let mut envelope = request_envelope(request.id, GET_FILE_REQUEST, request.security_key);
        envelope.put(param::PATH, request.path);
        Ok(envelope)
    }
}

impl TryFrom<&Envelope> for GetFileRequest {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            security_key: envelope.required(param::SECURITY_KEY)?.to_owned(),
            path: envelope.required(param::PATH)?.to_owned(),
        })
    }
}

/// Implementation for `GetFileResponse`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFileResponse {
    pub id: String,
    pub status: ResponseStatus,
    pub file: Option<FileDescriptor>,
}

impl GetFileResponse {
    pub fn new(status: ResponseStatus, file: Option<FileDescriptor>) -> Self {
        Self {
            id: new_id(),
            status,
            file,
        }
    }
}

impl_packet_for!(GetFile, GetFileResponse, Response);

impl TryFrom<GetFileResponse> for Envelope {
    type Error = Error;

    fn try_from(response: GetFileResponse) -> Result<Self, Self::Error> {
        let mut envelope = response_envelope(response.id, GET_FILE_RESPONSE, &response.status)?;
        envelope.put_blob(param::FILE, response.file.as_ref())?;
        Ok(envelope)
    }
}

impl TryFrom<&Envelope> for GetFileResponse {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            status: envelope.required_blob(param::RESPONSE)?,
            file: envelope.blob(param::FILE)?,
        })
    }
}
