use super::{
    impl_packet_for, impl_request_id, param, request_envelope, response_envelope, Envelope,
    Request, RequestId, Response, ResponseStatus, CREATE_FOLDER_REQUEST, CREATE_FOLDER_RESPONSE,
};
use crate::{error::Error, utils::new_id};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFolderRequest {
    pub id: String,
    pub security_key: String,
    pub path: String,
}

impl CreateFolderRequest {
    pub fn new<K: Into<String>, P: Into<String>>(security_key: K, path: P) -> Self {
        Self {
            id: new_id(),
            security_key: security_key.into(),
            path: path.into(),
        }
    }
}

impl_request_id!(CreateFolderRequest);
impl_packet_for!(CreateFolder, CreateFolderRequest, Request);

impl TryFrom<CreateFolderRequest> for Envelope {
    type Error = Error;

    fn try_from(request: CreateFolderRequest) -> Result<Self, Self::Error> {
        let mut envelope =
            request_envelope(request.id, CREATE_FOLDER_REQUEST, request.security_key);
        envelope.put(param::PATH, request.path);
        Ok(envelope)
    }
}

impl TryFrom<&Envelope> for CreateFolderRequest {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            security_key: envelope.required(param::SECURITY_KEY)?.to_owned(),
            path: envelope.required(param::PATH)?.to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateFolderResponse {
    pub id: String,
    pub status: ResponseStatus,
}

impl CreateFolderResponse {
    pub fn new(status: ResponseStatus) -> Self {
        Self {
            id: new_id(),
            status,
        }
    }
}

impl_packet_for!(CreateFolder, CreateFolderResponse, Response);

impl TryFrom<CreateFolderResponse> for Envelope {
    type Error = Error;

    fn try_from(response: CreateFolderResponse) -> Result<Self, Self::Error> {
        response_envelope(response.id, CREATE_FOLDER_RESPONSE, &response.status)
    }
}

impl TryFrom<&Envelope> for CreateFolderResponse {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            status: envelope.required_blob(param::RESPONSE)?,
        })
    }
}
