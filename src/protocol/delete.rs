use super::{
    impl_packet_for, impl_request_id, param, request_envelope, response_envelope, Envelope,
    Request, RequestId, Response, ResponseStatus, DELETE_REQUEST, DELETE_RESPONSE,
};
use crate::{error::Error, utils::new_id};

/// Removes a file or a whole folder tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub id: String,
    pub security_key: String,
    pub path: String,
}

impl DeleteRequest {
    pub fn new<K: Into<String>, P: Into<String>>(security_key: K, path: P) -> Self {
        Self {
            id: new_id(),
            security_key: security_key.into(),
            path: path.into(),
        }
    }
}

impl_request_id!(DeleteRequest);
impl_packet_for!(Delete, DeleteRequest, Request);

impl TryFrom<DeleteRequest> for Envelope {
    type Error = Error;

    fn try_from(request: DeleteRequest) -> Result<Self, Self::Error> {
        let mut envelope = request_envelope(request.id, DELETE_REQUEST, request.security_key);
        envelope.put(param::PATH, request.path);
        Ok(envelope)
    }
}

impl TryFrom<&Envelope> for DeleteRequest {
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
pub struct DeleteResponse {
    pub id: String,
    pub status: ResponseStatus,
}

impl DeleteResponse {
    pub fn new(status: ResponseStatus) -> Self {
        Self {
            id: new_id(),
            status,
        }
    }
}

impl_packet_for!(Delete, DeleteResponse, Response);

impl TryFrom<DeleteResponse> for Envelope {
    type Error = Error;

    fn try_from(response: DeleteResponse) -> Result<Self, Self::Error> {
        response_envelope(response.id, DELETE_RESPONSE, &response.status)
    }
}

impl TryFrom<&Envelope> for DeleteResponse {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            status: envelope.required_blob(param::RESPONSE)?,
        })
    }
}
