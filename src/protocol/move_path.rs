use super::{
    impl_packet_for, impl_request_id, param, request_envelope, response_envelope, Envelope,
    Request, RequestId, Response, ResponseStatus, MOVE_REQUEST, MOVE_RESPONSE,
};
use crate::{error::Error, utils::new_id};

/// Moves a file or folder from `old_path` to `new_path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRequest {
    pub id: String,
    pub security_key: String,
    pub old_path: String,
    pub new_path: String,
}

impl MoveRequest {
    pub fn new<K: Into<String>, O: Into<String>, N: Into<String>>(
        security_key: K,
        old_path: O,
        new_path: N,
    ) -> Self {
        Self {
            id: new_id(),
            security_key: security_key.into(),
            old_path: old_path.into(),
            new_path: new_path.into(),
        }
    }
}

impl_request_id!(MoveRequest);
impl_packet_for!(Move, MoveRequest, Request);

impl TryFrom<MoveRequest> for Envelope {
    type Error = Error;

    fn try_from(request: MoveRequest) -> Result<Self, Self::Error> {
        let mut envelope = request_envelope(request.id, MOVE_REQUEST, request.security_key);
        envelope.put(param::OLD_PATH, request.old_path);
        envelope.put(param::NEW_PATH, request.new_path);
        Ok(envelope)
    }
}

impl TryFrom<&Envelope> for MoveRequest {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            security_key: envelope.required(param::SECURITY_KEY)?.to_owned(),
            old_path: envelope.required(param::OLD_PATH)?.to_owned(),
            new_path: envelope.required(param::NEW_PATH)?.to_owned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveResponse {
    pub id: String,
    pub status: ResponseStatus,
}

impl MoveResponse {
    pub fn new(status: ResponseStatus) -> Self {
        Self {
            id: new_id(),
            status,
        }
    }
}

impl_packet_for!(Move, MoveResponse, Response);

impl TryFrom<MoveResponse> for Envelope {
    type Error = Error;

    fn try_from(response: MoveResponse) -> Result<Self, Self::Error> {
        response_envelope(response.id, MOVE_RESPONSE, &response.status)
    }
}

impl TryFrom<&Envelope> for MoveResponse {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            status: envelope.required_blob(param::RESPONSE)?,
        })
    }
}
