use super::{
    impl_packet_for, impl_request_id, param, request_envelope, response_envelope, Drive,
    Envelope, Request, RequestId, Response, ResponseStatus, GET_DRIVES_REQUEST,
    GET_DRIVES_RESPONSE,
};
use crate::{error::Error, utils::new_id};

/// Implementation for `GetDrivesRequest`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDrivesRequest {
    pub id: String,
    pub security_key: String,
}

impl GetDrivesRequest {
    pub fn new<K: Into<String>>(security_key: K) -> Self {
        Self {
            id: new_id(),
            security_key: security_key.into(),
        }
    }
}

impl_request_id!(GetDrivesRequest);
impl_packet_for!(GetDrives, GetDrivesRequest, Request);

impl TryFrom<GetDrivesRequest> for Envelope {
    type Error = Error;

    fn try_from(request: GetDrivesRequest) -> Result<Self, Self::Error> {
        Ok(request_envelope(
            request.id,
            GET_DRIVES_REQUEST,
            request.security_key,
        ))
    }
}

impl TryFrom<&Envelope> for GetDrivesRequest {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            security_key: envelope.required(param::SECURITY_KEY)?.to_owned(),
        })
    }
}

/// Implementation for `GetDrivesResponse`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDrivesResponse {
    pub id: String,
    pub status: ResponseStatus,
    pub drives: Vec<Drive>,
}

impl GetDrivesResponse {
    pub fn new(status: ResponseStatus, drives: Vec<Drive>) -> Self {
        Self {
            id: new_id(),
            status,
            drives,
        }
    }
}

impl_packet_for!(GetDrives, GetDrivesResponse, Response);

impl TryFrom<GetDrivesResponse> for Envelope {
    type Error = Error;

    fn try_from(response: GetDrivesResponse) -> Result<Self, Self::Error> {
        let mut envelope = response_envelope(response.id, GET_DRIVES_RESPONSE, &response.status)?;
        envelope.put_blob(param::DRIVES, Some(&response.drives))?;
        Ok(envelope)
    }
}

impl TryFrom<&Envelope> for GetDrivesResponse {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            status: envelope.required_blob(param::RESPONSE)?,
            drives: envelope.blob(param::DRIVES)?.unwrap_or_default(),
        })
    }
}
