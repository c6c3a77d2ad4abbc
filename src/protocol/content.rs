use super::{
    impl_packet_for, impl_request_id, param, request_envelope, response_envelope, Envelope,
    Request, RequestId, Response, ResponseStatus, GET_FILE_CONTENT_REQUEST,
    GET_FILE_CONTENT_RESPONSE,
};
use crate::{error::Error, utils::new_id};

/// Section size used when a caller has no preference
pub const DEFAULT_SECTION_BYTES: u64 = 1024 * 1000;

/// Implementation for `GetFileContentRequest`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetFileContentRequest {
    pub id: String,
    pub security_key: String,
    pub path: String,
    pub section_bytes: u64,
}

impl GetFileContentRequest {
    pub fn new<K: Into<String>, P: Into<String>>(
        security_key: K,
        path: P,
        section_bytes: u64,
    ) -> Self {
        Self {
            id: new_id(),
            security_key: security_key.into(),
            path: path.into(),
            section_bytes,
        }
    }
}

impl_request_id!(GetFileContentRequest);
impl_packet_for!(GetFileContent, GetFileContentRequest, Request);

impl TryFrom<GetFileContentRequest> for Envelope {
    type Error = Error;

    fn try_from(request: GetFileContentRequest) -> Result<Self, Self::Error> {
        let mut envelope =
            request_envelope(request.id, GET_FILE_CONTENT_REQUEST, request.security_key);
        envelope.put(param::PATH, request.path);
        envelope.put(param::SECTION_BYTES, request.section_bytes.to_string());
        Ok(envelope)
    }
}

impl TryFrom<&Envelope> for GetFileContentRequest {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        let section_bytes = match envelope.get(param::SECTION_BYTES) {
            None | Some("") => DEFAULT_SECTION_BYTES,
            Some(_) => envelope.required_u64(param::SECTION_BYTES)?,
        };

        Ok(Self {
            id: envelope.id.clone(),
            security_key: envelope.required(param::SECURITY_KEY)?.to_owned(),
            path: envelope.required(param::PATH)?.to_owned(),
            section_bytes,
        })
    }
}

/// One section of a file. The sequence number and continuation flag live in
/// the status block.
#[derive(Clone, PartialEq, Eq)]
pub struct GetFileContentResponse {
    pub id: String,
    pub status: ResponseStatus,
    pub content: Vec<u8>,
}

impl std::fmt::Debug for GetFileContentResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetFileContentResponse")
            .field("id", &self.id)
            .field("status", &self.status)
            .field("content", &self.content.len())
            .finish()
    }
}

impl GetFileContentResponse {
    pub fn new(status: ResponseStatus, content: Vec<u8>) -> Self {
        Self {
            id: new_id(),
            status,
            content,
        }
    }
}

impl_packet_for!(GetFileContent, GetFileContentResponse, Response);

impl TryFrom<GetFileContentResponse> for Envelope {
    type Error = Error;

    fn try_from(response: GetFileContentResponse) -> Result<Self, Self::Error> {
        let mut envelope =
            response_envelope(response.id, GET_FILE_CONTENT_RESPONSE, &response.status)?;
        envelope.put_bytes(param::CONTENT, &response.content);
        Ok(envelope)
    }
}

impl TryFrom<&Envelope> for GetFileContentResponse {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            status: envelope.required_blob(param::RESPONSE)?,
            content: envelope.bytes(param::CONTENT)?,
        })
    }
}
