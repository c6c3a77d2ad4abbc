use super::{
    impl_packet_for, impl_request_id, param, request_envelope, response_envelope, Envelope,
    FileDescriptor, Request, RequestId, Response, ResponseStatus, WRITE_FILE_REQUEST,
    WRITE_FILE_RESPONSE,
};
use crate::{error::Error, utils::new_id};

/// One chunk of an upload. All chunks of the same upload share `session_id`
/// and the last one has `is_more == false`.
#[derive(Clone, PartialEq, Eq)]
pub struct WriteFileRequest {
    pub id: String,
    pub security_key: String,
    pub session_id: String,
    pub file: FileDescriptor,
    pub content: Vec<u8>,
    pub is_more: bool,
}

impl std::fmt::Debug for WriteFileRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteFileRequest")
            .field("id", &self.id)
            .field("session_id", &self.session_id)
            .field("file", &self.file.path)
            .field("content", &self.content.len())
            .field("is_more", &self.is_more)
            .finish()
    }
}

impl WriteFileRequest {
    pub fn new<K: Into<String>, S: Into<String>>(
        security_key: K,
        session_id: S,
        file: FileDescriptor,
        content: Vec<u8>,
        is_more: bool,
    ) -> Self {
        Self {
            id: new_id(),
            security_key: security_key.into(),
            session_id: session_id.into(),
            file,
            content,
            is_more,
        }
    }
}

impl_request_id!(WriteFileRequest);
impl_packet_for!(WriteFile, WriteFileRequest, Request);

impl TryFrom<WriteFileRequest> for Envelope {
    type Error = Error;

    fn try_from(request: WriteFileRequest) -> Result<Self, Self::Error> {
        let mut envelope = request_envelope(request.id, WRITE_FILE_REQUEST, request.security_key);
        envelope.put(param::SESSION_ID, request.session_id);
        envelope.put_blob(param::FILE, Some(&request.file))?;
        envelope.put_bytes(param::CONTENT, &request.content);
        envelope.put_bool(param::IS_MORE, request.is_more);
        Ok(envelope)
    }
}

impl TryFrom<&Envelope> for WriteFileRequest {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            security_key: envelope.required(param::SECURITY_KEY)?.to_owned(),
            session_id: envelope.required(param::SESSION_ID)?.to_owned(),
            file: envelope.required_blob(param::FILE)?,
            content: envelope.bytes(param::CONTENT)?,
            is_more: envelope.required_bool(param::IS_MORE)?,
        })
    }
}

/// Implementation for `WriteFileResponse`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFileResponse {
    pub id: String,
    pub status: ResponseStatus,
    pub session_id: String,
}

impl WriteFileResponse {
    pub fn new<S: Into<String>>(status: ResponseStatus, session_id: S) -> Self {
        Self {
            id: new_id(),
            status,
            session_id: session_id.into(),
        }
    }
}

impl_packet_for!(WriteFile, WriteFileResponse, Response);

impl TryFrom<WriteFileResponse> for Envelope {
    type Error = Error;

    fn try_from(response: WriteFileResponse) -> Result<Self, Self::Error> {
        let mut envelope = response_envelope(response.id, WRITE_FILE_RESPONSE, &response.status)?;
        envelope.put(param::SESSION_ID, response.session_id);
        Ok(envelope)
    }
}

impl TryFrom<&Envelope> for WriteFileResponse {
    type Error = Error;

    fn try_from(envelope: &Envelope) -> Result<Self, Self::Error> {
        Ok(Self {
            id: envelope.id.clone(),
            status: envelope.required_blob(param::RESPONSE)?,
            session_id: envelope.get(param::SESSION_ID).unwrap_or_default().to_owned(),
        })
    }
}
