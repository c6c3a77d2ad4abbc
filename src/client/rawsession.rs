use bytes::Bytes;
use flurry::HashMap;
use std::{sync::Arc, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::{mpsc, watch, RwLock},
    time::{self, Instant},
};

use super::{error::Error, run, Handler};
use crate::{
    protocol::{
        CreateFolderRequest, CreateFolderResponse, DeleteRequest, DeleteResponse, Envelope,
        FileDescriptor, GetDrivesRequest, GetDrivesResponse, GetFileContentRequest,
        GetFileContentResponse, GetFileRequest, GetFileResponse, GetFolderRequest,
        GetFolderResponse, MoveRequest, MoveResponse, Request, Response, WriteFileRequest,
        WriteFileResponse,
    },
    utils::frame,
};

/// How long a request waits for its final response unless told otherwise
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

type SharedRequests = HashMap<String, mpsc::UnboundedSender<Response>>;

pub(crate) struct SessionInner {
    requests: Arc<SharedRequests>,
    closed: watch::Sender<bool>,
}

impl SessionInner {
    /// Hands `response` to whoever is waiting on its request id. The waiter
    /// is forgotten once the final response has been routed.
    fn reply(&self, response: Response) -> Result<(), Error> {
        let request_id = response.request_id().to_owned();
        let is_more = response.status().is_more;

        let requests = self.requests.pin();
        let Some(sender) = requests.get(request_id.as_str()) else {
            return Err(Error::UnexpectedBehavior(format!(
                "{} for unknown request {}",
                response.type_tag(),
                request_id
            )));
        };

        let result = sender
            .send(response)
            .map_err(|_| Error::UnexpectedBehavior(format!("request {request_id} went away")));

        if !is_more {
            let _ = requests.remove(request_id.as_str());
        }

        result
    }
}

#[async_trait]
impl Handler for SessionInner {
    type Error = Error;

    async fn get_drives(&mut self, response: GetDrivesResponse) -> Result<(), Self::Error> {
        self.reply(response.into())
    }

    async fn get_folder(&mut self, response: GetFolderResponse) -> Result<(), Self::Error> {
        self.reply(response.into())
    }

    async fn get_file(&mut self, response: GetFileResponse) -> Result<(), Self::Error> {
        self.reply(response.into())
    }

    async fn get_file_content(
        &mut self,
        response: GetFileContentResponse,
    ) -> Result<(), Self::Error> {
        self.reply(response.into())
    }

    async fn write_file(&mut self, response: WriteFileResponse) -> Result<(), Self::Error> {
        self.reply(response.into())
    }

    async fn delete(&mut self, response: DeleteResponse) -> Result<(), Self::Error> {
        self.reply(response.into())
    }

    async fn move_path(&mut self, response: MoveResponse) -> Result<(), Self::Error> {
        self.reply(response.into())
    }

    async fn create_folder(&mut self, response: CreateFolderResponse) -> Result<(), Self::Error> {
        self.reply(response.into())
    }

    async fn disconnected(&mut self) {
        let _ = self.closed.send_replace(true);
        self.requests.pin().clear();
    }
}

/// Responses that belong to one request, in arrival order.
///
/// Iteration stops after the first response with `is_more == false`. The
/// deadline covers the whole exchange, not each response. Dropping the value
/// forgets the request, so anything arriving later is logged and discarded.
pub struct Responses {
    request_id: String,
    rx: mpsc::UnboundedReceiver<Response>,
    requests: Arc<SharedRequests>,
    closed: watch::Receiver<bool>,
    deadline: Instant,
    received: usize,
    finished: bool,
}

impl Responses {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Number of responses handed out so far
    pub const fn received(&self) -> usize {
        self.received
    }

    pub async fn next(&mut self) -> Option<Result<Response, Error>> {
        if self.finished {
            return None;
        }

        // responses already routed win over a close that happened after them
        let result = tokio::select! {
            biased;
            response = self.rx.recv() => match response {
                Some(response) => {
                    self.received += 1;
                    self.finished = !response.status().is_more;
                    return Some(Ok(response));
                }
                None => Error::Connection("session closed".to_owned()),
            },
            () = stream_closed(&mut self.closed) => {
                Error::Connection("session closed".to_owned())
            }
            () = time::sleep_until(self.deadline) => {
                if self.received == 0 {
                    Error::NoResponse
                } else {
                    Error::Timeout {
                        received: self.received,
                    }
                }
            }
        };

        self.finished = true;
        Some(Err(result))
    }

    /// Waits for the final response and returns it, skipping anything before
    /// it.
    pub async fn last(mut self) -> Result<Response, Error> {
        let mut last = None;
        while let Some(response) = self.next().await {
            last = Some(response?);
        }

        last.ok_or(Error::NoResponse)
    }
}

/// Resolves once the read task has seen the stream end
async fn stream_closed(closed: &mut watch::Receiver<bool>) {
    let _ = closed.wait_for(|closed| *closed).await;
}

impl Drop for Responses {
    fn drop(&mut self) {
        let _ = self.requests.pin().remove(self.request_id.as_str());
    }
}

/// Implements raw work with the protocol in request-response format.
/// Typed methods return the response when its status carries no error and
/// turn an error status into [`Error::Status`].
pub struct RawSession {
    tx: mpsc::UnboundedSender<Bytes>,
    requests: Arc<SharedRequests>,
    closed: watch::Receiver<bool>,
    security_key: String,
    timeout: RwLock<Duration>,
}

macro_rules! into_with_status {
    ($result:ident, $packet:ident) => {
        match $result {
            Response::$packet(p) if p.status.is_error() => Err(Error::from(&p.status)),
            Response::$packet(p) => Ok(p),
            _ => Err(Error::UnexpectedPacket),
        }
    };
}

impl RawSession {
    pub fn new<S, K>(stream: S, security_key: K) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        K: Into<String>,
    {
        let req_map = Arc::new(HashMap::new());
        let (closed_tx, closed_rx) = watch::channel(false);
        let inner = SessionInner {
            requests: req_map.clone(),
            closed: closed_tx,
        };

        Self {
            tx: run(stream, inner),
            requests: req_map,
            closed: closed_rx,
            security_key: security_key.into(),
            timeout: RwLock::new(DEFAULT_TIMEOUT),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = RwLock::new(timeout);
        self
    }

    /// Set the overall response deadline for requests sent from now on.
    /// Default: 30 seconds
    pub async fn set_timeout(&self, timeout: Duration) {
        *self.timeout.write().await = timeout;
    }

    pub fn security_key(&self) -> &str {
        &self.security_key
    }

    /// Either half of the stream has ended
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed() || *self.closed.borrow()
    }

    /// Closes the inner channel stream. Called by [`Drop`]
    pub fn close_session(&self) -> Result<(), Error> {
        if self.tx.is_closed() {
            return Ok(());
        }

        Ok(self.tx.send(Bytes::new())?)
    }

    /// Registers `request` and writes it to the stream. The request is known
    /// to the read task before any of its bytes leave.
    pub async fn send<R: Into<Request>>(&self, request: R) -> Result<Responses, Error> {
        if self.is_closed() {
            return Err(Error::Connection("session closed".to_owned()));
        }

        let request = request.into();
        let request_id = request.get_request_id().to_owned();
        let envelope = Envelope::try_from(request)?;
        let frame = frame(&envelope)?;

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.requests.pin().insert(request_id.clone(), tx);

        let responses = Responses {
            request_id,
            rx,
            requests: self.requests.clone(),
            closed: self.closed.clone(),
            deadline: Instant::now() + *self.timeout.read().await,
            received: 0,
            finished: false,
        };

        self.tx.send(frame)?;

        Ok(responses)
    }

    pub async fn get_drives(&self) -> Result<GetDrivesResponse, Error> {
        let result = self
            .send(GetDrivesRequest::new(self.security_key.as_str()))
            .await?
            .last()
            .await?;

        into_with_status!(result, GetDrives)
    }

    pub async fn get_folder<P: Into<String>>(
        &self,
        path: P,
        get_files: bool,
        recurse_sub_folders: bool,
    ) -> Result<GetFolderResponse, Error> {
        let result = self
            .send(GetFolderRequest::new(
                self.security_key.as_str(),
                path,
                get_files,
                recurse_sub_folders,
            ))
            .await?
            .last()
            .await?;

        into_with_status!(result, GetFolder)
    }

    pub async fn get_file<P: Into<String>>(&self, path: P) -> Result<GetFileResponse, Error> {
        let result = self
            .send(GetFileRequest::new(self.security_key.as_str(), path))
            .await?
            .last()
            .await?;

        into_with_status!(result, GetFile)
    }

    /// Content arrives as a stream of sections, so the caller gets the
    /// [`Responses`] as they are.
    pub async fn get_file_content<P: Into<String>>(
        &self,
        path: P,
        section_bytes: u64,
    ) -> Result<Responses, Error> {
        self.send(GetFileContentRequest::new(
            self.security_key.as_str(),
            path,
            section_bytes,
        ))
        .await
    }

    pub async fn write_file<S: Into<String>>(
        &self,
        session_id: S,
        file: FileDescriptor,
        content: Vec<u8>,
        is_more: bool,
    ) -> Result<WriteFileResponse, Error> {
        let result = self
            .send(WriteFileRequest::new(
                self.security_key.as_str(),
                session_id,
                file,
                content,
                is_more,
            ))
            .await?
            .last()
            .await?;

        into_with_status!(result, WriteFile)
    }

    pub async fn delete<P: Into<String>>(&self, path: P) -> Result<DeleteResponse, Error> {
        let result = self
            .send(DeleteRequest::new(self.security_key.as_str(), path))
            .await?
            .last()
            .await?;

        into_with_status!(result, Delete)
    }

    pub async fn move_path<O, N>(&self, old_path: O, new_path: N) -> Result<MoveResponse, Error>
    where
        O: Into<String>,
        N: Into<String>,
    {
        let result = self
            .send(MoveRequest::new(
                self.security_key.as_str(),
                old_path,
                new_path,
            ))
            .await?
            .last()
            .await?;

        into_with_status!(result, Move)
    }

    pub async fn create_folder<P: Into<String>>(
        &self,
        path: P,
    ) -> Result<CreateFolderResponse, Error> {
        let result = self
            .send(CreateFolderRequest::new(self.security_key.as_str(), path))
            .await?
            .last()
            .await?;

        into_with_status!(result, CreateFolder)
    }
}

impl Drop for RawSession {
    fn drop(&mut self) {
        let _ = self.close_session();
    }
}

#[cfg(test)]
mod test_rawsession {
    use tokio::io::{duplex, AsyncRead, AsyncWrite};

    use super::*;
    use crate::{
        protocol::{ErrorKind, ResponseStatus},
        utils::{read_packet, write_packet},
    };

    async fn next_request<S: AsyncRead + Unpin>(stream: &mut S) -> Request {
        let mut bytes = read_packet(stream).await.unwrap();
        let envelope = Envelope::try_from(&mut bytes).unwrap();
        Request::try_from(&envelope).unwrap()
    }

    async fn answer<S: AsyncWrite + Unpin>(stream: &mut S, response: Response) {
        let envelope = Envelope::try_from(response).unwrap();
        write_packet(stream, &envelope).await.unwrap();
    }

    #[tokio::test]
    async fn test_typed_request() {
        let (client, mut server) = duplex(64 * 1024);
        let session = RawSession::new(client, "key");

        let remote = tokio::spawn(async move {
            let request = next_request(&mut server).await;
            assert_eq!(request.security_key(), "key");
            let status = ResponseStatus::ok(request.get_request_id());
            answer(&mut server, CreateFolderResponse::new(status).into()).await;
            server
        });

        let response = session.create_folder("/data/new").await.unwrap();
        assert!(!response.status.is_error());
        let _server = remote.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status() {
        let (client, mut server) = duplex(64 * 1024);
        let session = RawSession::new(client, "key");

        let remote = tokio::spawn(async move {
            let request = next_request(&mut server).await;
            let status = ResponseStatus::error(
                request.get_request_id(),
                ErrorKind::PermissionDenied,
                "Permission denied",
            );
            answer(&mut server, DeleteResponse::new(status).into()).await;
            server
        });

        let error = session.delete("/data/a.txt").await.unwrap_err();
        assert_eq!(error.kind(), Some(ErrorKind::PermissionDenied));
        let _server = remote.await.unwrap();
    }

    #[tokio::test]
    async fn test_responses_routed_by_request_id() {
        let (client, mut server) = duplex(64 * 1024);
        let session = RawSession::new(client, "key");

        let mut first = session.send(DeleteRequest::new("key", "/a")).await.unwrap();
        let mut second = session.send(DeleteRequest::new("key", "/b")).await.unwrap();

        let a = next_request(&mut server).await;
        let b = next_request(&mut server).await;

        // answered in reverse order, with a stray response in between
        answer(
            &mut server,
            DeleteResponse::new(ResponseStatus::ok(b.get_request_id())).into(),
        )
        .await;
        answer(
            &mut server,
            DeleteResponse::new(ResponseStatus::ok("nobody")).into(),
        )
        .await;
        answer(
            &mut server,
            DeleteResponse::new(ResponseStatus::ok(a.get_request_id())).into(),
        )
        .await;

        let response = second.next().await.unwrap().unwrap();
        assert_eq!(response.request_id(), b.get_request_id());
        assert!(second.next().await.is_none());

        let response = first.next().await.unwrap().unwrap();
        assert_eq!(response.request_id(), a.get_request_id());
        assert!(first.next().await.is_none());
    }

    #[tokio::test]
    async fn test_streamed_responses() {
        let (client, mut server) = duplex(64 * 1024);
        let session = RawSession::new(client, "key");

        let mut responses = session.get_file_content("/a", 1000).await.unwrap();
        let request = next_request(&mut server).await;
        for sequence in 0..3 {
            let status = ResponseStatus::section(request.get_request_id(), sequence, sequence < 2);
            answer(
                &mut server,
                GetFileContentResponse::new(status, vec![1; 10]).into(),
            )
            .await;
        }

        let mut count = 0;
        while let Some(response) = responses.next().await {
            assert_eq!(response.unwrap().status().sequence, Some(count));
            count += 1;
        }
        assert_eq!(count, 3);
        assert_eq!(responses.received(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_response() {
        let (client, _server) = duplex(64 * 1024);
        let session = RawSession::new(client, "key").with_timeout(Duration::from_secs(5));

        assert_eq!(session.get_drives().await.unwrap_err(), Error::NoResponse);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_stream_times_out() {
        let (client, mut server) = duplex(64 * 1024);
        let session = RawSession::new(client, "key");
        session.set_timeout(Duration::from_secs(5)).await;

        let mut responses = session.get_file_content("/a", 1000).await.unwrap();
        let request = next_request(&mut server).await;
        let status = ResponseStatus::section(request.get_request_id(), 0, true);
        answer(
            &mut server,
            GetFileContentResponse::new(status, vec![1; 10]).into(),
        )
        .await;

        assert!(responses.next().await.unwrap().is_ok());
        assert_eq!(
            responses.next().await.unwrap().unwrap_err(),
            Error::Timeout { received: 1 }
        );
        assert!(responses.next().await.is_none());
    }

    #[tokio::test]
    async fn test_closed_stream() {
        let (client, server) = duplex(64 * 1024);
        let session = RawSession::new(client, "key");

        let mut responses = session.send(GetDrivesRequest::new("key")).await.unwrap();
        drop(server);

        assert!(matches!(
            responses.next().await.unwrap(),
            Err(Error::Connection(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_wakes_waiters_before_deadline() {
        let (client, server) = duplex(64 * 1024);
        let session = RawSession::new(client, "key").with_timeout(Duration::from_secs(3600));

        let started = Instant::now();
        let waiter = tokio::spawn(async move { session.get_drives().await });
        time::sleep(Duration::from_millis(10)).await;
        drop(server);

        assert!(matches!(waiter.await.unwrap(), Err(Error::Connection(_))));
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_send_after_disconnect() {
        let (client, server) = duplex(64 * 1024);
        let session = RawSession::new(client, "key");
        drop(server);

        for _ in 0..100 {
            if session.is_closed() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }

        assert!(session.is_closed());
        assert!(matches!(
            session.get_drives().await,
            Err(Error::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_send_after_close() {
        let (client, _server) = duplex(64 * 1024);
        let session = RawSession::new(client, "key");
        session.close_session().unwrap();

        // the writer task notices the empty frame asynchronously
        for _ in 0..100 {
            if session.tx.is_closed() {
                break;
            }
            time::sleep(Duration::from_millis(10)).await;
        }

        assert!(matches!(
            session.get_drives().await,
            Err(Error::Connection(_))
        ));
    }
}
