mod dispatcher;
mod observer;
mod sessions;

use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::{
    io::{split, AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf},
    net::TcpListener,
    sync::mpsc,
    task::JoinHandle,
};

pub use self::{
    dispatcher::{Dispatcher, Reply},
    observer::{LogObserver, Observer},
    sessions::{WriteProgress, WriteSession, WriteSessions, DEFAULT_SESSION_TIMEOUT},
};

use crate::{
    auth::{AuthorizationGate, JsonUserDirectory, UserDirectory},
    config::ServerConfig,
    error::Error,
    fs::{FileSystem, LocalFileSystem},
    protocol::{param, Envelope, ErrorKind, Request, Response},
    utils::{read_packet, write_packet},
};

/// Shared by every connection of one server
struct Shared {
    dispatcher: Arc<Dispatcher>,
    observer: Arc<dyn Observer>,
    response_channel_depth: usize,
}

impl Shared {
    fn serve<S>(self: &Arc<Self>, stream: S, remote: String) -> JoinHandle<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let shared = self.clone();
        tokio::spawn(async move { shared.run(stream, remote).await })
    }

    async fn run<S>(self: Arc<Self>, stream: S, remote: String)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        self.observer.connected(&remote);

        let (mut rd, mut wr) = split(stream);
        let (tx, mut rx) = mpsc::channel::<Envelope>(self.response_channel_depth.max(1));

        let writer = tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                if let Err(err) = write_packet(&mut wr, &envelope).await {
                    warn!("unable to send {}: {}", envelope.type_tag, err);
                    break;
                }
            }

            let _ = wr.shutdown().await;
        });

        loop {
            match self.process(&mut rd, &tx, &remote).await {
                Err(Error::UnexpectedEof) => break,
                Err(err) => {
                    warn!("{}: {}", remote, err);
                    break;
                }
                Ok(()) => (),
            }
        }

        drop(tx);
        let _ = writer.await;

        self.observer.disconnected(&remote);
        debug!("connection with {} ended", remote);
    }

    /// Reads one envelope and answers it completely before returning
    async fn process<S>(
        self: &Arc<Self>,
        stream: &mut ReadHalf<S>,
        tx: &mpsc::Sender<Envelope>,
        remote: &str,
    ) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut bytes = read_packet(stream).await?;

        let envelope = match Envelope::try_from(&mut bytes) {
            Ok(envelope) => envelope,
            Err(err) => {
                self.observer.error(remote, "", "", &err.to_string());
                return Ok(());
            }
        };

        self.observer
            .request_received(remote, &envelope.id, &envelope.type_tag);

        let request = match Request::try_from(&envelope) {
            Ok(request) => request,
            Err(err) => return self.reject(&envelope, &err, tx, remote).await,
        };

        let shared = self.clone();
        let tx = tx.clone();
        let remote = remote.to_owned();

        let handled = tokio::task::spawn_blocking(move || {
            shared.dispatcher.dispatch(request, &mut |response: Response| {
                shared.deliver(response, &tx, &remote)
            })
        })
        .await;

        match handled {
            Ok(Err(Error::Closed)) => Err(Error::Closed),
            Ok(Err(err)) => {
                warn!("request {} not answered: {}", envelope.id, err);
                Ok(())
            }
            Ok(Ok(())) => Ok(()),
            Err(err) => Err(Error::IO(err.to_string())),
        }
    }

    /// Runs on the blocking pool
    fn deliver(
        &self,
        response: Response,
        tx: &mpsc::Sender<Envelope>,
        remote: &str,
    ) -> Result<(), Error> {
        let status = response.status().clone();
        let type_tag = response.type_tag();

        if let Some(kind) = status.error_kind {
            self.observer.error(
                remote,
                &status.request_id,
                type_tag,
                &format!("{kind}: {}", status.error_message.as_deref().unwrap_or_default()),
            );
        }

        let envelope = Envelope::try_from(response)?;
        tx.blocking_send(envelope).map_err(|_| Error::Closed)?;

        self.observer.response_sent(remote, type_tag, &status);
        Ok(())
    }

    /// Answers an envelope whose request could not be decoded
    async fn reject(
        &self,
        envelope: &Envelope,
        err: &Error,
        tx: &mpsc::Sender<Envelope>,
        remote: &str,
    ) -> Result<(), Error> {
        let message = err.to_string();
        self.observer
            .error(remote, &envelope.id, &envelope.type_tag, &message);

        let Some(response) = Response::error(
            &envelope.type_tag,
            &envelope.id,
            envelope.get(param::SESSION_ID),
            ErrorKind::Unknown,
            &message,
        ) else {
            return Ok(());
        };

        let type_tag = response.type_tag();
        let status = response.status().clone();
        tx.send(Envelope::try_from(response)?)
            .await
            .map_err(|_| Error::Closed)?;

        self.observer.response_sent(remote, type_tag, &status);
        Ok(())
    }
}

/// Answers requests from any number of connections. Uploads in progress are
/// shared by all connections and abandoned after a period of inactivity.
pub struct Server {
    shared: Arc<Shared>,
    sessions: Arc<WriteSessions>,
    sweep_interval: std::time::Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Server {
    pub fn new(
        config: &ServerConfig,
        fs: Arc<dyn FileSystem>,
        directory: Arc<dyn UserDirectory>,
    ) -> Self {
        let gate = Arc::new(AuthorizationGate::with_refresh(
            directory,
            config.user_cache_refresh(),
        ));
        let sessions = Arc::new(WriteSessions::new(config.write_session_timeout()));
        let dispatcher = Arc::new(Dispatcher::new(fs, gate, sessions.clone()));

        Self {
            shared: Arc::new(Shared {
                dispatcher,
                observer: Arc::new(LogObserver),
                response_channel_depth: config.response_channel_depth,
            }),
            sessions,
            sweep_interval: config.sweep_interval(),
            sweeper: Mutex::new(None),
            listener: Mutex::new(None),
        }
    }

    /// Server over the local file system with users from
    /// [`ServerConfig::users_file`]
    pub fn from_config(config: &ServerConfig) -> Self {
        let fs = match &config.drives {
            Some(drives) => LocalFileSystem::with_drives(drives.clone()),
            None => LocalFileSystem::new(),
        };
        let directory = JsonUserDirectory::new(&config.users_file);

        Self::new(config, Arc::new(fs), Arc::new(directory))
    }

    /// Replaces the default [`LogObserver`]. Must be called before any
    /// connection is served.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        let dispatcher = self.shared.dispatcher.clone();
        let response_channel_depth = self.shared.response_channel_depth;

        self.shared = Arc::new(Shared {
            dispatcher,
            observer,
            response_channel_depth,
        });
        self
    }

    pub fn gate(&self) -> &Arc<AuthorizationGate> {
        self.shared.dispatcher.gate()
    }

    pub fn sessions(&self) -> &Arc<WriteSessions> {
        &self.sessions
    }

    fn ensure_sweeper(&self) {
        if let Ok(mut sweeper) = self.sweeper.lock() {
            if sweeper.is_none() {
                *sweeper = Some(self.sessions.spawn_sweeper(self.sweep_interval));
            }
        }
    }

    /// Serves one already established connection
    pub fn serve<S, R>(&self, stream: S, remote: R) -> JoinHandle<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        R: Into<String>,
    {
        self.ensure_sweeper();
        self.shared.serve(stream, remote.into())
    }

    /// Accepts TCP connections on `addr` until [`Server::stop_listening`].
    /// Returns the bound address.
    pub async fn start_listening(&self, addr: &str) -> Result<SocketAddr, Error> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("listening on {}", local_addr);

        self.ensure_sweeper();

        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        let _ = stream.set_nodelay(true);
                        let _ = shared.serve(stream, peer.to_string());
                    }
                    Err(err) => {
                        error!("accept failed: {}", err);
                        break;
                    }
                }
            }
        });

        if let Ok(mut listener) = self.listener.lock() {
            if let Some(previous) = listener.replace(handle) {
                previous.abort();
            }
        }

        Ok(local_addr)
    }

    /// Stops accepting connections. Established connections are kept.
    pub fn stop_listening(&self) {
        if let Some(handle) = self.listener.lock().ok().and_then(|mut l| l.take()) {
            handle.abort();
            info!("stopped listening");
        }
    }

    /// Stops listening and sweeping, then abandons every upload in progress
    pub async fn shutdown(&self) {
        self.stop_listening();

        if let Some(handle) = self.sweeper.lock().ok().and_then(|mut s| s.take()) {
            handle.abort();
        }

        let sessions = self.sessions.clone();
        let _ = tokio::task::spawn_blocking(move || sessions.abandon_all()).await;
    }
}

#[cfg(test)]
mod test_server {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::duplex;

    use super::*;
    use crate::{
        auth::{MemoryUserDirectory, Roles, User},
        protocol::{GetFolderRequest, ResponseStatus, GET_FOLDER_RESPONSE},
    };

    #[derive(Default)]
    struct Counting {
        connected: AtomicUsize,
        errors: AtomicUsize,
        sent: AtomicUsize,
    }

    impl Observer for Counting {
        fn connected(&self, _remote: &str) {
            let _ = self.connected.fetch_add(1, Ordering::SeqCst);
        }

        fn response_sent(&self, _remote: &str, _type_tag: &str, _status: &ResponseStatus) {
            let _ = self.sent.fetch_add(1, Ordering::SeqCst);
        }

        fn error(&self, _remote: &str, _request_id: &str, _type_tag: &str, _message: &str) {
            let _ = self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn server(observer: Arc<Counting>) -> Server {
        let directory = MemoryUserDirectory::new(vec![User::new("u", "key", Roles::READ)]);
        Server::new(
            &ServerConfig::default(),
            Arc::new(LocalFileSystem::new()),
            Arc::new(directory),
        )
        .with_observer(observer)
    }

    async fn read_envelope<S: AsyncRead + Unpin>(stream: &mut S) -> Envelope {
        let mut bytes = read_packet(stream).await.unwrap();
        Envelope::try_from(&mut bytes).unwrap()
    }

    #[tokio::test]
    async fn test_bad_request_gets_paired_error() {
        let observer = Arc::new(Counting::default());
        let server = server(observer.clone());
        let (mut client, remote) = duplex(64 * 1024);
        let handle = server.serve(remote, "test");

        // no Path parameter
        let mut envelope = Envelope::new("req-1", "GetFolderRequest");
        envelope.put("SecurityKey", "key");
        write_packet(&mut client, &envelope).await.unwrap();

        let reply = read_envelope(&mut client).await;
        assert_eq!(reply.type_tag, GET_FOLDER_RESPONSE);

        let Response::GetFolder(response) = Response::try_from(&reply).unwrap() else {
            panic!("unexpected response");
        };
        assert_eq!(response.status.request_id, "req-1");
        assert_eq!(response.status.error_kind, Some(ErrorKind::Unknown));

        drop(client);
        handle.await.unwrap();

        assert_eq!(observer.connected.load(Ordering::SeqCst), 1);
        assert_eq!(observer.errors.load(Ordering::SeqCst), 1);
        assert_eq!(observer.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_request_over_stream() {
        let dir = tempfile::tempdir().unwrap();
        let server = server(Arc::new(Counting::default()));
        let (mut client, remote) = duplex(64 * 1024);
        let _handle = server.serve(remote, "test");

        let request = GetFolderRequest::new("key", dir.path().to_string_lossy(), true, false);
        let id = request.id.clone();
        let envelope = Envelope::try_from(Request::from(request)).unwrap();
        write_packet(&mut client, &envelope).await.unwrap();

        let reply = read_envelope(&mut client).await;
        let response = Response::try_from(&reply).unwrap();
        assert_eq!(response.request_id(), id);
        assert!(!response.status().is_error());
    }

    #[tokio::test]
    async fn test_listen_and_stop() {
        let server = server(Arc::new(Counting::default()));
        let addr = server.start_listening("127.0.0.1:0").await.unwrap();

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        drop(stream);

        server.stop_listening();
        server.shutdown().await;
        assert!(server.sessions().is_empty());
    }
}
