pub mod error;
mod handler;
pub mod rawsession;
mod session;

pub use error::Error;
pub use handler::Handler;
pub use rawsession::{RawSession, Responses, DEFAULT_TIMEOUT};
pub use session::RemoteFileSystem;

use bytes::Bytes;
use tokio::{
    io::{split, AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
};

use crate::{
    config::ClientConfig,
    error::Error as ProtocolError,
    protocol::{Envelope, Response},
    utils::read_packet,
};

macro_rules! into_wrap {
    ($handler:expr) => {
        match $handler.await {
            Err(error) => Err(error.into()),
            Ok(()) => Ok(()),
        }
    };
}

async fn execute_handler<H>(bytes: &mut Bytes, handler: &mut H) -> Result<(), Error>
where
    H: Handler + Send,
{
    let envelope = Envelope::try_from(bytes)?;

    match Response::try_from(&envelope)? {
        Response::GetDrives(r) => into_wrap!(handler.get_drives(r)),
        Response::GetFolder(r) => into_wrap!(handler.get_folder(r)),
        Response::GetFile(r) => into_wrap!(handler.get_file(r)),
        Response::GetFileContent(r) => into_wrap!(handler.get_file_content(r)),
        Response::WriteFile(r) => into_wrap!(handler.write_file(r)),
        Response::Delete(r) => into_wrap!(handler.delete(r)),
        Response::Move(r) => into_wrap!(handler.move_path(r)),
        Response::CreateFolder(r) => into_wrap!(handler.create_folder(r)),
    }
}

/// Run processing stream as a client. Is a simple handler of incoming
/// and outgoing frames. Can be used for non-standard implementations.
///
/// Every frame sent through the returned channel is written as is; an empty
/// frame shuts the write half down.
pub fn run<S, H>(stream: S, mut handler: H) -> mpsc::UnboundedSender<Bytes>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    H: Handler + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();

    let (mut rd, mut wr) = split(stream);
    tokio::spawn(async move {
        loop {
            let mut bytes = match read_packet(&mut rd).await {
                Ok(bytes) => bytes,
                Err(ProtocolError::UnexpectedEof) => break,
                Err(err) => {
                    warn!("{}", err);
                    break;
                }
            };

            if let Err(err) = execute_handler(&mut bytes, &mut handler).await {
                warn!("{}", err);
            }
        }

        handler.disconnected().await;
        debug!("read half of client stream ended");
    });

    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if data.is_empty() {
                let _ = wr.shutdown().await;
                break;
            }

            if let Err(err) = wr.write_all(&data[..]).await {
                warn!("{}", err);
                break;
            }
        }

        debug!("write half of client stream ended");
    });

    tx
}

/// Opens a TCP connection to `config.remote_addr`
pub async fn connect(config: &ClientConfig) -> Result<RemoteFileSystem, Error> {
    let stream = TcpStream::connect(&config.remote_addr)
        .await
        .map_err(|err| Error::Connection(err.to_string()))?;
    stream.set_nodelay(true)?;

    info!("connected to {}", config.remote_addr);

    Ok(RemoteFileSystem::new(stream, config))
}
