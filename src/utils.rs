use bytes::{BufMut, Bytes, BytesMut};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{error::Error, protocol::Envelope};

/// Upper bound for one frame. A section of a few megabytes plus its base64
/// overhead stays well below this.
pub const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

pub async fn read_packet<S: AsyncRead + Unpin>(stream: &mut S) -> Result<Bytes, Error> {
    let length = stream.read_u32().await?;
    if length > MAX_FRAME_LEN {
        return Err(Error::BadMessage(format!("frame of {length} bytes is too large")));
    }

    let mut buf = vec![0; length as usize];
    stream.read_exact(&mut buf).await?;

    Ok(Bytes::from(buf))
}

/// `envelope` with its length prefix, ready to be written to a stream.
/// Envelopes the peer would refuse to read are refused here instead.
pub fn frame(envelope: &Envelope) -> Result<Bytes, Error> {
    frame_within(envelope, MAX_FRAME_LEN)
}

fn frame_within(envelope: &Envelope, max_len: u32) -> Result<Bytes, Error> {
    let payload = Bytes::from(envelope);

    let length = match u32::try_from(payload.len()) {
        Ok(length) if length <= max_len => length,
        _ => {
            return Err(Error::BadMessage(format!(
                "{} of {} bytes does not fit in a frame",
                envelope.type_tag,
                payload.len()
            )))
        }
    };

    let mut bytes = BytesMut::with_capacity(payload.len() + 4);
    bytes.put_u32(length);
    bytes.put_slice(&payload);

    Ok(bytes.freeze())
}

pub async fn write_packet<S: AsyncWrite + Unpin>(
    stream: &mut S,
    envelope: &Envelope,
) -> Result<(), Error> {
    stream.write_all(&frame(envelope)?).await?;
    stream.flush().await?;
    Ok(())
}

/// Picks a name of the form `<uuid>.<extension>` inside `folder` that does
/// not exist yet.
pub fn unique_file_name(folder: &Path, extension: &str) -> PathBuf {
    loop {
        let file = folder.join(format!("{}.{extension}", uuid::Uuid::new_v4()));
        if !file.exists() {
            return file;
        }
    }
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
