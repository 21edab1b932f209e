//! Byte streams exposed by files, and the copy routine shared by every copy/move path.

use std::io::{self, Cursor, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::io::{
    AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt, AsyncWrite, AsyncWriteExt, ReadBuf,
};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{check_cancelled, Result, StoreError};

/// Default chunk size for [`copy_stream`].
pub const DEFAULT_COPY_BUFFER_SIZE: usize = 80 * 1024;

/// A stream opened on a file item.
pub trait ItemStream: AsyncRead + AsyncWrite + AsyncSeek + Send + Unpin {
    /// Whether seeking is supported. Non-seekable streams may only be used from position zero.
    fn is_seekable(&self) -> bool;

    /// Current byte offset.
    fn position(&self) -> u64;
}

pub type BoxedStream = Box<dyn ItemStream>;

/// Moves `stream` back to offset zero.
///
/// Fails with [`StoreError::Unsupported`] when the stream cannot seek and has already moved.
pub async fn rewind(stream: &mut BoxedStream) -> Result<()> {
    if stream.is_seekable() {
        stream.seek(SeekFrom::Start(0)).await?;
        return Ok(());
    }
    match stream.position() {
        0 => Ok(()),
        position => Err(StoreError::unsupported(format!(
            "rewind non-seekable stream at position {}",
            position
        ))),
    }
}

/// Copies all bytes of `source` into `destination`, starting both at offset zero.
///
/// Returns the number of bytes copied. Cancellation is checked before every chunk.
pub async fn copy_stream(
    source: &mut BoxedStream,
    destination: &mut BoxedStream,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<u64> {
    if buffer_size == 0 {
        return Err(StoreError::invalid_argument("buffer_size", "must be greater than zero"));
    }
    rewind(source).await?;
    rewind(destination).await?;

    let mut buffer = vec![0u8; buffer_size];
    let mut total = 0u64;
    loop {
        check_cancelled(cancel)?;
        let read = source.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        destination.write_all(&buffer[..read]).await?;
        total += read as u64;
    }
    destination.flush().await?;

    trace!(bytes = total, "stream copy finished");
    Ok(total)
}

/// Stream over a shared byte buffer. Writes land in the buffer immediately, so they stay
/// visible to other streams opened on the same buffer after this one is dropped.
pub struct MemoryStream {
    data: Arc<Mutex<Vec<u8>>>,
    pos: u64,
    seekable: bool,
}

impl MemoryStream {
    pub fn new(data: Arc<Mutex<Vec<u8>>>) -> Self {
        Self { data, pos: 0, seekable: true }
    }

    /// Same buffer, but seeking fails the way a forward-only network stream would.
    pub fn forward_only(data: Arc<Mutex<Vec<u8>>>) -> Self {
        Self { data, pos: 0, seekable: false }
    }
}

impl AsyncRead for MemoryStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.data.lock();
        let start = (self.pos as usize).min(data.len());
        let count = buf.remaining().min(data.len() - start);
        buf.put_slice(&data[start..start + count]);
        drop(data);
        self.pos += count as u64;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MemoryStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut data = self.data.lock();
        let mut cursor = Cursor::new(std::mem::take(&mut *data));
        cursor.set_position(self.pos);
        io::Write::write_all(&mut cursor, buf)?;
        *data = cursor.into_inner();
        drop(data);
        self.pos += buf.len() as u64;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

impl AsyncSeek for MemoryStream {
    fn start_seek(mut self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        if !self.seekable {
            return Err(io::Error::new(io::ErrorKind::Unsupported, "stream is not seekable"));
        }
        let len = self.data.lock().len() as i64;
        let target = match position {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if target < 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "seek before start"));
        }
        self.pos = target as u64;
        Ok(())
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(self.pos))
    }
}

impl ItemStream for MemoryStream {
    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn position(&self) -> u64 {
        self.pos
    }
}
