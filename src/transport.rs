//! Paced half-duplex command exchange over the serial line.
//!
//! The controller needs a moment between being woken up by a bare newline and receiving the
//! actual command. Every exchange starts by dropping stale input and sending that newline, then
//! waits out the settle delay before the command itself goes out.

use futures::FutureExt as _;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};
use tokio_util::bytes::{Buf as _, BytesMut};
use tracing::{debug, trace};

/// Anything the engine can talk to the controller over.
pub trait Link: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> Link for T {}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("could not write to the controller")]
    Write(#[source] std::io::Error),
    #[error("could not flush data out to the controller")]
    Flush(#[source] std::io::Error),
    #[error("could not read from the controller")]
    Read(#[source] std::io::Error),
}

/// Protocol mandated timings of a single exchange.
#[derive(Clone, Copy, Debug)]
pub struct Pacing {
    /// Pause between the wake-up newline and the command.
    pub settle_delay: Duration,
    /// How long to wait for the first byte of a response.
    pub response_timeout: Duration,
    /// How long to wait for each subsequent byte.
    pub read_timeout: Duration,
    /// Gap between consecutive commands of a multi-command write.
    pub burst_gap: Duration,
    /// Upper bound on the bytes discarded by a single flush.
    pub flush_limit: usize,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(50),
            response_timeout: Duration::from_secs(1),
            read_timeout: Duration::from_millis(250),
            burst_gap: Duration::from_millis(100),
            flush_limit: 5120,
        }
    }
}

/// Something that can send a command and check the controller's one line confirmation.
pub trait CommandLink {
    fn send_and_verify(
        &mut self,
        command: &str,
        expected: &str,
    ) -> impl Future<Output = Result<bool, Error>> + Send;
}

pub struct CommandTransport<S> {
    io: S,
    buffer: BytesMut,
    pacing: Pacing,
    dirty: bool,
}

impl<S: Link> CommandTransport<S> {
    pub fn new(io: S, pacing: Pacing) -> Self {
        Self { io, buffer: BytesMut::with_capacity(1024), pacing, dirty: false }
    }

    pub fn pacing(&self) -> &Pacing {
        &self.pacing
    }

    /// Whether a command was sent since the last call.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Discard everything that is available right now, without waiting for more.
    ///
    /// Stops after [`Pacing::flush_limit`] bytes so a line that never goes quiet can't stall the
    /// caller. Returns the discarded bytes if `capture` is set.
    pub fn flush(&mut self, capture: bool) -> Result<Vec<u8>, Error> {
        let mut discarded = Vec::new();
        let mut count = 0;
        while count < self.pacing.flush_limit {
            if self.buffer.is_empty() {
                match self.io.read_buf(&mut self.buffer).now_or_never() {
                    None | Some(Ok(0)) => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(Error::Read(e)),
                }
            }
            let take = self.buffer.len().min(self.pacing.flush_limit - count);
            let chunk = self.buffer.split_to(take);
            count += take;
            if capture {
                discarded.extend_from_slice(&chunk);
            }
        }
        if count > 0 {
            trace!(message = "flushed stale input", bytes = count);
        }
        Ok(discarded)
    }

    /// Send `command` and wait for the controller to start answering.
    ///
    /// Not hearing back within [`Pacing::response_timeout`] is not an error here; the subsequent
    /// reads will simply come up empty.
    pub async fn send(&mut self, command: &str) -> Result<(), Error> {
        self.flush(false)?;
        debug!(message = "sending", command);
        self.write(b"\n").await?;
        tokio::time::sleep(self.pacing.settle_delay).await;
        self.write(format!("{command}\n").as_bytes()).await?;
        self.dirty = true;
        if self.buffer.is_empty() {
            let read = self.io.read_buf(&mut self.buffer);
            match tokio::time::timeout(self.pacing.response_timeout, read).await {
                Err(_) => debug!(message = "no response", command),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(Error::Read(e)),
            }
        }
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        self.io.write_all(data).await.map_err(Error::Write)?;
        self.io.flush().await.map_err(Error::Flush)
    }

    /// Next byte of the response, or `None` if the line stays quiet for
    /// [`Pacing::read_timeout`] or reaches its end.
    pub async fn read_byte(&mut self) -> Result<Option<u8>, Error> {
        if self.buffer.is_empty() {
            let read = self.io.read_buf(&mut self.buffer);
            match tokio::time::timeout(self.pacing.read_timeout, read).await {
                Err(_) | Ok(Ok(0)) => return Ok(None),
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(Error::Read(e)),
            }
        }
        Ok(Some(self.buffer.get_u8()))
    }

    /// Send `command` and return the response up to the first carriage return.
    ///
    /// The byte following the carriage return (normally a line feed) is discarded.
    pub async fn send_and_read_line(&mut self, command: &str) -> Result<String, Error> {
        self.send(command).await?;
        let mut line = Vec::new();
        while let Some(byte) = self.read_byte().await? {
            if byte == b'\r' {
                self.read_byte().await?;
                break;
            }
            line.push(byte);
        }
        let line = String::from_utf8_lossy(&line).into_owned();
        trace!(message = "received line", command, line = %line);
        Ok(line)
    }
}

impl<S: Link> CommandLink for CommandTransport<S> {
    async fn send_and_verify(&mut self, command: &str, expected: &str) -> Result<bool, Error> {
        let line = self.send_and_read_line(command).await?;
        if line == expected {
            Ok(true)
        } else {
            debug!(message = "unexpected confirmation", command, expected, received = %line);
            Ok(false)
        }
    }
}
