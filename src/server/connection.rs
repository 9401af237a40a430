use crate::protocol::{Line, LineBuffer, TfshError, TfshResult, HELP_HINT, WELCOME_BANNER};
use crate::server::Session;
use std::collections::VecDeque;
use std::io;
use std::task::{Context, Poll};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

/// Bytes pulled off a socket per readiness event.
const READ_CHUNK_SIZE: usize = 512;

/// Queued output above which a connection is neither read nor dispatched
/// until its peer drains some of it.
pub const MAX_PENDING_OUTPUT: usize = 64 * 1024;

/// Result of reading a readable socket once.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Bytes were added to the line buffer.
    Data,
    /// The socket reported ready but had nothing for us yet.
    NoData,
    /// Peer closed the stream.
    Closed,
}

/// One accepted client: its socket, its private line buffer, its queue of
/// unsent output, and its session.
///
/// Nothing here waits on the socket. Reads and writes are attempted with
/// `try_read`/`try_write` and whatever the kernel refuses stays queued.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    buffer: LineBuffer,
    outbound: VecDeque<u8>,
    session: Session,
}

impl Connection {
    pub fn new(stream: TcpStream, session: Session, max_line_length: usize) -> Self {
        Self {
            stream,
            buffer: LineBuffer::new(max_line_length),
            outbound: VecDeque::new(),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn send_banner(&mut self) -> TfshResult<()> {
        let greeting = format!("{}{}{}", WELCOME_BANNER, HELP_HINT, self.session.prompt());
        self.queue(&greeting);
        self.flush_output()
    }

    pub fn queue(&mut self, text: &str) {
        self.outbound.extend(text.as_bytes());
    }

    pub fn queue_prompt(&mut self) {
        let prompt = self.session.prompt();
        self.queue(&prompt);
    }

    pub fn pending_output(&self) -> usize {
        self.outbound.len()
    }

    /// Too much unsent output to accept more work from this client.
    pub fn is_backlogged(&self) -> bool {
        self.outbound.len() > MAX_PENDING_OUTPUT
    }

    /// Write as much queued output as the socket takes right now.
    pub fn flush_output(&mut self) -> TfshResult<()> {
        while !self.outbound.is_empty() {
            let (front, _) = self.outbound.as_slices();
            match self.stream.try_write(front) {
                Ok(0) => {
                    return Err(TfshError::NetworkError(format!(
                        "{} stopped accepting data", self.session.client_addr()
                    )));
                }
                Ok(n) => {
                    self.outbound.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    return Err(TfshError::NetworkError(format!(
                        "Failed to write to {}: {}", self.session.client_addr(), e
                    )));
                }
            }
        }
        Ok(())
    }

    /// Ready when there is something to do: queued output the socket can
    /// take, buffered lines to run, or new bytes to read. A backlogged
    /// connection is only woken for writing.
    pub fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<()> {
        // An error also counts as ready; the next read or write surfaces it
        if !self.outbound.is_empty() && self.stream.poll_write_ready(cx).is_ready() {
            return Poll::Ready(());
        }
        if self.is_backlogged() {
            return Poll::Pending;
        }
        if self.buffer.has_lines() || self.stream.poll_read_ready(cx).is_ready() {
            return Poll::Ready(());
        }
        Poll::Pending
    }

    /// Read whatever is available right now without waiting.
    pub fn read_available(&mut self) -> TfshResult<ReadOutcome> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        match self.stream.try_read(&mut chunk) {
            Ok(0) => Ok(ReadOutcome::Closed),
            Ok(n) => {
                self.buffer.add_data(&chunk[..n]);
                debug!(
                    "Read {} bytes from {} ({} buffered)",
                    n, self.session.client_addr(), self.buffer.pending()
                );
                Ok(ReadOutcome::Data)
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(ReadOutcome::NoData),
            Err(e) => Err(TfshError::NetworkError(format!(
                "Failed to read from {}: {}", self.session.client_addr(), e
            ))),
        }
    }

    /// The next buffered line, unless the client has too much unread output.
    pub fn next_line(&mut self) -> Option<Line> {
        if self.is_backlogged() {
            return None;
        }
        self.buffer.next_line()
    }

    /// Send what the socket takes without waiting, then close our side.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.flush_output() {
            debug!("{}", e);
        }
        if !self.outbound.is_empty() {
            debug!("Dropping {} unsent bytes for {}", self.outbound.len(), self.session.client_addr());
        }
        if let Err(e) = self.stream.shutdown().await {
            debug!("Shutdown of {} failed: {}", self.session.client_addr(), e);
        }
    }
}
