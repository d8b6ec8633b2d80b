//! Control-channel framing.
//!
//! The server reads newline-terminated command lines. The client reads
//! replies, which carry no length prefix: a frame ends at a line of the form
//! `nnn <text>`, or when the peer goes quiet for the idle window while some
//! bytes are already buffered.

use crate::constants::READ_CHUNK_SIZE;
use crate::core_network::reply::{is_code_line, Reply};
use log::{debug, trace};
use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::time::{timeout, Instant};

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("control channel I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("control channel closed by peer")]
    Closed,

    #[error("no reply within {0:?}")]
    Timeout(Duration),

    #[error("malformed reply: {0:?}")]
    Malformed(String),
}

/// Server side: yields one trimmed command line per call.
pub struct CommandFramer<R> {
    reader: BufReader<R>,
    line: Vec<u8>,
}

impl<R: AsyncRead + Unpin> CommandFramer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: Vec::new(),
        }
    }

    /// Returns `Ok(None)` once the peer has closed, including when it closes
    /// halfway through an unterminated line.
    pub async fn next_command(&mut self) -> io::Result<Option<String>> {
        self.line.clear();
        let n = self.reader.read_until(b'\n', &mut self.line).await?;
        if n == 0 || self.line.last() != Some(&b'\n') {
            trace!("Command stream ended after {} trailing bytes", n);
            return Ok(None);
        }
        let line = String::from_utf8_lossy(&self.line);
        Ok(Some(line.trim().to_string()))
    }
}

/// Client side: reassembles reply frames from whatever chunking the
/// transport produces. Bytes that follow a complete frame stay buffered for
/// the next call.
pub struct ResponseFramer<R> {
    reader: R,
    buffer: Vec<u8>,
    idle_timeout: Duration,
    reply_timeout: Duration,
}

impl<R: AsyncRead + Unpin> ResponseFramer<R> {
    pub fn new(reader: R, idle_timeout: Duration, reply_timeout: Duration) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
            idle_timeout,
            reply_timeout,
        }
    }

    pub async fn next_reply(&mut self) -> Result<Reply, FrameError> {
        let deadline = Instant::now() + self.reply_timeout;
        let mut chunk = vec![0u8; READ_CHUNK_SIZE];

        loop {
            if let Some(end) = frame_end(&self.buffer) {
                return self.take_frame(end);
            }

            match timeout(self.idle_timeout, self.reader.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    if has_content(&self.buffer) {
                        debug!("Peer closed mid-reply; using buffered bytes");
                        return self.take_frame(self.buffer.len());
                    }
                    return Err(FrameError::Closed);
                }
                Ok(Ok(n)) => {
                    trace!("Read {} bytes from control channel", n);
                    self.buffer.extend_from_slice(&chunk[..n]);
                }
                Ok(Err(e)) => return Err(FrameError::Io(e)),
                Err(_) => {
                    if has_content(&self.buffer) {
                        debug!("Idle timeout with buffered bytes; treating reply as complete");
                        return self.take_frame(self.buffer.len());
                    }
                    if Instant::now() >= deadline {
                        return Err(FrameError::Timeout(self.reply_timeout));
                    }
                }
            }
        }
    }

    fn take_frame(&mut self, end: usize) -> Result<Reply, FrameError> {
        let frame: Vec<u8> = self.buffer.drain(..end).collect();
        let raw = String::from_utf8_lossy(&frame).into_owned();
        Reply::parse(&raw).ok_or(FrameError::Malformed(raw))
    }
}

fn has_content(buffer: &[u8]) -> bool {
    buffer.iter().any(|b| !b.is_ascii_whitespace())
}

/// Byte offset just past the line that completes the first reply in
/// `buffer`, if a complete reply is present.
///
/// A reply opened with `nnn-` only ends at a line starting `nnn ` with the
/// same code, so continuation lines that happen to begin with three digits
/// and a space do not cut it short.
fn frame_end(buffer: &[u8]) -> Option<usize> {
    let mut start = 0;
    let mut opener: Option<&[u8]> = None;

    while let Some(pos) = buffer[start..].iter().position(|b| *b == b'\n') {
        let next = start + pos + 1;
        let mut line = &buffer[start..start + pos];
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }

        match opener {
            None if is_code_line(line, b' ') => return Some(next),
            None if is_code_line(line, b'-') => opener = Some(&line[..3]),
            Some(code) if is_code_line(line, b' ') && &line[..3] == code => return Some(next),
            _ => {}
        }
        start = next;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncWriteExt};

    const IDLE: Duration = Duration::from_millis(200);
    const REPLY: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_command_lines_are_trimmed() {
        let (mut tx, rx) = duplex(64);
        let mut framer = CommandFramer::new(rx);

        tx.write_all(b"USER bob\r\nNOOP\n  ").await.unwrap();
        tx.write_all(b"pwd \r\nSTOR unfinished").await.unwrap();
        drop(tx);

        assert_eq!(framer.next_command().await.unwrap().as_deref(), Some("USER bob"));
        assert_eq!(framer.next_command().await.unwrap().as_deref(), Some("NOOP"));
        assert_eq!(framer.next_command().await.unwrap().as_deref(), Some("pwd"));
        assert_eq!(framer.next_command().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reply_split_across_reads_is_reassembled() {
        let (mut tx, rx) = duplex(64);
        let mut framer = ResponseFramer::new(rx, IDLE, REPLY);

        let writer = tokio::spawn(async move {
            tx.write_all(b"220 Rea").await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.write_all(b"dy\r\n").await.unwrap();
            tx
        });

        let reply = framer.next_reply().await.unwrap();
        assert_eq!(reply.code, 220);
        assert_eq!(reply.text, "Ready");
        assert_eq!(reply.raw, "220 Ready\r\n");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_multi_line_reply_waits_for_final_line() {
        let (mut tx, rx) = duplex(256);
        let mut framer = ResponseFramer::new(rx, IDLE, REPLY);

        let writer = tokio::spawn(async move {
            tx.write_all(b"220-Welcome\r\n").await.unwrap();
            tokio::time::sleep(Duration::from_millis(50)).await;
            tx.write_all(b"123 not the end\r\n220 Ready\r\n").await.unwrap();
            tx
        });

        let reply = framer.next_reply().await.unwrap();
        assert_eq!(reply.code, 220);
        assert_eq!(reply.raw, "220-Welcome\r\n123 not the end\r\n220 Ready\r\n");
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_back_to_back_replies_are_split() {
        let (mut tx, rx) = duplex(256);
        let mut framer = ResponseFramer::new(rx, IDLE, REPLY);

        tx.write_all(b"150 Opening\r\n226 Done\r\n").await.unwrap();

        assert_eq!(framer.next_reply().await.unwrap().code, 150);
        assert_eq!(framer.next_reply().await.unwrap().code, 226);
        drop(tx);
    }

    #[tokio::test]
    async fn test_idle_timeout_completes_partial_reply() {
        let (mut tx, rx) = duplex(64);
        let mut framer = ResponseFramer::new(rx, IDLE, REPLY);

        tx.write_all(b"421-Service shutting down").await.unwrap();

        let reply = framer.next_reply().await.unwrap();
        assert_eq!(reply.code, 421);
        drop(tx);
    }

    #[tokio::test]
    async fn test_silence_times_out_and_close_is_reported() {
        let (tx, rx) = duplex(64);
        let mut framer = ResponseFramer::new(rx, Duration::from_millis(20), Duration::from_millis(100));
        assert!(matches!(
            framer.next_reply().await,
            Err(FrameError::Timeout(_))
        ));

        drop(tx);
        assert!(matches!(framer.next_reply().await, Err(FrameError::Closed)));
    }

    #[tokio::test]
    async fn test_garbage_is_malformed() {
        let (mut tx, rx) = duplex(64);
        let mut framer = ResponseFramer::new(rx, IDLE, REPLY);
        tx.write_all(b"hello there\r\n").await.unwrap();
        assert!(matches!(
            framer.next_reply().await,
            Err(FrameError::Malformed(_))
        ));
    }
}
