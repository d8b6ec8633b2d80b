use crate::config::ClientConfig;
use crate::core_client::error::ClientError;
use crate::core_log::{EventSink, FtpEvent};
use crate::core_network::framing::ResponseFramer;
use crate::core_network::pasv::parse_passive_reply;
use crate::core_network::reply::Reply;
use log::{debug, trace, warn};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Connects with a deadline; any failure here means the peer was never
/// reached.
pub(crate) async fn connect_with_timeout(
    host: &str,
    port: u16,
    wait: Duration,
) -> Result<TcpStream, ClientError> {
    let addr = format!("{}:{}", host, port);
    match timeout(wait, TcpStream::connect((host, port))).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(source)) => Err(ClientError::Unreachable { addr, source }),
        Err(_) => Err(ClientError::Unreachable {
            addr,
            source: io::Error::new(io::ErrorKind::TimedOut, format!("no answer within {:?}", wait)),
        }),
    }
}

/// The client's control channel: commands out, framed replies in.
pub struct ControlConnection {
    writer: OwnedWriteHalf,
    framer: ResponseFramer<OwnedReadHalf>,
    peer_host: String, // EPSV endpoints are always on this host
    data_timeout: Duration,
    events: Arc<dyn EventSink>,
}

impl ControlConnection {
    pub async fn open(config: &ClientConfig, events: Arc<dyn EventSink>) -> Result<Self, ClientError> {
        let stream =
            connect_with_timeout(&config.host, config.port, config.control_timeout()).await?;
        let peer_host = stream.peer_addr()?.ip().to_string();
        debug!("Control channel connected to {}", peer_host);

        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            writer: write_half,
            framer: ResponseFramer::new(read_half, config.idle_timeout(), config.control_timeout()),
            peer_host,
            data_timeout: config.data_timeout(),
            events,
        })
    }

    pub async fn send(&mut self, line: &str) -> Result<(), ClientError> {
        self.events.emit(&FtpEvent::command_sent(line));
        self.writer.write_all(format!("{}\r\n", line).as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub async fn read_reply(&mut self) -> Result<Reply, ClientError> {
        let reply = self.framer.next_reply().await?;
        trace!("CC IN: {:?}", reply.raw);
        self.events.emit(&FtpEvent::ReplyReceived {
            code: reply.code,
            text: reply.text.clone(),
        });
        Ok(reply)
    }

    /// Sends one command and returns whatever the server answered.
    pub async fn exchange(&mut self, line: &str) -> Result<Reply, ClientError> {
        self.send(line).await?;
        self.read_reply().await
    }

    /// Sends one command and requires one of `expected` in return.
    pub async fn execute(&mut self, line: &str, expected: &[u16]) -> Result<Reply, ClientError> {
        let reply = self.exchange(line).await?;
        expect(line, reply, expected)
    }

    /// Reads the next reply and requires one of `expected`.
    pub async fn read_expected(&mut self, command: &str, expected: &[u16]) -> Result<Reply, ClientError> {
        let reply = self.read_reply().await?;
        expect(command, reply, expected)
    }

    /// Negotiates a passive data channel and connects to it. EPSV is tried
    /// first; any failure there falls back to PASV. Either reply format is
    /// accepted for either command.
    pub async fn open_data_channel(&mut self) -> Result<TcpStream, ClientError> {
        let epsv_failure = match self.try_passive("EPSV").await? {
            Ok(stream) => return Ok(stream),
            Err(reason) => reason,
        };
        warn!("EPSV failed ({}), trying PASV", epsv_failure);

        match self.try_passive("PASV").await? {
            Ok(stream) => Ok(stream),
            Err(pasv_failure) => Err(ClientError::Negotiation(format!(
                "EPSV: {}; PASV: {}",
                epsv_failure, pasv_failure
            ))),
        }
    }

    /// The outer error is a broken control channel; the inner one is a
    /// refusal worth retrying with the other command.
    async fn try_passive(&mut self, verb: &str) -> Result<Result<TcpStream, String>, ClientError> {
        let reply = self.exchange(verb).await?;
        if !reply.is(&[227, 229]) {
            return Ok(Err(reply.to_string()));
        }
        let endpoint = match parse_passive_reply(&reply, &self.peer_host) {
            Ok(endpoint) => endpoint,
            Err(e) => return Ok(Err(e.to_string())),
        };
        debug!("Data connection: {}:{}", endpoint.host, endpoint.port);
        match connect_with_timeout(&endpoint.host, endpoint.port, self.data_timeout).await {
            Ok(stream) => Ok(Ok(stream)),
            Err(e) => Ok(Err(e.to_string())),
        }
    }

    pub async fn shutdown(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Control channel shutdown: {}", e);
        }
    }
}

fn expect(command: &str, reply: Reply, expected: &[u16]) -> Result<Reply, ClientError> {
    if reply.is(expected) {
        Ok(reply)
    } else {
        let command = command.split_whitespace().next().unwrap_or(command).to_string();
        Err(ClientError::UnexpectedReply { command, reply })
    }
}
