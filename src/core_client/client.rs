use crate::config::ClientConfig;
use crate::constants::MDTM_FORMAT;
use crate::core_client::connection::ControlConnection;
use crate::core_client::error::ClientError;
use crate::core_log::{EventSink, FtpEvent, LogSink};
use crate::core_network::reply::Reply;
use crate::session::TransferType;
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use regex::Regex;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

// 257 "<path>" ...
static QUOTED_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)""#).expect("valid quoted path pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Connected,
    LoggedIn,
}

/// An FTP client session over one control connection, using passive mode
/// for every transfer.
pub struct FtpClient {
    config: ClientConfig,
    events: Arc<dyn EventSink>,
    control: Option<ControlConnection>,
    state: ClientState,
    welcome: Option<Reply>,
}

impl FtpClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            events: Arc::new(LogSink),
            control: None,
            state: ClientState::Disconnected,
            welcome: None,
        }
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn is_logged_in(&self) -> bool {
        self.state == ClientState::LoggedIn
    }

    /// The 220 banner from the last successful `connect`.
    pub fn welcome(&self) -> Option<&Reply> {
        self.welcome.as_ref()
    }

    /// Opens the control channel and requires a 220 greeting. Any previous
    /// connection is closed first.
    pub async fn connect(&mut self) -> Result<Reply, ClientError> {
        if let Some(mut old) = self.control.take() {
            old.shutdown().await;
        }
        self.state = ClientState::Disconnected;
        self.welcome = None;

        let mut conn = ControlConnection::open(&self.config, Arc::clone(&self.events)).await?;
        let reply = match conn.read_expected("connect", &[220]).await {
            Ok(reply) => reply,
            Err(e) => {
                conn.shutdown().await;
                return Err(e);
            }
        };

        info!("Connected to {}:{}", self.config.host, self.config.port);
        self.events.emit(&FtpEvent::Connected {
            peer: format!("{}:{}", self.config.host, self.config.port),
        });
        self.control = Some(conn);
        self.state = ClientState::Connected;
        self.welcome = Some(reply.clone());
        Ok(reply)
    }

    /// USER, then PASS only if the server asks for it with 331.
    pub async fn login(&mut self, user: &str, password: &str) -> Result<(), ClientError> {
        debug!("Signing in with user '{}'", user);
        let conn = self.connected()?;
        let reply = conn.exchange(&format!("USER {}", user)).await?;
        let reply = match reply.code {
            230 => reply,
            331 => {
                debug!("Password is required");
                conn.exchange(&format!("PASS {}", password)).await?
            }
            _ => {
                self.state = ClientState::Connected;
                return Err(ClientError::LoginRejected(reply));
            }
        };

        if reply.code != 230 {
            self.state = ClientState::Connected;
            return Err(ClientError::LoginRejected(reply));
        }
        self.state = ClientState::LoggedIn;
        self.events.emit(&FtpEvent::LoggedIn {
            user: user.to_string(),
        });
        Ok(())
    }

    /// Raw `LIST` output for `path`, or for the current directory.
    pub async fn list(&mut self, path: Option<&str>) -> Result<String, ClientError> {
        let command = match path {
            Some(path) => format!("LIST {}", path),
            None => "LIST".to_string(),
        };
        let mut listing = Vec::new();
        self.retrieve(&command, &mut listing).await?;
        Ok(String::from_utf8_lossy(&listing).into_owned())
    }

    pub async fn download(&mut self, remote: &str) -> Result<Vec<u8>, ClientError> {
        self.binary_mode().await?;
        let mut contents = Vec::new();
        self.retrieve(&format!("RETR {}", remote), &mut contents).await?;
        Ok(contents)
    }

    /// Downloads into `local`, removing the partial file if the transfer
    /// fails.
    pub async fn download_to_file(
        &mut self,
        remote: &str,
        local: impl AsRef<Path>,
    ) -> Result<u64, ClientError> {
        let local = local.as_ref();
        self.binary_mode().await?;
        let mut file = File::create(local).await.map_err(|source| ClientError::LocalIo {
            path: local.display().to_string(),
            source,
        })?;

        match self.retrieve(&format!("RETR {}", remote), &mut file).await {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                drop(file);
                if let Err(cleanup) = tokio::fs::remove_file(local).await {
                    warn!("Failed to remove partial download {:?}: {}", local, cleanup);
                }
                Err(e)
            }
        }
    }

    pub async fn upload(&mut self, remote: &str, contents: &[u8]) -> Result<(), ClientError> {
        self.binary_mode().await?;
        let mut reader = contents;
        self.store(&format!("STOR {}", remote), &mut reader).await?;
        Ok(())
    }

    pub async fn upload_file(
        &mut self,
        local: impl AsRef<Path>,
        remote: &str,
    ) -> Result<u64, ClientError> {
        let local = local.as_ref();
        let mut file = File::open(local).await.map_err(|source| ClientError::LocalIo {
            path: local.display().to_string(),
            source,
        })?;
        self.binary_mode().await?;
        self.store(&format!("STOR {}", remote), &mut file).await
    }

    pub async fn delete(&mut self, path: &str) -> Result<(), ClientError> {
        self.logged_in()?
            .execute(&format!("DELE {}", path), &[250])
            .await
            .map(|_| ())
    }

    pub async fn mkdir(&mut self, path: &str) -> Result<(), ClientError> {
        self.logged_in()?
            .execute(&format!("MKD {}", path), &[257])
            .await
            .map(|_| ())
    }

    pub async fn rmdir(&mut self, path: &str) -> Result<(), ClientError> {
        self.logged_in()?
            .execute(&format!("RMD {}", path), &[250])
            .await
            .map(|_| ())
    }

    pub async fn rename(&mut self, from: &str, to: &str) -> Result<(), ClientError> {
        debug!("Renaming '{}' to '{}'", from, to);
        let conn = self.logged_in()?;
        conn.execute(&format!("RNFR {}", from), &[350]).await?;
        conn.execute(&format!("RNTO {}", to), &[250]).await?;
        Ok(())
    }

    pub async fn size(&mut self, path: &str) -> Result<u64, ClientError> {
        let reply = self
            .logged_in()?
            .execute(&format!("SIZE {}", path), &[213])
            .await?;
        reply
            .text
            .trim()
            .parse::<u64>()
            .map_err(|_| ClientError::MalformedReply(reply.raw.clone()))
    }

    /// Modification time, in UTC as the server reports it.
    pub async fn mtime(&mut self, path: &str) -> Result<NaiveDateTime, ClientError> {
        let reply = self
            .logged_in()?
            .execute(&format!("MDTM {}", path), &[213])
            .await?;
        NaiveDateTime::parse_from_str(reply.text.trim(), MDTM_FORMAT)
            .map_err(|_| ClientError::MalformedReply(reply.raw.clone()))
    }

    pub async fn pwd(&mut self) -> Result<String, ClientError> {
        let reply = self.logged_in()?.execute("PWD", &[257]).await?;
        parse_pwd(&reply).ok_or_else(|| ClientError::MalformedReply(reply.raw.clone()))
    }

    pub async fn cwd(&mut self, path: &str) -> Result<(), ClientError> {
        self.logged_in()?
            .execute(&format!("CWD {}", path), &[250, 200])
            .await
            .map(|_| ())
    }

    pub async fn cdup(&mut self) -> Result<(), ClientError> {
        self.logged_in()?
            .execute("CDUP", &[200, 250])
            .await
            .map(|_| ())
    }

    pub async fn noop(&mut self) -> Result<(), ClientError> {
        self.logged_in()?.execute("NOOP", &[200]).await.map(|_| ())
    }

    /// The system type text, e.g. `UNIX Type: L8`.
    pub async fn syst(&mut self) -> Result<String, ClientError> {
        let reply = self.logged_in()?.execute("SYST", &[215]).await?;
        Ok(reply.text)
    }

    pub async fn set_transfer_type(&mut self, transfer_type: TransferType) -> Result<(), ClientError> {
        self.logged_in()?
            .execute(&format!("TYPE {}", transfer_type.code()), &[200])
            .await
            .map(|_| ())
    }

    /// Sends QUIT and closes the control channel whatever the server does.
    pub async fn quit(&mut self) -> Result<(), ClientError> {
        let Some(mut conn) = self.control.take() else {
            return Err(ClientError::NotConnected);
        };
        self.state = ClientState::Disconnected;

        match conn.exchange("QUIT").await {
            Ok(reply) if reply.code == 221 => debug!("Server said goodbye"),
            Ok(reply) => debug!("Unexpected reply to QUIT: {}", reply),
            Err(e) => debug!("No reply to QUIT: {}", e),
        }
        conn.shutdown().await;
        self.events.emit(&FtpEvent::Disconnected {
            peer: format!("{}:{}", self.config.host, self.config.port),
        });
        Ok(())
    }

    fn connected(&mut self) -> Result<&mut ControlConnection, ClientError> {
        match self.state {
            ClientState::Disconnected => Err(ClientError::NotConnected),
            _ => self.control.as_mut().ok_or(ClientError::NotConnected),
        }
    }

    fn logged_in(&mut self) -> Result<&mut ControlConnection, ClientError> {
        match self.state {
            ClientState::Disconnected => Err(ClientError::NotConnected),
            ClientState::Connected => Err(ClientError::NotLoggedIn),
            ClientState::LoggedIn => self.control.as_mut().ok_or(ClientError::NotConnected),
        }
    }

    async fn binary_mode(&mut self) -> Result<(), ClientError> {
        self.set_transfer_type(TransferType::Binary).await
    }

    /// Runs a download-style command: the server writes, we read to EOF.
    async fn retrieve<W>(&mut self, command: &str, sink: &mut W) -> Result<u64, ClientError>
    where
        W: AsyncWrite + Unpin,
    {
        let events = Arc::clone(&self.events);
        let conn = self.logged_in()?;
        let mut data = conn.open_data_channel().await?;
        conn.execute(command, &[125, 150]).await?;
        events.emit(&transfer_started(command));

        let bytes = tokio::io::copy(&mut data, sink).await?;
        drop(data);

        conn.read_expected(command, &[226, 250]).await?;
        events.emit(&transfer_finished(command, bytes));
        Ok(bytes)
    }

    /// Runs an upload-style command: we write, then close the data channel
    /// so the server sees EOF before it replies.
    async fn store<R>(&mut self, command: &str, source: &mut R) -> Result<u64, ClientError>
    where
        R: AsyncRead + Unpin,
    {
        let events = Arc::clone(&self.events);
        let conn = self.logged_in()?;
        let mut data = conn.open_data_channel().await?;
        conn.execute(command, &[125, 150]).await?;
        events.emit(&transfer_started(command));

        let bytes = tokio::io::copy(source, &mut data).await?;
        data.shutdown().await?;
        drop(data);

        conn.read_expected(command, &[226, 250]).await?;
        events.emit(&transfer_finished(command, bytes));
        Ok(bytes)
    }
}

fn split_command(command: &str) -> (String, String) {
    match command.split_once(' ') {
        Some((verb, path)) => (verb.to_string(), path.to_string()),
        None => (command.to_string(), String::new()),
    }
}

fn transfer_started(command: &str) -> FtpEvent {
    let (command, path) = split_command(command);
    FtpEvent::TransferStarted { command, path }
}

fn transfer_finished(command: &str, bytes: u64) -> FtpEvent {
    let (command, path) = split_command(command);
    FtpEvent::TransferFinished {
        command,
        path,
        bytes,
    }
}

/// The quoted path of a 257 reply; servers that skip the quotes get their
/// first word after the code.
fn parse_pwd(reply: &Reply) -> Option<String> {
    if let Some(caps) = QUOTED_PATH_RE.captures(&reply.text) {
        return Some(caps[1].to_string());
    }
    reply.text.split_whitespace().next().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn reply(raw: &str) -> Reply {
        Reply::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_pwd() {
        assert_eq!(
            parse_pwd(&reply("257 \"/pub/my docs\" is the current directory.\r\n")).as_deref(),
            Some("/pub/my docs")
        );
        assert_eq!(parse_pwd(&reply("257 /home\r\n")).as_deref(), Some("/home"));
        assert_eq!(parse_pwd(&reply("257 \r\n")), None);
    }

    #[tokio::test]
    async fn test_operations_need_login() {
        let mut client = FtpClient::new(ClientConfig::new("127.0.0.1", 21));
        assert_eq!(client.state(), ClientState::Disconnected);

        assert!(matches!(client.pwd().await, Err(ClientError::NotConnected)));
        assert!(matches!(
            client.login("anonymous", "guest").await,
            Err(ClientError::NotConnected)
        ));
        assert!(client.list(None).await.unwrap_err().is_precondition());
        assert!(client.upload("a.txt", b"data").await.unwrap_err().is_precondition());
        assert!(matches!(client.quit().await, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn test_connect_refused_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client = FtpClient::new(ClientConfig::new("127.0.0.1", port));
        let err = client.connect().await.unwrap_err();
        assert!(err.is_unreachable(), "{err}");
        assert_eq!(client.state(), ClientState::Disconnected);
    }

    #[test]
    fn test_transfer_events_split_command() {
        assert_eq!(
            transfer_finished("RETR my file.bin", 12),
            FtpEvent::TransferFinished {
                command: "RETR".into(),
                path: "my file.bin".into(),
                bytes: 12
            }
        );
        assert_eq!(
            transfer_started("LIST"),
            FtpEvent::TransferStarted {
                command: "LIST".into(),
                path: String::new()
            }
        );
    }
}
