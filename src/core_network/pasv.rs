use crate::config::ServerConfig;
use crate::constants::PASSIVE_BACKLOG;
use crate::core_ftpcommand::handlers::CommandOutcome;
use crate::core_ftpcommand::utils::{send_response, ControlWriter};
use crate::core_network::reply::Reply;
use crate::session::Session;
use log::{debug, error, trace, warn};
use regex::Regex;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::Mutex;

// 227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)
static PASV_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\((\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})\)")
        .expect("valid PASV pattern")
});

// 229 Entering Extended Passive Mode (|||port|)
static EPSV_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(\|\|\|(\d{1,5})\|\)").expect("valid EPSV pattern"));

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PassiveError {
    #[error("Invalid PASV reply: {0}")]
    InvalidPasv(String),

    #[error("Invalid EPSV reply: {0}")]
    InvalidEpsv(String),

    #[error("Not a passive mode reply: {0}")]
    NotPassive(String),
}

/// Where the client should open its data connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassiveEndpoint {
    pub host: String,
    pub port: u16,
}

/// Parses a passive-mode reply by its own code, not by the command that
/// triggered it: some servers answer PASV with a 229.
///
/// `control_host` is used for 229 replies, which never carry an address.
pub fn parse_passive_reply(reply: &Reply, control_host: &str) -> Result<PassiveEndpoint, PassiveError> {
    match reply.code {
        227 => {
            let caps = PASV_RE
                .captures(&reply.raw)
                .ok_or_else(|| PassiveError::InvalidPasv(reply.to_string()))?;
            let mut octets = [0u8; 6];
            for (i, octet) in octets.iter_mut().enumerate() {
                *octet = caps[i + 1]
                    .parse::<u8>()
                    .map_err(|_| PassiveError::InvalidPasv(reply.to_string()))?;
            }
            let host = format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3]);
            let port = u16::from(octets[4]) * 256 + u16::from(octets[5]);
            trace!("PASV endpoint {}:{}", host, port);
            Ok(PassiveEndpoint { host, port })
        }
        229 => {
            let caps = EPSV_RE
                .captures(&reply.raw)
                .ok_or_else(|| PassiveError::InvalidEpsv(reply.to_string()))?;
            let port = caps[1]
                .parse::<u16>()
                .map_err(|_| PassiveError::InvalidEpsv(reply.to_string()))?;
            trace!("EPSV endpoint {}:{}", control_host, port);
            Ok(PassiveEndpoint {
                host: control_host.to_string(),
                port,
            })
        }
        _ => Err(PassiveError::NotPassive(reply.to_string())),
    }
}

/// Server side of one passive negotiation: a listener on an OS-assigned
/// port that hands out exactly one data connection.
#[derive(Debug)]
pub struct PassiveListener {
    listener: TcpListener,
    local: SocketAddr,
}

impl PassiveListener {
    pub async fn allocate(bind_ip: IpAddr) -> io::Result<Self> {
        let socket = match bind_ip {
            IpAddr::V4(_) => TcpSocket::new_v4()?,
            IpAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(SocketAddr::new(bind_ip, 0))?;
        let listener = socket.listen(PASSIVE_BACKLOG)?;
        let local = listener.local_addr()?;
        debug!("Passive listener set up on {}", local);
        Ok(Self { listener, local })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// The 227 reply, or `None` when the advertised address is not IPv4.
    pub fn pasv_reply(&self, advertised: Option<IpAddr>) -> Option<String> {
        let ip = match advertised.unwrap_or(self.local.ip()) {
            IpAddr::V4(ip) => ip,
            IpAddr::V6(ip) => ip.to_ipv4_mapped()?,
        };
        let [h1, h2, h3, h4] = ip.octets();
        let port = self.local.port();
        Some(format!(
            "227 Entering Passive Mode ({},{},{},{},{},{})\r\n",
            h1,
            h2,
            h3,
            h4,
            port / 256,
            port % 256
        ))
    }

    pub fn epsv_reply(&self) -> String {
        format!(
            "229 Entering Extended Passive Mode (|||{}|)\r\n",
            self.local.port()
        )
    }

    /// Waits for the single data connection. Consumes the listener, so the
    /// port is released whether or not a peer showed up.
    pub async fn accept(self, wait: Duration) -> io::Result<TcpStream> {
        match tokio::time::timeout(wait, self.listener.accept()).await {
            Ok(Ok((stream, addr))) => {
                debug!("Accepted data connection from {} on {}", addr, self.local);
                Ok(stream)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("no data connection within {:?}", wait),
            )),
        }
    }
}

/// Handles the PASV command: opens a fresh listener, closing any earlier one
/// that was never used, and advertises it in 227 form.
pub async fn handle_pasv_command(
    writer: ControlWriter,
    config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<CommandOutcome, io::Error> {
    let mut session = session.lock().await;
    session.close_passive();

    let advertised = match config.pasv_address.as_deref().map(str::parse::<IpAddr>) {
        Some(Ok(ip)) => Some(ip),
        Some(Err(e)) => {
            warn!("Ignoring invalid pasv_address: {}", e);
            None
        }
        None => None,
    };

    let listener = match PassiveListener::allocate(session.local_ip).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to set up passive listener: {}", e);
            send_response(&writer, b"425 Can't open passive connection.\r\n").await?;
            return Ok(CommandOutcome::Continue);
        }
    };

    let Some(response) = listener.pasv_reply(advertised) else {
        warn!("PASV on a non-IPv4 control connection");
        send_response(&writer, b"425 PASV needs IPv4, use EPSV.\r\n").await?;
        return Ok(CommandOutcome::Continue);
    };

    session.set_passive(listener);
    send_response(&writer, response.as_bytes()).await?;
    Ok(CommandOutcome::Continue)
}

/// Handles the EPSV command; same as PASV but replies in 229 form.
pub async fn handle_epsv_command(
    writer: ControlWriter,
    _config: Arc<ServerConfig>,
    session: Arc<Mutex<Session>>,
    _arg: String,
) -> Result<CommandOutcome, io::Error> {
    let mut session = session.lock().await;
    session.close_passive();

    let listener = match PassiveListener::allocate(session.local_ip).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to set up passive listener: {}", e);
            send_response(&writer, b"425 Can't open passive connection.\r\n").await?;
            return Ok(CommandOutcome::Continue);
        }
    };

    let response = listener.epsv_reply();
    session.set_passive(listener);
    send_response(&writer, response.as_bytes()).await?;
    Ok(CommandOutcome::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn reply(raw: &str) -> Reply {
        Reply::parse(raw).unwrap()
    }

    #[test]
    fn test_parse_pasv() {
        let endpoint = parse_passive_reply(
            &reply("227 Entering Passive Mode (127,0,0,1,200,3)\r\n"),
            "10.0.0.9",
        )
        .unwrap();
        assert_eq!(endpoint.host, "127.0.0.1");
        assert_eq!(endpoint.port, 51203);
    }

    #[test]
    fn test_parse_epsv_uses_control_host() {
        let endpoint = parse_passive_reply(
            &reply("229 Entering Extended Passive Mode (|||51203|)\r\n"),
            "192.168.1.20",
        )
        .unwrap();
        assert_eq!(endpoint.host, "192.168.1.20");
        assert_eq!(endpoint.port, 51203);
    }

    #[test]
    fn test_parse_rejects_bad_replies() {
        assert!(matches!(
            parse_passive_reply(&reply("227 Entering Passive Mode (1,2,3)\r\n"), "h"),
            Err(PassiveError::InvalidPasv(_))
        ));
        assert!(matches!(
            parse_passive_reply(&reply("227 Entering Passive Mode (300,0,0,1,1,1)\r\n"), "h"),
            Err(PassiveError::InvalidPasv(_))
        ));
        assert!(matches!(
            parse_passive_reply(&reply("229 Entering Extended Passive Mode (|||99999|)\r\n"), "h"),
            Err(PassiveError::InvalidEpsv(_))
        ));
        assert!(matches!(
            parse_passive_reply(&reply("500 Unknown command\r\n"), "h"),
            Err(PassiveError::NotPassive(_))
        ));
    }

    #[tokio::test]
    async fn test_listener_replies_round_trip() {
        let listener = PassiveListener::allocate(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .await
            .unwrap();
        let port = listener.local_addr().port();
        assert_ne!(port, 0);

        let pasv = listener.pasv_reply(None).unwrap();
        let endpoint = parse_passive_reply(&reply(&pasv), "ignored").unwrap();
        assert_eq!(endpoint, PassiveEndpoint { host: "127.0.0.1".into(), port });

        let epsv = listener.epsv_reply();
        let endpoint = parse_passive_reply(&reply(&epsv), "127.0.0.1").unwrap();
        assert_eq!(endpoint.port, port);

        let advertised = listener
            .pasv_reply(Some(IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7))))
            .unwrap();
        assert!(advertised.starts_with("227 Entering Passive Mode (203,0,113,7,"));
    }

    #[tokio::test]
    async fn test_accept_one_connection() {
        let listener = PassiveListener::allocate(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .await
            .unwrap();
        let addr = listener.local_addr();
        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });

        let stream = listener.accept(Duration::from_secs(5)).await.unwrap();
        let client = client.await.unwrap();
        assert_eq!(stream.peer_addr().unwrap(), client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_accept_times_out() {
        let listener = PassiveListener::allocate(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .await
            .unwrap();
        let err = listener.accept(Duration::from_millis(50)).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }
}
