use crate::core_network::framing::FrameError;
use crate::core_network::reply::Reply;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Could not reach {addr}: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Control channel error: {0}")]
    Transport(#[from] io::Error),

    #[error("Connection closed by server")]
    ConnectionClosed,

    #[error("Malformed reply: {0:?}")]
    MalformedReply(String),

    #[error("Unexpected reply to {command}: {reply}")]
    UnexpectedReply { command: String, reply: Reply },

    #[error("Data channel negotiation failed: {0}")]
    Negotiation(String),

    #[error("Login rejected: {0}")]
    LoginRejected(Reply),

    #[error("Not connected")]
    NotConnected,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("Local file error on {path}: {source}")]
    LocalIo {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ClientError {
    /// True when the server could not be reached at all, as opposed to a
    /// server that answered but refused or failed the exchange.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ClientError::Unreachable { .. })
    }

    /// True for calls made in the wrong session state; nothing was sent.
    pub fn is_precondition(&self) -> bool {
        matches!(self, ClientError::NotConnected | ClientError::NotLoggedIn)
    }

    /// The server's reply, when the failure is one.
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            ClientError::UnexpectedReply { reply, .. } | ClientError::LoginRejected(reply) => {
                Some(reply)
            }
            _ => None,
        }
    }
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Io(e) => ClientError::Transport(e),
            FrameError::Closed => ClientError::ConnectionClosed,
            FrameError::Timeout(wait) => ClientError::Timeout(format!("no reply within {:?}", wait)),
            FrameError::Malformed(raw) => ClientError::MalformedReply(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let unreachable = ClientError::Unreachable {
            addr: "127.0.0.1:1".into(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(unreachable.is_unreachable());
        assert!(!unreachable.is_precondition());

        let rejected = ClientError::UnexpectedReply {
            command: "CWD".into(),
            reply: Reply::parse("550 Failed to change directory.\r\n").unwrap(),
        };
        assert!(!rejected.is_unreachable());
        assert_eq!(rejected.reply().map(|r| r.code), Some(550));

        assert!(ClientError::NotLoggedIn.is_precondition());
        assert!(ClientError::NotConnected.is_precondition());
    }

    #[test]
    fn test_frame_errors_map_over() {
        assert!(matches!(
            ClientError::from(FrameError::Closed),
            ClientError::ConnectionClosed
        ));
        assert!(matches!(
            ClientError::from(FrameError::Malformed("hello".into())),
            ClientError::MalformedReply(_)
        ));
    }
}
