use log::{debug, info};
use std::fmt;

/// Protocol milestones reported by the client and the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FtpEvent {
    Connected { peer: String },
    LoggedIn { user: String },
    CommandSent { line: String },
    CommandReceived { peer: String, line: String },
    ReplyReceived { code: u16, text: String },
    TransferStarted { command: String, path: String },
    TransferFinished { command: String, path: String, bytes: u64 },
    Disconnected { peer: String },
}

impl FtpEvent {
    pub fn command_sent(line: &str) -> Self {
        FtpEvent::CommandSent {
            line: mask_password(line),
        }
    }

    pub fn command_received(peer: impl fmt::Display, line: &str) -> Self {
        FtpEvent::CommandReceived {
            peer: peer.to_string(),
            line: mask_password(line),
        }
    }
}

fn mask_password(line: &str) -> String {
    match line.split_once(' ') {
        Some((verb, _)) if verb.eq_ignore_ascii_case("PASS") => format!("{} ****", verb),
        _ => line.to_string(),
    }
}

impl fmt::Display for FtpEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FtpEvent::Connected { peer } => write!(f, "connected to {}", peer),
            FtpEvent::LoggedIn { user } => write!(f, "logged in as {}", user),
            FtpEvent::CommandSent { line } => write!(f, "-> {}", line),
            FtpEvent::CommandReceived { peer, line } => write!(f, "[{}] {}", peer, line),
            FtpEvent::ReplyReceived { code, text } => write!(f, "<- {} {}", code, text),
            FtpEvent::TransferStarted { command, path } => {
                write!(f, "{} {} started", command, path)
            }
            FtpEvent::TransferFinished {
                command,
                path,
                bytes,
            } => write!(f, "{} {} finished ({} bytes)", command, path, bytes),
            FtpEvent::Disconnected { peer } => write!(f, "disconnected from {}", peer),
        }
    }
}

/// Receives protocol events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &FtpEvent);
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &FtpEvent) {
        match event {
            FtpEvent::CommandSent { .. }
            | FtpEvent::CommandReceived { .. }
            | FtpEvent::ReplyReceived { .. } => debug!("{}", event),
            _ => info!("{}", event),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: &FtpEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_is_masked() {
        assert_eq!(
            FtpEvent::command_sent("PASS hunter2"),
            FtpEvent::CommandSent {
                line: "PASS ****".into()
            }
        );
        assert_eq!(
            FtpEvent::command_received("1.2.3.4:5", "pass hunter2"),
            FtpEvent::CommandReceived {
                peer: "1.2.3.4:5".into(),
                line: "pass ****".into()
            }
        );
        assert_eq!(
            FtpEvent::command_sent("USER bob"),
            FtpEvent::CommandSent {
                line: "USER bob".into()
            }
        );
    }
}
