use crate::core_fs::{FileStore, FsError, PathSandbox};
use crate::core_log::EventSink;
use crate::core_network::pasv::PassiveListener;
use log::debug;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferType {
    Ascii,
    Binary,
}

impl TransferType {
    pub fn from_code(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "A" => Some(TransferType::Ascii),
            "I" => Some(TransferType::Binary),
            _ => None,
        }
    }

    pub fn code(&self) -> char {
        match self {
            TransferType::Ascii => 'A',
            TransferType::Binary => 'I',
        }
    }
}

/// Per-connection state, created at accept time and dropped with the
/// connection.
pub struct Session {
    pub current_dir: String,            // Virtual, always normalized and absolute
    pub rename_from: Option<String>,    // Virtual path set by RNFR
    pub pending_passive: Option<PassiveListener>,
    pub transfer_type: TransferType,
    pub username: Option<String>,
    pub is_authenticated: bool,
    pub sandbox: PathSandbox,
    pub store: FileStore,
    pub local_ip: IpAddr, // Control connection's local address
    pub peer: SocketAddr,
    pub events: Arc<dyn EventSink>,
}

impl Session {
    pub fn new(
        sandbox: PathSandbox,
        local_ip: IpAddr,
        peer: SocketAddr,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            current_dir: String::from("/"),
            rename_from: None,
            pending_passive: None,
            transfer_type: TransferType::Ascii,
            username: None,
            is_authenticated: false,
            sandbox,
            store: FileStore,
            local_ip,
            peer,
            events,
        }
    }

    pub fn resolve(&self, arg: &str) -> Result<PathBuf, FsError> {
        self.sandbox.resolve(&self.current_dir, arg)
    }

    pub fn virtual_path(&self, arg: &str) -> Result<String, FsError> {
        PathSandbox::normalize(&self.current_dir, arg)
    }

    /// Stores the normalized virtual form only.
    pub fn set_current_dir(&mut self, path: &str) -> Result<(), FsError> {
        self.current_dir = PathSandbox::normalize(&self.current_dir, path)?;
        debug!("Current directory is now {}", self.current_dir);
        Ok(())
    }

    /// Replaces any unconsumed passive listener; the old one is closed.
    pub fn set_passive(&mut self, listener: PassiveListener) {
        if let Some(old) = self.pending_passive.replace(listener) {
            debug!("Closed unconsumed passive listener on {}", old.local_addr());
        }
    }

    pub fn take_passive(&mut self) -> Option<PassiveListener> {
        self.pending_passive.take()
    }

    pub fn close_passive(&mut self) {
        if let Some(old) = self.pending_passive.take() {
            debug!("Closed passive listener on {}", old.local_addr());
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("current_dir", &self.current_dir)
            .field("rename_from", &self.rename_from)
            .field("pending_passive", &self.pending_passive)
            .field("transfer_type", &self.transfer_type)
            .field("username", &self.username)
            .field("is_authenticated", &self.is_authenticated)
            .field("root", &self.sandbox.root())
            .field("peer", &self.peer)
            .finish()
    }
}
