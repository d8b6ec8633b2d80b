// src/constants.rs

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";
pub const DEFAULT_SERVER_PORT: u16 = 2121;
pub const DEFAULT_ROOT_DIR: &str = "server_storage";
pub const DEFAULT_BANNER: &str = "Welcome to sandftp";

pub const DEFAULT_CLIENT_PORT: u16 = 21;
pub const DEFAULT_CONTROL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DATA_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 500;
/// Pause after a failed accept; EMFILE and friends would otherwise spin.
pub const ACCEPT_RETRY_DELAY_MS: u64 = 100;

pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;
pub const READ_CHUNK_SIZE: usize = 4096;

/// Passive listeners accept exactly one data connection.
pub const PASSIVE_BACKLOG: u32 = 1;

pub const LISTING_OWNER: &str = "ftp";
pub const LISTING_GROUP: &str = "ftp";
pub const MDTM_FORMAT: &str = "%Y%m%d%H%M%S";
pub const LISTING_TIME_FORMAT: &str = "%b %d %H:%M";
