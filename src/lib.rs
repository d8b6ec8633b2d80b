pub mod config;
pub mod constants;
pub mod core_client;
pub mod core_fs;
pub mod core_ftpcommand;
pub mod core_log;
pub mod core_network;
pub mod server;
pub mod session;

pub use config::{ClientConfig, Config, ServerConfig};
pub use core_client::{ClientError, ClientState, FtpClient};
pub use server::Server;
