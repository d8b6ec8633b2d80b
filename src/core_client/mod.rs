pub mod client;
pub mod connection;
pub mod error;

pub use client::{ClientState, FtpClient};
pub use error::ClientError;
