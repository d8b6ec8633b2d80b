pub mod framing;
pub mod network;
pub mod pasv;
pub mod reply;
