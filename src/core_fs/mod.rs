pub mod error;
pub mod sandbox;
pub mod store;

pub use error::FsError;
pub use sandbox::PathSandbox;
pub use store::{FileStore, StagedUpload};
