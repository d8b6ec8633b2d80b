// Error handling for the sandboxed filesystem
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FsError {
    #[error("No such file or directory: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Directory not empty: {0}")]
    NotEmpty(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl FsError {
    /// Wraps an `io::Error`, keeping the well-known kinds distinguishable.
    pub fn from_io(path: impl Into<String>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(path),
            io::ErrorKind::AlreadyExists => FsError::AlreadyExists(path),
            io::ErrorKind::PermissionDenied => FsError::AccessDenied(path),
            _ => FsError::Io { path, source },
        }
    }

    pub fn to_ftp_response(&self) -> String {
        match self {
            FsError::NotFound(_) => "550 No such file or directory.".to_string(),
            FsError::NotADirectory(_) => "550 Not a directory.".to_string(),
            FsError::IsADirectory(_) => "550 Is a directory.".to_string(),
            FsError::AlreadyExists(_) => "550 Already exists.".to_string(),
            FsError::NotEmpty(_) => "550 Directory not empty.".to_string(),
            FsError::AccessDenied(_) => "550 Access denied.".to_string(),
            FsError::Io { .. } => "451 Requested action aborted. Local error in processing.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_kinds_are_mapped() {
        let err = FsError::from_io("/a", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, FsError::NotFound(_)));

        let err = FsError::from_io("/a", io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, FsError::AccessDenied(_)));

        let err = FsError::from_io("/a", io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert!(err.to_ftp_response().starts_with("451"));
    }

    #[test]
    fn test_denial_and_missing_reply_differently() {
        let missing = FsError::NotFound("/x".into()).to_ftp_response();
        let is_dir = FsError::IsADirectory("/x".into()).to_ftp_response();
        assert!(missing.starts_with("550"));
        assert!(is_dir.starts_with("550"));
        assert_ne!(missing, is_dir);
    }
}
