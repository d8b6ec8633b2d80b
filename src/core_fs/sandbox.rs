use crate::core_fs::error::FsError;
use log::{trace, warn};
use std::io;
use std::path::{Path, PathBuf};

/// Maps FTP-visible virtual paths onto the real filesystem below a fixed root.
///
/// Every path-bearing command goes through [`PathSandbox::resolve`]. The
/// returned path is always the root itself or one of its descendants, after
/// symlinks have been followed.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    root: PathBuf,
}

impl PathSandbox {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, FsError> {
        let root = root.as_ref();
        let root = root
            .canonicalize()
            .map_err(|e| FsError::from_io(root.display().to_string(), e))?;
        if !root.is_dir() {
            return Err(FsError::NotADirectory(root.display().to_string()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Collapses `input` against `cwd` into an absolute virtual path.
    ///
    /// An empty input means `cwd`. A `..` that would climb above `/` is a
    /// traversal attempt and is denied rather than clamped.
    pub fn normalize(cwd: &str, input: &str) -> Result<String, FsError> {
        let joined = if input.is_empty() {
            cwd.to_string()
        } else if input.starts_with('/') {
            input.to_string()
        } else {
            format!("{}/{}", cwd.trim_end_matches('/'), input)
        };

        let mut segments: Vec<&str> = Vec::new();
        for segment in joined.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        warn!("Path traversal attempt: cwd={:?} input={:?}", cwd, input);
                        return Err(FsError::AccessDenied(input.to_string()));
                    }
                }
                name => segments.push(name),
            }
        }

        Ok(format!("/{}", segments.join("/")))
    }

    /// Parent of a normalized virtual path; the root is its own parent.
    pub fn parent(virtual_path: &str) -> String {
        match virtual_path.trim_end_matches('/').rsplit_once('/') {
            Some(("", _)) | None => "/".to_string(),
            Some((parent, _)) => parent.to_string(),
        }
    }

    pub fn resolve(&self, cwd: &str, input: &str) -> Result<PathBuf, FsError> {
        let virtual_path = Self::normalize(cwd, input)?;
        self.resolve_virtual(&virtual_path)
    }

    /// Resolves an already-normalized virtual path.
    pub fn resolve_virtual(&self, virtual_path: &str) -> Result<PathBuf, FsError> {
        let candidate = self.root.join(virtual_path.trim_start_matches('/'));
        let real = canonicalize_partial(&candidate)
            .map_err(|e| FsError::from_io(virtual_path.to_string(), e))?;

        if !real.starts_with(&self.root) {
            warn!(
                "Path is outside of the allowed area: {:?} -> {:?}",
                virtual_path, real
            );
            return Err(FsError::AccessDenied(virtual_path.to_string()));
        }

        trace!("Resolved {:?} to {:?}", virtual_path, real);
        Ok(real)
    }
}

/// Canonicalizes the longest existing prefix of `path` and re-appends the
/// missing tail, so targets that do not exist yet (STOR, MKD, RNTO) still get
/// their symlinks resolved.
fn canonicalize_partial(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut tail = Vec::new();

    loop {
        match existing.canonicalize() {
            Ok(mut real) => {
                for name in tail.iter().rev() {
                    real.push(name);
                }
                return Ok(real);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // A dangling symlink points somewhere we cannot vet.
                if std::fs::symlink_metadata(&existing).is_ok() {
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        "dangling symbolic link",
                    ));
                }
                match (existing.file_name(), existing.parent()) {
                    (Some(name), Some(parent)) => {
                        tail.push(name.to_os_string());
                        existing = parent.to_path_buf();
                    }
                    _ => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sandbox() -> (tempfile::TempDir, PathSandbox) {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("pub/docs")).unwrap();
        fs::write(dir.path().join("pub/readme.txt"), b"hello").unwrap();
        let sandbox = PathSandbox::new(dir.path()).unwrap();
        (dir, sandbox)
    }

    #[test]
    fn test_normalize_relative_and_absolute() {
        assert_eq!(PathSandbox::normalize("/pub", "docs").unwrap(), "/pub/docs");
        assert_eq!(PathSandbox::normalize("/pub", "/etc").unwrap(), "/etc");
        assert_eq!(PathSandbox::normalize("/pub/docs", "..").unwrap(), "/pub");
        assert_eq!(PathSandbox::normalize("/", "a//b/./c/").unwrap(), "/a/b/c");
        assert_eq!(PathSandbox::normalize("/pub", "").unwrap(), "/pub");
        assert_eq!(PathSandbox::normalize("/", "").unwrap(), "/");
    }

    #[test]
    fn test_normalize_denies_climbing_above_root() {
        for input in ["..", "../etc", "../../etc/passwd", "/..", "a/../../b"] {
            let err = PathSandbox::normalize("/", input).unwrap_err();
            assert!(matches!(err, FsError::AccessDenied(_)), "{input}");
        }
        assert!(PathSandbox::normalize("/pub", "../../../secret").is_err());
    }

    #[test]
    fn test_parent() {
        assert_eq!(PathSandbox::parent("/"), "/");
        assert_eq!(PathSandbox::parent("/pub"), "/");
        assert_eq!(PathSandbox::parent("/pub/docs"), "/pub");
    }

    #[test]
    fn test_resolve_stays_below_root() {
        let (_dir, sandbox) = sandbox();
        let root = sandbox.root().to_path_buf();

        assert_eq!(sandbox.resolve("/", "").unwrap(), root);
        assert_eq!(
            sandbox.resolve("/pub", "readme.txt").unwrap(),
            root.join("pub/readme.txt")
        );
        // Targets that do not exist yet still resolve inside the root.
        assert_eq!(
            sandbox.resolve("/pub", "new/file.bin").unwrap(),
            root.join("pub/new/file.bin")
        );
    }

    #[test]
    fn test_resolve_never_escapes() {
        let (_dir, sandbox) = sandbox();
        let inputs = [
            "..",
            "../..",
            "../../etc",
            "../../../secret",
            "docs/../../..",
            "./../pub",
            "/../../../../etc/passwd",
            "docs/../../../x",
        ];
        for cwd in ["/", "/pub", "/pub/docs"] {
            for input in inputs {
                match sandbox.resolve(cwd, input) {
                    Ok(real) => assert!(real.starts_with(sandbox.root()), "{cwd} {input}"),
                    Err(e) => assert!(matches!(e, FsError::AccessDenied(_)), "{cwd} {input}"),
                }
            }
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_is_denied() {
        let (dir, sandbox) = sandbox();
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret"), b"top").unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("pub/out")).unwrap();
        std::os::unix::fs::symlink("/nonexistent/target", dir.path().join("pub/dangling")).unwrap();

        let err = sandbox.resolve("/pub", "out/secret").unwrap_err();
        assert!(matches!(err, FsError::AccessDenied(_)));
        let err = sandbox.resolve("/pub", "out/newfile").unwrap_err();
        assert!(matches!(err, FsError::AccessDenied(_)));
        let err = sandbox.resolve("/pub", "dangling").unwrap_err();
        assert!(matches!(err, FsError::AccessDenied(_)));
    }
}
