use crate::constants::{LISTING_GROUP, LISTING_OWNER, LISTING_TIME_FORMAT};
use crate::core_fs::error::FsError;
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use filetime::{set_file_mtime, FileTime};
use log::{debug, info, warn};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs::{self, File};

const STAGING_SUFFIX: &str = ".part";

/// Filesystem operations behind the FTP verbs.
///
/// Only ever called with paths that came out of `PathSandbox::resolve`.
/// Nothing here locks across sessions; a concurrent mutation surfaces as an
/// ordinary `FsError`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStore;

impl FileStore {
    /// Builds the LIST payload for a directory, one CRLF-terminated line per
    /// entry, sorted by name.
    pub async fn list(&self, dir: &Path) -> Result<String, FsError> {
        let meta = stat(dir).await?;
        if !meta.is_dir() {
            return Err(FsError::NotADirectory(display(dir)));
        }

        let mut reader = fs::read_dir(dir)
            .await
            .map_err(|e| FsError::from_io(display(dir), e))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| FsError::from_io(display(dir), e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_staging_name(&name) {
                continue;
            }
            // Follows symlinks, like `ls -lL`.
            match fs::metadata(entry.path()).await {
                Ok(metadata) => entries.push((name, metadata)),
                Err(e) => warn!("Cannot stat {:?}: {}", entry.path(), e),
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut listing = String::new();
        for (name, metadata) in &entries {
            listing.push_str(&format_entry(name, metadata));
            listing.push_str("\r\n");
        }
        debug!("Listed {} entries in {:?}", entries.len(), dir);
        Ok(listing)
    }

    pub async fn open_read(&self, path: &Path) -> Result<File, FsError> {
        let meta = stat(path).await?;
        if meta.is_dir() {
            return Err(FsError::IsADirectory(display(path)));
        }
        File::open(path)
            .await
            .map_err(|e| FsError::from_io(display(path), e))
    }

    /// Opens a temporary sibling of `target` for an upload. The bytes only
    /// become visible under `target` once [`StagedUpload::commit`] runs.
    pub async fn stage_upload(&self, target: &Path) -> Result<StagedUpload, FsError> {
        reject_staging_target(target)?;
        if let Ok(meta) = fs::metadata(target).await {
            if meta.is_dir() {
                return Err(FsError::IsADirectory(display(target)));
            }
        }

        let (parent, name) = match (target.parent(), target.file_name()) {
            (Some(parent), Some(name)) => (parent, name.to_string_lossy()),
            _ => return Err(FsError::IsADirectory(display(target))),
        };
        fs::create_dir_all(parent)
            .await
            .map_err(|e| FsError::from_io(display(parent), e))?;

        let temp = parent.join(staging_name(&name, rand::random::<u32>()));
        let file = File::create(&temp)
            .await
            .map_err(|e| FsError::from_io(display(&temp), e))?;
        debug!("Staging upload for {:?} in {:?}", target, temp);

        Ok(StagedUpload {
            file,
            temp,
            target: target.to_path_buf(),
            committed: false,
        })
    }

    pub async fn delete_file(&self, path: &Path) -> Result<(), FsError> {
        let meta = stat(path).await?;
        if meta.is_dir() {
            return Err(FsError::IsADirectory(display(path)));
        }
        fs::remove_file(path)
            .await
            .map_err(|e| FsError::from_io(display(path), e))?;
        info!("Deleted file {:?}", path);
        Ok(())
    }

    pub async fn make_dir(&self, path: &Path) -> Result<(), FsError> {
        if fs::symlink_metadata(path).await.is_ok() {
            return Err(FsError::AlreadyExists(display(path)));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FsError::from_io(display(parent), e))?;
        }
        fs::create_dir(path)
            .await
            .map_err(|e| FsError::from_io(display(path), e))?;
        info!("Created directory {:?}", path);
        Ok(())
    }

    pub async fn remove_dir(&self, path: &Path) -> Result<(), FsError> {
        let meta = stat(path).await?;
        if !meta.is_dir() {
            return Err(FsError::NotADirectory(display(path)));
        }
        let mut reader = fs::read_dir(path)
            .await
            .map_err(|e| FsError::from_io(display(path), e))?;
        if reader
            .next_entry()
            .await
            .map_err(|e| FsError::from_io(display(path), e))?
            .is_some()
        {
            return Err(FsError::NotEmpty(display(path)));
        }
        fs::remove_dir(path)
            .await
            .map_err(|e| FsError::from_io(display(path), e))?;
        info!("Removed directory {:?}", path);
        Ok(())
    }

    pub async fn rename(&self, from: &Path, to: &Path) -> Result<(), FsError> {
        stat(from).await?;
        reject_staging_target(to)?;
        if fs::symlink_metadata(to).await.is_ok() {
            return Err(FsError::AlreadyExists(display(to)));
        }
        fs::rename(from, to)
            .await
            .map_err(|e| FsError::from_io(display(from), e))?;
        info!("Renamed {:?} to {:?}", from, to);
        Ok(())
    }

    pub async fn size(&self, path: &Path) -> Result<u64, FsError> {
        let meta = stat(path).await?;
        if meta.is_dir() {
            return Err(FsError::IsADirectory(display(path)));
        }
        Ok(meta.len())
    }

    pub async fn modified(&self, path: &Path) -> Result<DateTime<Utc>, FsError> {
        let meta = stat(path).await?;
        let mtime = FileTime::from_last_modification_time(&meta);
        DateTime::from_timestamp(mtime.unix_seconds(), mtime.nanoseconds()).ok_or_else(|| {
            FsError::Io {
                path: display(path),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "modification time out of range",
                ),
            }
        })
    }

    /// Sets the modification time, interpreting `when` as UTC.
    pub async fn set_modified(&self, path: &Path, when: NaiveDateTime) -> Result<(), FsError> {
        stat(path).await?;
        let filetime = FileTime::from_unix_time(when.and_utc().timestamp(), 0);
        let target = path.to_path_buf();
        tokio::task::spawn_blocking(move || set_file_mtime(&target, filetime))
            .await
            .map_err(|e| FsError::Io {
                path: display(path),
                source: std::io::Error::new(std::io::ErrorKind::Other, e),
            })?
            .map_err(|e| FsError::from_io(display(path), e))
    }

    pub async fn is_dir(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    pub async fn exists(&self, path: &Path) -> bool {
        !is_staged_path(path) && fs::symlink_metadata(path).await.is_ok()
    }
}

/// An upload being written to a temporary file next to its target.
///
/// Dropping it without calling `commit` removes the temporary file.
#[derive(Debug)]
pub struct StagedUpload {
    file: File,
    temp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl StagedUpload {
    pub fn file(&mut self) -> &mut File {
        &mut self.file
    }

    /// Atomically moves the finished upload over its target. Concurrent
    /// uploads to the same name resolve to whichever commits last.
    pub async fn commit(mut self) -> Result<(), FsError> {
        self.file
            .sync_all()
            .await
            .map_err(|e| FsError::from_io(display(&self.temp), e))?;
        fs::rename(&self.temp, &self.target)
            .await
            .map_err(|e| FsError::from_io(display(&self.target), e))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.temp) {
                warn!("Failed to remove staged upload {:?}: {}", self.temp, e);
            }
        }
    }
}

/// One `ls -l` style line, without the line terminator.
pub fn format_entry(name: &str, metadata: &Metadata) -> String {
    let (perms, size) = if metadata.is_dir() {
        ("drwxr-xr-x", 0)
    } else {
        ("-rw-r--r--", metadata.len())
    };
    let modified: DateTime<Local> = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH).into();
    format!(
        "{} {:>3} {:<8} {:<8} {:>12} {} {}",
        perms,
        1,
        LISTING_OWNER,
        LISTING_GROUP,
        size,
        modified.format(LISTING_TIME_FORMAT),
        name
    )
}

/// Name of the temporary sibling an upload to `name` is written into.
fn staging_name(name: &str, nonce: u32) -> String {
    format!(".{}.{:08x}{}", name, nonce, STAGING_SUFFIX)
}

/// True for names produced by [`staging_name`]. Such files belong to an
/// upload in flight and are invisible to every other operation.
pub fn is_staging_name(name: &str) -> bool {
    let Some(rest) = name
        .strip_prefix('.')
        .and_then(|rest| rest.strip_suffix(STAGING_SUFFIX))
    else {
        return false;
    };
    match rest.rsplit_once('.') {
        Some((base, nonce)) => {
            !base.is_empty() && nonce.len() == 8 && nonce.bytes().all(|b| b.is_ascii_hexdigit())
        }
        None => false,
    }
}

fn is_staged_path(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| is_staging_name(&name.to_string_lossy()))
}

async fn stat(path: &Path) -> Result<Metadata, FsError> {
    if is_staged_path(path) {
        return Err(FsError::NotFound(display(path)));
    }
    fs::metadata(path)
        .await
        .map_err(|e| FsError::from_io(display(path), e))
}

fn reject_staging_target(path: &Path) -> Result<(), FsError> {
    if is_staged_path(path) {
        return Err(FsError::AccessDenied(display(path)));
    }
    Ok(())
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_list_layout_and_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("zeta.txt"), b"12345").unwrap();
        std::fs::write(dir.path().join("alpha.bin"), b"").unwrap();
        std::fs::create_dir(dir.path().join("middle")).unwrap();

        let listing = FileStore.list(dir.path()).await.unwrap();
        let lines: Vec<&str> = listing.split("\r\n").collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[3], "");

        assert!(lines[0].starts_with("-rw-r--r--   1 ftp      ftp                 0 "));
        assert!(lines[0].ends_with(" alpha.bin"));
        assert!(lines[1].starts_with("drwxr-xr-x   1 ftp      ftp                 0 "));
        assert!(lines[1].ends_with(" middle"));
        assert!(lines[2].starts_with("-rw-r--r--   1 ftp      ftp                 5 "));
        assert!(lines[2].ends_with(" zeta.txt"));
    }

    #[tokio::test]
    async fn test_list_empty_and_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FileStore.list(dir.path()).await.unwrap(), "");

        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        assert!(matches!(
            FileStore.list(&file).await,
            Err(FsError::NotADirectory(_))
        ));
        assert!(matches!(
            FileStore.list(&dir.path().join("missing")).await,
            Err(FsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_distinguishes_missing_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        assert!(matches!(
            FileStore.delete_file(&dir.path().join("nope")).await,
            Err(FsError::NotFound(_))
        ));
        assert!(matches!(
            FileStore.delete_file(&dir.path().join("sub")).await,
            Err(FsError::IsADirectory(_))
        ));
        assert!(dir.path().join("sub").is_dir());
    }

    #[tokio::test]
    async fn test_directory_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");

        FileStore.make_dir(&sub).await.unwrap();
        assert!(matches!(
            FileStore.make_dir(&sub).await,
            Err(FsError::AlreadyExists(_))
        ));

        std::fs::write(sub.join("keep"), b"x").unwrap();
        assert!(matches!(
            FileStore.remove_dir(&sub).await,
            Err(FsError::NotEmpty(_))
        ));

        std::fs::remove_file(sub.join("keep")).unwrap();
        FileStore.remove_dir(&sub).await.unwrap();
        assert!(!sub.exists());
    }

    #[tokio::test]
    async fn test_rename_refuses_to_clobber() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        assert!(matches!(
            FileStore.rename(&a, &b).await,
            Err(FsError::AlreadyExists(_))
        ));
        assert!(matches!(
            FileStore.rename(&dir.path().join("missing"), &dir.path().join("c")).await,
            Err(FsError::NotFound(_))
        ));

        FileStore.rename(&a, &dir.path().join("c")).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("c")).unwrap(), b"a");
    }

    #[tokio::test]
    async fn test_uploads_in_flight_are_hidden() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("kept.txt"), b"x").unwrap();
        let target = dir.path().join("incoming.bin");

        let mut staged = FileStore.stage_upload(&target).await.unwrap();
        staged.file().write_all(b"partial").await.unwrap();

        let listing = FileStore.list(dir.path()).await.unwrap();
        assert_eq!(listing.lines().count(), 1);
        assert!(listing.trim_end().ends_with(" kept.txt"));

        let temp_name = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .find(|name| name.ends_with(".part"))
            .unwrap();
        let temp = dir.path().join(&temp_name);
        assert!(matches!(FileStore.open_read(&temp).await, Err(FsError::NotFound(_))));
        assert!(matches!(FileStore.delete_file(&temp).await, Err(FsError::NotFound(_))));
        assert!(!FileStore.exists(&temp).await);
        assert!(temp.exists());

        assert!(matches!(
            FileStore.stage_upload(&temp).await,
            Err(FsError::AccessDenied(_))
        ));
        assert!(matches!(
            FileStore.rename(&dir.path().join("kept.txt"), &temp).await,
            Err(FsError::AccessDenied(_))
        ));

        staged.commit().await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"partial");
    }

    #[test]
    fn test_staging_names() {
        assert!(is_staging_name(&staging_name("a.txt", 0xdeadbeef)));
        assert!(is_staging_name(".x.0000000f.part"));
        assert!(!is_staging_name("a.txt"));
        assert!(!is_staging_name(".notes.part"));
        assert!(!is_staging_name("..0000000f.part"));
        assert!(!is_staging_name(".x.zzzzzzzz.part"));
    }

    #[tokio::test]
    async fn test_staged_upload_commit_and_discard() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out.bin");

        let mut staged = FileStore.stage_upload(&target).await.unwrap();
        staged.file().write_all(b"payload").await.unwrap();
        assert!(!target.exists());
        staged.commit().await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"payload");

        let mut staged = FileStore.stage_upload(&target).await.unwrap();
        staged.file().write_all(b"half").await.unwrap();
        drop(staged);
        assert_eq!(std::fs::read(&target).unwrap(), b"payload");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn test_size_and_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"123").unwrap();

        assert_eq!(FileStore.size(&file).await.unwrap(), 3);
        assert!(matches!(
            FileStore.size(dir.path()).await,
            Err(FsError::IsADirectory(_))
        ));

        let when = NaiveDateTime::parse_from_str("20200102030405", "%Y%m%d%H%M%S").unwrap();
        FileStore.set_modified(&file, when).await.unwrap();
        let modified = FileStore.modified(&file).await.unwrap();
        assert_eq!(modified.format("%Y%m%d%H%M%S").to_string(), "20200102030405");
    }
}
