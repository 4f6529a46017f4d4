use crate::config::PathKind;
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct FileMeta {
    pub size_bytes: u64,
    pub modified: Option<SystemTime>,
}

/// Read-only view of the filesystem the bot works in.
pub trait FileSystem: Send + Sync + 'static {
    /// `Ok(None)` when the path is missing or neither a file nor a directory.
    /// Any other stat failure is an error.
    fn kind_of(&self, path: &Path) -> io::Result<Option<PathKind>>;
    /// Regular files directly inside `dir`, sorted by path.
    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
    fn metadata(&self, path: &Path) -> io::Result<FileMeta>;
    /// At most `limit` bytes from the start of the file.
    fn read_head(&self, path: &Path, limit: u64) -> io::Result<Vec<u8>>;
    /// At most `limit` bytes from the end of the file.
    fn read_tail(&self, path: &Path, limit: u64) -> io::Result<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn kind_of(&self, path: &Path) -> io::Result<Option<PathKind>> {
        let meta = match fs::metadata(path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        Ok(if meta.is_file() {
            Some(PathKind::File)
        } else if meta.is_dir() {
            Some(PathKind::Directory)
        } else {
            None
        })
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    debug!(dir = %dir.display(), error = %err, "skipping unreadable dir entry");
                    continue;
                }
            };
            let path = entry.path();
            // follows symlinks, so a link to a regular file counts as a file
            if fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) {
                out.push(path);
            }
        }
        out.sort();
        Ok(out)
    }

    fn metadata(&self, path: &Path) -> io::Result<FileMeta> {
        let meta = fs::metadata(path)?;
        Ok(FileMeta {
            size_bytes: meta.len(),
            modified: meta.modified().ok(),
        })
    }

    fn read_head(&self, path: &Path, limit: u64) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        File::open(path)?.take(limit).read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn read_tail(&self, path: &Path, limit: u64) -> io::Result<Vec<u8>> {
        let mut file = File::open(path)?;
        let len = file.metadata()?.len();
        file.seek(SeekFrom::Start(len.saturating_sub(limit)))?;
        let mut buf = Vec::new();
        file.take(limit).read_to_end(&mut buf)?;
        Ok(buf)
    }
}
