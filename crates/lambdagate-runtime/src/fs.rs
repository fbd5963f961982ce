//! Filesystem capability.
//!
//! The function cache and the administrative operations only touch the disk
//! through [`Filesystem`], so tests can observe or replace the storage layer.

use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Filesystem operations used by the runtime.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Modification time of `path`. A missing file yields `io::ErrorKind::NotFound`.
    async fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Recursive directory creation; succeeds if the directory already exists.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Names of the direct subdirectories of `path`, sorted.
    async fn read_dir_names(&self, path: &Path) -> io::Result<Vec<String>>;
}

/// [`Filesystem`] backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskFilesystem;

#[async_trait]
impl Filesystem for DiskFilesystem {
    async fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        tokio::fs::metadata(path).await?.modified()
    }

    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_dir_all(path).await
    }

    async fn read_dir_names(&self, path: &Path) -> io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            // Skip names that are not valid UTF-8; they cannot be addressed by name anyway
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }
}
