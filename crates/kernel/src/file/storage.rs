//! File storage backends.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Where uploaded bytes live. Paths are relative, `/`-separated and never
/// contain `..`.
#[async_trait]
pub trait FileStorage: Send + Sync {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Remove a file. A missing file is not an error.
    async fn delete(&self, path: &str) -> Result<()>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Read a whole file. `None` when it does not exist.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// Public URL a browser can fetch the file from.
    fn public_url(&self, path: &str) -> String;
}

/// Local filesystem storage rooted at the uploads directory.
pub struct LocalFileStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.into(),
        }
    }

    /// Resolve a relative storage path under the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        for component in relative.components() {
            if !matches!(component, Component::Normal(_)) {
                anyhow::bail!("storage path must be relative without `..`: {path}");
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl FileStorage for LocalFileStorage {
    async fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;

        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)
                .await
                .context("failed to create upload directory")?;
        }

        let mut file = fs::File::create(&full)
            .await
            .context("failed to create file")?;
        file.write_all(data).await.context("failed to write file")?;
        file.flush().await.context("failed to flush file")?;

        debug!(path = %path, size = data.len(), "file written");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match fs::remove_file(&full).await {
            Ok(()) => {
                debug!(path = %path, "file deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path, "file not found for deletion");
                Ok(())
            }
            Err(e) => Err(e).context("failed to delete file"),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        Ok(fs::try_exists(&full).await.unwrap_or(false))
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let full = self.resolve(path)?;
        match fs::read(&full).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("failed to read file"),
        }
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

impl std::fmt::Debug for LocalFileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFileStorage")
            .field("root", &self.root)
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn traversal_is_rejected() {
        let storage = LocalFileStorage::new("/srv/uploads", "/files");
        assert!(storage.resolve("1/uploads/a.png").is_ok());
        assert!(storage.resolve("../etc/passwd").is_err());
        assert!(storage.resolve("1/../../x").is_err());
        assert!(storage.resolve("/etc/passwd").is_err());
    }

    #[test]
    fn public_url_joins_base() {
        let storage = LocalFileStorage::new("/srv/uploads", "/files/");
        assert_eq!(storage.public_url("3/logos/a.png"), "/files/3/logos/a.png");
    }

    #[tokio::test]
    async fn write_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFileStorage::new(dir.path(), "/files");

        storage.write("7/uploads/hello.txt", b"hi").await.unwrap();
        assert!(storage.exists("7/uploads/hello.txt").await.unwrap());
        assert_eq!(
            storage.read("7/uploads/hello.txt").await.unwrap().as_deref(),
            Some(&b"hi"[..])
        );

        storage.delete("7/uploads/hello.txt").await.unwrap();
        assert!(!storage.exists("7/uploads/hello.txt").await.unwrap());

        // Deleting again is fine
        storage.delete("7/uploads/hello.txt").await.unwrap();
        assert!(storage.read("7/uploads/hello.txt").await.unwrap().is_none());
    }
}
