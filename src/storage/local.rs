//! Local filesystem storage implementation

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::{LocalReader, LocalStorage, LocalWriter};
use crate::error::{Result, WebDavError};

/// `LocalStorage` backed by `tokio::fs`
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

fn display(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

#[async_trait]
impl LocalStorage for LocalFileSystem {
    async fn list_entries(&self, path: &Path) -> Result<Vec<String>> {
        let mut reader = fs::read_dir(path)
            .await
            .map_err(|e| WebDavError::local_io(display(path), e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| WebDavError::local_io(display(path), e))?
        {
            let mut name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(
                        "Skipping {:?} in {}: name is not valid UTF-8",
                        raw,
                        path.display()
                    );
                    continue;
                }
            };
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .map_err(|e| WebDavError::local_io(display(&entry.path()), e))?;
            if is_dir {
                name.push('/');
            }
            entries.push(name);
        }

        entries.sort();
        Ok(entries)
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    async fn is_directory(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    async fn remove_tree(&self, path: &Path) -> Result<()> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(WebDavError::local_io(display(path), e)),
        };

        debug!("Removing local {}", path.display());
        let removed = if metadata.is_dir() {
            fs::remove_dir_all(path).await
        } else {
            fs::remove_file(path).await
        };
        removed.map_err(|e| WebDavError::local_io(display(path), e))
    }

    async fn make_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| WebDavError::local_io(display(path), e))
    }

    async fn open_read(&self, path: &Path) -> Result<(LocalReader, u64)> {
        let file = fs::File::open(path)
            .await
            .map_err(|e| WebDavError::local_io(display(path), e))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| WebDavError::local_io(display(path), e))?
            .len();
        Ok((Box::new(file), length))
    }

    async fn open_write(&self, path: &Path) -> Result<LocalWriter> {
        let file = fs::File::create(path)
            .await
            .map_err(|e| WebDavError::local_io(display(path), e))?;
        Ok(Box::new(file))
    }

    fn storage_type(&self) -> &'static str {
        "local"
    }
}
