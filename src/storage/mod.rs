//! Local filesystem abstraction used by transfers and tree operations
//!
//! The client never touches `std::fs` or `tokio::fs` directly; everything goes
//! through `LocalStorage` so tree operations can be driven against any
//! implementation.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

pub mod local;

pub use local::LocalFileSystem;

/// Byte source handed to an upload
pub type LocalReader = Box<dyn AsyncRead + Send + Unpin>;

/// Byte sink a download is streamed into
pub type LocalWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[async_trait]
pub trait LocalStorage: Send + Sync {
    /// Entry names of a directory sorted by name, directories suffixed with `/`
    async fn list_entries(&self, path: &Path) -> Result<Vec<String>>;

    async fn exists(&self, path: &Path) -> bool;

    async fn is_directory(&self, path: &Path) -> bool;

    /// Removes a directory with all its contents (or a single file); a
    /// missing path is not an error
    async fn remove_tree(&self, path: &Path) -> Result<()>;

    /// Creates a directory and any missing parents
    async fn make_directory(&self, path: &Path) -> Result<()>;

    /// Opens a file for reading and reports its length in bytes
    async fn open_read(&self, path: &Path) -> Result<(LocalReader, u64)>;

    /// Creates (or truncates) a file for writing
    async fn open_write(&self, path: &Path) -> Result<LocalWriter>;

    /// Get a human-readable identifier for this storage type
    fn storage_type(&self) -> &'static str;
}
