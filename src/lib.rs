//! WebDAV client library
//!
//! Translates filesystem-like operations (list, transfer, copy, move, delete,
//! publish, properties, recursive sync) into WebDAV requests and parses the
//! multistatus responses back into typed results.
//!
//! ```no_run
//! # async fn demo() -> webdav_client::Result<()> {
//! use webdav_client::{ClientSettings, WebDavClient};
//!
//! let settings = ClientSettings::new("https://dav.example.com", "alice", "secret")
//!     .with_root("/remote.php/webdav");
//! let client = WebDavClient::new(settings)?;
//! for name in client.list("/documents").await? {
//!     println!("{}", name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;
pub mod webdav_xml_parser;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_helpers;

#[cfg(test)]
mod tests;

pub use config::{CheckStrategy, ClientSettings, ProxySettings, WebDavSettings};
pub use error::{Result, WebDavError};
pub use models::{PropertyName, ResourceInfo, Urn};
pub use services::webdav::{
    CompletionCallback, ProgressCallback, Resource, Transport, WebDavClient,
};
pub use storage::{LocalFileSystem, LocalStorage};
pub use utils::{render_progress, TransferProgress};
