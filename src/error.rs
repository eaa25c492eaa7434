//! Error taxonomy shared by every WebDAV operation.
//!
//! Each variant carries enough context (path, option, server) to render a
//! human-readable message on its own. Nothing in the crate retries: the first
//! failure inside a request or a recursive tree walk is returned unchanged.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WebDavError>;

#[derive(Debug, Error)]
pub enum WebDavError {
    /// A local path the operation needs does not exist
    #[error("Local file: {path} not found")]
    LocalResourceNotFound { path: String },

    /// A remote resource failed its existence precondition
    #[error("Remote resource: {path} not found")]
    RemoteResourceNotFound { path: String },

    /// The parent collection of a remote target does not exist
    #[error("Remote parent for: {path} not found")]
    RemoteParentNotFound { path: String },

    /// The server answered but left out the element the operation relies on
    #[error("Method {name} not supported for {server}")]
    MethodNotSupported { name: String, server: String },

    /// A caller supplied path role or transport option is structurally wrong
    #[error("Option ({name}:{value}) has invalid name or value")]
    InvalidOption { name: String, value: String },

    /// The server could not be reached (network, DNS, TLS)
    #[error("Not connection with {hostname}: {message}")]
    NotConnection { hostname: String, message: String },

    /// HTTP 507 Insufficient Storage on upload
    #[error("Not enough space on the server")]
    NotEnoughSpace,

    #[error("{method} {url} failed with HTTP {status}")]
    UnexpectedStatus {
        method: String,
        url: String,
        status: u16,
    },

    #[error("Local I/O error at {path}: {source}")]
    LocalIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl WebDavError {
    pub fn local_not_found(path: impl Into<String>) -> Self {
        Self::LocalResourceNotFound { path: path.into() }
    }

    pub fn remote_not_found(path: impl Into<String>) -> Self {
        Self::RemoteResourceNotFound { path: path.into() }
    }

    pub fn parent_not_found(path: impl Into<String>) -> Self {
        Self::RemoteParentNotFound { path: path.into() }
    }

    pub fn not_supported(name: impl Into<String>, server: impl Into<String>) -> Self {
        Self::MethodNotSupported {
            name: name.into(),
            server: server.into(),
        }
    }

    pub fn invalid_option(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::InvalidOption {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Wraps a local I/O failure, turning `NotFound` into `LocalResourceNotFound`
    pub fn local_io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::LocalResourceNotFound { path }
        } else {
            Self::LocalIo { path, source }
        }
    }

    /// True for the three "something is missing" kinds
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::LocalResourceNotFound { .. }
                | Self::RemoteResourceNotFound { .. }
                | Self::RemoteParentNotFound { .. }
        )
    }
}
