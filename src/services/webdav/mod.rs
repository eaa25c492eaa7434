// WebDAV client modules

pub mod client;
pub mod common;
pub mod request;
pub mod resource;
pub mod transport;
mod tree;

// Re-export main types for convenience
pub use client::{CompletionCallback, WebDavClient};
pub use request::{
    DavRequest, DavResponse, Operation, ProgressCallback, RequestBody, RequestComposer,
    ResponseTarget,
};
pub use resource::Resource;
pub use transport::{ReqwestTransport, Transport};
