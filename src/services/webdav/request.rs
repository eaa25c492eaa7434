//! Request composition
//!
//! Every operation the client can issue is a variant of [`Operation`]. A
//! variant fixes the HTTP method, the header set and the body builder, so an
//! unknown operation name simply cannot be expressed. [`RequestComposer`]
//! turns an operation plus a target [`Urn`] into a [`DavRequest`] the
//! transport can execute; it performs no I/O.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Method;
use tracing::warn;

use super::common::vendor_namespace_for;
use crate::config::{CheckStrategy, ClientSettings};
use crate::error::{Result, WebDavError};
use crate::models::{PropertyName, Urn};
use crate::storage::{LocalReader, LocalWriter};
use crate::utils::TransferProgress;
use crate::webdav_xml_parser::{
    get_property_request_body, publish_request_body, quota_request_body,
    set_property_request_body, unpublish_request_body, HrefMatcher,
};

/// Called after every streamed chunk of a GET or PUT
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    List,
    Free,
    Check,
    Info,
    IsDirectory,
    Mkdir,
    Clean,
    Copy { destination: Urn },
    Move { destination: Urn },
    Publish,
    Unpublish,
    GetProperty(PropertyName),
    SetProperty(PropertyName, String),
    Download,
    Upload { length: u64, content_type: String },
}

impl Operation {
    /// Name used in logs and in `MethodNotSupported` errors
    pub fn name(&self) -> &'static str {
        match self {
            Operation::List => "list",
            Operation::Free => "free",
            Operation::Check => "check",
            Operation::Info => "info",
            Operation::IsDirectory => "is_dir",
            Operation::Mkdir => "mkdir",
            Operation::Clean => "clean",
            Operation::Copy { .. } => "copy",
            Operation::Move { .. } => "move",
            Operation::Publish => "publish",
            Operation::Unpublish => "unpublish",
            Operation::GetProperty(_) => "get_property",
            Operation::SetProperty(..) => "set_property",
            Operation::Download => "download",
            Operation::Upload { .. } => "upload",
        }
    }

    fn method_name(&self, check_strategy: CheckStrategy) -> &'static str {
        match self {
            Operation::List
            | Operation::Free
            | Operation::Info
            | Operation::IsDirectory
            | Operation::GetProperty(_) => "PROPFIND",
            Operation::Check => match check_strategy {
                CheckStrategy::Propfind => "PROPFIND",
                CheckStrategy::Head => "HEAD",
            },
            Operation::Mkdir => "MKCOL",
            Operation::Clean => "DELETE",
            Operation::Copy { .. } => "COPY",
            Operation::Move { .. } => "MOVE",
            Operation::Publish | Operation::Unpublish | Operation::SetProperty(..) => "PROPPATCH",
            Operation::Download => "GET",
            Operation::Upload { .. } => "PUT",
        }
    }
}

/// Body of an outgoing request
pub enum RequestBody {
    Empty,
    Xml(String),
    /// Streamed local content of a known length
    Stream { reader: LocalReader, length: u64 },
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => write!(f, "Empty"),
            RequestBody::Xml(xml) => f.debug_tuple("Xml").field(xml).finish(),
            RequestBody::Stream { length, .. } => {
                f.debug_struct("Stream").field("length", length).finish()
            }
        }
    }
}

/// Where a response body goes
pub enum ResponseTarget {
    Buffer,
    /// Stream a successful body into `writer`; `label` names it in errors
    Writer { writer: LocalWriter, label: String },
}

/// A fully composed request, ready for a [`super::transport::Transport`]
pub struct DavRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
    pub target: ResponseTarget,
    pub progress: Option<ProgressCallback>,
}

impl DavRequest {
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn with_target(mut self, target: ResponseTarget) -> Self {
        self.target = target;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// XML payload, if the body is one
    pub fn xml_body(&self) -> Option<&str> {
        match &self.body {
            RequestBody::Xml(xml) => Some(xml),
            _ => None,
        }
    }
}

impl fmt::Debug for DavRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DavRequest")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("streams_to_writer", &matches!(self.target, ResponseTarget::Writer { .. }))
            .finish()
    }
}

/// Status and buffered body of a response; the body is empty when it was
/// streamed into a writer
#[derive(Debug, Clone)]
pub struct DavResponse {
    pub status: u16,
    pub body: Bytes,
}

impl DavResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Maps operations onto URLs, headers and bodies for one server
#[derive(Debug, Clone)]
pub struct RequestComposer {
    hostname: String,
    root: String,
    check_strategy: CheckStrategy,
    vendor_namespace: Option<String>,
}

impl RequestComposer {
    pub fn new(settings: &ClientSettings) -> Self {
        let vendor_namespace = settings
            .vendor_namespace
            .clone()
            .or_else(|| vendor_namespace_for(&settings.webdav.hostname).map(str::to_string));

        Self {
            hostname: settings.webdav.hostname.trim_end_matches('/').to_string(),
            root: settings.webdav.root.clone(),
            check_strategy: settings.check_strategy,
            vendor_namespace,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn check_strategy(&self) -> CheckStrategy {
        self.check_strategy
    }

    /// `hostname + root + quoted path`
    pub fn url_for(&self, urn: &Urn) -> String {
        format!("{}{}{}", self.hostname, self.root, urn.quote())
    }

    /// Value of the `Destination` header for copy/move targets
    pub fn destination_for(&self, urn: &Urn) -> String {
        format!("{}{}", self.root, urn.quote())
    }

    pub fn matcher(&self, urn: &Urn) -> HrefMatcher {
        HrefMatcher::new(&self.root, urn)
    }

    /// Namespace of the publish/unpublish property; empty for unknown hosts
    pub fn vendor_namespace(&self) -> &str {
        match &self.vendor_namespace {
            Some(namespace) => namespace,
            None => {
                warn!(
                    "No vendor namespace known for {}; sending public_url without a namespace",
                    self.hostname
                );
                ""
            }
        }
    }

    pub fn compose(&self, operation: &Operation, urn: &Urn) -> Result<DavRequest> {
        let method_name = operation.method_name(self.check_strategy);
        let method = Method::from_bytes(method_name.as_bytes())
            .map_err(|_| WebDavError::invalid_option("method", method_name))?;

        let headers = self.headers(operation);
        for (name, value) in &headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| WebDavError::invalid_option(name.as_str(), value.as_str()))?;
            HeaderValue::from_str(value)
                .map_err(|_| WebDavError::invalid_option(name.as_str(), value.as_str()))?;
        }

        Ok(DavRequest {
            method,
            url: self.url_for(urn),
            headers,
            body: self.body(operation)?,
            target: ResponseTarget::Buffer,
            progress: None,
        })
    }

    fn headers(&self, operation: &Operation) -> Vec<(String, String)> {
        let mut headers: Vec<(&str, String)> = vec![("Accept", "*/*".to_string())];

        match operation {
            Operation::List | Operation::Info | Operation::IsDirectory => {
                headers.push(("Depth", "1".to_string()));
            }
            Operation::Check => {
                if self.check_strategy == CheckStrategy::Propfind {
                    headers.push(("Depth", "0".to_string()));
                }
            }
            Operation::Free => {
                headers.push(("Depth", "0".to_string()));
                headers.push(("Content-Type", "text/xml".to_string()));
            }
            Operation::Mkdir | Operation::Clean => {
                headers.push(("Connection", "Keep-Alive".to_string()));
            }
            Operation::Copy { destination } | Operation::Move { destination } => {
                headers.push(("Destination", self.destination_for(destination)));
            }
            Operation::GetProperty(_) | Operation::SetProperty(..) => {
                headers.push(("Depth", "1".to_string()));
                headers.push(("Content-Type", "application/x-www-form-urlencoded".to_string()));
            }
            Operation::Upload {
                length,
                content_type,
            } => {
                headers.push(("Content-Length", length.to_string()));
                headers.push(("Content-Type", content_type.clone()));
            }
            Operation::Publish | Operation::Unpublish | Operation::Download => {}
        }

        headers
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    fn body(&self, operation: &Operation) -> Result<RequestBody> {
        let xml = match operation {
            Operation::Free => quota_request_body()?,
            Operation::Publish => publish_request_body(self.vendor_namespace())?,
            Operation::Unpublish => unpublish_request_body(self.vendor_namespace())?,
            Operation::GetProperty(property) => get_property_request_body(property)?,
            Operation::SetProperty(property, value) => set_property_request_body(property, value)?,
            _ => return Ok(RequestBody::Empty),
        };
        Ok(RequestBody::Xml(xml))
    }
}
