//! WebDAV XML handling
//!
//! Responses are read with quick-xml into a small namespace-resolved element
//! tree, then each operation family pulls what it needs out of it:
//!
//! | Parser | Looks for | Missing element |
//! |--------|-----------|-----------------|
//! | listing | every `response/href` | - |
//! | quota | `quota-available-bytes` | `MethodNotSupported` |
//! | exists | `href` equal to the composed path | `false` |
//! | info | matching response, four DAV properties | `RemoteResourceNotFound` |
//! | is-directory | matching response, `resourcetype/collection` | `MethodNotSupported` |
//! | public link | any `public_url` element | `MethodNotSupported` |
//! | property | first `{namespace}name` element | `None` |
//!
//! Request bodies for PROPFIND/PROPPATCH are written with the quick-xml writer
//! so property values are always escaped.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::{NsReader, Writer};
use tracing::{debug, warn};

use crate::error::{Result, WebDavError};
use crate::models::{PropertyName, ResourceInfo, Urn, SEPARATOR};
use crate::utils::encoding::unquote;

pub const DAV_NS: &str = "DAV:";

// ============================================================================
// Element tree
// ============================================================================

/// One parsed element with its resolved namespace and direct text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub namespace: String,
    pub name: String,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace == namespace
    }

    pub fn child(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.is(namespace, name))
    }

    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |c| c.is(namespace, name))
    }

    /// Depth-first search below this element
    pub fn descendant(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        self.find(&|e: &XmlElement| e.is(namespace, name))
    }

    /// Depth-first search ignoring namespaces
    pub fn descendant_by_local_name(&self, name: &str) -> Option<&XmlElement> {
        self.find(&|e: &XmlElement| e.name == name)
    }

    fn find(&self, predicate: &dyn Fn(&XmlElement) -> bool) -> Option<&XmlElement> {
        for child in &self.children {
            if predicate(child) {
                return Some(child);
            }
            if let Some(found) = child.find(predicate) {
                return Some(found);
            }
        }
        None
    }
}

#[derive(Debug, thiserror::Error)]
#[error("malformed XML: {0}")]
pub struct MalformedXml(String);

/// Parses a complete document and returns its root element
pub fn parse_document(body: &[u8]) -> std::result::Result<XmlElement, MalformedXml> {
    let mut reader = NsReader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut buf = Vec::new();

    loop {
        let (namespace, event) = reader
            .read_resolved_event_into(&mut buf)
            .map_err(|e| MalformedXml(e.to_string()))?;
        let namespace = match namespace {
            ResolveResult::Bound(Namespace(ns)) => String::from_utf8_lossy(ns).into_owned(),
            _ => String::new(),
        };

        match event {
            Event::Start(e) => stack.push(XmlElement {
                namespace,
                name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                ..Default::default()
            }),
            Event::Empty(e) => {
                let element = XmlElement {
                    namespace,
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Default::default()
                };
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| MalformedXml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| MalformedXml(e.to_string()))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&t.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(MalformedXml("document ended inside an element".to_string()));
    }
    root.ok_or_else(|| MalformedXml("document has no root element".to_string()))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> std::result::Result<(), MalformedXml> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(MalformedXml("more than one root element".to_string())),
    }
}

// ============================================================================
// Multistatus
// ============================================================================

/// One `<response>` of a 207 body
#[derive(Debug, Clone)]
pub struct MultistatusEntry {
    /// Path part of the href, still percent-encoded
    pub raw_href: String,
    /// Decoded path part of the href
    pub href: String,
    pub element: XmlElement,
}

impl MultistatusEntry {
    /// First matching property from a propstat whose status is 2xx (or absent)
    pub fn property(&self, namespace: &str, name: &str) -> Option<&XmlElement> {
        let propstats: Vec<&XmlElement> = self.element.children_named(DAV_NS, "propstat").collect();
        if propstats.is_empty() {
            return self.element.descendant(namespace, name);
        }
        propstats
            .into_iter()
            .filter(|propstat| propstat_succeeded(propstat))
            .find_map(|propstat| propstat.descendant(namespace, name))
    }
}

fn propstat_succeeded(propstat: &XmlElement) -> bool {
    match propstat.child(DAV_NS, "status") {
        // "HTTP/1.1 200 OK"
        Some(status) => status
            .text
            .split_whitespace()
            .nth(1)
            .map(|code| code.starts_with('2'))
            .unwrap_or(false),
        None => true,
    }
}

pub fn multistatus_entries(root: &XmlElement) -> Vec<MultistatusEntry> {
    root.children_named(DAV_NS, "response")
        .filter_map(|response| {
            let href = response.child(DAV_NS, "href")?;
            let raw_href = href_path(href.text.trim());
            Some(MultistatusEntry {
                href: unquote(&raw_href),
                raw_href,
                element: response.clone(),
            })
        })
        .collect()
}

/// Reduces absolute hrefs (`https://host/dav/a.txt`) to their path
fn href_path(href: &str) -> String {
    match url::Url::parse(href) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => href.to_string(),
    }
}

/// Decides whether an href names the resource a request was composed for.
///
/// Servers disagree on the form of the hrefs they send back: encoded or not,
/// with or without the trailing separator, with or without the configured
/// root prefix. Both sides are compared decoded.
#[derive(Debug, Clone)]
pub struct HrefMatcher {
    /// Decoded root prefix, no trailing separator
    root: String,
    /// Decoded Urn path
    path: String,
}

impl HrefMatcher {
    pub fn new(root: &str, urn: &Urn) -> Self {
        Self {
            root: unquote(root),
            path: urn.path(),
        }
    }

    /// Root prefix joined with the path, as it appears on the wire
    pub fn composed_path(&self) -> String {
        format!("{}{}", self.root, self.path)
    }

    /// The href equals the composed path, character for character once decoded
    pub fn exact(&self, href: &str) -> bool {
        href == self.composed_path()
    }

    /// The href equals the composed path or the bare path, ignoring a
    /// trailing separator on either side
    pub fn lenient(&self, href: &str) -> bool {
        let href = trim_separator(href);
        href == trim_separator(&self.composed_path()) || href == trim_separator(&self.path)
    }
}

fn trim_separator(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

// ============================================================================
// Response parsers
// ============================================================================

/// Parses response bodies on behalf of one server
#[derive(Debug, Clone)]
pub struct ResponseParser {
    server: String,
    strict: bool,
}

impl ResponseParser {
    pub fn new(server: impl Into<String>, strict: bool) -> Self {
        Self {
            server: server.into(),
            strict,
        }
    }

    fn not_supported(&self, operation: &str) -> WebDavError {
        WebDavError::not_supported(operation, &self.server)
    }

    fn document(&self, operation: &str, body: &[u8]) -> Result<XmlElement> {
        parse_document(body).map_err(|e| {
            debug!("{} response from {} is not XML: {}", operation, self.server, e);
            self.not_supported(operation)
        })
    }

    /// Filenames of the children of `directory`, in server order
    pub fn parse_listing(&self, body: &[u8], matcher: &HrefMatcher) -> Result<Vec<String>> {
        let root = match parse_document(body) {
            Ok(root) => root,
            Err(e) if self.strict => {
                debug!("Listing from {} is not XML: {}", self.server, e);
                return Err(self.not_supported("list"));
            }
            Err(e) => {
                warn!("Ignoring malformed listing from {}: {}", self.server, e);
                return Ok(Vec::new());
            }
        };

        Ok(multistatus_entries(&root)
            .into_iter()
            .filter(|entry| !matcher.lenient(&entry.href))
            .map(|entry| Urn::new(&entry.raw_href).filename())
            .collect())
    }

    pub fn parse_quota(&self, body: &[u8]) -> Result<u64> {
        let root = self.document("free", body)?;
        root.descendant(DAV_NS, "quota-available-bytes")
            .and_then(|node| node.text.trim().parse::<u64>().ok())
            .ok_or_else(|| self.not_supported("free"))
    }

    /// HEAD-based check: any 2xx status means the resource exists
    pub fn parse_exists_status(status: u16) -> bool {
        (200..300).contains(&status)
    }

    /// PROPFIND-based check: the multistatus must list the exact href
    pub fn parse_exists(&self, body: &[u8], matcher: &HrefMatcher) -> Result<bool> {
        let root = self.document("check", body)?;
        Ok(multistatus_entries(&root)
            .iter()
            .any(|entry| matcher.exact(&entry.href)))
    }

    pub fn parse_info(&self, body: &[u8], matcher: &HrefMatcher) -> Result<ResourceInfo> {
        let root = self.document("info", body)?;
        let entry = matching_entry(&root, matcher)?;
        let text = |name: &str| entry.property(DAV_NS, name).map(|e| e.text.clone());

        Ok(ResourceInfo {
            created: text("creationdate"),
            name: text("displayname"),
            size: text("getcontentlength"),
            modified: text("getlastmodified"),
        })
    }

    pub fn parse_is_directory(&self, body: &[u8], matcher: &HrefMatcher) -> Result<bool> {
        let root = self.document("is_dir", body)?;
        let entry = matching_entry(&root, matcher)?;
        let resource_type = entry
            .property(DAV_NS, "resourcetype")
            .ok_or_else(|| self.not_supported("is_dir"))?;
        Ok(resource_type.child(DAV_NS, "collection").is_some())
    }

    /// Text of the vendor `public_url` property, whatever its namespace
    pub fn parse_public_url(&self, body: &[u8]) -> Result<String> {
        let root = match parse_document(body) {
            Ok(root) => root,
            Err(_) if self.strict => return Err(self.not_supported("publish")),
            Err(e) => {
                warn!("Ignoring malformed publish response from {}: {}", self.server, e);
                return Ok(String::new());
            }
        };
        root.descendant_by_local_name("public_url")
            .map(|node| node.text.trim().to_string())
            .ok_or_else(|| self.not_supported("publish"))
    }

    /// First text of `{namespace}name` anywhere in the document; an empty
    /// namespace matches any namespace
    pub fn parse_property(&self, body: &[u8], property: &PropertyName) -> Result<Option<String>> {
        let root = match parse_document(body) {
            Ok(root) => root,
            Err(_) if self.strict => return Err(self.not_supported("get_property")),
            Err(e) => {
                warn!("Ignoring malformed property response from {}: {}", self.server, e);
                return Ok(None);
            }
        };
        let node = if property.namespace.is_empty() {
            root.descendant_by_local_name(&property.name)
        } else {
            root.descendant(&property.namespace, &property.name)
        };
        Ok(node.map(|node| node.text.clone()))
    }
}

fn matching_entry(root: &XmlElement, matcher: &HrefMatcher) -> Result<MultistatusEntry> {
    multistatus_entries(root)
        .into_iter()
        .find(|entry| matcher.lenient(&entry.href))
        .ok_or_else(|| WebDavError::remote_not_found(matcher.composed_path()))
}

// ============================================================================
// Request bodies
// ============================================================================

struct BodyWriter {
    writer: Writer<Vec<u8>>,
}

impl BodyWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::new()),
        }
    }

    fn emit(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| WebDavError::invalid_option("xml_body", e.to_string()))
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.emit(Event::Start(start))
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.emit(Event::Empty(start))
    }

    fn text(&mut self, text: &str) -> Result<()> {
        self.emit(Event::Text(BytesText::new(text)))
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.emit(Event::End(BytesEnd::new(name)))
    }

    fn finish(self) -> Result<String> {
        String::from_utf8(self.writer.into_inner())
            .map_err(|e| WebDavError::invalid_option("xml_body", e.to_string()))
    }
}

/// Rejects names that cannot be used as an XML element name
fn check_property_name(name: &str) -> Result<()> {
    let valid_start = name
        .chars()
        .next()
        .map(|c| c.is_alphabetic() || c == '_')
        .unwrap_or(false);
    let valid_rest = name
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid_start && valid_rest {
        Ok(())
    } else {
        Err(WebDavError::invalid_option("property_name", name))
    }
}

/// `<propfind xmlns="DAV:"><prop><quota-available-bytes/><quota-used-bytes/></prop></propfind>`
pub fn quota_request_body() -> Result<String> {
    let mut body = BodyWriter::new();
    body.open("propfind", &[("xmlns", DAV_NS)])?;
    body.open("prop", &[])?;
    body.empty("quota-available-bytes", &[])?;
    body.empty("quota-used-bytes", &[])?;
    body.close("prop")?;
    body.close("propfind")?;
    body.finish()
}

pub fn publish_request_body(vendor_namespace: &str) -> Result<String> {
    let mut body = BodyWriter::new();
    body.open("propertyupdate", &[("xmlns", DAV_NS)])?;
    body.open("set", &[])?;
    body.open("prop", &[])?;
    body.open("public_url", &[("xmlns", vendor_namespace)])?;
    body.text("true")?;
    body.close("public_url")?;
    body.close("prop")?;
    body.close("set")?;
    body.close("propertyupdate")?;
    body.finish()
}

pub fn unpublish_request_body(vendor_namespace: &str) -> Result<String> {
    let mut body = BodyWriter::new();
    body.open("propertyupdate", &[("xmlns", DAV_NS)])?;
    body.open("remove", &[])?;
    body.open("prop", &[])?;
    body.empty("public_url", &[("xmlns", vendor_namespace)])?;
    body.close("prop")?;
    body.close("remove")?;
    body.close("propertyupdate")?;
    body.finish()
}

pub fn get_property_request_body(property: &PropertyName) -> Result<String> {
    check_property_name(&property.name)?;
    let mut body = BodyWriter::new();
    body.open("propfind", &[("xmlns", DAV_NS)])?;
    body.open("prop", &[])?;
    body.empty(&property.name, &[("xmlns", &property.namespace)])?;
    body.close("prop")?;
    body.close("propfind")?;
    body.finish()
}

pub fn set_property_request_body(property: &PropertyName, value: &str) -> Result<String> {
    check_property_name(&property.name)?;
    let element = format!("u:{}", property.name);
    let mut body = BodyWriter::new();
    body.open("propertyupdate", &[("xmlns", DAV_NS)])?;
    body.open("set", &[])?;
    body.open("prop", &[])?;
    body.open(&element, &[("xmlns:u", &property.namespace)])?;
    body.text(value)?;
    body.close(&element)?;
    body.close("prop")?;
    body.close("set")?;
    body.close("propertyupdate")?;
    body.finish()
}
