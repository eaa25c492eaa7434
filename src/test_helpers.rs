/*!
 * Test Helpers and Utilities
 *
 * An in-memory WebDAV server that implements `Transport`, so client and tree
 * operations can be exercised without a network. It keeps a flat map of
 * paths, answers the subset of WebDAV the client speaks, and records every
 * request as `(METHOD, decoded path)` for ordering assertions.
 */

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::{normalize_root, ClientSettings};
use crate::error::{Result, WebDavError};
use crate::services::webdav::{
    DavRequest, DavResponse, RequestBody, ResponseTarget, Transport, WebDavClient,
};
use crate::storage::LocalFileSystem;
use crate::utils::encoding::{quote_segment, unquote};
use crate::utils::TransferProgress;
use crate::webdav_xml_parser::{parse_document, XmlElement, DAV_NS};

pub const TEST_HOSTNAME: &str = "https://dav.example.com";
pub const PUBLIC_LINK_PREFIX: &str = "https://public.example.com";

#[derive(Debug, Clone)]
enum Node {
    Directory,
    File(Vec<u8>),
}

#[derive(Debug, Default)]
struct ServerState {
    nodes: BTreeMap<String, Node>,
    /// (path, namespace, name) -> value
    properties: BTreeMap<(String, String, String), String>,
    calls: Vec<(String, String)>,
    quota: Option<u64>,
    upload_status: Option<u16>,
    download_status: Option<u16>,
    omit_resource_type: bool,
}

pub struct MemoryDavServer {
    hostname: String,
    root: String,
    state: Mutex<ServerState>,
}

impl Default for MemoryDavServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDavServer {
    pub fn new() -> Self {
        let mut state = ServerState::default();
        state.nodes.insert("/".to_string(), Node::Directory);
        Self {
            hostname: TEST_HOSTNAME.to_string(),
            root: String::new(),
            state: Mutex::new(state),
        }
    }

    /// Serves everything below a root prefix such as `/remote.php/webdav`
    pub fn with_root(mut self, root: &str) -> Self {
        self.root = normalize_root(root);
        self
    }

    fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_directory(&self, path: &str) {
        let mut state = self.state();
        for ancestor in ancestors(&key(path)) {
            state.nodes.entry(ancestor).or_insert(Node::Directory);
        }
    }

    pub fn add_file(&self, path: &str, content: &[u8]) {
        let key = key(path);
        self.add_directory(&parent_key(&key));
        self.state().nodes.insert(key, Node::File(content.to_vec()));
    }

    pub fn set_quota(&self, available: Option<u64>) {
        self.state().quota = available;
    }

    /// Answer every PUT with `status` instead of storing the body
    pub fn fail_uploads_with(&self, status: u16) {
        self.state().upload_status = Some(status);
    }

    /// Answer every GET with `status` instead of the file content
    pub fn fail_downloads_with(&self, status: u16) {
        self.state().download_status = Some(status);
    }

    /// Leave `resourcetype` out of PROPFIND answers
    pub fn omit_resource_type(&self) {
        self.state().omit_resource_type = true;
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.state().nodes.get(&key(path)) {
            Some(Node::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state().nodes.contains_key(&key(path))
    }

    pub fn is_directory(&self, path: &str) -> bool {
        matches!(self.state().nodes.get(&key(path)), Some(Node::Directory))
    }

    pub fn property(&self, path: &str, namespace: &str, name: &str) -> Option<String> {
        self.state()
            .properties
            .get(&(key(path), namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.state().calls.clone()
    }

    /// Recorded calls without the read-only PROPFIND/HEAD probes
    pub fn mutating_calls(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter(|(method, _)| method != "PROPFIND" && method != "HEAD")
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Decoded server path of a composed URL or Destination header
    fn path_of(&self, target: &str) -> String {
        let without_host = target.strip_prefix(&self.hostname).unwrap_or(target);
        let without_root = without_host.strip_prefix(&self.root).unwrap_or(without_host);
        let without_query = without_root.split('?').next().unwrap_or_default();
        let decoded = unquote(without_query);
        if decoded.is_empty() {
            "/".to_string()
        } else {
            decoded
        }
    }

    fn href(&self, key: &str, node: &Node) -> String {
        let mut href = self.root.clone();
        if key == "/" {
            href.push('/');
        } else {
            for segment in key.split('/').skip(1) {
                href.push('/');
                href.push_str(&quote_segment(segment));
            }
            if matches!(node, Node::Directory) {
                href.push('/');
            }
        }
        href
    }

    fn handle(&self, request: &DavRequest, body: Vec<u8>) -> (u16, Vec<u8>) {
        let method = request.method.as_str().to_string();
        let path = self.path_of(&request.url);
        let key = key(&path);
        let mut state = self.state();
        state.calls.push((method.clone(), path));

        match method.as_str() {
            "PROPFIND" => {
                let depth_one = request.header("Depth") != Some("0");
                match state.nodes.get(&key) {
                    Some(_) => (207, self.multistatus(&state, &key, depth_one).into_bytes()),
                    None => (404, Vec::new()),
                }
            }
            "HEAD" => match state.nodes.get(&key) {
                Some(_) => (200, Vec::new()),
                None => (404, Vec::new()),
            },
            "GET" => match (state.download_status, state.nodes.get(&key)) {
                (Some(status), _) => (status, Vec::new()),
                (None, Some(Node::File(content))) => (200, content.clone()),
                _ => (404, Vec::new()),
            },
            "MKCOL" => {
                if state.nodes.contains_key(&key) {
                    (405, Vec::new())
                } else if !matches!(state.nodes.get(&parent_key(&key)), Some(Node::Directory)) {
                    (409, Vec::new())
                } else {
                    state.nodes.insert(key, Node::Directory);
                    (201, Vec::new())
                }
            }
            "PUT" => {
                if let Some(status) = state.upload_status {
                    (status, Vec::new())
                } else if !matches!(state.nodes.get(&parent_key(&key)), Some(Node::Directory)) {
                    (409, Vec::new())
                } else {
                    state.nodes.insert(key, Node::File(body));
                    (201, Vec::new())
                }
            }
            "DELETE" => {
                if state.nodes.remove(&key).is_none() {
                    return (404, Vec::new());
                }
                let prefix = format!("{}/", key);
                state.nodes.retain(|path, _| !path.starts_with(&prefix));
                (204, Vec::new())
            }
            "COPY" | "MOVE" => {
                let destination = match request.header("Destination") {
                    Some(destination) => self::key(&self.path_of(destination)),
                    None => return (400, Vec::new()),
                };
                if !state.nodes.contains_key(&key) {
                    return (404, Vec::new());
                }
                let prefix = format!("{}/", key);
                let subtree: Vec<(String, Node)> = state
                    .nodes
                    .iter()
                    .filter(|(path, _)| **path == key || path.starts_with(&prefix))
                    .map(|(path, node)| (format!("{}{}", destination, &path[key.len()..]), node.clone()))
                    .collect();
                if method == "MOVE" {
                    state
                        .nodes
                        .retain(|path, _| *path != key && !path.starts_with(&prefix));
                }
                state.nodes.extend(subtree);
                (201, Vec::new())
            }
            "PROPPATCH" => {
                if !state.nodes.contains_key(&key) {
                    return (404, Vec::new());
                }
                let document = match parse_document(&body) {
                    Ok(document) => document,
                    Err(_) => return (400, Vec::new()),
                };
                let link = self.apply_proppatch(&mut state, &key, &document);
                (207, self.proppatch_response(&state, &key, link).into_bytes())
            }
            _ => (405, Vec::new()),
        }
    }

    /// Applies set/remove instructions; returns the public link when one was set
    fn apply_proppatch(
        &self,
        state: &mut ServerState,
        key: &str,
        document: &XmlElement,
    ) -> Option<(String, String)> {
        let mut link = None;
        for instruction in &document.children {
            let Some(prop) = instruction.child(DAV_NS, "prop") else {
                continue;
            };
            for property in &prop.children {
                let id = (key.to_string(), property.namespace.clone(), property.name.clone());
                match instruction.name.as_str() {
                    "set" => {
                        let value = if property.name == "public_url" {
                            let url = format!("{}{}", PUBLIC_LINK_PREFIX, key);
                            link = Some((property.namespace.clone(), url.clone()));
                            url
                        } else {
                            property.text.clone()
                        };
                        state.properties.insert(id, value);
                    }
                    "remove" => {
                        state.properties.remove(&id);
                    }
                    _ => {}
                }
            }
        }
        link
    }

    fn proppatch_response(
        &self,
        state: &ServerState,
        key: &str,
        link: Option<(String, String)>,
    ) -> String {
        let node = state.nodes.get(key).cloned().unwrap_or(Node::Directory);
        let prop = match link {
            Some((namespace, url)) => {
                format!(r#"<public_url xmlns="{}">{}</public_url>"#, namespace, url)
            }
            None => String::new(),
        };
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?><d:multistatus xmlns:d="DAV:"><d:response><d:href>{}</d:href><d:propstat><d:prop>{}</d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response></d:multistatus>"#,
            self.href(key, &node),
            prop
        )
    }

    fn multistatus(&self, state: &ServerState, key: &str, depth_one: bool) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="utf-8"?><d:multistatus xmlns:d="DAV:">"#,
        );
        let mut entries = vec![key.to_string()];
        if depth_one {
            entries.extend(
                state
                    .nodes
                    .keys()
                    .filter(|path| path.as_str() != "/" && parent_key(path) == key)
                    .cloned(),
            );
        }

        for (index, path) in entries.iter().enumerate() {
            let Some(node) = state.nodes.get(path) else {
                continue;
            };
            let mut props = String::new();
            if !state.omit_resource_type {
                match node {
                    Node::Directory => props.push_str("<d:resourcetype><d:collection/></d:resourcetype>"),
                    Node::File(_) => props.push_str("<d:resourcetype/>"),
                }
            }
            let name = path.rsplit('/').next().unwrap_or_default();
            props.push_str(&format!("<d:displayname>{}</d:displayname>", escape(name)));
            props.push_str("<d:creationdate>2024-03-01T10:00:00Z</d:creationdate>");
            props.push_str("<d:getlastmodified>Fri, 01 Mar 2024 10:00:00 GMT</d:getlastmodified>");
            if let Node::File(content) = node {
                props.push_str(&format!("<d:getcontentlength>{}</d:getcontentlength>", content.len()));
            }
            if index == 0 {
                if let Some(quota) = state.quota {
                    props.push_str(&format!(
                        "<d:quota-available-bytes>{}</d:quota-available-bytes><d:quota-used-bytes>0</d:quota-used-bytes>",
                        quota
                    ));
                }
            }
            for ((owner, namespace, name), value) in &state.properties {
                if owner == path {
                    props.push_str(&format!(
                        r#"<x:{name} xmlns:x="{namespace}">{value}</x:{name}>"#,
                        name = name,
                        namespace = namespace,
                        value = escape(value)
                    ));
                }
            }

            xml.push_str(&format!(
                "<d:response><d:href>{}</d:href><d:propstat><d:prop>{}</d:prop><d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>",
                self.href(path, node),
                props
            ));
        }
        xml.push_str("</d:multistatus>");
        xml
    }
}

#[async_trait]
impl Transport for MemoryDavServer {
    async fn execute(&self, mut request: DavRequest) -> Result<DavResponse> {
        let body = match std::mem::replace(&mut request.body, RequestBody::Empty) {
            RequestBody::Empty => Vec::new(),
            RequestBody::Xml(xml) => xml.into_bytes(),
            RequestBody::Stream { mut reader, .. } => {
                let mut content = Vec::new();
                reader
                    .read_to_end(&mut content)
                    .await
                    .map_err(|e| WebDavError::local_io("upload body", e))?;
                content
            }
        };
        let sent = body.len() as u64;

        let (status, response) = self.handle(&request, body);

        if request.method.as_str() == "PUT" {
            if let Some(progress) = &request.progress {
                progress(TransferProgress {
                    transferred: sent,
                    total: Some(sent),
                });
            }
        }

        match request.target {
            ResponseTarget::Writer { mut writer, label } if (200..300).contains(&status) => {
                writer
                    .write_all(&response)
                    .await
                    .map_err(|e| WebDavError::local_io(label.as_str(), e))?;
                writer
                    .shutdown()
                    .await
                    .map_err(|e| WebDavError::local_io(label.as_str(), e))?;
                if let Some(progress) = &request.progress {
                    progress(TransferProgress {
                        transferred: response.len() as u64,
                        total: Some(response.len() as u64),
                    });
                }
                Ok(DavResponse::new(status, Vec::new()))
            }
            _ => Ok(DavResponse::new(status, response)),
        }
    }
}

/// Normalized node key: decoded, leading `/`, no trailing `/` except for root
fn key(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

fn parent_key(key: &str) -> String {
    match key.rsplit_once('/') {
        Some(("", _)) | None => "/".to_string(),
        Some((parent, _)) => parent.to_string(),
    }
}

fn ancestors(key: &str) -> Vec<String> {
    let mut result = vec!["/".to_string()];
    let mut current = String::new();
    for segment in key.split('/').filter(|s| !s.is_empty()) {
        current.push('/');
        current.push_str(segment);
        result.push(current.clone());
    }
    result
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Settings for a client talking to `TEST_HOSTNAME` with basic credentials
pub fn test_settings() -> ClientSettings {
    ClientSettings::new(TEST_HOSTNAME, "alice", "secret")
}

/// A client wired to `server` and the real local filesystem
pub fn memory_client(server: Arc<MemoryDavServer>, settings: ClientSettings) -> Result<WebDavClient> {
    WebDavClient::with_parts(settings, server, Arc::new(LocalFileSystem::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys() {
        assert_eq!(key("/dir/"), "/dir");
        assert_eq!(key(""), "/");
        assert_eq!(parent_key("/dir/a.txt"), "/dir");
        assert_eq!(parent_key("/a.txt"), "/");
        assert_eq!(ancestors("/a/b"), vec!["/", "/a", "/a/b"]);
    }

    #[test]
    fn test_hrefs_are_encoded_with_root() {
        let server = MemoryDavServer::new().with_root("/dav/");
        assert_eq!(server.href("/my dir", &Node::Directory), "/dav/my%20dir/");
        assert_eq!(server.href("/", &Node::Directory), "/dav/");
        assert_eq!(server.path_of("https://dav.example.com/dav/my%20dir/"), "/my dir/");
    }
}
