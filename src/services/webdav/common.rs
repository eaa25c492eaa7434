/// Common utilities and shared functions for WebDAV services

/// Build the User-Agent string sent with every WebDAV request
pub fn build_user_agent() -> String {
    format!("webdav-client/{} (+https://crates.io/crates/webdav-client)",
            env!("CARGO_PKG_VERSION"))
}

/// Publish/unpublish property namespaces of known providers, keyed by host
const VENDOR_NAMESPACES: &[(&str, &str)] = &[("webdav.yandex.ru", "urn:yandex:disk:meta")];

/// Looks up the vendor namespace for the host component of `hostname`
pub fn vendor_namespace_for(hostname: &str) -> Option<&'static str> {
    let host = url::Url::parse(hostname)
        .ok()
        .and_then(|url| url.host_str().map(|h| h.to_ascii_lowercase()))?;
    VENDOR_NAMESPACES
        .iter()
        .find(|(known, _)| *known == host)
        .map(|(_, namespace)| *namespace)
}
