//! Percent-encoding helpers used on the path and query side of a URL

use std::collections::BTreeMap;

/// Form-style encoding: only alphanumerics and `*-._` survive, space becomes `+`
pub fn quote_plus(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// RFC 3986 encoding for a single path segment
pub fn quote_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Percent-decodes `value`, falling back to the raw text when the escapes
/// do not form valid UTF-8
pub fn unquote(value: &str) -> String {
    match urlencoding::decode(value) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => value.to_string(),
    }
}

/// `key=value&...` form encoding in key order
pub fn encode_query(params: &BTreeMap<String, String>) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}
