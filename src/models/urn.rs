//! Normalized remote resource path
//!
//! A `Urn` is an immutable path value: it always starts with `/`, runs of
//! separators and `/./`-style dot segments are collapsed when it is built,
//! and a directory Urn always ends with `/`. Anything that changes a path
//! (rename, move) builds a new Urn.

use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::utils::encoding::{encode_query, unquote};
use crate::utils::matrix_params::{quote_path_with_matrix_params, MatrixParams};

pub const SEPARATOR: char = '/';

static DOT_SEGMENTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\.+/").expect("static regex"));
static REPEATED_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"/+").expect("static regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Urn {
    raw_path: String,
    matrix_params: Option<MatrixParams>,
    query_params: Option<BTreeMap<String, String>>,
}

impl Urn {
    pub fn new(path: &str) -> Self {
        Self::build(path, false)
    }

    /// Builds a collection Urn; the result always ends with `/`
    pub fn directory(path: &str) -> Self {
        Self::build(path, true)
    }

    fn build(path: &str, directory: bool) -> Self {
        let mut raw_path = collapse(path);

        if !raw_path.starts_with(SEPARATOR) {
            raw_path.insert(0, SEPARATOR);
        }
        if directory && !raw_path.ends_with(SEPARATOR) {
            raw_path.push(SEPARATOR);
        }

        Self {
            raw_path,
            matrix_params: None,
            query_params: None,
        }
    }

    pub fn with_matrix_params(mut self, matrix_params: MatrixParams) -> Self {
        self.matrix_params = Some(matrix_params);
        self
    }

    pub fn with_query_params(mut self, query_params: BTreeMap<String, String>) -> Self {
        self.query_params = Some(query_params);
        self
    }

    /// Decoded, human-readable path
    pub fn path(&self) -> String {
        unquote(&self.raw_path)
    }

    /// Wire form: encoded segments, matrix parameters and query string
    pub fn quote(&self) -> String {
        let path = quote_path_with_matrix_params(&self.path(), self.matrix_params.as_ref());
        match &self.query_params {
            Some(query) if !query.is_empty() => format!("{}?{}", path, encode_query(query)),
            _ => path,
        }
    }

    /// Last segment; directories keep their trailing separator (`sub/`)
    pub fn filename(&self) -> String {
        let segments: Vec<&str> = self.raw_path.split(SEPARATOR).collect();
        let last = segments[segments.len() - 1];
        let name = if last.is_empty() && segments.len() >= 2 {
            format!("{}{}", segments[segments.len() - 2], SEPARATOR)
        } else {
            last.to_string()
        };
        unquote(&name)
    }

    /// Enclosing collection, always ending with `/`; the root is its own parent
    pub fn parent(&self) -> String {
        let segments: Vec<&str> = self.raw_path.split(SEPARATOR).collect();
        let level = self.nesting_level();

        let mut parent = if level == 1 {
            SEPARATOR.to_string()
        } else {
            segments[..level.min(segments.len())].join("/")
        };
        if !parent.ends_with(SEPARATOR) {
            parent.push(SEPARATOR);
        }
        unquote(&parent)
    }

    /// Number of separators, not counting a trailing one
    pub fn nesting_level(&self) -> usize {
        let separators = self.raw_path.matches(SEPARATOR).count();
        if self.raw_path.ends_with(SEPARATOR) {
            separators - 1
        } else {
            separators
        }
    }

    pub fn is_directory(&self) -> bool {
        self.raw_path.ends_with(SEPARATOR)
    }

    pub fn is_root(&self) -> bool {
        self.raw_path == "/"
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

impl From<&str> for Urn {
    fn from(path: &str) -> Self {
        Urn::new(path)
    }
}

/// Applies both collapsing rules until neither changes the path
fn collapse(path: &str) -> String {
    let mut current = path.to_string();
    loop {
        let dots = DOT_SEGMENTS.replace_all(&current, "/");
        let next = REPEATED_SEPARATORS.replace_all(&dots, "/").into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(Urn::new("").path(), "/");
        assert_eq!(Urn::new("dir/file.txt").path(), "/dir/file.txt");
        assert_eq!(Urn::new("//dir///sub//").path(), "/dir/sub/");
        assert_eq!(Urn::new("/dir/./file").path(), "/dir/file");
        assert_eq!(Urn::new("/a/./././b").path(), "/a/b");
        assert_eq!(Urn::new("/a/../b").path(), "/a/b");
    }

    #[test]
    fn test_directory_flag() {
        assert_eq!(Urn::directory("/dir").path(), "/dir/");
        assert_eq!(Urn::directory("/dir/").path(), "/dir/");
        assert_eq!(Urn::directory("").path(), "/");
        assert_eq!(Urn::new("/dir/").path(), "/dir/");
        assert_eq!(Urn::new("/dir").path(), "/dir");
    }

    #[test]
    fn test_filename() {
        assert_eq!(Urn::new("/dir/a.txt").filename(), "a.txt");
        assert_eq!(Urn::new("/dir/sub/").filename(), "sub/");
        assert_eq!(Urn::new("/my%20file.txt").filename(), "my file.txt");
        assert_eq!(Urn::new("/").filename(), "/");
    }

    #[test]
    fn test_parent() {
        assert_eq!(Urn::new("/dir/a.txt").parent(), "/dir/");
        assert_eq!(Urn::new("/dir/sub/").parent(), "/dir/");
        assert_eq!(Urn::new("/a.txt").parent(), "/");
        assert_eq!(Urn::new("/sub/").parent(), "/");
        assert_eq!(Urn::new("/").parent(), "/");
        assert_eq!(Urn::new("/a/b/c/d.txt").parent(), "/a/b/c/");
    }

    #[test]
    fn test_nesting_level() {
        assert_eq!(Urn::new("/").nesting_level(), 0);
        assert_eq!(Urn::new("/a.txt").nesting_level(), 1);
        assert_eq!(Urn::new("/dir/").nesting_level(), 1);
        assert_eq!(Urn::new("/dir/sub/file").nesting_level(), 3);
    }

    #[test]
    fn test_is_directory() {
        assert!(Urn::new("/").is_directory());
        assert!(Urn::new("/dir/").is_directory());
        assert!(!Urn::new("/dir").is_directory());
    }

    #[test]
    fn test_quote_with_params() {
        let mut matrix = MatrixParams::new();
        matrix
            .entry("/docs".to_string())
            .or_default()
            .insert("rev".to_string(), vec!["7".to_string()]);
        let mut query = BTreeMap::new();
        query.insert("lang".to_string(), "en gb".to_string());

        let urn = Urn::new("/docs/read me.txt")
            .with_matrix_params(matrix)
            .with_query_params(query);

        assert_eq!(urn.quote(), "/docs;rev=7/read%20me.txt?lang=en+gb");
        assert_eq!(urn.path(), "/docs/read me.txt");
    }

    #[test]
    fn test_encoded_input_is_decoded_once() {
        let urn = Urn::new("/a%20b/c");
        assert_eq!(urn.path(), "/a b/c");
        assert_eq!(urn.quote(), "/a%20b/c");
    }
}
