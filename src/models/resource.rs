use serde::{Deserialize, Serialize};

/// Properties returned by an `info` query; `None` when the server left the
/// corresponding element out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub created: Option<String>,
    pub name: Option<String>,
    pub size: Option<String>,
    pub modified: Option<String>,
}

impl ResourceInfo {
    pub const KEYS: [&'static str; 4] = ["created", "name", "size", "modified"];

    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "created" => self.created.as_deref(),
            "name" => self.name.as_deref(),
            "size" => self.size.as_deref(),
            "modified" => self.modified.as_deref(),
            _ => None,
        }
    }

    /// Copy keeping only the listed keys
    pub fn filtered(&self, keys: &[&str]) -> ResourceInfo {
        let keep = |key: &str, value: &Option<String>| {
            if keys.contains(&key) {
                value.clone()
            } else {
                None
            }
        };
        ResourceInfo {
            created: keep("created", &self.created),
            name: keep("name", &self.name),
            size: keep("size", &self.size),
            modified: keep("modified", &self.modified),
        }
    }
}

/// A custom (dead) property addressed by namespace and local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyName {
    pub namespace: String,
    pub name: String,
}

impl PropertyName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtered_keeps_requested_keys() {
        let info = ResourceInfo {
            created: Some("2024-01-01T00:00:00Z".into()),
            name: Some("a.txt".into()),
            size: Some("12".into()),
            modified: Some("Mon, 01 Jan 2024 00:00:00 GMT".into()),
        };

        let only_size = info.filtered(&["size"]);
        assert_eq!(only_size.size.as_deref(), Some("12"));
        assert!(only_size.name.is_none());
        assert_eq!(info.get("name"), Some("a.txt"));
        assert_eq!(info.get("etag"), None);
    }
}
