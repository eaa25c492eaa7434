//! Connection settings
//!
//! Settings come either from a key/value option map (plain `hostname` or
//! prefixed `webdav_hostname` / `proxy_hostname` keys) or from the process
//! environment (`WEBDAV_*`, `PROXY_*`, optionally seeded from a `.env` file).
//! They are validated once, before the client issues any request.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WebDavError};
use crate::models::{Urn, SEPARATOR};

const WEBDAV_NS: &str = "webdav:";
const PROXY_NS: &str = "proxy:";

/// How `check` decides whether a remote resource exists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStrategy {
    /// `PROPFIND` with `Depth: 0`, exists iff the multistatus lists the exact href
    #[default]
    Propfind,
    /// `HEAD`, exists iff the status is 2xx
    Head,
}

impl FromStr for CheckStrategy {
    type Err = WebDavError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "propfind" => Ok(CheckStrategy::Propfind),
            "head" => Ok(CheckStrategy::Head),
            _ => Err(WebDavError::invalid_option(
                format!("{}check_strategy", WEBDAV_NS),
                value,
            )),
        }
    }
}

#[derive(Clone, Default)]
pub struct WebDavSettings {
    pub hostname: String,
    pub login: String,
    pub password: String,
    pub bearer_token: String,
    pub oauth_token: String,
    /// Quoted root prefix without a trailing separator; empty when unset
    pub root: String,
    pub cert_path: String,
    pub key_path: String,
    /// Download cap in bytes per second
    pub recv_speed: Option<u64>,
    /// Upload cap in bytes per second
    pub send_speed: Option<u64>,
    pub verbose: bool,
}

impl fmt::Debug for WebDavSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebDavSettings")
            .field("hostname", &self.hostname)
            .field("login", &self.login)
            .field("password", &redact(&self.password))
            .field("bearer_token", &redact(&self.bearer_token))
            .field("oauth_token", &redact(&self.oauth_token))
            .field("root", &self.root)
            .field("cert_path", &self.cert_path)
            .field("key_path", &self.key_path)
            .field("recv_speed", &self.recv_speed)
            .field("send_speed", &self.send_speed)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl WebDavSettings {
    /// Stores `root` in its quoted form with the trailing separator stripped
    pub fn set_root(&mut self, root: &str) {
        self.root = normalize_root(root);
    }

    pub fn validate(&self) -> Result<()> {
        if self.hostname.is_empty() {
            return Err(invalid(WEBDAV_NS, "hostname", &self.hostname));
        }
        if url::Url::parse(&self.hostname).is_err() {
            return Err(invalid(WEBDAV_NS, "hostname", &self.hostname));
        }
        if !self.cert_path.is_empty() && !Path::new(&self.cert_path).exists() {
            return Err(invalid(WEBDAV_NS, "cert_path", &self.cert_path));
        }
        if !self.key_path.is_empty() && !Path::new(&self.key_path).exists() {
            return Err(invalid(WEBDAV_NS, "key_path", &self.key_path));
        }
        if !self.key_path.is_empty() && self.cert_path.is_empty() {
            return Err(invalid(WEBDAV_NS, "cert_path", &self.cert_path));
        }
        if !self.password.is_empty() && self.login.is_empty() {
            return Err(invalid(WEBDAV_NS, "login", &self.login));
        }
        if self.login.is_empty() && self.bearer_token.is_empty() && self.oauth_token.is_empty() {
            return Err(invalid(WEBDAV_NS, "login", &self.login));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct ProxySettings {
    pub hostname: String,
    pub login: String,
    pub password: String,
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("hostname", &self.hostname)
            .field("login", &self.login)
            .field("password", &redact(&self.password))
            .finish()
    }
}

impl ProxySettings {
    pub fn is_configured(&self) -> bool {
        !self.hostname.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if !self.password.is_empty() && self.login.is_empty() {
            return Err(invalid(PROXY_NS, "login", &self.login));
        }
        if (!self.login.is_empty() || !self.password.is_empty()) && self.hostname.is_empty() {
            return Err(invalid(PROXY_NS, "hostname", &self.hostname));
        }
        Ok(())
    }
}

/// Everything a client needs: server identity, proxy, and behavior switches
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub webdav: WebDavSettings,
    pub proxy: ProxySettings,
    pub check_strategy: CheckStrategy,
    /// Turn malformed listing/publish/property responses into errors
    pub strict_parsing: bool,
    /// Explicit namespace for the publish/unpublish property
    pub vendor_namespace: Option<String>,
    pub timeout_seconds: u64,
    pub accept_invalid_certs: bool,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            webdav: WebDavSettings::default(),
            proxy: ProxySettings::default(),
            check_strategy: CheckStrategy::default(),
            strict_parsing: false,
            vendor_namespace: None,
            timeout_seconds: 30,
            accept_invalid_certs: false,
        }
    }
}

#[derive(Clone, Copy)]
enum Scope {
    WebDav,
    Proxy,
}

impl ClientSettings {
    /// Minimal settings for a server reached with login and password
    pub fn new(hostname: &str, login: &str, password: &str) -> Self {
        let mut settings = Self::default();
        settings.webdav.hostname = hostname.to_string();
        settings.webdav.login = login.to_string();
        settings.webdav.password = password.to_string();
        settings
    }

    pub fn with_root(mut self, root: &str) -> Self {
        self.webdav.set_root(root);
        self
    }

    /// Loads settings from an option map with plain or prefixed keys
    pub fn from_options(options: &HashMap<String, String>) -> Result<Self> {
        Self::from_source(|scope, key| match scope {
            Scope::WebDav => options
                .get(key)
                .or_else(|| options.get(&format!("webdav_{}", key)))
                .cloned(),
            Scope::Proxy => options.get(&format!("proxy_{}", key)).cloned(),
        })
    }

    /// Loads settings from the environment, reading `.env` first when present
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) => debug!("No .env file loaded: {}", e),
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads settings through an arbitrary `NAME -> value` lookup
    /// (`WEBDAV_HOSTNAME`, `PROXY_LOGIN`, ...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Self::from_source(|scope, key| {
            let name = match scope {
                Scope::WebDav => format!("WEBDAV_{}", key.to_ascii_uppercase()),
                Scope::Proxy => format!("PROXY_{}", key.to_ascii_uppercase()),
            };
            lookup(&name).or_else(|| match (scope, key) {
                // Older setups export the TLS paths without a prefix
                (Scope::WebDav, "cert_path") | (Scope::WebDav, "key_path") => {
                    lookup(&key.to_ascii_uppercase())
                }
                _ => None,
            })
        })
    }

    fn from_source<F>(get: F) -> Result<Self>
    where
        F: Fn(Scope, &str) -> Option<String>,
    {
        let text = |key: &str| get(Scope::WebDav, key).unwrap_or_default();
        let proxy = |key: &str| get(Scope::Proxy, key).unwrap_or_default();

        let mut webdav = WebDavSettings {
            hostname: text("hostname").trim().to_string(),
            login: text("login"),
            password: text("password"),
            bearer_token: text("bearer_token"),
            oauth_token: text("oauth_token"),
            root: String::new(),
            cert_path: text("cert_path"),
            key_path: text("key_path"),
            recv_speed: parse_number(WEBDAV_NS, "recv_speed", get(Scope::WebDav, "recv_speed"))?,
            send_speed: parse_number(WEBDAV_NS, "send_speed", get(Scope::WebDav, "send_speed"))?,
            verbose: parse_flag(WEBDAV_NS, "verbose", get(Scope::WebDav, "verbose"))?,
        };
        webdav.set_root(&text("root"));

        let check_strategy = match get(Scope::WebDav, "check_strategy") {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => CheckStrategy::default(),
        };
        let vendor_namespace = get(Scope::WebDav, "vendor_namespace").filter(|ns| !ns.is_empty());
        let timeout_seconds =
            parse_number(WEBDAV_NS, "timeout_seconds", get(Scope::WebDav, "timeout_seconds"))?
                .unwrap_or(30);

        Ok(Self {
            webdav,
            proxy: ProxySettings {
                hostname: proxy("hostname").trim().to_string(),
                login: proxy("login"),
                password: proxy("password"),
            },
            check_strategy,
            strict_parsing: parse_flag(WEBDAV_NS, "strict_parsing", get(Scope::WebDav, "strict_parsing"))?,
            vendor_namespace,
            timeout_seconds,
            accept_invalid_certs: parse_flag(
                WEBDAV_NS,
                "accept_invalid_certs",
                get(Scope::WebDav, "accept_invalid_certs"),
            )?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.webdav.validate()?;
        self.proxy.validate()?;
        if self.timeout_seconds == 0 {
            return Err(invalid(WEBDAV_NS, "timeout_seconds", "0"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// `Urn(root).quote()` with any trailing separator removed
pub fn normalize_root(root: &str) -> String {
    if root.trim().is_empty() {
        return String::new();
    }
    Urn::new(root.trim())
        .quote()
        .trim_end_matches(SEPARATOR)
        .to_string()
}

fn invalid(namespace: &str, key: &str, value: &str) -> WebDavError {
    WebDavError::invalid_option(format!("{}{}", namespace, key), value)
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}

fn parse_number(namespace: &str, key: &str, value: Option<String>) -> Result<Option<u64>> {
    match value {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| invalid(namespace, key, &value)),
        _ => Ok(None),
    }
}

fn parse_flag(namespace: &str, key: &str, value: Option<String>) -> Result<bool> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            _ => Err(invalid(namespace, key, &v)),
        },
    }
}
