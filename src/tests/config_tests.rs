use crate::config::{normalize_root, CheckStrategy, ClientSettings};
use crate::error::WebDavError;
use std::collections::HashMap;

// Helper building a lookup over a fixed set of variables, so tests never race
// on the process environment
fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

fn options(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn assert_invalid(result: crate::error::Result<()>, expected: &str) {
    match result {
        Err(WebDavError::InvalidOption { name, .. }) => assert_eq!(name, expected),
        other => panic!("expected InvalidOption({}), got {:?}", expected, other),
    }
}

#[test]
fn test_environment_variables_are_read() {
    let settings = ClientSettings::from_lookup(lookup(&[
        ("WEBDAV_HOSTNAME", "https://dav.example.com"),
        ("WEBDAV_LOGIN", "alice"),
        ("WEBDAV_PASSWORD", "secret"),
        ("WEBDAV_ROOT", "/remote.php/webdav/"),
        ("WEBDAV_RECV_SPEED", "1024"),
        ("WEBDAV_CHECK_STRATEGY", "head"),
        ("PROXY_HOSTNAME", "http://proxy.local:3128"),
        ("PROXY_LOGIN", "bob"),
    ]))
    .expect("Settings should load successfully");

    assert_eq!(settings.webdav.hostname, "https://dav.example.com");
    assert_eq!(settings.webdav.root, "/remote.php/webdav");
    assert_eq!(settings.webdav.recv_speed, Some(1024));
    assert_eq!(settings.webdav.send_speed, None);
    assert_eq!(settings.check_strategy, CheckStrategy::Head);
    assert_eq!(settings.proxy.login, "bob");
    assert!(settings.proxy.is_configured());
    assert!(settings.validate().is_ok());
}

#[test]
fn test_unprefixed_tls_paths_are_accepted() {
    let settings = ClientSettings::from_lookup(lookup(&[
        ("WEBDAV_HOSTNAME", "https://dav.example.com"),
        ("WEBDAV_LOGIN", "alice"),
        ("CERT_PATH", "/etc/ssl/client.pem"),
    ]))
    .unwrap();
    assert_eq!(settings.webdav.cert_path, "/etc/ssl/client.pem");
}

#[test]
fn test_defaults() {
    let settings = ClientSettings::from_lookup(lookup(&[
        ("WEBDAV_HOSTNAME", "https://dav.example.com"),
        ("WEBDAV_LOGIN", "alice"),
    ]))
    .unwrap();

    assert_eq!(settings.check_strategy, CheckStrategy::Propfind);
    assert_eq!(settings.timeout_seconds, 30);
    assert!(!settings.strict_parsing);
    assert!(!settings.accept_invalid_certs);
    assert_eq!(settings.vendor_namespace, None);
    assert_eq!(settings.webdav.root, "");
}

#[test]
fn test_plain_key_wins_over_prefixed_key() {
    let settings = ClientSettings::from_options(&options(&[
        ("hostname", "https://plain.example.com"),
        ("webdav_hostname", "https://prefixed.example.com"),
        ("webdav_login", "alice"),
        ("proxy_hostname", "http://proxy.local"),
    ]))
    .unwrap();

    assert_eq!(settings.webdav.hostname, "https://plain.example.com");
    assert_eq!(settings.webdav.login, "alice");
    assert_eq!(settings.proxy.hostname, "http://proxy.local");
}

#[test]
fn test_validation_rules() {
    let base = || ClientSettings::new("https://dav.example.com", "alice", "secret");

    let mut settings = base();
    settings.webdav.hostname.clear();
    assert_invalid(settings.validate(), "webdav:hostname");

    let mut settings = base();
    settings.webdav.login.clear();
    assert_invalid(settings.validate(), "webdav:login");

    let mut settings = base();
    settings.webdav.login.clear();
    settings.webdav.password.clear();
    assert_invalid(settings.validate(), "webdav:login");
    settings.webdav.bearer_token = "token".to_string();
    assert!(settings.validate().is_ok());

    let mut settings = base();
    settings.webdav.cert_path = "/definitely/missing/cert.pem".to_string();
    assert_invalid(settings.validate(), "webdav:cert_path");

    let mut settings = base();
    settings.proxy.password = "pw".to_string();
    assert_invalid(settings.validate(), "proxy:login");

    let mut settings = base();
    settings.proxy.login = "bob".to_string();
    assert_invalid(settings.validate(), "proxy:hostname");

    let mut settings = base();
    settings.timeout_seconds = 0;
    assert_invalid(settings.validate(), "webdav:timeout_seconds");
}

#[test]
fn test_key_path_requires_cert_path() {
    let key = tempfile::NamedTempFile::new().unwrap();
    let mut settings = ClientSettings::new("https://dav.example.com", "alice", "secret");
    settings.webdav.key_path = key.path().to_string_lossy().to_string();
    assert_invalid(settings.validate(), "webdav:cert_path");
}

#[test]
fn test_malformed_numbers_and_flags_are_rejected() {
    let speed = ClientSettings::from_lookup(lookup(&[
        ("WEBDAV_HOSTNAME", "https://dav.example.com"),
        ("WEBDAV_LOGIN", "alice"),
        ("WEBDAV_SEND_SPEED", "fast"),
    ]));
    assert!(matches!(speed, Err(WebDavError::InvalidOption { ref name, .. }) if name == "webdav:send_speed"));

    let flag = ClientSettings::from_lookup(lookup(&[
        ("WEBDAV_HOSTNAME", "https://dav.example.com"),
        ("WEBDAV_LOGIN", "alice"),
        ("WEBDAV_STRICT_PARSING", "maybe"),
    ]));
    assert!(matches!(flag, Err(WebDavError::InvalidOption { .. })));

    let strategy = ClientSettings::from_lookup(lookup(&[
        ("WEBDAV_HOSTNAME", "https://dav.example.com"),
        ("WEBDAV_LOGIN", "alice"),
        ("WEBDAV_CHECK_STRATEGY", "guess"),
    ]));
    assert!(matches!(strategy, Err(WebDavError::InvalidOption { ref name, .. }) if name == "webdav:check_strategy"));
}

#[test]
fn test_root_normalization() {
    assert_eq!(normalize_root(""), "");
    assert_eq!(normalize_root("/"), "");
    assert_eq!(normalize_root("dav/"), "/dav");
    assert_eq!(normalize_root("/my files//dav/"), "/my%20files/dav");
}

#[test]
fn test_debug_output_redacts_secrets() {
    let mut settings = ClientSettings::new("https://dav.example.com", "alice", "hunter2");
    settings.webdav.bearer_token = "tok-123".to_string();
    let rendered = format!("{:?}", settings);
    assert!(!rendered.contains("hunter2"));
    assert!(!rendered.contains("tok-123"));
    assert!(rendered.contains("alice"));
}
