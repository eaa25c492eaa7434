//! HTTP transport
//!
//! The client only needs one capability from the network: execute a composed
//! [`DavRequest`] and hand back status plus body. [`ReqwestTransport`] is the
//! production implementation; tests plug in the in-memory server from
//! `test_helpers` or point this one at a wiremock server.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use super::common::build_user_agent;
use super::request::{DavRequest, DavResponse, ProgressCallback, RequestBody, ResponseTarget};
use crate::config::ClientSettings;
use crate::error::{Result, WebDavError};
use crate::utils::TransferProgress;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one request; non-2xx statuses are returned, not raised
    async fn execute(&self, request: DavRequest) -> Result<DavResponse>;
}

#[derive(Clone)]
enum Credentials {
    Anonymous,
    Basic { login: String, password: String },
    Bearer(String),
    OAuth(String),
}

pub struct ReqwestTransport {
    client: reqwest::Client,
    hostname: String,
    credentials: Credentials,
    recv_speed: Option<u64>,
    send_speed: Option<u64>,
}

impl ReqwestTransport {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let webdav = &settings.webdav;

        let mut builder = reqwest::Client::builder()
            .timeout(settings.timeout())
            .user_agent(build_user_agent())
            .danger_accept_invalid_certs(settings.accept_invalid_certs);

        if settings.accept_invalid_certs {
            warn!("⚠️ TLS certificate verification is disabled for {}", webdav.hostname);
        }

        if settings.proxy.is_configured() {
            let mut proxy = reqwest::Proxy::all(&settings.proxy.hostname).map_err(|_| {
                WebDavError::invalid_option("proxy:hostname", &settings.proxy.hostname)
            })?;
            if !settings.proxy.login.is_empty() {
                proxy = proxy.basic_auth(&settings.proxy.login, &settings.proxy.password);
            }
            debug!("Routing requests through proxy {}", settings.proxy.hostname);
            builder = builder.proxy(proxy);
        }

        if !webdav.cert_path.is_empty() {
            let cert = std::fs::read(&webdav.cert_path)
                .map_err(|_| WebDavError::invalid_option("webdav:cert_path", &webdav.cert_path))?;
            // Without a separate key the certificate file must carry it too
            let key = if webdav.key_path.is_empty() {
                cert.clone()
            } else {
                std::fs::read(&webdav.key_path)
                    .map_err(|_| WebDavError::invalid_option("webdav:key_path", &webdav.key_path))?
            };
            let identity = reqwest::Identity::from_pkcs8_pem(&cert, &key)
                .map_err(|_| WebDavError::invalid_option("webdav:cert_path", &webdav.cert_path))?;
            builder = builder.identity(identity);
        }

        let client = builder.build().map_err(|e| WebDavError::NotConnection {
            hostname: webdav.hostname.clone(),
            message: e.to_string(),
        })?;

        let credentials = if !webdav.bearer_token.is_empty() {
            Credentials::Bearer(webdav.bearer_token.clone())
        } else if !webdav.oauth_token.is_empty() {
            Credentials::OAuth(webdav.oauth_token.clone())
        } else if !webdav.login.is_empty() {
            Credentials::Basic {
                login: webdav.login.clone(),
                password: webdav.password.clone(),
            }
        } else {
            Credentials::Anonymous
        };

        Ok(Self {
            client,
            hostname: webdav.hostname.clone(),
            credentials,
            recv_speed: webdav.recv_speed,
            send_speed: webdav.send_speed,
        })
    }

    fn connection_error(&self, error: reqwest::Error) -> WebDavError {
        WebDavError::NotConnection {
            hostname: self.hostname.clone(),
            message: error.to_string(),
        }
    }
}

fn header_map(headers: &[(String, String)]) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| WebDavError::invalid_option(name.as_str(), value.as_str()))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| WebDavError::invalid_option(name.as_str(), value.as_str()))?;
        map.append(header_name, header_value);
    }
    Ok(map)
}

/// Counts streamed bytes, reports progress and holds the stream back to the
/// configured speed
struct TransferMeter {
    started: Instant,
    transferred: AtomicU64,
    total: Option<u64>,
    speed: Option<u64>,
    progress: Option<ProgressCallback>,
}

impl TransferMeter {
    fn new(total: Option<u64>, speed: Option<u64>, progress: Option<ProgressCallback>) -> Self {
        Self {
            started: Instant::now(),
            transferred: AtomicU64::new(0),
            total,
            speed: speed.filter(|s| *s > 0),
            progress,
        }
    }

    async fn record(&self, chunk: usize) {
        let transferred = self.transferred.fetch_add(chunk as u64, Ordering::Relaxed) + chunk as u64;
        if let Some(progress) = &self.progress {
            progress(TransferProgress {
                transferred,
                total: self.total,
            });
        }
        if let Some(speed) = self.speed {
            let due = Duration::from_secs_f64(transferred as f64 / speed as f64);
            let elapsed = self.started.elapsed();
            if due > elapsed {
                tokio::time::sleep(due - elapsed).await;
            }
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: DavRequest) -> Result<DavResponse> {
        let DavRequest {
            method,
            url,
            headers,
            body,
            target,
            progress,
        } = request;

        debug!("🌐 HTTP Request Details:");
        debug!("   Method: {}", method);
        debug!("   URL: {}", url);
        debug!("   Headers: {:?}", headers);

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .headers(header_map(&headers)?);

        builder = match &self.credentials {
            Credentials::Anonymous => builder,
            Credentials::Basic { login, password } => builder.basic_auth(login, Some(password)),
            Credentials::Bearer(token) => builder.bearer_auth(token),
            Credentials::OAuth(token) => builder.header(AUTHORIZATION, format!("OAuth {}", token)),
        };

        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Xml(xml) => {
                debug!("   Body length: {} bytes", xml.len());
                builder.body(xml)
            }
            RequestBody::Stream { reader, length } => {
                debug!("   Streaming {} bytes", length);
                let meter = Arc::new(TransferMeter::new(Some(length), self.send_speed, progress.clone()));
                let stream = ReaderStream::new(reader).then(move |chunk| {
                    let meter = Arc::clone(&meter);
                    async move {
                        if let Ok(bytes) = &chunk {
                            meter.record(bytes.len()).await;
                        }
                        chunk
                    }
                });
                builder.body(reqwest::Body::wrap_stream(stream))
            }
        };

        let response = builder.send().await.map_err(|e| {
            warn!("❌ {} {} failed: {}", method, url, e);
            self.connection_error(e)
        })?;
        let status = response.status().as_u16();
        debug!("   Status: {}", status);

        match target {
            ResponseTarget::Writer { mut writer, label } if response.status().is_success() => {
                let meter = TransferMeter::new(response.content_length(), self.recv_speed, progress);
                let mut stream = response.bytes_stream();
                while let Some(chunk) = stream.next().await {
                    let chunk = chunk.map_err(|e| self.connection_error(e))?;
                    writer
                        .write_all(&chunk)
                        .await
                        .map_err(|e| WebDavError::local_io(label.as_str(), e))?;
                    meter.record(chunk.len()).await;
                }
                writer
                    .shutdown()
                    .await
                    .map_err(|e| WebDavError::local_io(label.as_str(), e))?;
                Ok(DavResponse::new(status, Bytes::new()))
            }
            _ => {
                let body = response.bytes().await.map_err(|e| self.connection_error(e))?;
                Ok(DavResponse::new(status, body))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_map_rejects_invalid_values() {
        let ok = header_map(&[("Depth".to_string(), "1".to_string())]).unwrap();
        assert_eq!(ok.get("depth").unwrap(), "1");

        let bad = header_map(&[("Destination".to_string(), "/a\nb".to_string())]);
        assert!(matches!(bad, Err(WebDavError::InvalidOption { .. })));
    }

    #[test]
    fn test_bad_proxy_is_invalid_option() {
        let mut settings = ClientSettings::new("https://dav.example.com", "alice", "secret");
        settings.proxy.hostname = "::not a proxy::".to_string();
        assert!(matches!(
            ReqwestTransport::new(&settings),
            Err(WebDavError::InvalidOption { ref name, .. }) if name == "proxy:hostname"
        ));
    }

    #[tokio::test]
    async fn test_meter_reports_progress() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ProgressCallback = Arc::new(move |p: TransferProgress| {
            sink.lock().unwrap().push(p.transferred);
        });

        let meter = TransferMeter::new(Some(10), None, Some(callback));
        meter.record(4).await;
        meter.record(6).await;

        assert_eq!(*seen.lock().unwrap(), vec![4, 10]);
    }
}
