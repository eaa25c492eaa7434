//! WebDAV client: single-resource operations and file transfers
//!
//! Every public operation follows the same shape: build a [`Urn`], run any
//! existence precondition, compose the request, execute it through the
//! [`Transport`] and hand the body to the matching parser. Recursive
//! directory operations live in `tree.rs`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::request::{
    DavRequest, DavResponse, Operation, ProgressCallback, RequestBody, RequestComposer,
    ResponseTarget,
};
use super::resource::Resource;
use super::transport::{ReqwestTransport, Transport};
use crate::config::{CheckStrategy, ClientSettings};
use crate::error::{Result, WebDavError};
use crate::models::{PropertyName, ResourceInfo, Urn};
use crate::storage::{LocalFileSystem, LocalStorage};
use crate::utils::TransferProgress;
use crate::webdav_xml_parser::ResponseParser;

/// Invoked once a `*_sync` / `*_async` transfer has finished successfully
pub type CompletionCallback = Box<dyn FnOnce() + Send>;

#[derive(Clone)]
pub struct WebDavClient {
    settings: Arc<ClientSettings>,
    pub(crate) composer: Arc<RequestComposer>,
    pub(crate) parser: ResponseParser,
    transport: Arc<dyn Transport>,
    pub(crate) storage: Arc<dyn LocalStorage>,
}

impl WebDavClient {
    /// Validates `settings` and connects through reqwest and the local filesystem
    pub fn new(settings: ClientSettings) -> Result<Self> {
        settings.validate()?;
        let transport = ReqwestTransport::new(&settings)?;
        Self::with_parts(settings, Arc::new(transport), Arc::new(LocalFileSystem::new()))
    }

    /// Builds a client over caller-supplied transport and storage
    pub fn with_parts(
        settings: ClientSettings,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn LocalStorage>,
    ) -> Result<Self> {
        settings.validate()?;
        info!(
            "WebDAV client for {}{} ({} storage)",
            settings.webdav.hostname,
            settings.webdav.root,
            storage.storage_type()
        );

        Ok(Self {
            composer: Arc::new(RequestComposer::new(&settings)),
            parser: ResponseParser::new(settings.webdav.hostname.clone(), settings.strict_parsing),
            settings: Arc::new(settings),
            transport,
            storage,
        })
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Handle bound to one remote path
    pub fn resource(&self, remote_path: &str) -> Resource {
        Resource::new(self.clone(), Urn::new(remote_path))
    }

    // ============================================================================
    // Request plumbing
    // ============================================================================

    /// Executes a request and maps error statuses onto the error taxonomy
    async fn send(&self, request: DavRequest, urn: &Urn) -> Result<DavResponse> {
        let method = request.method.to_string();
        let url = request.url.clone();
        let response = self.transport.execute(request).await?;

        match response.status {
            status if (200..300).contains(&status) => Ok(response),
            404 => Err(WebDavError::remote_not_found(urn.path())),
            507 => Err(WebDavError::NotEnoughSpace),
            status => Err(WebDavError::UnexpectedStatus {
                method,
                url,
                status,
            }),
        }
    }

    pub(crate) async fn execute(&self, operation: Operation, urn: &Urn) -> Result<DavResponse> {
        debug!("{} {}", operation.name(), urn);
        let request = self.composer.compose(&operation, urn)?;
        self.send(request, urn).await
    }

    /// Existence of `urn`, trying the directory form too for paths without a
    /// trailing separator
    async fn exists(&self, urn: &Urn) -> Result<bool> {
        if self.check(&urn.path()).await? {
            return Ok(true);
        }
        if urn.is_directory() {
            return Ok(false);
        }
        self.check(&Urn::directory(&urn.path()).path()).await
    }

    async fn require(&self, urn: &Urn) -> Result<()> {
        if self.exists(urn).await? {
            Ok(())
        } else {
            Err(WebDavError::remote_not_found(urn.path()))
        }
    }

    async fn require_parent(&self, urn: &Urn) -> Result<()> {
        if self.check(&urn.parent()).await? {
            Ok(())
        } else {
            Err(WebDavError::parent_not_found(urn.path()))
        }
    }

    // ============================================================================
    // Single-resource operations
    // ============================================================================

    /// Names of the children of a remote directory; subdirectories end with `/`
    pub async fn list(&self, remote_path: &str) -> Result<Vec<String>> {
        let directory = Urn::directory(remote_path);
        if !directory.is_root() && !self.check(&directory.path()).await? {
            return Err(WebDavError::remote_not_found(directory.path()));
        }

        let response = self.execute(Operation::List, &directory).await?;
        self.parser
            .parse_listing(&response.body, &self.composer.matcher(&directory))
    }

    /// Free space in bytes as reported by `quota-available-bytes`
    pub async fn free(&self) -> Result<u64> {
        let response = self.execute(Operation::Free, &Urn::directory("")).await?;
        self.parser.parse_quota(&response.body)
    }

    pub async fn check(&self, remote_path: &str) -> Result<bool> {
        let urn = Urn::new(remote_path);
        let request = self.composer.compose(&Operation::Check, &urn)?;
        let url = request.url.clone();
        let method = request.method.to_string();
        let response = self.transport.execute(request).await?;

        match self.composer.check_strategy() {
            CheckStrategy::Head => Ok(ResponseParser::parse_exists_status(response.status)),
            CheckStrategy::Propfind => match response.status {
                404 => Ok(false),
                status if (200..300).contains(&status) => self
                    .parser
                    .parse_exists(&response.body, &self.composer.matcher(&urn)),
                status => Err(WebDavError::UnexpectedStatus {
                    method,
                    url,
                    status,
                }),
            },
        }
    }

    /// Creates a remote directory; its parent must exist
    pub async fn mkdir(&self, remote_path: &str) -> Result<()> {
        let directory = Urn::directory(remote_path);
        self.require_parent(&directory).await?;
        self.execute(Operation::Mkdir, &directory).await?;
        Ok(())
    }

    /// Deletes a remote file or directory
    pub async fn clean(&self, remote_path: &str) -> Result<()> {
        let urn = Urn::new(remote_path);
        self.execute(Operation::Clean, &urn).await?;
        Ok(())
    }

    pub async fn copy(&self, remote_path_from: &str, remote_path_to: &str) -> Result<()> {
        let from = Urn::new(remote_path_from);
        let to = Urn::new(remote_path_to);
        self.require(&from).await?;
        self.require_parent(&to).await?;
        self.execute(Operation::Copy { destination: to }, &from).await?;
        Ok(())
    }

    pub async fn move_resource(&self, remote_path_from: &str, remote_path_to: &str) -> Result<()> {
        let from = Urn::new(remote_path_from);
        let to = Urn::new(remote_path_to);
        self.require(&from).await?;
        self.require_parent(&to).await?;
        self.execute(Operation::Move { destination: to }, &from).await?;
        Ok(())
    }

    /// Makes a resource public and returns its link
    pub async fn publish(&self, remote_path: &str) -> Result<String> {
        let urn = Urn::new(remote_path);
        self.require(&urn).await?;
        let response = self.execute(Operation::Publish, &urn).await?;
        self.parser.parse_public_url(&response.body)
    }

    pub async fn unpublish(&self, remote_path: &str) -> Result<()> {
        let urn = Urn::new(remote_path);
        self.require(&urn).await?;
        self.execute(Operation::Unpublish, &urn).await?;
        Ok(())
    }

    pub async fn info(&self, remote_path: &str) -> Result<ResourceInfo> {
        let urn = Urn::new(remote_path);
        self.require(&urn).await?;
        let response = self.execute(Operation::Info, &urn).await?;
        self.parser
            .parse_info(&response.body, &self.composer.matcher(&urn))
    }

    /// Asks the server whether a resource is a collection. The listing of the
    /// parent is used, so the answer comes from the same response shape for
    /// files and directories.
    pub async fn is_dir(&self, remote_path: &str) -> Result<bool> {
        let urn = Urn::new(remote_path);
        self.require(&urn).await?;
        let parent = Urn::directory(&urn.parent());
        let response = self.execute(Operation::IsDirectory, &parent).await?;
        self.parser
            .parse_is_directory(&response.body, &self.composer.matcher(&urn))
    }

    pub async fn get_property(
        &self,
        remote_path: &str,
        property: &PropertyName,
    ) -> Result<Option<String>> {
        let urn = Urn::new(remote_path);
        self.require(&urn).await?;
        let response = self
            .execute(Operation::GetProperty(property.clone()), &urn)
            .await?;
        self.parser.parse_property(&response.body, property)
    }

    pub async fn set_property(
        &self,
        remote_path: &str,
        property: &PropertyName,
        value: &str,
    ) -> Result<()> {
        let urn = Urn::new(remote_path);
        self.require(&urn).await?;
        self.execute(
            Operation::SetProperty(property.clone(), value.to_string()),
            &urn,
        )
        .await?;
        Ok(())
    }

    // ============================================================================
    // Transfers
    // ============================================================================

    /// Downloads a remote file into `writer`
    pub async fn download_to<W>(
        &self,
        remote_path: &str,
        writer: &mut W,
        progress: Option<ProgressCallback>,
    ) -> Result<()>
    where
        W: AsyncWrite + Send + Unpin,
    {
        let urn = Urn::new(remote_path);
        if self.is_dir(remote_path).await? {
            return Err(WebDavError::invalid_option("remote_path", remote_path));
        }

        let response = self.execute(Operation::Download, &urn).await?;
        writer
            .write_all(&response.body)
            .await
            .map_err(|e| WebDavError::local_io("download buffer", e))?;
        writer
            .flush()
            .await
            .map_err(|e| WebDavError::local_io("download buffer", e))?;

        if let Some(progress) = progress {
            let length = response.body.len() as u64;
            progress(TransferProgress {
                transferred: length,
                total: Some(length),
            });
        }
        Ok(())
    }

    /// Uploads `length` bytes from `reader` to a remote file
    pub async fn upload_from<R>(
        &self,
        reader: R,
        length: u64,
        remote_path: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let urn = Urn::new(remote_path);
        if urn.is_directory() {
            return Err(WebDavError::invalid_option("remote_path", remote_path));
        }
        self.require_parent(&urn).await?;

        let content_type = mime_guess::from_path(urn.filename())
            .first_or_octet_stream()
            .to_string();
        self.put(&urn, Box::new(reader), length, content_type, progress)
            .await
    }

    async fn put(
        &self,
        urn: &Urn,
        reader: crate::storage::LocalReader,
        length: u64,
        content_type: String,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let operation = Operation::Upload {
            length,
            content_type,
        };
        debug!("{} {} ({} bytes)", operation.name(), urn, length);
        let request = self
            .composer
            .compose(&operation, urn)?
            .with_body(RequestBody::Stream { reader, length })
            .with_progress(progress);
        self.send(request, urn).await?;
        Ok(())
    }

    pub async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let urn = Urn::new(remote_path);
        if self.is_dir(remote_path).await? {
            return Err(WebDavError::invalid_option("remote_path", remote_path));
        }
        if self.storage.is_directory(local_path).await {
            return Err(WebDavError::invalid_option(
                "local_path",
                local_path.to_string_lossy(),
            ));
        }

        let label = local_path.to_string_lossy().to_string();
        let request = self
            .composer
            .compose(&Operation::Download, &urn)?
            .with_progress(progress);
        let writer = self.storage.open_write(local_path).await?;
        let request = request.with_target(ResponseTarget::Writer { writer, label });

        if let Err(e) = self.send(request, &urn).await {
            // the writer created or truncated the file before the status was known
            if let Err(cleanup) = self.storage.remove_tree(local_path).await {
                warn!("Failed to remove partial download {}: {}", local_path.display(), cleanup);
            }
            return Err(e);
        }
        debug!("Downloaded {} to {}", urn, local_path.display());
        Ok(())
    }

    pub async fn upload_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        if !self.storage.exists(local_path).await {
            return Err(WebDavError::local_not_found(local_path.to_string_lossy()));
        }
        let urn = Urn::new(remote_path);
        if urn.is_directory() {
            return Err(WebDavError::invalid_option("remote_path", remote_path));
        }
        if self.storage.is_directory(local_path).await {
            return Err(WebDavError::invalid_option(
                "local_path",
                local_path.to_string_lossy(),
            ));
        }
        self.require_parent(&urn).await?;

        let (reader, length) = self.storage.open_read(local_path).await?;
        let content_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();
        self.put(&urn, reader, length, content_type, progress).await?;
        debug!("Uploaded {} to {}", local_path.display(), urn);
        Ok(())
    }

    /// Downloads a file or a whole directory, whichever the server reports
    pub async fn download(
        &self,
        remote_path: &str,
        local_path: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        if self.is_dir(remote_path).await? {
            self.download_directory(remote_path, local_path, progress)
                .await
        } else {
            self.download_file(remote_path, local_path, progress).await
        }
    }

    /// Uploads a file or a whole directory, whichever the local path is
    pub fn upload<'a>(
        &'a self,
        remote_path: &'a str,
        local_path: &'a Path,
        progress: Option<ProgressCallback>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if self.storage.is_directory(local_path).await {
                self.upload_directory(remote_path, local_path, progress)
                    .await
            } else {
                self.upload_file(remote_path, local_path, progress).await
            }
        }
        .boxed()
    }

    pub async fn download_sync(
        &self,
        remote_path: &str,
        local_path: &Path,
        callback: Option<CompletionCallback>,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        self.download(remote_path, local_path, progress).await?;
        if let Some(callback) = callback {
            callback();
        }
        Ok(())
    }

    pub async fn upload_sync(
        &self,
        remote_path: &str,
        local_path: &Path,
        callback: Option<CompletionCallback>,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        self.upload(remote_path, local_path, progress).await?;
        if let Some(callback) = callback {
            callback();
        }
        Ok(())
    }

    /// Runs [`Self::download_sync`] on a spawned task
    pub fn download_async(
        &self,
        remote_path: impl Into<String>,
        local_path: impl Into<PathBuf>,
        callback: Option<CompletionCallback>,
        progress: Option<ProgressCallback>,
    ) -> JoinHandle<Result<()>> {
        let client = self.clone();
        let remote_path = remote_path.into();
        let local_path = local_path.into();
        tokio::spawn(async move {
            client
                .download_sync(&remote_path, &local_path, callback, progress)
                .await
        })
    }

    /// Runs [`Self::upload_sync`] on a spawned task
    pub fn upload_async(
        &self,
        remote_path: impl Into<String>,
        local_path: impl Into<PathBuf>,
        callback: Option<CompletionCallback>,
        progress: Option<ProgressCallback>,
    ) -> JoinHandle<Result<()>> {
        let client = self.clone();
        let remote_path = remote_path.into();
        let local_path = local_path.into();
        tokio::spawn(async move {
            client
                .upload_sync(&remote_path, &local_path, callback, progress)
                .await
        })
    }
}
