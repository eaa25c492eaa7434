use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;

use super::client::{CompletionCallback, WebDavClient};
use super::request::ProgressCallback;
use crate::error::Result;
use crate::models::{PropertyName, ResourceInfo, Urn};

/// A client bound to one remote path
///
/// `rename` and `move_to` rebind the handle to the new path once the server
/// has accepted the MOVE.
#[derive(Clone)]
pub struct Resource {
    client: WebDavClient,
    urn: Urn,
}

impl Resource {
    pub(crate) fn new(client: WebDavClient, urn: Urn) -> Self {
        Self { client, urn }
    }

    pub fn urn(&self) -> &Urn {
        &self.urn
    }

    pub fn path(&self) -> String {
        self.urn.path()
    }

    pub async fn is_dir(&self) -> Result<bool> {
        self.client.is_dir(&self.path()).await
    }

    pub async fn check(&self) -> Result<bool> {
        self.client.check(&self.path()).await
    }

    pub async fn clean(&self) -> Result<()> {
        self.client.clean(&self.path()).await
    }

    /// Moves the resource to `new_name` inside the same parent directory;
    /// only the last segment of `new_name` is used
    pub async fn rename(&mut self, new_name: &str) -> Result<()> {
        let target = format!("{}{}", self.urn.parent(), Urn::new(new_name).filename());
        self.move_to(&target).await
    }

    pub async fn move_to(&mut self, remote_path: &str) -> Result<()> {
        self.client.move_resource(&self.path(), remote_path).await?;
        self.urn = Urn::new(remote_path);
        Ok(())
    }

    pub async fn copy_to(&self, remote_path: &str) -> Result<Resource> {
        self.client.copy(&self.path(), remote_path).await?;
        Ok(self.client.resource(remote_path))
    }

    /// Resource properties, optionally restricted to some of
    /// [`ResourceInfo::KEYS`]
    pub async fn info(&self, filter: Option<&[&str]>) -> Result<ResourceInfo> {
        let info = self.client.info(&self.path()).await?;
        Ok(match filter {
            Some(keys) => info.filtered(keys),
            None => info,
        })
    }

    /// Uploads `length` bytes from `reader` into this resource
    pub async fn read_from<R>(&self, reader: R, length: u64) -> Result<()>
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.client
            .upload_from(reader, length, &self.path(), None)
            .await
    }

    /// Uploads a local file or directory into this resource
    pub async fn read(&self, local_path: &Path) -> Result<()> {
        self.client.upload_sync(&self.path(), local_path, None, None).await
    }

    pub fn read_async(
        &self,
        local_path: &Path,
        callback: Option<CompletionCallback>,
        progress: Option<ProgressCallback>,
    ) -> JoinHandle<Result<()>> {
        self.client
            .upload_async(self.path(), local_path, callback, progress)
    }

    /// Downloads this resource into `writer`
    pub async fn write_to<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Send + Unpin,
    {
        self.client.download_to(&self.path(), writer, None).await
    }

    /// Downloads this resource to a local file or directory
    pub async fn write(&self, local_path: &Path) -> Result<()> {
        self.client
            .download_sync(&self.path(), local_path, None, None)
            .await
    }

    pub fn write_async(
        &self,
        local_path: &Path,
        callback: Option<CompletionCallback>,
        progress: Option<ProgressCallback>,
    ) -> JoinHandle<Result<()>> {
        self.client
            .download_async(self.path(), local_path, callback, progress)
    }

    pub async fn publish(&self) -> Result<String> {
        self.client.publish(&self.path()).await
    }

    pub async fn unpublish(&self) -> Result<()> {
        self.client.unpublish(&self.path()).await
    }

    pub async fn get_property(&self, property: &PropertyName) -> Result<Option<String>> {
        self.client.get_property(&self.path(), property).await
    }

    pub async fn set_property(&self, property: &PropertyName, value: &str) -> Result<()> {
        self.client.set_property(&self.path(), property, value).await
    }
}
