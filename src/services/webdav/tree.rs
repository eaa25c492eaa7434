//! Recursive directory operations
//!
//! Two families with very different semantics:
//!
//! - `push` / `pull` / `sync` merge additively: an entry already present on
//!   the destination side is skipped, never overwritten or compared.
//! - `upload_directory` / `download_directory` mirror destructively: the
//!   destination directory is deleted and rebuilt from the source.
//!
//! Each recursive call descends exactly one level. The first failure aborts
//! the whole walk and is returned unchanged.

use std::collections::BTreeSet;
use std::path::Path;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::{debug, info};

use super::client::WebDavClient;
use super::request::ProgressCallback;
use crate::error::{Result, WebDavError};
use crate::models::{Urn, SEPARATOR};

/// Entry names are compared with directories carrying a trailing separator;
/// some servers drop it, so a directory also counts as present under its
/// bare name
fn contains_directory(entries: &BTreeSet<String>, name: &str) -> bool {
    entries.contains(name) || entries.contains(name.trim_end_matches(SEPARATOR))
}

fn local_child(local_directory: &Path, name: &str) -> std::path::PathBuf {
    local_directory.join(name.trim_end_matches(SEPARATOR))
}

impl WebDavClient {
    /// Verifies both roots of a tree walk
    async fn check_tree_roots(&self, remote_directory: &str, local_directory: &Path) -> Result<()> {
        if !self.is_dir(remote_directory).await? {
            return Err(WebDavError::invalid_option("remote_path", remote_directory));
        }
        if !self.storage.exists(local_directory).await {
            return Err(WebDavError::local_not_found(local_directory.to_string_lossy()));
        }
        if !self.storage.is_directory(local_directory).await {
            return Err(WebDavError::invalid_option(
                "local_path",
                local_directory.to_string_lossy(),
            ));
        }
        Ok(())
    }

    /// Uploads every local entry missing on the server
    pub fn push<'a>(
        &'a self,
        remote_directory: &'a str,
        local_directory: &'a Path,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            self.check_tree_roots(remote_directory, local_directory).await?;
            let remote = Urn::directory(remote_directory);

            let remote_entries: BTreeSet<String> =
                self.list(&remote.path()).await?.into_iter().collect();

            for name in self.storage.list_entries(local_directory).await? {
                let local_path = local_child(local_directory, &name);
                let remote_path = format!("{}{}", remote.path(), name);

                if name.ends_with(SEPARATOR) {
                    if !contains_directory(&remote_entries, &name) {
                        debug!("push: creating remote directory {}", remote_path);
                        self.mkdir(&remote_path).await?;
                    }
                    self.push(&remote_path, &local_path).await?;
                } else if remote_entries.contains(&name) {
                    debug!("push: {} exists remotely, skipping", remote_path);
                } else {
                    debug!("push: uploading {}", remote_path);
                    self.upload_file(&remote_path, &local_path, None).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// Downloads every remote entry missing locally
    pub fn pull<'a>(
        &'a self,
        remote_directory: &'a str,
        local_directory: &'a Path,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            self.check_tree_roots(remote_directory, local_directory).await?;
            let remote = Urn::directory(remote_directory);

            let local_entries: BTreeSet<String> = self
                .storage
                .list_entries(local_directory)
                .await?
                .into_iter()
                .collect();

            for name in self.list(&remote.path()).await? {
                let local_path = local_child(local_directory, &name);
                let remote_path = format!("{}{}", remote.path(), name);

                if name.ends_with(SEPARATOR) {
                    if !local_entries.contains(&name) {
                        debug!("pull: creating local directory {}", local_path.display());
                        self.storage.make_directory(&local_path).await?;
                    }
                    self.pull(&remote_path, &local_path).await?;
                } else if local_entries.contains(&name) {
                    debug!("pull: {} exists locally, skipping", local_path.display());
                } else {
                    debug!("pull: downloading {}", remote_path);
                    self.download_file(&remote_path, &local_path, None).await?;
                }
            }
            Ok(())
        }
        .boxed()
    }

    /// `pull` followed by `push`; not atomic
    pub async fn sync(&self, remote_directory: &str, local_directory: &Path) -> Result<()> {
        info!("Syncing {} with {}", remote_directory, local_directory.display());
        self.pull(remote_directory, local_directory).await?;
        self.push(remote_directory, local_directory).await?;
        info!("Sync of {} finished", remote_directory);
        Ok(())
    }

    /// Replaces the remote directory with a copy of the local one
    pub async fn upload_directory(
        &self,
        remote_path: &str,
        local_path: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<()> {
        let remote = Urn::directory(remote_path);
        if !self.storage.exists(local_path).await {
            return Err(WebDavError::local_not_found(local_path.to_string_lossy()));
        }
        if !self.storage.is_directory(local_path).await {
            return Err(WebDavError::invalid_option("local_path", local_path.to_string_lossy()));
        }

        if self.check(&remote.path()).await? {
            debug!("upload_directory: replacing existing {}", remote);
            self.clean(&remote.path()).await?;
        }
        self.mkdir(&remote.path()).await?;

        for name in self.storage.list_entries(local_path).await? {
            let remote_child = format!("{}{}", remote.path(), name);
            let local_path = local_child(local_path, &name);
            self.upload(&remote_child, &local_path, progress.clone())
                .await?;
        }
        Ok(())
    }

    /// Replaces the local directory with a copy of the remote one
    pub fn download_directory<'a>(
        &'a self,
        remote_path: &'a str,
        local_path: &'a Path,
        progress: Option<ProgressCallback>,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if !self.is_dir(remote_path).await? {
                return Err(WebDavError::invalid_option("remote_path", remote_path));
            }
            let remote = Urn::directory(remote_path);

            if self.storage.exists(local_path).await {
                debug!("download_directory: replacing existing {}", local_path.display());
                self.storage.remove_tree(local_path).await?;
            }
            self.storage.make_directory(local_path).await?;

            for name in self.list(&remote.path()).await? {
                let remote_child = format!("{}{}", remote.path(), name);
                let local_path = local_child(local_path, &name);
                if name.ends_with(SEPARATOR) {
                    self.download_directory(&remote_child, &local_path, progress.clone())
                        .await?;
                } else {
                    self.download_file(&remote_child, &local_path, progress.clone())
                        .await?;
                }
            }
            Ok(())
        }
        .boxed()
    }
}
