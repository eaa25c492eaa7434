//! `webdav` command-line client
//!
//! Connection settings come from the environment (`WEBDAV_HOSTNAME`,
//! `WEBDAV_LOGIN`, `WEBDAV_PASSWORD`, ... optionally from a `.env` file);
//! the global flags override the matching variables.
//!
//! Usage: webdav ls /documents
//!        webdav push /backup ./photos

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use webdav_client::{
    render_progress, ClientSettings, ProgressCallback, TransferProgress, WebDavClient,
};

#[derive(Parser)]
#[command(name = "webdav")]
#[command(about = "List, transfer, publish and sync files on a WebDAV server", version)]
struct Args {
    /// Root prefix prepended to every remote path
    #[arg(long, global = true)]
    root: Option<String>,

    /// Proxy URL, e.g. http://proxy.local:3128
    #[arg(long, global = true)]
    proxy: Option<String>,

    /// Client certificate (PEM)
    #[arg(long, global = true)]
    cert_path: Option<String>,

    /// Private key for the client certificate (PEM)
    #[arg(long, global = true)]
    key_path: Option<String>,

    /// Log every request
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check the connection, or whether a remote path exists
    Check { path: Option<String> },
    /// Show free space on the server
    Free,
    /// List a remote directory
    Ls { path: Option<String> },
    /// Show properties of a remote resource
    Info { path: String },
    /// Delete a remote resource
    Clean { path: String },
    /// Create a remote directory
    Mkdir { path: String },
    /// Copy a remote resource
    Copy { from: String, to: String },
    /// Move a remote resource
    Move { from: String, to: String },
    /// Download a file or directory
    Download { remote: String, local: PathBuf },
    /// Upload a file or directory
    Upload { remote: String, local: PathBuf },
    /// Make a resource public and print its link
    Publish { path: String },
    /// Revoke a public link
    Unpublish { path: String },
    /// Upload local entries missing on the server
    Push { remote: String, local: PathBuf },
    /// Download remote entries missing locally
    Pull { remote: String, local: PathBuf },
    /// Pull, then push
    Sync { remote: String, local: PathBuf },
}

fn progress_bar() -> ProgressCallback {
    Arc::new(|progress: TransferProgress| {
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "\r{}", render_progress(progress.transferred, progress.total, 80));
        let _ = stderr.flush();
    })
}

fn settings_from(args: &Args) -> Result<ClientSettings> {
    let mut settings = ClientSettings::from_env().context("Failed to read WebDAV settings")?;

    if let Some(root) = &args.root {
        settings.webdav.set_root(root);
    }
    if let Some(proxy) = &args.proxy {
        settings.proxy.hostname = proxy.clone();
    }
    if let Some(cert_path) = &args.cert_path {
        settings.webdav.cert_path = cert_path.clone();
    }
    if let Some(key_path) = &args.key_path {
        settings.webdav.key_path = key_path.clone();
    }
    settings.webdav.verbose |= args.verbose;

    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = settings_from(&args)?;

    // Initialize logging
    let default_level = if settings.webdav.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let client = WebDavClient::new(settings)?;

    match args.command {
        Command::Check { path } => {
            let path = path.unwrap_or_else(|| "/".to_string());
            if client.check(&path).await? {
                println!("{} exists", path);
            } else {
                println!("{} not found", path);
                std::process::exit(1);
            }
        }
        Command::Free => {
            println!("{}", client.free().await?);
        }
        Command::Ls { path } => {
            for name in client.list(path.as_deref().unwrap_or("/")).await? {
                println!("{}", name);
            }
        }
        Command::Info { path } => {
            let info = client.info(&path).await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Clean { path } => {
            client.clean(&path).await?;
            info!("🗑️ Deleted {}", path);
        }
        Command::Mkdir { path } => {
            client.mkdir(&path).await?;
            info!("📁 Created {}", path);
        }
        Command::Copy { from, to } => {
            client.copy(&from, &to).await?;
            info!("Copied {} to {}", from, to);
        }
        Command::Move { from, to } => {
            client.move_resource(&from, &to).await?;
            info!("Moved {} to {}", from, to);
        }
        Command::Download { remote, local } => {
            client.download(&remote, &local, Some(progress_bar())).await?;
            eprintln!();
            info!("⬇️ Downloaded {} to {}", remote, local.display());
        }
        Command::Upload { remote, local } => {
            client.upload(&remote, &local, Some(progress_bar())).await?;
            eprintln!();
            info!("⬆️ Uploaded {} to {}", local.display(), remote);
        }
        Command::Publish { path } => {
            println!("{}", client.publish(&path).await?);
        }
        Command::Unpublish { path } => {
            client.unpublish(&path).await?;
            info!("Unpublished {}", path);
        }
        Command::Push { remote, local } => {
            client.push(&remote, &local).await?;
            info!("✅ Pushed {} to {}", local.display(), remote);
        }
        Command::Pull { remote, local } => {
            client.pull(&remote, &local).await?;
            info!("✅ Pulled {} to {}", remote, local.display());
        }
        Command::Sync { remote, local } => {
            client.sync(&remote, &local).await?;
        }
    }

    Ok(())
}
