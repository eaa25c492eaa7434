/*!
 * Integration Tests for single-resource client operations
 *
 * Drives `WebDavClient` and `Resource` against the in-memory DAV server, so
 * preconditions, request ordering and parsed results can be checked without
 * a network.
 */

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tempfile::TempDir;

use webdav_client::test_helpers::{
    memory_client, test_settings, MemoryDavServer, PUBLIC_LINK_PREFIX,
};
use webdav_client::{
    CheckStrategy, ClientSettings, ProgressCallback, PropertyName, ResourceInfo, TransferProgress,
    WebDavClient, WebDavError,
};

fn setup_with(settings: ClientSettings) -> (Arc<MemoryDavServer>, WebDavClient) {
    let server = Arc::new(MemoryDavServer::new());
    server.add_file("/docs/a.txt", b"hello");
    server.add_directory("/docs/sub");
    let client = memory_client(Arc::clone(&server), settings).unwrap();
    server.clear_calls();
    (server, client)
}

fn setup() -> (Arc<MemoryDavServer>, WebDavClient) {
    setup_with(test_settings())
}

fn color() -> PropertyName {
    PropertyName::new("urn:example:meta", "color")
}

#[tokio::test]
async fn test_list_returns_children_only() {
    let (_server, client) = setup();

    assert_eq!(client.list("/docs").await.unwrap(), vec!["a.txt", "sub/"]);
    assert_eq!(client.list("/").await.unwrap(), vec!["docs/"]);
    assert!(client.list("/docs/sub/").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_missing_directory() {
    let (_server, client) = setup();

    let result = client.list("/nowhere").await;
    assert!(matches!(result, Err(WebDavError::RemoteResourceNotFound { .. })));
}

#[tokio::test]
async fn test_check_with_both_strategies() {
    let (_server, client) = setup();
    assert!(client.check("/docs/a.txt").await.unwrap());
    assert!(client.check("/docs/sub/").await.unwrap());
    assert!(!client.check("/docs/missing.txt").await.unwrap());

    let mut settings = test_settings();
    settings.check_strategy = CheckStrategy::Head;
    let (server, client) = setup_with(settings);
    assert!(client.check("/docs/a.txt").await.unwrap());
    assert!(!client.check("/docs/missing.txt").await.unwrap());
    assert!(server.calls().iter().all(|(method, _)| method == "HEAD"));
}

#[tokio::test]
async fn test_free_reads_quota() {
    let (server, client) = setup();
    server.set_quota(Some(4096));
    assert_eq!(client.free().await.unwrap(), 4096);

    server.set_quota(None);
    let result = client.free().await;
    assert!(matches!(result, Err(WebDavError::MethodNotSupported { ref name, .. }) if name == "free"));
}

#[tokio::test]
async fn test_mkdir_requires_parent() {
    let (server, client) = setup();

    client.mkdir("/docs/new").await.unwrap();
    assert!(server.is_directory("/docs/new"));
    assert_eq!(
        server.mutating_calls(),
        vec![("MKCOL".to_string(), "/docs/new/".to_string())]
    );

    let orphan = client.mkdir("/missing/new").await;
    assert!(matches!(orphan, Err(WebDavError::RemoteParentNotFound { .. })));
    assert!(!server.exists("/missing/new"));
}

#[tokio::test]
async fn test_info_of_file() {
    let (_server, client) = setup();

    let info = client.info("/docs/a.txt").await.unwrap();
    assert_eq!(
        info,
        ResourceInfo {
            created: Some("2024-03-01T10:00:00Z".to_string()),
            name: Some("a.txt".to_string()),
            size: Some("5".to_string()),
            modified: Some("Fri, 01 Mar 2024 10:00:00 GMT".to_string()),
        }
    );

    let missing = client.info("/docs/missing.txt").await;
    assert!(matches!(missing, Err(WebDavError::RemoteResourceNotFound { .. })));
}

#[tokio::test]
async fn test_is_dir() {
    let (_server, client) = setup();

    assert!(client.is_dir("/docs/sub").await.unwrap());
    assert!(client.is_dir("/docs/sub/").await.unwrap());
    assert!(!client.is_dir("/docs/a.txt").await.unwrap());
}

#[tokio::test]
async fn test_is_dir_without_resource_type() {
    let (server, client) = setup();
    server.omit_resource_type();

    let result = client.is_dir("/docs/a.txt").await;
    assert!(matches!(result, Err(WebDavError::MethodNotSupported { ref name, .. }) if name == "is_dir"));
}

#[tokio::test]
async fn test_copy_move_and_clean() {
    let (server, client) = setup();

    client.copy("/docs/a.txt", "/docs/sub/copy.txt").await.unwrap();
    assert_eq!(server.file("/docs/sub/copy.txt").unwrap(), b"hello");
    assert!(server.exists("/docs/a.txt"));

    client.move_resource("/docs/a.txt", "/docs/moved.txt").await.unwrap();
    assert!(!server.exists("/docs/a.txt"));
    assert_eq!(server.file("/docs/moved.txt").unwrap(), b"hello");

    client.clean("/docs/sub").await.unwrap();
    assert!(!server.exists("/docs/sub"));
    assert!(!server.exists("/docs/sub/copy.txt"));
}

#[tokio::test]
async fn test_copy_and_move_preconditions() {
    let (server, client) = setup();

    let missing_source = client.copy("/docs/ghost.txt", "/docs/b.txt").await;
    assert!(matches!(missing_source, Err(WebDavError::RemoteResourceNotFound { .. })));

    let missing_parent = client.move_resource("/docs/a.txt", "/elsewhere/a.txt").await;
    assert!(matches!(missing_parent, Err(WebDavError::RemoteParentNotFound { .. })));

    assert!(server.mutating_calls().is_empty());
}

#[tokio::test]
async fn test_publish_and_unpublish_with_vendor_namespace() {
    let mut settings = test_settings();
    settings.vendor_namespace = Some("urn:example:disk".to_string());
    let (server, client) = setup_with(settings);

    let link = client.publish("/docs/a.txt").await.unwrap();
    assert_eq!(link, format!("{}/docs/a.txt", PUBLIC_LINK_PREFIX));
    assert_eq!(
        server.property("/docs/a.txt", "urn:example:disk", "public_url"),
        Some(link)
    );

    client.unpublish("/docs/a.txt").await.unwrap();
    assert_eq!(server.property("/docs/a.txt", "urn:example:disk", "public_url"), None);
}

#[tokio::test]
async fn test_publish_without_known_namespace() {
    let (_server, client) = setup();

    let link = client.publish("/docs/sub").await.unwrap();
    assert_eq!(link, format!("{}/docs/sub", PUBLIC_LINK_PREFIX));

    let missing = client.publish("/docs/ghost.txt").await;
    assert!(matches!(missing, Err(WebDavError::RemoteResourceNotFound { .. })));
}

#[tokio::test]
async fn test_custom_properties() {
    let (server, client) = setup();

    assert_eq!(client.get_property("/docs/a.txt", &color()).await.unwrap(), None);

    client.set_property("/docs/a.txt", &color(), "blue").await.unwrap();
    assert_eq!(
        server.property("/docs/a.txt", "urn:example:meta", "color"),
        Some("blue".to_string())
    );
    assert_eq!(
        client.get_property("/docs/a.txt", &color()).await.unwrap(),
        Some("blue".to_string())
    );

    let invalid = client
        .set_property("/docs/a.txt", &PropertyName::new("urn:example:meta", "bad name"), "x")
        .await;
    assert!(matches!(invalid, Err(WebDavError::InvalidOption { .. })));
}

#[tokio::test]
async fn test_stream_transfers() {
    let (server, client) = setup();

    client
        .upload_from(Cursor::new(b"streamed".to_vec()), 8, "/docs/stream.txt", None)
        .await
        .unwrap();
    assert_eq!(server.file("/docs/stream.txt").unwrap(), b"streamed");

    let mut buffer: Vec<u8> = Vec::new();
    client
        .download_to("/docs/a.txt", &mut buffer, None)
        .await
        .unwrap();
    assert_eq!(buffer, b"hello");

    let into_directory = client
        .upload_from(Cursor::new(Vec::new()), 0, "/docs/sub/", None)
        .await;
    assert!(matches!(into_directory, Err(WebDavError::InvalidOption { .. })));
}

#[tokio::test]
async fn test_file_transfers_report_progress() {
    let (server, client) = setup();
    let local = TempDir::new().unwrap();
    let source = local.path().join("report.txt");
    std::fs::write(&source, "quarterly numbers").unwrap();

    let seen = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&seen);
    let progress: ProgressCallback = Arc::new(move |p: TransferProgress| {
        counter.store(p.transferred, Ordering::SeqCst);
    });

    client
        .upload_file("/docs/report.txt", &source, Some(progress.clone()))
        .await
        .unwrap();
    assert_eq!(server.file("/docs/report.txt").unwrap(), b"quarterly numbers");
    assert_eq!(seen.load(Ordering::SeqCst), 17);

    let target = local.path().join("a.txt");
    seen.store(0, Ordering::SeqCst);
    client
        .download("/docs/a.txt", &target, Some(progress))
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&target).unwrap(), "hello");
    assert_eq!(seen.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_file_transfer_preconditions() {
    let (server, client) = setup();
    let local = TempDir::new().unwrap();

    let missing_local = client
        .upload_file("/docs/x.txt", &local.path().join("absent.txt"), None)
        .await;
    assert!(matches!(missing_local, Err(WebDavError::LocalResourceNotFound { .. })));

    let file = local.path().join("x.txt");
    std::fs::write(&file, "x").unwrap();
    let to_directory = client.upload_file("/docs/sub/", &file, None).await;
    assert!(matches!(
        to_directory,
        Err(WebDavError::InvalidOption { ref name, .. }) if name == "remote_path"
    ));

    let no_parent = client.upload_file("/nowhere/x.txt", &file, None).await;
    assert!(matches!(no_parent, Err(WebDavError::RemoteParentNotFound { .. })));

    let into_local_directory = client.download_file("/docs/a.txt", local.path(), None).await;
    assert!(matches!(
        into_local_directory,
        Err(WebDavError::InvalidOption { ref name, .. }) if name == "local_path"
    ));

    let missing_remote = client
        .download_file("/docs/ghost.txt", &local.path().join("ghost.txt"), None)
        .await;
    assert!(matches!(missing_remote, Err(WebDavError::RemoteResourceNotFound { .. })));

    let collection = client
        .download_file("/docs/sub", &local.path().join("sub.bin"), None)
        .await;
    assert!(matches!(
        collection,
        Err(WebDavError::InvalidOption { ref name, .. }) if name == "remote_path"
    ));
    assert!(!local.path().join("sub.bin").exists());

    let mut buffer: Vec<u8> = Vec::new();
    let collection_to_buffer = client.download_to("/docs/sub", &mut buffer, None).await;
    assert!(matches!(
        collection_to_buffer,
        Err(WebDavError::InvalidOption { ref name, .. }) if name == "remote_path"
    ));

    assert!(server
        .mutating_calls()
        .iter()
        .all(|(method, _)| method != "PUT" && method != "GET"));
}

#[tokio::test]
async fn test_failed_download_leaves_no_local_file() {
    let (server, client) = setup();
    server.fail_downloads_with(503);
    let local = TempDir::new().unwrap();
    let target = local.path().join("a.txt");

    let result = client.download_file("/docs/a.txt", &target, None).await;

    assert!(matches!(result, Err(WebDavError::UnexpectedStatus { status: 503, .. })));
    assert!(!target.exists());
}

#[tokio::test]
async fn test_upload_async_runs_callback() {
    let (server, client) = setup();
    let local = TempDir::new().unwrap();
    let file = local.path().join("async.txt");
    std::fs::write(&file, "spawned").unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    client
        .upload_async(
            "/docs/async.txt",
            file,
            Some(Box::new(move || flag.store(true, Ordering::SeqCst))),
            None,
        )
        .await
        .unwrap()
        .unwrap();

    assert!(done.load(Ordering::SeqCst));
    assert_eq!(server.file("/docs/async.txt").unwrap(), b"spawned");
}

#[tokio::test]
async fn test_failed_transfer_skips_callback() {
    let (server, client) = setup();
    server.fail_uploads_with(507);
    let local = TempDir::new().unwrap();
    let file = local.path().join("big.bin");
    std::fs::write(&file, vec![0u8; 64]).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    let result = client
        .upload_sync(
            "/docs/big.bin",
            &file,
            Some(Box::new(move || flag.store(true, Ordering::SeqCst))),
            None,
        )
        .await;

    assert!(matches!(result, Err(WebDavError::NotEnoughSpace)));
    assert!(!done.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_resource_handle() {
    let (server, client) = setup();

    let mut resource = client.resource("/docs/a.txt");
    assert!(resource.check().await.unwrap());
    assert!(!resource.is_dir().await.unwrap());

    resource.rename("renamed.txt").await.unwrap();
    assert_eq!(resource.path(), "/docs/renamed.txt");
    assert_eq!(server.file("/docs/renamed.txt").unwrap(), b"hello");

    let copy = resource.copy_to("/docs/sub/copy.txt").await.unwrap();
    assert_eq!(copy.path(), "/docs/sub/copy.txt");
    assert!(server.exists("/docs/renamed.txt"));

    let info = copy.info(Some(&["name", "size"])).await.unwrap();
    assert_eq!(info.name.as_deref(), Some("copy.txt"));
    assert_eq!(info.size.as_deref(), Some("5"));
    assert!(info.created.is_none());
    assert!(info.modified.is_none());

    copy.set_property(&color(), "green").await.unwrap();
    assert_eq!(copy.get_property(&color()).await.unwrap().as_deref(), Some("green"));

    let mut buffer: Vec<u8> = Vec::new();
    copy.write_to(&mut buffer).await.unwrap();
    assert_eq!(buffer, b"hello");

    let fresh = client.resource("/docs/fresh.txt");
    fresh.read_from(Cursor::new(b"new".to_vec()), 3).await.unwrap();
    assert_eq!(server.file("/docs/fresh.txt").unwrap(), b"new");

    copy.clean().await.unwrap();
    assert!(!copy.check().await.unwrap());
}

#[tokio::test]
async fn test_root_prefix_is_applied_to_every_request() {
    let server = Arc::new(MemoryDavServer::new().with_root("/remote.php/webdav"));
    server.add_file("/notes/today.md", b"# today");
    let client = memory_client(
        Arc::clone(&server),
        test_settings().with_root("remote.php/webdav"),
    )
    .unwrap();

    assert_eq!(client.list("/notes").await.unwrap(), vec!["today.md"]);
    client.move_resource("/notes/today.md", "/notes/yesterday.md").await.unwrap();
    assert_eq!(server.file("/notes/yesterday.md").unwrap(), b"# today");
    assert!(client.is_dir("/notes").await.unwrap());
}

#[tokio::test]
async fn test_rename_stays_in_parent_directory() {
    let (server, client) = setup();

    let mut resource = client.resource("/docs/a.txt");
    resource.rename("other/x.txt").await.unwrap();

    assert_eq!(resource.path(), "/docs/x.txt");
    assert_eq!(server.file("/docs/x.txt").unwrap(), b"hello");
    assert!(!server.exists("/docs/other"));
}
