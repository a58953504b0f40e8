use abrdl::{
    error::{AbrError, ErrorKind},
    load_catalog,
    storage::{file::FileStorage, memory::MemoryStorage},
    AddressResolver, HttpClient, HttpTransport, ManifestLocation, SegmentFetchLoop,
    SessionConfig,
};
use wiremock::{
    matchers::{method, path, path_regex},
    Mock, MockServer, ResponseTemplate,
};

use crate::{common::MPD, AssertWrapper};

async fn dash_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dash/manifest.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MPD))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/dash/(lo|mid|hi)/(init\.mp4|seg-\d+\.m4s)$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 16 * 1024]))
        .mount(&server)
        .await;

    server
}

fn manifest_location(server: &MockServer) -> ManifestLocation {
    ManifestLocation::parse(&format!("{}/dash/manifest.mpd", server.uri())).assert_success()
}

#[tokio::test]
async fn test_download_to_directory() -> anyhow::Result<()> {
    let server = dash_server().await;
    let location = manifest_location(&server);
    let client = HttpClient::default();

    let catalog = load_catalog(&client, &location, 0, 0).await?;
    assert_eq!(catalog.len(), 3);
    assert_eq!(catalog.segment_count(), Some(6));

    let output = tempfile::tempdir()?;
    let resolver = AddressResolver::from_manifest_url(location.url().unwrap());
    let mut session = SegmentFetchLoop::new(
        HttpTransport::new(client),
        FileStorage::new(output.path().to_path_buf()),
        resolver,
        SessionConfig::default(),
    );

    let summary = session.run_catalog(&catalog).await;
    assert!(summary.is_complete());
    assert_eq!(summary.succeeded, 6);
    assert_eq!(summary.bytes, 6 * 16 * 1024);

    let mut saved = 0;
    for entry in std::fs::read_dir(output.path())? {
        let dir = entry?.path();
        assert!(dir.join("init.mp4").is_file());
        saved += std::fs::read_dir(&dir)?.count() - 1;
    }
    assert_eq!(saved, 6);

    Ok(())
}

#[tokio::test]
async fn test_error_responses_are_recorded() -> anyhow::Result<()> {
    let server = dash_server().await;
    Mock::given(method("GET"))
        .and(path_regex(r"/seg-2\.m4s$"))
        .respond_with(ResponseTemplate::new(404))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"/seg-3\.m4s$"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not found</html>"))
        .with_priority(1)
        .mount(&server)
        .await;

    let location = manifest_location(&server);
    let client = HttpClient::default();
    let catalog = load_catalog(&client, &location, 0, 0).await?;

    let storage = MemoryStorage::new();
    let config = SessionConfig {
        segment_count: Some(4),
        fetch_initialization: false,
        ..Default::default()
    };
    let mut session = SegmentFetchLoop::new(
        HttpTransport::new(client),
        storage.clone(),
        AddressResolver::from_manifest_url(location.url().unwrap()),
        config,
    );

    let summary = session.run_catalog(&catalog).await;
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed, 2);
    assert_eq!(summary.failures[0].number, 2);
    assert_eq!(summary.failures[0].kind, ErrorKind::Transport);
    assert!(summary.failures[0].reason.contains("404"));
    assert_eq!(summary.failures[1].number, 3);
    assert_eq!(summary.failures[1].kind, ErrorKind::Validation);
    assert_eq!(storage.len(), 2);

    Ok(())
}

#[tokio::test]
async fn test_manifest_errors() {
    let server = dash_server().await;
    Mock::given(method("GET"))
        .and(path("/dash/broken.mpd"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<MPD><Period>"))
        .mount(&server)
        .await;
    let client = HttpClient::default();

    let missing = ManifestLocation::parse(&format!("{}/dash/missing.mpd", server.uri())).assert_success();
    let result = load_catalog(&client, &missing, 0, 0).await;
    assert!(matches!(result, Err(AbrError::ManifestFetch(_))));

    let broken = ManifestLocation::parse(&format!("{}/dash/broken.mpd", server.uri())).assert_success();
    let error = load_catalog(&client, &broken, 0, 0).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Parse);
    assert!(error.is_fatal());

    let location = manifest_location(&server);
    load_catalog(&client, &location, 1, 0).await.assert_error();
    load_catalog(&client, &location, 0, 3).await.assert_error();
}

#[tokio::test]
async fn test_local_manifest() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let manifest = dir.path().join("manifest.mpd");
    tokio::fs::write(&manifest, crate::common::MPD).await?;

    let location = ManifestLocation::parse(manifest.to_str().unwrap())?;
    assert_eq!(location.url(), None);

    let catalog = load_catalog(&HttpClient::default(), &location, 0, 0).await?;
    let ids: Vec<_> = catalog.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["lo", "mid", "hi"]);
    assert_eq!(catalog.first().initialization.as_deref(), Some("$RepresentationID$/init.mp4"));

    Ok(())
}
