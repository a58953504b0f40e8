use std::{num::NonZeroU32, sync::Arc, time::Duration};

use abrdl::{
    error::{AbrError, ErrorKind},
    storage::memory::MemoryStorage,
    AddressResolver, FixedSelector, Representation, RepresentationCatalog, RetryPolicy,
    SegmentFetchLoop, SessionConfig,
};
use reqwest::StatusCode;
use tokio_util::sync::CancellationToken;

use crate::common::{ladder, Behavior, MockTransport};

fn resolver() -> AddressResolver {
    AddressResolver::new(Some("http://localhost:8080".to_string()))
}

fn config(initial_bandwidth_kbps: f64) -> SessionConfig {
    SessionConfig {
        initial_bandwidth_kbps,
        fetch_initialization: false,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_adapts_to_link_speed() -> anyhow::Result<()> {
    let transport = Arc::new(MockTransport::new(10_000.0));
    let storage = MemoryStorage::new();
    let mut session =
        SegmentFetchLoop::new(transport.clone(), storage.clone(), resolver(), config(100.0));

    let summary = session.run(&ladder(), 1, 4).await;
    assert!(summary.is_complete());
    assert_eq!(summary.succeeded, 4);
    assert_eq!(summary.bytes, 4 * 64 * 1024);

    // 100 -> 2080 -> 3664 -> 4931.2
    assert_eq!(
        storage.names(),
        vec!["lo/seg-1.m4s", "mid/seg-2.m4s", "mid/seg-3.m4s", "hi/seg-4.m4s"]
    );
    assert_eq!(
        transport.requested()[0],
        "http://localhost:8080/lo/seg-1.m4s"
    );
    assert!((summary.final_estimate_kbps - 5944.96).abs() < 1e-3);

    Ok(())
}

#[tokio::test]
async fn test_slow_link_stays_on_lowest() {
    let transport = MockTransport::new(200.0);
    let storage = MemoryStorage::new();
    let mut session = SegmentFetchLoop::new(transport, storage.clone(), resolver(), config(5000.0));

    let summary = session.run(&ladder(), 1, 8).await;
    assert_eq!(summary.succeeded, 8);

    let names = storage.names();
    assert_eq!(names[0], "hi/seg-1.m4s");
    assert!(names.last().unwrap().starts_with("lo/"));
    assert!(summary.final_estimate_kbps < 1500.0);
}

#[tokio::test(start_paused = true)]
async fn test_lookahead_persists_in_order() {
    // earlier segments finish last
    let mut transport = MockTransport::new(10_000.0);
    for number in 1..=4u64 {
        transport = transport.on(
            &format!("seg-{number}.m4s"),
            Behavior::Payload {
                size: 4096,
                delay: Duration::from_millis((5 - number) * 50),
            },
        );
    }
    let transport = Arc::new(transport);
    let storage = MemoryStorage::new();
    let config = SessionConfig {
        lookahead: NonZeroU32::new(4).unwrap(),
        ..config(100.0)
    };
    let mut session = SegmentFetchLoop::new(transport.clone(), storage.clone(), resolver(), config);

    let summary = session.run(&ladder(), 1, 4).await;
    assert_eq!(summary.succeeded, 4);

    // all four were dispatched before any completed, so they share the seed estimate
    assert_eq!(
        storage.names(),
        vec!["lo/seg-1.m4s", "lo/seg-2.m4s", "lo/seg-3.m4s", "lo/seg-4.m4s"]
    );
    assert_eq!(transport.requested().len(), 4);
}

#[tokio::test]
async fn test_failures_do_not_stop_session() {
    let transport = MockTransport::new(10_000.0)
        .on(
            "seg-2.m4s",
            Behavior::Fail(|| AbrError::HttpError(StatusCode::INTERNAL_SERVER_ERROR)),
        )
        .on(
            "seg-4.m4s",
            Behavior::Payload {
                size: 40,
                delay: Duration::ZERO,
            },
        );
    let storage = MemoryStorage::new();
    let mut session =
        SegmentFetchLoop::new(transport, storage.clone(), resolver(), config(2000.0));

    let summary = session.run(&ladder(), 1, 5).await;
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 2);
    assert!(!summary.is_complete());

    let failed: Vec<_> = summary.failures.iter().map(|f| (f.number, f.kind)).collect();
    assert_eq!(
        failed,
        vec![(2, ErrorKind::Transport), (4, ErrorKind::Validation)]
    );
    assert!(summary.failures[1].url.ends_with("seg-4.m4s"));
    assert_eq!(storage.len(), 3);
}

#[tokio::test]
async fn test_small_payload_keeps_estimate() {
    let transport = MockTransport::new(10_000.0).on(
        "seg-1.m4s",
        Behavior::Payload {
            size: 50,
            delay: Duration::ZERO,
        },
    );
    let storage = MemoryStorage::new();
    let mut session =
        SegmentFetchLoop::new(transport, storage.clone(), resolver(), config(1234.0));

    let summary = session.run(&ladder(), 1, 1).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.final_estimate_kbps, 1234.0);
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_cancellation() {
    let token = CancellationToken::new();
    let transport = MockTransport::new(10_000.0).on("seg-3.m4s", Behavior::CancelAndHang(token.clone()));
    let storage = MemoryStorage::new();
    let mut session = SegmentFetchLoop::new(transport, storage.clone(), resolver(), config(2000.0))
        .with_cancellation_token(token);

    let summary = session.run(&ladder(), 1, 10).await;
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.cancelled, 1);
    assert_eq!(summary.skipped, 7);
    assert_eq!(summary.failed, 0);
    assert!(!summary.is_complete());
    assert_eq!(storage.len(), 2);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let transport = Arc::new(MockTransport::new(10_000.0));
    let mut session =
        SegmentFetchLoop::new(transport.clone(), MemoryStorage::new(), resolver(), config(2000.0));
    session.cancellation_token().cancel();

    let summary = session.run(&ladder(), 1, 3).await;
    assert_eq!(summary.attempted(), 0);
    assert_eq!(summary.skipped, 3);
    assert!(transport.requested().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retry_transient_failure() {
    let transport = MockTransport::new(10_000.0).on(
        "seg-1.m4s",
        Behavior::FailTimes(2, || AbrError::HttpError(StatusCode::SERVICE_UNAVAILABLE)),
    );
    let transport = Arc::new(transport);
    let config = SessionConfig {
        retry: RetryPolicy {
            retries: 2,
            base_delay: Duration::from_millis(10),
        },
        ..config(2000.0)
    };
    let mut session =
        SegmentFetchLoop::new(transport.clone(), MemoryStorage::new(), resolver(), config);

    let summary = session.run(&ladder(), 1, 1).await;
    assert_eq!(summary.succeeded, 1);
    assert_eq!(transport.requested().len(), 3);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let transport = MockTransport::new(10_000.0).on(
        "seg-1.m4s",
        Behavior::Fail(|| AbrError::HttpError(StatusCode::NOT_FOUND)),
    );
    let transport = Arc::new(transport);
    let config = SessionConfig {
        retry: RetryPolicy {
            retries: 3,
            base_delay: Duration::from_millis(1),
        },
        ..config(2000.0)
    };
    let mut session =
        SegmentFetchLoop::new(transport.clone(), MemoryStorage::new(), resolver(), config);

    let summary = session.run(&ladder(), 1, 1).await;
    assert_eq!(summary.failed, 1);
    assert_eq!(transport.requested().len(), 1);
}

#[tokio::test]
async fn test_initialization_once_per_representation() {
    let template = "$RepresentationID$/seg-$Number$.m4s";
    let catalog = RepresentationCatalog::new(vec![
        Representation::new("lo", 500_000, template).with_initialization("$RepresentationID$/init.mp4"),
        Representation::new("hi", 4_000_000, template).with_initialization("$RepresentationID$/init.mp4"),
    ])
    .unwrap();

    let storage = MemoryStorage::new();
    let config = SessionConfig {
        fetch_initialization: true,
        ..config(100.0)
    };
    let mut session =
        SegmentFetchLoop::new(MockTransport::new(10_000.0), storage.clone(), resolver(), config);

    session.run(&catalog, 1, 4).await;
    // 100 -> 2080 -> 3664 -> 4931.2, the init fetches do not feed the estimator
    assert_eq!(
        storage.names(),
        vec![
            "lo/init.mp4",
            "lo/seg-1.m4s",
            "lo/seg-2.m4s",
            "lo/seg-3.m4s",
            "hi/init.mp4",
            "hi/seg-4.m4s",
        ]
    );
}

#[tokio::test]
async fn test_failed_initialization_is_fetched_again() {
    let template = "$RepresentationID$/seg-$Number$.m4s";
    let catalog = RepresentationCatalog::new(vec![
        Representation::new("lo", 500_000, template).with_initialization("$RepresentationID$/init.mp4"),
        Representation::new("hi", 4_000_000, template).with_initialization("$RepresentationID$/init.mp4"),
    ])
    .unwrap();

    let transport = Arc::new(MockTransport::new(10_000.0).on(
        "lo/init.mp4",
        Behavior::FailTimes(1, || AbrError::HttpError(StatusCode::SERVICE_UNAVAILABLE)),
    ));
    let storage = MemoryStorage::new();
    let config = SessionConfig {
        fetch_initialization: true,
        ..config(100.0)
    };
    let mut session = SegmentFetchLoop::new(transport.clone(), storage.clone(), resolver(), config);

    let summary = session.run(&catalog, 1, 3).await;
    assert_eq!(summary.succeeded, 3);
    assert_eq!(summary.failed, 0);
    assert!(summary.failures.is_empty());
    // 100 -> 2080 -> 3664 -> 4931.2, only media segments feed the estimator
    assert!((summary.final_estimate_kbps - 4931.2).abs() < 1e-3);

    let requested: Vec<_> = transport
        .requested()
        .into_iter()
        .map(|url| url.trim_start_matches("http://localhost:8080/").to_string())
        .collect();
    assert_eq!(
        requested,
        vec![
            "lo/init.mp4",
            "lo/seg-1.m4s",
            "lo/init.mp4",
            "lo/seg-2.m4s",
            "lo/seg-3.m4s",
        ]
    );
    assert_eq!(
        storage.names(),
        vec!["lo/seg-1.m4s", "lo/init.mp4", "lo/seg-2.m4s", "lo/seg-3.m4s"]
    );
}

#[tokio::test]
async fn test_fixed_selector() -> anyhow::Result<()> {
    let catalog = ladder();
    let storage = MemoryStorage::new();
    let mut session = SegmentFetchLoop::new(
        MockTransport::new(100_000.0),
        storage.clone(),
        resolver(),
        config(100_000.0),
    )
    .with_selector(FixedSelector::new(&catalog, "mid")?);

    let summary = session.run(&catalog, 1, 3).await;
    assert_eq!(summary.succeeded, 3);
    assert!(storage.names().iter().all(|name| name.starts_with("mid/")));

    Ok(())
}
