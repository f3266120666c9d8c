//! Scheduler timers, jitter and lifecycle.

mod common;

use std::sync::Arc;
use std::time::Duration;

use photo_bot::Error;
use photo_bot::delivery::{MediaMessage, SCHEDULED_CAPTION_PREFIX};
use photo_bot::index::INDEX_FILE_NAME;
use photo_bot::random::thread_random;
use photo_bot::scheduler::TimerState;
use photo_bot::services::ServiceContainer;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::{
    AUTHORIZED_CHAT, CountingRandom, FixedRandom, RecordingTransport, Sent, eventually, example_tree, test_config,
};

fn delivered_at(sent: &[Sent]) -> Vec<(String, tokio::time::Instant)> {
    sent.iter()
        .filter_map(|s| match s {
            Sent::Media { caption, at, .. } => Some((caption.clone(), *at)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_zero_jitter_delivers_immediately() {
    let dir = TempDir::new().unwrap();
    example_tree(dir.path());
    let transport = RecordingTransport::new();
    let container = ServiceContainer::with_transport(
        test_config(dir.path(), &[("CRON_SPEC", "0 9 * * *")]),
        transport.clone(),
        Arc::new(FixedRandom(7_500)),
    )
    .unwrap();
    container.index.rebuild().unwrap();

    let started = tokio::time::Instant::now();
    let fired = container
        .scheduler
        .fire_delivery(&CancellationToken::new())
        .await
        .unwrap();
    assert!(fired);

    let sent = transport.sent();
    match sent.as_slice() {
        [Sent::Media {
            chat_id,
            caption,
            reply_to,
            at,
            ..
        }] => {
            assert_eq!(chat_id, AUTHORIZED_CHAT);
            assert_eq!(caption, &format!("{SCHEDULED_CAPTION_PREFIX}b/c.png"));
            assert_eq!(*reply_to, None);
            assert_eq!(at.duration_since(started), Duration::ZERO);
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_jitter_delay_matches_draw() {
    let dir = TempDir::new().unwrap();
    example_tree(dir.path());
    let transport = RecordingTransport::new();
    let container = ServiceContainer::with_transport(
        test_config(
            dir.path(),
            &[("CRON_SPEC", "0 9 * * *"), ("CRON_JITTER_SEC", "10")],
        ),
        transport.clone(),
        Arc::new(FixedRandom(7_500)),
    )
    .unwrap();
    container.index.rebuild().unwrap();

    let started = tokio::time::Instant::now();
    assert!(
        container
            .scheduler
            .fire_delivery(&CancellationToken::new())
            .await
            .unwrap()
    );

    let delivered = delivered_at(&transport.sent());
    assert_eq!(delivered.len(), 1);
    assert_eq!(
        delivered[0].1.duration_since(started),
        Duration::from_millis(7_500)
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_jitter_abandons_delivery() {
    let dir = TempDir::new().unwrap();
    example_tree(dir.path());
    let transport = RecordingTransport::new();
    let container = ServiceContainer::with_transport(
        test_config(
            dir.path(),
            &[("CRON_SPEC", "0 9 * * *"), ("CRON_JITTER_SEC", "60")],
        ),
        transport.clone(),
        Arc::new(FixedRandom(30_000)),
    )
    .unwrap();
    container.index.rebuild().unwrap();

    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let fired = container.scheduler.fire_delivery(&cancel).await.unwrap();
    assert!(!fired);
    assert!(transport.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_jitter_draws_only_when_enabled() {
    let dir = TempDir::new().unwrap();
    example_tree(dir.path());

    for (jitter, expected_draws) in [("0", 1), ("10", 2)] {
        let rng = Arc::new(CountingRandom::default());
        let container = ServiceContainer::with_transport(
            test_config(
                dir.path(),
                &[("CRON_SPEC", "0 9 * * *"), ("CRON_JITTER_SEC", jitter)],
            ),
            RecordingTransport::new(),
            rng.clone(),
        )
        .unwrap();
        container.index.rebuild().unwrap();

        assert!(
            container
                .scheduler
                .fire_delivery(&CancellationToken::new())
                .await
                .unwrap()
        );
        // One draw picks the photo; the jitter adds one more.
        assert_eq!(rng.draws(), expected_draws, "CRON_JITTER_SEC={jitter}");
    }
}

#[tokio::test]
async fn test_pipeline_returns_transport_error() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path(), &[]);
    let recipient = config.recipient.clone();
    let container =
        ServiceContainer::with_transport(config, RecordingTransport::failing(), thread_random())
            .unwrap();

    let message = MediaMessage {
        caption: "a.jpg".to_string(),
        file_name: "a.jpg".to_string(),
        content: bytes::Bytes::from_static(b"jpg"),
    };
    let result = container.pipeline.deliver(&message, &recipient).await;
    assert!(matches!(result, Err(Error::TransportFailed(_))));
}

#[tokio::test]
async fn test_delivery_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    example_tree(dir.path());
    let container = ServiceContainer::with_transport(
        test_config(dir.path(), &[("CRON_SPEC", "0 9 * * *")]),
        RecordingTransport::failing(),
        thread_random(),
    )
    .unwrap();
    container.index.rebuild().unwrap();

    let result = container
        .scheduler
        .fire_delivery(&CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::TransportFailed(_))));
}

#[tokio::test]
async fn test_empty_index_skips_delivery() {
    let dir = TempDir::new().unwrap();
    let transport = RecordingTransport::new();
    let container = ServiceContainer::with_transport(
        test_config(dir.path(), &[("CRON_SPEC", "0 9 * * *")]),
        transport.clone(),
        thread_random(),
    )
    .unwrap();
    assert_eq!(container.index.rebuild().unwrap(), 0);

    let result = container
        .scheduler
        .fire_delivery(&CancellationToken::new())
        .await;
    assert!(matches!(result, Err(Error::NoEligibleFiles)));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_lifecycle_transitions() {
    let dir = TempDir::new().unwrap();
    let container = ServiceContainer::with_transport(
        test_config(dir.path(), &[]),
        RecordingTransport::new(),
        thread_random(),
    )
    .unwrap();
    let scheduler = &container.scheduler;

    assert_eq!(scheduler.rebuild_state(), TimerState::Stopped);
    assert!(matches!(
        scheduler.shutdown(Duration::from_secs(1)).await,
        Err(Error::InvalidStateTransition { .. })
    ));

    scheduler.start().unwrap();
    assert_eq!(scheduler.rebuild_state(), TimerState::Running);
    // No CRON_SPEC: the delivery timer never starts.
    assert_eq!(scheduler.delivery_state(), TimerState::Stopped);
    assert!(matches!(
        scheduler.start(),
        Err(Error::InvalidStateTransition { .. })
    ));

    scheduler.shutdown(Duration::from_secs(5)).await.unwrap();
    assert_eq!(scheduler.rebuild_state(), TimerState::Stopped);

    // A stopped scheduler can be started again.
    scheduler.start().unwrap();
    assert_eq!(scheduler.rebuild_state(), TimerState::Running);
    scheduler.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_delivery_timer_follows_schedule() {
    let dir = TempDir::new().unwrap();
    example_tree(dir.path());
    let transport = RecordingTransport::new();
    let container = ServiceContainer::with_transport(
        test_config(dir.path(), &[("CRON_SPEC", "* * * * * *")]),
        transport.clone(),
        thread_random(),
    )
    .unwrap();
    container.index.rebuild().unwrap();

    container.scheduler.start().unwrap();
    assert_eq!(container.scheduler.delivery_state(), TimerState::Running);

    assert!(eventually(|| !delivered_at(&transport.sent()).is_empty()).await);
    container
        .scheduler
        .shutdown(Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(container.scheduler.delivery_state(), TimerState::Stopped);

    for (caption, _) in delivered_at(&transport.sent()) {
        assert!(caption.starts_with(SCHEDULED_CAPTION_PREFIX));
    }
}

#[tokio::test]
async fn test_rebuild_runs_on_start() {
    let dir = TempDir::new().unwrap();
    example_tree(dir.path());
    let container = ServiceContainer::with_transport(
        test_config(dir.path(), &[]),
        RecordingTransport::new(),
        thread_random(),
    )
    .unwrap();
    let index_file = dir.path().join(INDEX_FILE_NAME);
    assert!(!index_file.exists());

    container.scheduler.start().unwrap();
    assert!(eventually(|| index_file.exists()).await);
    container
        .scheduler
        .shutdown(Duration::from_secs(5))
        .await
        .unwrap();

    let listing = std::fs::read_to_string(index_file).unwrap();
    assert_eq!(listing, "a.jpg\nb/c.png\n");
}

#[tokio::test]
async fn test_failed_rebuild_keeps_previous_index() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("media");
    example_tree(&root);
    let container = ServiceContainer::with_transport(
        test_config(&root, &[]),
        RecordingTransport::new(),
        thread_random(),
    )
    .unwrap();

    assert_eq!(container.scheduler.run_rebuild_cycle().await, Some(2));

    std::fs::remove_dir_all(&root).unwrap();
    assert_eq!(container.scheduler.run_rebuild_cycle().await, None);
    assert_eq!(container.index.snapshot().unwrap().len(), 2);
}
