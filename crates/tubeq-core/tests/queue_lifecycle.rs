//! Integration tests: controller operations and the worker loop against a
//! scripted adapter, under paused (virtual) time.

mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::fake_adapter::{FakeAdapter, Step};
use common::{queue_with, settings, wait_terminal};
use tubeq_core::error::QueueError;
use tubeq_core::events::{Event, EventStream};
use tubeq_core::job::{JobId, JobOptions, JobStatus, OutputKind};
use tubeq_core::queue::{EnqueueRequest, JobQueue};

fn drain(stream: &mut EventStream) -> Vec<Event> {
    let mut out = Vec::new();
    while let Some(ev) = stream.try_next() {
        out.push(ev);
    }
    out
}

fn for_job(events: &[Event], id: JobId) -> Vec<&Event> {
    events.iter().filter(|e| e.job_id() == id).collect()
}

#[tokio::test(start_paused = true)]
async fn enqueue_returns_fresh_pending_ids() {
    let queue = queue_with(Arc::new(FakeAdapter::new()));
    let mut seen = HashSet::new();
    for _ in 0..20 {
        let id = queue
            .enqueue("https://www.youtube.com/watch?v=same", JobOptions::default())
            .await
            .unwrap();
        assert!(seen.insert(id), "duplicate id {id}");
        assert_eq!(queue.get(&id).unwrap().status, JobStatus::Pending);
    }
    assert_eq!(queue.list().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn same_url_twice_runs_twice() {
    let adapter = Arc::new(FakeAdapter::new());
    let queue = queue_with(adapter.clone());
    let url = "https://youtu.be/dup";
    let a = queue.enqueue(url, JobOptions::default()).await.unwrap();
    let b = queue.enqueue(url, JobOptions::default()).await.unwrap();
    assert_ne!(a, b);

    let worker = queue.spawn_worker().unwrap();
    assert_eq!(wait_terminal(&queue, a).await.status, JobStatus::Completed);
    assert_eq!(wait_terminal(&queue, b).await.status, JobStatus::Completed);
    assert_eq!(adapter.transfers().len(), 2);
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn eager_metadata_fills_title_and_tolerates_failure() {
    let queue = queue_with(Arc::new(FakeAdapter::new()));
    let id = queue
        .enqueue("https://youtu.be/abc123", JobOptions::default())
        .await
        .unwrap();
    let job = queue.get(&id).unwrap();
    assert_eq!(job.title.as_deref(), Some("Title of abc123"));
    assert!(job.thumbnail_url.is_some());

    let queue = queue_with(Arc::new(FakeAdapter::new().with_metadata_failure()));
    let id = queue
        .enqueue("https://youtu.be/abc123", JobOptions::default())
        .await
        .unwrap();
    let job = queue.get(&id).unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert!(job.title.is_none());
}

#[tokio::test(start_paused = true)]
async fn validation_errors_never_create_jobs() {
    let queue = queue_with(Arc::new(FakeAdapter::new()));
    let mut events = queue.subscribe();
    assert!(matches!(
        queue.enqueue("https://vimeo.com/1", JobOptions::default()).await,
        Err(QueueError::DisallowedDomain(_))
    ));
    assert!(matches!(
        queue.enqueue("youtube", JobOptions::default()).await,
        Err(QueueError::InvalidUrl(_))
    ));
    assert!(queue.list().is_empty());
    assert!(drain(&mut events).is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancel_pending_emits_exactly_one_event() {
    let queue = queue_with(Arc::new(FakeAdapter::new()));
    let mut events = queue.subscribe();
    let id = queue
        .enqueue("https://youtu.be/x", JobOptions::default())
        .await
        .unwrap();
    let job = queue.cancel(&id).unwrap();
    assert_eq!(job.status, JobStatus::Cancelled);
    assert!(job.finished_at.is_some());

    let evs = drain(&mut events);
    assert!(matches!(evs[0], Event::Enqueued { .. }));
    let cancels = evs
        .iter()
        .filter(|e| matches!(e, Event::Cancelled { job_id } if *job_id == id))
        .count();
    assert_eq!(cancels, 1);

    assert!(matches!(
        queue.cancel(&id),
        Err(QueueError::CannotCancel { status: JobStatus::Cancelled, .. })
    ));
    assert!(matches!(
        queue.cancel(&JobId::new_v4()),
        Err(QueueError::JobNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn cancelled_job_is_never_executed() {
    let adapter = Arc::new(FakeAdapter::new());
    let queue = queue_with(adapter.clone());
    let skip = queue
        .enqueue("https://youtu.be/skip", JobOptions::default())
        .await
        .unwrap();
    let run = queue
        .enqueue("https://youtu.be/run", JobOptions::default())
        .await
        .unwrap();
    queue.cancel(&skip).unwrap();

    let worker = queue.spawn_worker().unwrap();
    wait_terminal(&queue, run).await;
    let urls: Vec<String> = adapter.transfers().into_iter().map(|t| t.url).collect();
    assert_eq!(urls, vec!["https://youtu.be/run".to_string()]);
    assert_eq!(queue.get(&skip).unwrap().status, JobStatus::Cancelled);
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_running_job_is_rejected() {
    let adapter = Arc::new(FakeAdapter::new().with_delay(Duration::from_millis(200)));
    let queue = queue_with(adapter);
    let id = queue
        .enqueue("https://youtu.be/long", JobOptions::default())
        .await
        .unwrap();
    let worker = queue.spawn_worker().unwrap();

    while queue.get(&id).unwrap().status != JobStatus::Running {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let before = queue.get(&id).unwrap();
    assert!(matches!(
        queue.cancel(&id),
        Err(QueueError::CannotCancel { status: JobStatus::Running, .. })
    ));
    let after = queue.get(&id).unwrap();
    assert_eq!(after.status, before.status);

    assert_eq!(wait_terminal(&queue, id).await.status, JobStatus::Completed);
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_end_failed_with_three_attempts() {
    let adapter = Arc::new(FakeAdapter::new().otherwise(Step::Fail("HTTP Error 429".into())));
    let queue = queue_with(adapter.clone());
    let mut events = queue.subscribe();
    let id = queue
        .enqueue("https://youtu.be/busy", JobOptions::default())
        .await
        .unwrap();
    let worker = queue.spawn_worker().unwrap();

    let job = wait_terminal(&queue, id).await;
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert!(job.message.as_deref().unwrap().contains("429"));
    assert!(job.filename.is_none());
    assert_eq!(queue.list().len(), 1);

    let evs = drain(&mut events);
    let evs = for_job(&evs, id);
    let retries: Vec<u32> = evs
        .iter()
        .filter_map(|e| match e {
            Event::Retry { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect();
    assert_eq!(retries, vec![1, 2]);
    assert_eq!(
        evs.iter().filter(|e| matches!(e, Event::Failed { .. })).count(),
        1
    );
    assert!(matches!(evs.last(), Some(Event::Failed { .. })));

    // identity rotates per attempt and wraps
    let agents: Vec<Option<String>> = adapter.transfers().into_iter().map(|t| t.user_agent).collect();
    assert_eq!(
        agents,
        vec![Some("ua-1".into()), Some("ua-2".into()), Some("ua-1".into())]
    );
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn backoff_grows_linearly_between_attempts() {
    let adapter = Arc::new(FakeAdapter::new().otherwise(Step::Fail("boom".into())));
    let queue = queue_with(adapter);
    let id = queue
        .enqueue("https://youtu.be/slow", JobOptions::default())
        .await
        .unwrap();
    let start = tokio::time::Instant::now();
    let worker = queue.spawn_worker().unwrap();
    wait_terminal(&queue, id).await;
    // default policy sleeps 2s then 4s
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(6), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(7), "{elapsed:?}");
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn success_on_second_attempt_stops_retrying() {
    let adapter = Arc::new(
        FakeAdapter::new().with_steps([Step::Fail("connection reset".into()), Step::Succeed]),
    );
    let queue = queue_with(adapter.clone());
    let mut events = queue.subscribe();
    let id = queue
        .enqueue("https://www.youtube.com/watch?v=ok", JobOptions::default())
        .await
        .unwrap();
    let worker = queue.spawn_worker().unwrap();

    let job = wait_terminal(&queue, id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.progress, 100);
    assert_eq!(job.attempts, 2);
    assert_eq!(job.filename.as_deref(), Some("ok.mp4"));
    assert!(job.message.is_none());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(adapter.transfers().len(), 2);

    let evs = drain(&mut events);
    let done: Vec<&Event> = for_job(&evs, id)
        .into_iter()
        .filter(|e| matches!(e, Event::Done { .. }))
        .collect();
    assert_eq!(done.len(), 1);
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn running_progress_never_decreases_across_retries() {
    let adapter = Arc::new(FakeAdapter::new().with_steps([
        Step::Fail("first".into()),
        Step::Succeed,
    ]));
    let queue = queue_with(adapter);
    let mut events = queue.subscribe();
    let id = queue
        .enqueue("https://youtu.be/mono", JobOptions::default())
        .await
        .unwrap();
    let worker = queue.spawn_worker().unwrap();
    wait_terminal(&queue, id).await;

    let evs = drain(&mut events);
    let mut last = 0u8;
    let mut saw_finalizing = false;
    for ev in for_job(&evs, id) {
        if let Event::Progress { data, .. } = ev {
            if data.status == JobStatus::Running {
                assert!(data.progress >= last, "{} < {}", data.progress, last);
                last = data.progress;
            }
            if data.status == JobStatus::Finalizing {
                assert_eq!(data.progress, 100);
                saw_finalizing = true;
            }
        }
    }
    assert!(last >= 90);
    assert!(saw_finalizing);
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn only_one_job_active_at_a_time() {
    let adapter = Arc::new(FakeAdapter::new().with_delay(Duration::from_millis(50)));
    let queue = queue_with(adapter.clone());
    let mut ids = Vec::new();
    for i in 0..5 {
        ids.push(
            queue
                .enqueue(&format!("https://youtu.be/j{i}"), JobOptions::default())
                .await
                .unwrap(),
        );
    }
    let worker = queue.spawn_worker().unwrap();
    assert!(matches!(
        queue.spawn_worker(),
        Err(QueueError::WorkerAlreadyRunning)
    ));

    loop {
        let jobs = queue.list();
        let active = jobs.iter().filter(|j| j.status.is_active()).count();
        assert!(active <= 1, "{active} jobs active");
        if jobs.iter().all(|j| j.status.is_terminal()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(7)).await;
    }
    assert_eq!(adapter.max_concurrent(), 1);

    // submission order
    let order: Vec<String> = adapter.transfers().into_iter().map(|t| t.url).collect();
    let expected: Vec<String> = (0..5).map(|i| format!("https://youtu.be/j{i}")).collect();
    assert_eq!(order, expected);
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn worker_survives_a_panicking_adapter() {
    let adapter = Arc::new(FakeAdapter::new().with_steps([Step::Panic]));
    let queue = queue_with(adapter);
    let bad = queue
        .enqueue("https://youtu.be/bad", JobOptions::default())
        .await
        .unwrap();
    let good = queue
        .enqueue("https://youtu.be/good", JobOptions::default())
        .await
        .unwrap();
    let worker = queue.spawn_worker().unwrap();

    let bad = wait_terminal(&queue, bad).await;
    assert_eq!(bad.status, JobStatus::Failed);
    assert!(bad.message.as_deref().unwrap().contains("adapter exploded"));
    assert_eq!(wait_terminal(&queue, good).await.status, JobStatus::Completed);
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn worker_can_restart_after_shutdown() {
    let queue = queue_with(Arc::new(FakeAdapter::new()));
    let worker = queue.spawn_worker().unwrap();
    worker.shutdown().await;
    let worker = queue.spawn_worker().unwrap();
    let id = queue
        .enqueue("https://youtu.be/again", JobOptions::default())
        .await
        .unwrap();
    assert_eq!(wait_terminal(&queue, id).await.status, JobStatus::Completed);
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn bulk_skips_invalid_items() {
    let queue = queue_with(Arc::new(FakeAdapter::new()));
    let out = queue
        .enqueue_bulk(vec![
            EnqueueRequest::new("https://youtu.be/one", JobOptions::default()),
            EnqueueRequest::new("https://example.com/two", JobOptions::default()),
            EnqueueRequest::new("https://www.youtube.com/watch?v=three", JobOptions::default()),
        ])
        .await
        .unwrap();
    assert_eq!(out.created(), 2);
    assert_eq!(out.skipped.len(), 1);
    assert_eq!(out.skipped[0].url, "https://example.com/two");
    assert_eq!(queue.list().len(), 2);

    assert!(matches!(
        queue
            .enqueue_bulk(vec![EnqueueRequest::new("nope", JobOptions::default())])
            .await,
        Err(QueueError::NoValidItems)
    ));
    assert!(matches!(
        queue.enqueue_bulk(Vec::new()).await,
        Err(QueueError::NoValidItems)
    ));
}

#[tokio::test(start_paused = true)]
async fn audio_job_completes_with_mp3_file() {
    let queue = queue_with(Arc::new(FakeAdapter::new()));
    let opts = JobOptions {
        kind: OutputKind::Audio,
        ..Default::default()
    };
    let id = queue.enqueue("https://youtu.be/abc123", opts).await.unwrap();
    let worker = queue.spawn_worker().unwrap();
    let job = wait_terminal(&queue, id).await;
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.filename.as_deref().unwrap().ends_with(".mp3"));
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn collection_is_capped() {
    let queue = queue_with(Arc::new(FakeAdapter::new().with_collection(500)));
    let ids = queue
        .expand_collection(
            "https://www.youtube.com/playlist?list=PLbig",
            JobOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(ids.len(), 200);
    let jobs = queue.list();
    assert_eq!(jobs.len(), 200);
    assert_eq!(jobs[0].title.as_deref(), Some("Entry 0"));
    assert!(jobs.iter().all(|j| j.status == JobStatus::Pending));
}

#[tokio::test(start_paused = true)]
async fn collection_failures_are_reported_once() {
    let queue = queue_with(Arc::new(FakeAdapter::new()));
    let err = queue
        .expand_collection("https://www.youtube.com/@chan", JobOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::CollectionResolution(_)));
    assert!(queue.list().is_empty());

    let queue = queue_with(Arc::new(FakeAdapter::new().with_collection(0)));
    assert!(matches!(
        queue
            .expand_collection("https://www.youtube.com/playlist?list=PL0", JobOptions::default())
            .await,
        Err(QueueError::EmptyCollection)
    ));
}

#[tokio::test(start_paused = true)]
async fn smaller_cap_from_settings() {
    let mut s = settings();
    s.max_collection_items = 3;
    let queue = JobQueue::new(s, Arc::new(FakeAdapter::new().with_collection(10)));
    let ids = queue
        .expand_collection("https://www.youtube.com/playlist?list=PL", JobOptions::default())
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn skipped_entries_do_not_count_against_cap() {
    let urls = (0..10)
        .map(|i| format!("vid{i}"))
        .chain((0..490).map(|i| format!("https://www.youtube.com/watch?v=w{i:04}")));
    let queue = queue_with(Arc::new(FakeAdapter::new().with_entry_urls(urls)));
    let ids = queue
        .expand_collection("https://www.youtube.com/playlist?list=PLmixed", JobOptions::default())
        .await
        .unwrap();
    assert_eq!(ids.len(), 200);
    let jobs = queue.list();
    assert_eq!(jobs[0].url, "https://www.youtube.com/watch?v=w0000");
    assert_eq!(jobs[199].url, "https://www.youtube.com/watch?v=w0199");
}

#[tokio::test(start_paused = true)]
async fn eviction_drops_finished_jobs_and_keeps_pending() {
    let mut s = settings();
    s.terminal_ttl = Some(Duration::ZERO);
    let queue = JobQueue::new(s, Arc::new(FakeAdapter::new()));
    let done = queue
        .enqueue("https://www.youtube.com/watch?v=gone", JobOptions::default())
        .await
        .unwrap();
    let waiting = queue
        .enqueue("https://www.youtube.com/watch?v=kept", JobOptions::default())
        .await
        .unwrap();
    queue.cancel(&done).unwrap();

    assert_eq!(queue.evict_expired(), 1);
    assert!(matches!(queue.get(&done), Err(QueueError::JobNotFound(_))));
    assert_eq!(queue.get(&waiting).unwrap().status, JobStatus::Pending);
    assert_eq!(queue.evict_expired(), 0);
}

#[tokio::test(start_paused = true)]
async fn idle_worker_evicts_expired_jobs() {
    let mut s = settings();
    s.terminal_ttl = Some(Duration::ZERO);
    let queue = JobQueue::new(s, Arc::new(FakeAdapter::new()));
    let mut events = queue.subscribe();
    let id = queue
        .enqueue("https://www.youtube.com/watch?v=short", JobOptions::default())
        .await
        .unwrap();
    let worker = queue.spawn_worker().unwrap();
    loop {
        match events.next().await {
            Some(Event::Done { job_id, .. }) if job_id == id => break,
            Some(_) => {}
            None => panic!("event stream closed"),
        }
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(matches!(queue.get(&id), Err(QueueError::JobNotFound(_))));
    worker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn retention_is_off_without_ttl() {
    let queue = queue_with(Arc::new(FakeAdapter::new()));
    let id = queue
        .enqueue("https://www.youtube.com/watch?v=stay", JobOptions::default())
        .await
        .unwrap();
    queue.cancel(&id).unwrap();
    assert_eq!(queue.evict_expired(), 0);
    assert_eq!(queue.get(&id).unwrap().status, JobStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn dropping_worker_handle_leaves_later_jobs_pending() {
    let adapter = Arc::new(FakeAdapter::new().with_delay(Duration::from_secs(1)));
    let queue = queue_with(adapter);
    let mut ids = Vec::new();
    for i in 0..3 {
        ids.push(
            queue
                .enqueue(&format!("https://www.youtube.com/watch?v=d{i}"), JobOptions::default())
                .await
                .unwrap(),
        );
    }
    let worker = queue.spawn_worker().unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(queue.get(&ids[0]).unwrap().status, JobStatus::Running);
    drop(worker);

    assert_eq!(wait_terminal(&queue, ids[0]).await.status, JobStatus::Completed);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(queue.get(&ids[1]).unwrap().status, JobStatus::Pending);
    assert_eq!(queue.get(&ids[2]).unwrap().status, JobStatus::Pending);

    let worker = queue.spawn_worker().unwrap();
    assert_eq!(wait_terminal(&queue, ids[2]).await.status, JobStatus::Completed);
    worker.shutdown().await;
}
