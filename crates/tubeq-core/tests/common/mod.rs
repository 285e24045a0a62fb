//! Shared helpers for queue integration tests.
#![allow(dead_code)]

pub mod fake_adapter;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tubeq_core::job::{Job, JobId};
use tubeq_core::queue::{JobQueue, QueueSettings};
use tubeq_core::retry::{IdentityRotation, RetryPolicy};

use fake_adapter::FakeAdapter;

pub fn settings() -> QueueSettings {
    QueueSettings {
        allowed_domains: vec!["youtube.com".to_string(), "youtu.be".to_string()],
        poll_interval: Duration::from_millis(20),
        event_capacity: 4096,
        retry: RetryPolicy::default(),
        identities: IdentityRotation::new(vec!["ua-1".to_string(), "ua-2".to_string()]),
        max_collection_items: 200,
        concurrent_fragments: 4,
        output_dir: PathBuf::from("downloads"),
        eager_metadata: true,
        terminal_ttl: None,
    }
}

pub fn queue_with(adapter: Arc<FakeAdapter>) -> JobQueue {
    JobQueue::new(settings(), adapter)
}

/// Poll until the job reaches a terminal state (virtual time under `start_paused`).
pub async fn wait_terminal(queue: &JobQueue, id: JobId) -> Job {
    let poll = async {
        loop {
            let job = queue.get(&id).expect("job exists");
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(600), poll)
        .await
        .expect("job did not finish")
}
