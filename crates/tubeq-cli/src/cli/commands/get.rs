//! `tubeq get` – queue URLs, run the worker, render events until every job ends.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tubeq_core::adapter::YtDlpAdapter;
use tubeq_core::config::TubeqConfig;
use tubeq_core::events::EventStream;
use tubeq_core::job::{JobId, JobOptions, JobStatus};
use tubeq_core::queue::{EnqueueRequest, JobQueue, QueueSettings};

use super::render::EventPrinter;
use crate::cli::control_socket;

const STATE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

async fn enqueue_all(
    queue: &JobQueue,
    urls: &[String],
    options: JobOptions,
    expand: bool,
) -> Result<Vec<JobId>> {
    if expand {
        let mut ids = Vec::new();
        for url in urls {
            let created = queue
                .expand_collection(url, options.clone())
                .await
                .with_context(|| format!("expand {url}"))?;
            tracing::info!(url = %url, jobs = created.len(), "collection queued");
            ids.extend(created);
        }
        return Ok(ids);
    }
    if let [url] = urls {
        return Ok(vec![queue.enqueue(url, options).await?]);
    }
    let items = urls
        .iter()
        .map(|u| EnqueueRequest::new(u.clone(), options.clone()))
        .collect();
    let outcome = queue.enqueue_bulk(items).await?;
    for skipped in &outcome.skipped {
        eprintln!("skipped {}: {}", skipped.url, skipped.reason);
    }
    Ok(outcome.job_ids)
}

fn all_finished(queue: &JobQueue, ids: &[JobId]) -> bool {
    ids.iter().all(|id| {
        queue
            .get(id)
            .map(|j| j.status.is_terminal())
            .unwrap_or(true)
    })
}

fn emit(printer: &mut EventPrinter, ev: &tubeq_core::events::Event, json: bool) {
    if json {
        match serde_json::to_string(ev) {
            Ok(s) => println!("{s}"),
            Err(e) => tracing::warn!("serialize event: {}", e),
        }
    } else if let Some(line) = printer.line(ev) {
        println!("{line}");
    }
}

/// Print events until every job in `ids` is terminal. Events can be dropped
/// under load, so job state is also checked on a timer.
async fn watch(queue: &JobQueue, events: &mut EventStream, ids: &[JobId], json: bool) -> Result<()> {
    let mut printer = EventPrinter::default();
    let mut tick = tokio::time::interval(STATE_CHECK_INTERVAL);
    while !all_finished(queue, ids) {
        tokio::select! {
            ev = events.next() => match ev {
                Some(ev) => emit(&mut printer, &ev, json),
                None => break,
            },
            _ = tick.tick() => {}
            _ = tokio::signal::ctrl_c() => anyhow::bail!("interrupted"),
        }
    }
    while let Some(ev) = events.try_next() {
        emit(&mut printer, &ev, json);
    }
    Ok(())
}

pub async fn run_get(
    cfg: &TubeqConfig,
    urls: &[String],
    options: JobOptions,
    expand: bool,
    json: bool,
    output_dir: PathBuf,
) -> Result<()> {
    let settings = QueueSettings::with_output_dir(cfg, output_dir);
    let adapter = Arc::new(YtDlpAdapter::from_config(cfg));
    let queue = JobQueue::new(settings, adapter);
    let mut events = queue.subscribe();

    let ids = enqueue_all(&queue, urls, options, expand).await?;
    if !json {
        println!(
            "Queued {} job(s), saving to {}",
            ids.len(),
            queue.settings().output_dir.display()
        );
    }

    let socket_path = match tubeq_core::control::default_control_socket_path() {
        Ok(path) => match control_socket::spawn_control_listener(queue.clone(), &path) {
            Ok(_) => {
                tracing::debug!(path = %path.display(), "control socket listening");
                Some(path)
            }
            Err(e) => {
                tracing::warn!("control socket unavailable: {:#}", e);
                None
            }
        },
        Err(e) => {
            tracing::warn!("control socket path: {:#}", e);
            None
        }
    };

    let worker = queue.spawn_worker()?;
    let watched = watch(&queue, &mut events, &ids, json).await;
    if let Some(path) = &socket_path {
        let _ = std::fs::remove_file(path);
    }
    watched?;
    worker.shutdown().await;

    let jobs: Vec<_> = ids.iter().filter_map(|id| queue.get(id).ok()).collect();
    let count = |s: JobStatus| jobs.iter().filter(|j| j.status == s).count();
    let (completed, failed, cancelled) = (
        count(JobStatus::Completed),
        count(JobStatus::Failed),
        count(JobStatus::Cancelled),
    );
    if !json {
        println!("{completed} completed, {failed} failed, {cancelled} cancelled");
    }
    if queue.dropped_events() > 0 {
        tracing::warn!(dropped = queue.dropped_events(), "some events were not displayed");
    }
    if failed > 0 {
        anyhow::bail!("{failed} job(s) failed");
    }
    Ok(())
}
