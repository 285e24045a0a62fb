//! Text rendering for job rows and events.

use std::collections::HashMap;
use tubeq_core::events::Event;
use tubeq_core::job::{Job, JobId, JobStatus};

const PROGRESS_STEP: u8 = 10;

pub fn format_rate(bytes_per_sec: f64) -> String {
    let mib = bytes_per_sec / 1_048_576.0;
    if mib >= 1.0 {
        format!("{mib:.2} MiB/s")
    } else {
        format!("{:.0} KiB/s", bytes_per_sec / 1024.0)
    }
}

pub fn format_eta(secs: u64) -> String {
    if secs >= 3600 {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}m{:02}s", secs / 60, secs % 60)
    }
}

pub fn status_header() -> String {
    format!("{:<36}  {:<10}  {:>4}  {}", "ID", "STATUS", "PCT", "NAME")
}

pub fn status_row(job: &Job) -> String {
    let mut row = format!(
        "{:<36}  {:<10}  {:>3}%  {}",
        job.id,
        job.status,
        job.progress,
        job.display_name()
    );
    if let Some(msg) = job.message.as_deref().filter(|_| job.status != JobStatus::Completed) {
        row.push_str(&format!("  ({msg})"));
    }
    row
}

/// Suppresses progress lines that add nothing: only status changes and
/// every `PROGRESS_STEP` percent are shown.
#[derive(Debug, Default)]
pub struct EventPrinter {
    last: HashMap<JobId, (JobStatus, u8)>,
}

impl EventPrinter {
    pub fn line(&mut self, event: &Event) -> Option<String> {
        match event {
            Event::Enqueued { job_id, url } => Some(format!("[{}] queued  {url}", short(job_id))),
            Event::Progress { job_id, data } => {
                let bucket = data.progress / PROGRESS_STEP;
                let key = (data.status, bucket);
                if self.last.get(job_id) == Some(&key) {
                    return None;
                }
                self.last.insert(*job_id, key);
                let mut line = format!(
                    "[{}] {:<10} {:>3}%  {}",
                    short(job_id),
                    data.status,
                    data.progress,
                    data.display_name()
                );
                if data.status == JobStatus::Running {
                    if let Some(rate) = data.speed {
                        line.push_str(&format!("  {}", format_rate(rate)));
                    }
                    if let Some(eta) = data.eta {
                        line.push_str(&format!("  ETA {}", format_eta(eta)));
                    }
                }
                Some(line)
            }
            Event::Retry {
                job_id,
                attempt,
                error,
            } => Some(format!(
                "[{}] attempt {attempt} failed, retrying: {error}",
                short(job_id)
            )),
            Event::Done { job_id, file } => Some(format!("[{}] done    {file}", short(job_id))),
            Event::Failed { job_id, error } => {
                Some(format!("[{}] failed  {error}", short(job_id)))
            }
            Event::Cancelled { job_id } => Some(format!("[{}] cancelled", short(job_id))),
        }
    }
}

/// First block of the UUID; enough to tell jobs apart on screen.
fn short(id: &JobId) -> String {
    id.simple().to_string()[..8].to_string()
}
