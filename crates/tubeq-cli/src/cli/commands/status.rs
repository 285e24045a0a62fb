//! `tubeq status [id]` – show jobs of a running `tubeq get`.

use anyhow::Result;
use tubeq_core::control::ControlRequest;
use tubeq_core::queue::parse_job_id;

use super::render;
use crate::cli::control_socket;

pub async fn run_status(id: Option<&str>) -> Result<()> {
    let req = match id {
        Some(raw) => ControlRequest::Get(parse_job_id(raw)?),
        None => ControlRequest::List,
    };
    let resp = control_socket::send_request(&req).await?;
    if !resp.ok {
        anyhow::bail!("{}", resp.error.unwrap_or_else(|| "request failed".to_string()));
    }
    let jobs = match (resp.job, resp.jobs) {
        (Some(job), _) => vec![job],
        (None, Some(jobs)) => jobs,
        (None, None) => Vec::new(),
    };
    if jobs.is_empty() {
        println!("No jobs.");
        return Ok(());
    }
    println!("{}", render::status_header());
    for job in &jobs {
        println!("{}", render::status_row(job));
    }
    Ok(())
}
