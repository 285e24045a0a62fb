//! `tubeq cancel <id>` – cancel a pending job in a running `tubeq get`.

use anyhow::Result;
use tubeq_core::control::ControlRequest;
use tubeq_core::queue::parse_job_id;

use crate::cli::control_socket;

pub async fn run_cancel(id: &str) -> Result<()> {
    let id = parse_job_id(id)?;
    let resp = control_socket::send_request(&ControlRequest::Cancel(id)).await?;
    match (resp.ok, resp.job) {
        (true, Some(job)) => println!("Cancelled job {} ({}).", job.id, job.display_name()),
        (true, None) => println!("Cancelled job {id}."),
        (false, _) => anyhow::bail!(
            "{}",
            resp.error.unwrap_or_else(|| "cancel rejected".to_string())
        ),
    }
    Ok(())
}
