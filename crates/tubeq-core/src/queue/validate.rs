//! Synchronous input checks: URL allow-list and job id parsing.

use url::Url;

use crate::error::QueueError;
use crate::job::JobId;

/// True if `host` is one of `allowed` or a subdomain of one.
fn host_allowed(host: &str, allowed: &[String]) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    allowed.iter().any(|d| {
        let d = d.trim().trim_end_matches('.').to_ascii_lowercase();
        !d.is_empty()
            && (host == d
                || host
                    .strip_suffix(d.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.')))
    })
}

/// Parse `raw` and check scheme and host against the allow-list.
pub fn validate_url(raw: &str, allowed: &[String]) -> Result<Url, QueueError> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|e| QueueError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(QueueError::InvalidUrl(format!(
            "{raw}: unsupported scheme {}",
            url.scheme()
        )));
    }
    let host = url
        .host_str()
        .ok_or_else(|| QueueError::InvalidUrl(format!("{raw}: missing host")))?;
    if !host_allowed(host, allowed) {
        return Err(QueueError::DisallowedDomain(host.to_string()));
    }
    Ok(url)
}

/// Parse a job id as given on a command line or socket.
pub fn parse_job_id(raw: &str) -> Result<JobId, QueueError> {
    JobId::parse_str(raw.trim()).map_err(|_| QueueError::InvalidJobId(raw.to_string()))
}
