//! Control protocol spoken over the local socket of a running `tubeq get`.
//!
//! One request per line (`cancel <id>`, `get <id>`, `list`); one JSON line
//! per response. The listener and client live in the CLI; parsing and
//! dispatch live here so they can be tested without a socket.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::job::{Job, JobId};
use crate::queue::{parse_job_id, JobQueue};

/// Default path for the control socket (same XDG state dir as the log).
pub fn default_control_socket_path() -> anyhow::Result<PathBuf> {
    Ok(crate::logging::state_dir()?.join("control.sock"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlRequest {
    Cancel(JobId),
    Get(JobId),
    List,
}

impl ControlRequest {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut words = line.split_whitespace();
        let cmd = words.next().ok_or_else(|| "empty request".to_string())?;
        let arg = words.next();
        if words.next().is_some() {
            return Err(format!("too many arguments for {cmd}"));
        }
        let id = |arg: Option<&str>| -> Result<JobId, String> {
            let raw = arg.ok_or_else(|| format!("{cmd} needs a job id"))?;
            parse_job_id(raw).map_err(|e| e.to_string())
        };
        match cmd {
            "cancel" => Ok(ControlRequest::Cancel(id(arg)?)),
            "get" => Ok(ControlRequest::Get(id(arg)?)),
            "list" if arg.is_none() => Ok(ControlRequest::List),
            "list" => Err("list takes no arguments".to_string()),
            other => Err(format!("unknown command: {other}")),
        }
    }

    /// Wire form, newline terminated.
    pub fn to_line(&self) -> String {
        match self {
            ControlRequest::Cancel(id) => format!("cancel {id}\n"),
            ControlRequest::Get(id) => format!("get {id}\n"),
            ControlRequest::List => "list\n".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlResponse {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<Job>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlResponse {
    pub fn job(job: Job) -> Self {
        Self {
            ok: true,
            job: Some(job),
            jobs: None,
            error: None,
        }
    }

    pub fn jobs(jobs: Vec<Job>) -> Self {
        Self {
            ok: true,
            job: None,
            jobs: Some(jobs),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            job: None,
            jobs: None,
            error: Some(msg.into()),
        }
    }

    pub fn to_line(&self) -> String {
        match serde_json::to_string(self) {
            Ok(s) => s + "\n",
            Err(e) => format!("{{\"ok\":false,\"error\":\"serialize response: {e}\"}}\n"),
        }
    }
}

/// Execute one request line against the queue.
pub fn handle_line(queue: &JobQueue, line: &str) -> ControlResponse {
    let req = match ControlRequest::parse(line) {
        Ok(r) => r,
        Err(e) => return ControlResponse::error(e),
    };
    let result = match req {
        ControlRequest::Cancel(id) => queue.cancel(&id).map(ControlResponse::job),
        ControlRequest::Get(id) => queue.get(&id).map(ControlResponse::job),
        ControlRequest::List => Ok(ControlResponse::jobs(queue.list())),
    };
    result.unwrap_or_else(|e| ControlResponse::error(e.to_string()))
}
