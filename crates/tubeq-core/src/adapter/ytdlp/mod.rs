//! [`MediaAdapter`] backed by the `yt-dlp` executable.
//!
//! Metadata and collection lookups run `yt-dlp -J` and parse the dump.
//! Transfers stream stdout line by line: our progress template and the
//! post-move `--print` line are the only lines we interpret.

mod parse;

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::adapter::{
    AdapterError, CollectionEntry, MediaAdapter, MediaMetadata, ProgressFn, TransferOutcome,
    TransferRequest,
};
use crate::config::TubeqConfig;
use crate::job::{JobOptions, OutputKind};

const REFERER: &str = "https://www.youtube.com/";
const STDERR_SUMMARY_MAX: usize = 500;

/// Process-level settings for the resolver executable.
#[derive(Debug, Clone)]
pub struct YtDlpSettings {
    pub bin: String,
    /// `--socket-timeout` for transfers.
    pub socket_timeout: Duration,
    /// `--socket-timeout` for lookups; four times this bounds the whole lookup.
    pub metadata_timeout: Duration,
    pub cookies_file: Option<PathBuf>,
    /// Identity presented on lookups.
    pub user_agent: Option<String>,
}

impl YtDlpSettings {
    pub fn from_config(cfg: &TubeqConfig) -> Self {
        Self {
            bin: cfg.ytdlp_bin.clone(),
            socket_timeout: Duration::from_secs(cfg.socket_timeout_secs.max(1)),
            metadata_timeout: Duration::from_secs(cfg.metadata_timeout_secs.max(1)),
            cookies_file: cfg.cookies_file.clone(),
            user_agent: cfg.user_agents.first().cloned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct YtDlpAdapter {
    settings: YtDlpSettings,
}

impl YtDlpAdapter {
    pub fn new(settings: YtDlpSettings) -> Self {
        Self { settings }
    }

    pub fn from_config(cfg: &TubeqConfig) -> Self {
        Self::new(YtDlpSettings::from_config(cfg))
    }

    fn common_args(&self, socket_timeout: Duration, user_agent: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "--no-warnings".to_string(),
            "--no-color".to_string(),
            "--socket-timeout".to_string(),
            socket_timeout.as_secs().to_string(),
            "--add-header".to_string(),
            format!("Referer:{REFERER}"),
        ];
        if let Some(ua) = user_agent {
            args.push("--user-agent".to_string());
            args.push(ua.to_string());
        }
        if let Some(cookies) = self.settings.cookies_file.as_ref().filter(|p| p.is_file()) {
            args.push("--cookies".to_string());
            args.push(cookies.to_string_lossy().into_owned());
        }
        args
    }

    fn lookup_args(&self, url: &str, flat: bool) -> Vec<String> {
        let mut args = self.common_args(
            self.settings.metadata_timeout,
            self.settings.user_agent.as_deref(),
        );
        args.push("-J".to_string());
        args.push("--skip-download".to_string());
        if flat {
            args.push("--flat-playlist".to_string());
        } else {
            args.push("--no-playlist".to_string());
        }
        args.push("--".to_string());
        args.push(url.to_string());
        args
    }

    fn transfer_args(&self, req: &TransferRequest) -> Vec<String> {
        let mut args = self.common_args(self.settings.socket_timeout, req.user_agent.as_deref());
        args.extend(format_args(&req.options));
        args.extend([
            "--no-playlist".to_string(),
            "--continue".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--no-simulate".to_string(),
            "--concurrent-fragments".to_string(),
            req.concurrent_fragments.max(1).to_string(),
            "--progress-template".to_string(),
            parse::progress_template(),
            "--print".to_string(),
            parse::file_template(),
            "-o".to_string(),
            req.output_dir
                .join("%(title)s.%(ext)s")
                .to_string_lossy()
                .into_owned(),
            "--".to_string(),
            req.url.clone(),
        ]);
        args
    }

    async fn lookup(&self, args: Vec<String>) -> Result<Vec<u8>, AdapterError> {
        let program = self.settings.bin.clone();
        let deadline = self.settings.metadata_timeout.saturating_mul(4);
        let mut cmd = Command::new(&program);
        cmd.args(&args).stdin(Stdio::null()).kill_on_drop(true);
        let out = tokio::time::timeout(deadline, cmd.output())
            .await
            .map_err(|_| AdapterError::Timeout(deadline))?
            .map_err(|source| AdapterError::Spawn {
                program: program.clone(),
                source,
            })?;
        if !out.status.success() {
            return Err(AdapterError::Exit {
                program,
                code: out.status.code(),
                stderr: stderr_summary(&String::from_utf8_lossy(&out.stderr)),
            });
        }
        Ok(out.stdout)
    }
}

/// Format-selection arguments for the requested output.
fn format_args(opts: &JobOptions) -> Vec<String> {
    let mut args = Vec::new();
    match opts.kind {
        OutputKind::Audio => {
            args.extend(
                ["-f", "bestaudio/best", "-x", "--audio-format", "mp3", "--audio-quality", "192K"]
                    .map(String::from),
            );
        }
        OutputKind::Video => {
            let selector = match opts.quality.max_height() {
                Some(h) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]"),
                None => "bestvideo+bestaudio/best".to_string(),
            };
            args.push("-f".to_string());
            args.push(selector);
            args.push("--merge-output-format".to_string());
            args.push("mp4".to_string());
        }
    }
    if opts.include_subs {
        args.push("--write-subs".to_string());
        args.push("--write-auto-subs".to_string());
        let langs: Vec<&str> = opts
            .subs_langs
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();
        if !langs.is_empty() {
            args.push("--sub-langs".to_string());
            args.push(langs.join(","));
        }
    }
    args
}

/// Shorten yt-dlp stderr to the line that matters, usually the last `ERROR:`.
fn stderr_summary(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let picked = lines
        .iter()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| lines.last())
        .copied()
        .unwrap_or("no error output");
    let mut s: String = picked.chars().take(STDERR_SUMMARY_MAX).collect();
    if s.len() < picked.len() {
        s.push('…');
    }
    s
}

#[async_trait]
impl MediaAdapter for YtDlpAdapter {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn resolve_metadata(&self, url: &str) -> Result<MediaMetadata, AdapterError> {
        let stdout = self.lookup(self.lookup_args(url, false)).await?;
        parse::parse_metadata(url, &stdout)
    }

    async fn resolve_collection(&self, url: &str) -> Result<Vec<CollectionEntry>, AdapterError> {
        let stdout = self.lookup(self.lookup_args(url, true)).await?;
        parse::parse_collection(url, &stdout)
    }

    async fn execute_transfer(
        &self,
        req: &TransferRequest,
        on_progress: &ProgressFn<'_>,
    ) -> Result<TransferOutcome, AdapterError> {
        tokio::fs::create_dir_all(&req.output_dir).await?;
        let program = self.settings.bin.clone();
        let args = self.transfer_args(req);
        tracing::debug!(url = %req.url, ?args, "spawning transfer");

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| AdapterError::Spawn {
                program: program.clone(),
                source,
            })?;

        // Drain stderr concurrently so a chatty child cannot fill the pipe.
        let stderr_task = child.stderr.take().map(|mut err| {
            tokio::spawn(async move {
                let mut buf = String::new();
                let _ = err.read_to_string(&mut buf).await;
                buf
            })
        });

        let mut output_path = None;
        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(p) = parse::parse_progress_line(&line) {
                    on_progress(p);
                } else if let Some(path) = parse::parse_file_line(&line) {
                    output_path = Some(path);
                } else {
                    tracing::trace!(line = %line, "resolver output");
                }
            }
        }

        let status = child.wait().await?;
        let stderr = match stderr_task {
            Some(t) => t.await.unwrap_or_default(),
            None => String::new(),
        };
        if !status.success() {
            return Err(AdapterError::Exit {
                program,
                code: status.code(),
                stderr: stderr_summary(&stderr),
            });
        }
        let path = output_path.ok_or(AdapterError::MissingOutput)?;
        Ok(TransferOutcome::normalized(path, req.options.kind))
    }
}
