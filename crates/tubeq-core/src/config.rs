use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per job (including the first).
    pub max_attempts: u32,
    /// Delay in seconds before the first retry.
    pub base_delay_secs: f64,
    /// Added to the delay for every further retry (linear, not exponential).
    pub increment_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 2.0,
            increment_secs: 2.0,
        }
    }
}

/// Retention of finished jobs in memory (optional section in config.toml).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Evict completed/failed/cancelled jobs this many seconds after they finished.
    /// None keeps them for the life of the process.
    #[serde(default)]
    pub terminal_ttl_secs: Option<u64>,
}

const DEFAULT_USER_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/15.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
];

/// Global configuration loaded from `~/.config/tubeq/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TubeqConfig {
    /// Directory downloads are written to. None = `./downloads`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Hosts accepted by enqueue (exact match or subdomain).
    pub allowed_domains: Vec<String>,
    /// Worker idle poll interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Capacity of the event channel; events beyond it are dropped.
    pub event_capacity: usize,
    /// Maximum number of jobs created from one playlist/channel.
    pub max_collection_items: usize,
    /// Segment parallelism hint passed to the resolver.
    pub concurrent_fragments: u32,
    /// Socket timeout for transfers, in seconds.
    pub socket_timeout_secs: u64,
    /// Socket timeout for metadata and collection lookups, in seconds.
    pub metadata_timeout_secs: u64,
    /// Resolve title/thumbnail when a job is enqueued.
    pub eager_metadata: bool,
    /// Resolver executable.
    pub ytdlp_bin: String,
    /// Netscape cookies file handed to the resolver when present.
    #[serde(default)]
    pub cookies_file: Option<PathBuf>,
    /// Client identities rotated across attempts.
    pub user_agents: Vec<String>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
    /// Optional retention policy; if missing, jobs are never evicted.
    #[serde(default)]
    pub retention: Option<RetentionConfig>,
}

impl Default for TubeqConfig {
    fn default() -> Self {
        Self {
            output_dir: None,
            allowed_domains: vec!["youtube.com".to_string(), "youtu.be".to_string()],
            poll_interval_ms: 1000,
            event_capacity: 1024,
            max_collection_items: 200,
            concurrent_fragments: 4,
            socket_timeout_secs: 30,
            metadata_timeout_secs: 15,
            eager_metadata: true,
            ytdlp_bin: "yt-dlp".to_string(),
            cookies_file: None,
            user_agents: DEFAULT_USER_AGENTS.iter().map(|s| s.to_string()).collect(),
            retry: None,
            retention: None,
        }
    }
}

impl TubeqConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn terminal_ttl(&self) -> Option<Duration> {
        self.retention
            .as_ref()
            .and_then(|r| r.terminal_ttl_secs)
            .map(Duration::from_secs)
    }

    /// Output directory, falling back to `downloads` under `base`.
    pub fn output_dir_or(&self, base: &Path) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| base.join("downloads"))
    }

    /// Apply `TUBEQ_MAX_COLLECTION_ITEMS` / `TUBEQ_CONCURRENT_FRAGMENTS` overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(n) = lookup("TUBEQ_MAX_COLLECTION_ITEMS").and_then(|v| v.trim().parse().ok()) {
            self.max_collection_items = n;
        }
        if let Some(n) = lookup("TUBEQ_CONCURRENT_FRAGMENTS").and_then(|v| v.trim().parse().ok()) {
            self.concurrent_fragments = n;
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("tubeq")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<TubeqConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = TubeqConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file.
pub fn load_from_path(path: &Path) -> Result<TubeqConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let cfg: TubeqConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
