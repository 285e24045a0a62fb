//! CLI for the tubeq media download queue.

mod commands;
mod control_socket;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tubeq_core::config::{self, TubeqConfig};
use tubeq_core::job::{JobOptions, OutputKind, Quality};

use commands::{run_cancel, run_completions, run_expand, run_get, run_info, run_status};

/// Top-level CLI for tubeq.
#[derive(Debug, Parser)]
#[command(name = "tubeq")]
#[command(about = "tubeq: queued media downloads with retry and live progress", long_about = None)]
pub struct Cli {
    /// Read configuration from this file instead of ~/.config/tubeq/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Output selection shared by download commands.
#[derive(Debug, Clone, Args)]
pub struct FormatArgs {
    /// Extract audio only (mp3) instead of a muxed mp4.
    #[arg(long)]
    pub audio: bool,

    /// Maximum video height: best, 1080, 720 or 360.
    #[arg(long, default_value = "best", value_name = "Q")]
    pub quality: Quality,

    /// Download subtitles (manual and automatic).
    #[arg(long)]
    pub subs: bool,

    /// Subtitle language to fetch; repeat for several.
    #[arg(long = "sub-lang", value_name = "LANG")]
    pub sub_langs: Vec<String>,
}

impl FormatArgs {
    pub fn to_options(&self) -> JobOptions {
        JobOptions {
            kind: if self.audio {
                OutputKind::Audio
            } else {
                OutputKind::Video
            },
            quality: self.quality,
            include_subs: self.subs || !self.sub_langs.is_empty(),
            subs_langs: self.sub_langs.clone(),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Queue one or more URLs and download them, showing live progress.
    Get {
        /// Video, playlist or channel URLs.
        #[arg(required = true)]
        urls: Vec<String>,

        #[command(flatten)]
        format: FormatArgs,

        /// Treat each URL as a playlist/channel and queue its entries.
        #[arg(long)]
        expand: bool,

        /// Print events as JSON lines instead of text.
        #[arg(long)]
        json: bool,

        /// Download directory (default: config output_dir, else ./downloads).
        #[arg(long, short = 'o', value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Show title, renditions and subtitles for a URL without downloading.
    Info {
        url: String,
        #[arg(long)]
        json: bool,
    },

    /// List the entries of a playlist or channel without downloading.
    Expand {
        url: String,
        #[arg(long)]
        json: bool,
    },

    /// Cancel a job that has not started yet (talks to a running `tubeq get`).
    Cancel {
        /// Job identifier (UUID).
        id: String,
    },

    /// Show jobs of a running `tubeq get`, or one job by ID.
    Status {
        /// Job identifier (UUID).
        id: Option<String>,
    },

    /// Print a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

fn load_config(path: Option<&Path>) -> Result<TubeqConfig> {
    let mut cfg = match path {
        Some(p) => config::load_from_path(p)?,
        None => config::load_or_init()?,
    };
    cfg.apply_env_overrides();
    tracing::debug!("loaded config: {:?}", cfg);
    Ok(cfg)
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let CliCommand::Completions { shell } = cli.command {
            return run_completions(shell);
        }
        let cfg = load_config(cli.config.as_deref())?;

        match cli.command {
            CliCommand::Get {
                urls,
                format,
                expand,
                json,
                output_dir,
            } => {
                let base = std::env::current_dir()?;
                let output_dir = output_dir.unwrap_or_else(|| cfg.output_dir_or(&base));
                run_get(&cfg, &urls, format.to_options(), expand, json, output_dir).await?
            }
            CliCommand::Info { url, json } => run_info(&cfg, &url, json).await?,
            CliCommand::Expand { url, json } => run_expand(&cfg, &url, json).await?,
            CliCommand::Cancel { id } => run_cancel(&id).await?,
            CliCommand::Status { id } => run_status(id.as_deref()).await?,
            CliCommand::Completions { .. } => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
