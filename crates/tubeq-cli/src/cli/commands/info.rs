//! `tubeq info <url>` – resolve and print metadata without downloading.

use anyhow::Result;
use tubeq_core::adapter::{MediaAdapter, YtDlpAdapter};
use tubeq_core::config::TubeqConfig;
use tubeq_core::queue::validate_url;

use super::render::format_eta;

pub async fn run_info(cfg: &TubeqConfig, url: &str, json: bool) -> Result<()> {
    validate_url(url, &cfg.allowed_domains)?;
    let meta = YtDlpAdapter::from_config(cfg).resolve_metadata(url).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&meta)?);
        return Ok(());
    }

    println!("Title:     {}", meta.title);
    if let Some(channel) = &meta.channel {
        println!("Channel:   {channel}");
    }
    if let Some(d) = meta.duration {
        println!("Duration:  {}", format_eta(d as u64));
    }
    if let Some(thumb) = &meta.thumbnail_url {
        println!("Thumbnail: {thumb}");
    }
    if !meta.renditions.is_empty() {
        let heights: Vec<String> = meta.renditions.iter().map(|r| format!("{}p", r.height)).collect();
        println!("Video:     {}", heights.join(", "));
    }
    if meta.subtitles.is_empty() {
        println!("Subtitles: none");
    } else {
        let langs: Vec<String> = meta
            .subtitles
            .iter()
            .map(|s| {
                if s.manual {
                    s.lang.clone()
                } else {
                    format!("{} (auto)", s.lang)
                }
            })
            .collect();
        println!("Subtitles: {}", langs.join(", "));
    }
    Ok(())
}
