//! `tubeq expand <url>` – list playlist/channel entries without queueing them.

use anyhow::Result;
use tubeq_core::adapter::{MediaAdapter, YtDlpAdapter};
use tubeq_core::config::TubeqConfig;
use tubeq_core::queue::validate_url;

pub async fn run_expand(cfg: &TubeqConfig, url: &str, json: bool) -> Result<()> {
    validate_url(url, &cfg.allowed_domains)?;
    let entries = YtDlpAdapter::from_config(cfg).resolve_collection(url).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }
    if entries.is_empty() {
        println!("No entries found.");
        return Ok(());
    }
    for (i, e) in entries.iter().enumerate() {
        println!("{:>4}  {}  {}", i + 1, e.url, e.title.as_deref().unwrap_or("-"));
    }
    let cap = cfg.max_collection_items;
    if entries.len() > cap {
        println!(
            "{} entries; `tubeq get --expand` queues the first {cap}.",
            entries.len()
        );
    }
    Ok(())
}
