//! Parsing of yt-dlp's JSON dumps and templated progress lines.

use serde_json::Value;
use std::path::PathBuf;

use crate::adapter::{
    AdapterError, CollectionEntry, MediaMetadata, Rendition, SubtitleTrack, TransferPhase,
    TransferProgress,
};

/// Prefix of the lines produced by our `--progress-template`.
pub(super) const PROGRESS_PREFIX: &str = "tubeq-progress|";
/// Prefix of the line produced by our `--print after_move:...`.
pub(super) const FILE_PREFIX: &str = "tubeq-file|";

const MAX_RENDITIONS: usize = 5;

/// Template that renders one progress line per update. Fields yt-dlp cannot
/// fill are rendered as `NA`.
pub(super) fn progress_template() -> String {
    format!(
        "download:{PROGRESS_PREFIX}%(progress.status)s|%(progress.downloaded_bytes)s|\
         %(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.speed)s|%(progress.eta)s"
    )
}

pub(super) fn file_template() -> String {
    format!("after_move:{FILE_PREFIX}%(filepath)s")
}

fn field_f64(s: &str) -> Option<f64> {
    match s.trim() {
        "" | "NA" | "None" => None,
        v => v.parse::<f64>().ok().filter(|x| x.is_finite() && *x >= 0.0),
    }
}

fn field_u64(s: &str) -> Option<u64> {
    field_f64(s).map(|v| v as u64)
}

/// Parse one stdout line as a progress update. Returns None for anything else
/// (including the `error` status, which is reported through the exit code).
pub(super) fn parse_progress_line(line: &str) -> Option<TransferProgress> {
    let rest = line.trim_end().strip_prefix(PROGRESS_PREFIX)?;
    let mut parts = rest.split('|');
    let status = parts.next()?;
    let done = parts.next().and_then(field_u64);
    let total = parts.next().and_then(field_u64);
    let estimate = parts.next().and_then(field_u64);
    let speed = parts.next().and_then(field_f64);
    let eta = parts.next().and_then(field_u64);

    let phase = match status {
        "downloading" => TransferPhase::Downloading,
        "finished" => TransferPhase::Finished,
        _ => return None,
    };
    Some(TransferProgress {
        phase,
        bytes_done: done.unwrap_or(0),
        bytes_total: total.or(estimate),
        rate: speed,
        eta,
    })
}

/// Parse the final-path line, if this is one.
pub(super) fn parse_file_line(line: &str) -> Option<PathBuf> {
    let path = line.trim_end().strip_prefix(FILE_PREFIX)?;
    if path.is_empty() || path == "NA" {
        return None;
    }
    Some(PathBuf::from(path))
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    v.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn thumbnail_of(v: &Value) -> Option<String> {
    str_field(v, "thumbnail").or_else(|| {
        v.get("thumbnails")
            .and_then(Value::as_array)
            .and_then(|t| t.last())
            .and_then(|t| str_field(t, "url"))
    })
}

fn keys_of(v: &Value, key: &str) -> Vec<String> {
    v.get(key)
        .and_then(Value::as_object)
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default()
}

/// Build display metadata from `yt-dlp -J` output for a single item.
pub(super) fn parse_metadata(url: &str, bytes: &[u8]) -> Result<MediaMetadata, AdapterError> {
    let v: Value = serde_json::from_slice(bytes)?;
    if !v.is_object() {
        return Err(AdapterError::Parse("metadata is not a JSON object".into()));
    }

    let mut renditions: Vec<Rendition> = v
        .get("formats")
        .and_then(Value::as_array)
        .map(|formats| {
            formats
                .iter()
                .filter(|f| f.get("vcodec").and_then(Value::as_str) != Some("none"))
                .filter_map(|f| {
                    let height = f.get("height").and_then(Value::as_u64)? as u32;
                    Some(Rendition {
                        format_id: str_field(f, "format_id").unwrap_or_default(),
                        height,
                        ext: str_field(f, "ext"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    renditions.sort_by(|a, b| b.height.cmp(&a.height));
    renditions.truncate(MAX_RENDITIONS);

    let manual = keys_of(&v, "subtitles");
    let automatic = keys_of(&v, "automatic_captions");
    let mut langs: Vec<String> = manual.iter().chain(automatic.iter()).cloned().collect();
    langs.sort();
    langs.dedup();
    let subtitles = langs
        .into_iter()
        .map(|lang| SubtitleTrack {
            manual: manual.contains(&lang),
            automatic: automatic.contains(&lang),
            lang,
        })
        .collect();

    Ok(MediaMetadata {
        title: str_field(&v, "title").unwrap_or_else(|| url.to_string()),
        url: str_field(&v, "webpage_url").unwrap_or_else(|| url.to_string()),
        duration: v.get("duration").and_then(Value::as_f64),
        thumbnail_url: thumbnail_of(&v),
        channel: str_field(&v, "channel").or_else(|| str_field(&v, "uploader")),
        renditions,
        subtitles,
    })
}

/// Entries of a `yt-dlp -J --flat-playlist` dump. A single-item URL yields one
/// entry for itself.
pub(super) fn parse_collection(url: &str, bytes: &[u8]) -> Result<Vec<CollectionEntry>, AdapterError> {
    let v: Value = serde_json::from_slice(bytes)?;
    let Some(entries) = v.get("entries").and_then(Value::as_array) else {
        return Ok(vec![CollectionEntry {
            url: str_field(&v, "webpage_url").unwrap_or_else(|| url.to_string()),
            title: str_field(&v, "title"),
            thumbnail: thumbnail_of(&v),
            duration: v.get("duration").and_then(Value::as_f64),
        }]);
    };
    Ok(entries
        .iter()
        .filter_map(|e| {
            let url = str_field(e, "webpage_url").or_else(|| str_field(e, "url"))?;
            Some(CollectionEntry {
                url,
                title: str_field(e, "title"),
                thumbnail: thumbnail_of(e),
                duration: e.get("duration").and_then(Value::as_f64),
            })
        })
        .collect())
}
