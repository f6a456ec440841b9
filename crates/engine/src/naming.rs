use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::warn;

use crate::config::{OutputLabel, Settings};
use crate::host::{DumpBound, FileInfo};
use crate::time::format_clock;

const MAX_FILENAME_BYTES: usize = 255;
/// Upper bound on numeric suffix probes before falling back to a timestamp.
pub const MAX_COLLISION_PROBES: u32 = 10_000;
const FALLBACK_TITLE: &str = "stream";

/// Sanitized title and extension of the loaded source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputName {
    pub title: String,
    pub extension: String,
}

impl OutputName {
    /// Resolves the output title and extension, honoring forced values.
    pub fn resolve(info: &FileInfo, settings: &Settings) -> Self {
        let raw_title = settings.force_title.as_deref().unwrap_or(&info.title);
        let mut title = sanitize_title(raw_title);
        if title.is_empty() {
            title = FALLBACK_TITLE.to_string();
        }
        let extension = settings
            .force_extension
            .clone()
            .unwrap_or_else(|| guess_extension(info).to_string());
        Self { title, extension }
    }
}

/// Replaces path separators, reserved and control characters with `_` and
/// trims surrounding whitespace and dots.
///
/// # Example
/// ```
/// use cachedump_engine::naming::sanitize_title;
///
/// assert_eq!(sanitize_title("Live: a/b?"), "Live_ a_b_");
/// ```
pub fn sanitize_title(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect();
    replaced
        .trim_matches(|ch: char| ch.is_whitespace() || ch == '.')
        .to_string()
}

/// Guesses a container extension able to hold the source codecs without
/// re-encoding.
pub fn guess_extension(info: &FileInfo) -> &'static str {
    let video = info.video_codec.as_deref().map(str::to_ascii_lowercase);
    let audio = info.audio_codec.as_deref().map(str::to_ascii_lowercase);
    let format = info
        .file_format
        .as_deref()
        .unwrap_or_default()
        .to_ascii_lowercase();
    let transport = format.contains("mpegts") || format.contains("hls");

    match (video.as_deref(), audio.as_deref()) {
        (None, None) => "mkv",
        (None, Some(audio)) => match audio {
            "aac" => "m4a",
            "mp3" => "mp3",
            "opus" | "vorbis" => "ogg",
            "flac" => "flac",
            _ => "mka",
        },
        (Some(video), audio) => {
            if matches!(video, "vp8" | "vp9" | "av1")
                && audio.is_none_or(|audio| matches!(audio, "opus" | "vorbis"))
            {
                "webm"
            } else if transport
                && matches!(video, "h264" | "hevc" | "mpeg2video")
                && audio.is_none_or(|audio| matches!(audio, "aac" | "mp3" | "ac3"))
            {
                "ts"
            } else if !transport
                && matches!(video, "h264" | "hevc" | "av1")
                && audio.is_none_or(|audio| matches!(audio, "aac" | "mp3"))
            {
                "mp4"
            } else {
                "mkv"
            }
        }
    }
}

/// Inputs to the naming policy for one write.
#[derive(Debug, Clone)]
pub struct LabelContext<'a> {
    pub label: OutputLabel,
    pub start: DumpBound,
    pub end: DumpBound,
    pub chapter_title: Option<&'a str>,
    pub now: DateTime<Local>,
}

/// Builds the output path for one write, probing `exists` to avoid
/// overwriting earlier dumps (except for the overwrite label).
pub fn output_path(
    directory: &Path,
    name: &OutputName,
    context: &LabelContext<'_>,
    exists: impl Fn(&Path) -> bool,
) -> PathBuf {
    let stamp = context.now.format("%Y%m%d-%H%M%S").to_string();
    let tag = match context.label {
        OutputLabel::Increment => None,
        OutputLabel::Overwrite => {
            return directory.join(file_name(&name.title, "", &name.extension));
        }
        OutputLabel::Range => Some(format!(
            "-[{}-{}]",
            describe_bound(context.start, "start"),
            describe_bound(context.end, "end")
        )),
        OutputLabel::Timestamp => Some(format!("-{stamp}")),
        OutputLabel::Chapter => context
            .chapter_title
            .map(sanitize_title)
            .filter(|title| !title.is_empty())
            .map(|title| format!("-{title}")),
    };

    if let Some(tag) = tag.as_deref() {
        let candidate = directory.join(file_name(&name.title, tag, &name.extension));
        if !exists(&candidate) {
            return candidate;
        }
    }

    let tag = tag.unwrap_or_default();
    for index in 1..=MAX_COLLISION_PROBES {
        let suffix = format!("{tag}-{index}");
        let candidate = directory.join(file_name(&name.title, &suffix, &name.extension));
        if !exists(&candidate) {
            return candidate;
        }
    }

    warn!(
        title = %name.title,
        probes = MAX_COLLISION_PROBES,
        "collision probing exhausted, using timestamp suffix"
    );
    let fallback = format!(
        "{tag}-{}",
        context.now.format("%Y%m%d-%H%M%S%.3f")
    );
    directory.join(file_name(&name.title, &fallback, &name.extension))
}

fn describe_bound(bound: DumpBound, open: &str) -> String {
    match bound {
        DumpBound::At(seconds) => format_clock(seconds, '.'),
        DumpBound::Open => open.to_string(),
    }
}

/// Joins title, suffix and extension, truncating the title on a char
/// boundary so the result fits in one file name.
fn file_name(title: &str, suffix: &str, extension: &str) -> String {
    let reserved = suffix.len() + extension.len() + 1;
    let budget = MAX_FILENAME_BYTES.saturating_sub(reserved);
    let mut end = title.len().min(budget);
    while !title.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{suffix}.{extension}", &title[..end])
}
