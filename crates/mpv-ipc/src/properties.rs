use std::collections::HashMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

/// One entry of `demuxer-cache-state/seekable-ranges`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SeekableRange {
    pub start: f64,
    pub end: f64,
}

/// The `demuxer-cache-state` property.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DemuxerCacheState {
    pub seekable_ranges: Vec<SeekableRange>,
    pub bof_cached: bool,
    pub eof_cached: bool,
    pub underrun: bool,
    pub cache_duration: Option<f64>,
    pub reader_pts: Option<f64>,
}

/// One entry of the `track-list` property.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Track {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub codec: Option<String>,
}

/// One entry of the `chapter-list` property.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChapterEntry {
    #[serde(default)]
    pub title: Option<String>,
    pub time: f64,
}

/// Latest value of every observed property, keyed by name.
#[derive(Debug, Default)]
pub struct PropertyMirror {
    values: HashMap<String, Value>,
}

impl PropertyMirror {
    /// Records a change; `None` marks the property unavailable.
    pub fn update(&mut self, name: &str, data: Option<Value>) {
        match data {
            Some(value) => {
                self.values.insert(name.to_string(), value);
            }
            None => {
                self.values.remove(name);
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.values.get(name).and_then(Value::as_f64)
    }

    pub fn i64(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(Value::as_i64)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    /// Decodes a structured property, logging values that do not fit `T`.
    pub fn decode<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let value = self.values.get(name)?;
        match T::deserialize(value) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                debug!(property = name, %error, "property value did not decode");
                None
            }
        }
    }

    pub fn cache_state(&self) -> Option<DemuxerCacheState> {
        self.decode("demuxer-cache-state")
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.decode("track-list").unwrap_or_default()
    }

    pub fn chapters(&self) -> Vec<ChapterEntry> {
        self.decode("chapter-list").unwrap_or_default()
    }

    /// Selected track of `kind` (`video`, `audio` or `sub`).
    pub fn selected_track(&self, kind: &str) -> Option<Track> {
        self.tracks()
            .into_iter()
            .find(|track| track.selected && track.kind == kind)
    }

    /// Loop point value; `"no"` means unset.
    pub fn loop_point(&self, name: &str) -> Option<f64> {
        self.f64(name)
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
