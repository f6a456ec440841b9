use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{EngineError, Result};
use crate::time::parse_clock;

const DEFAULT_STABILIZE_THRESHOLD: f64 = 1_500.0;
const DEFAULT_SUSPEND_WINDOW: Duration = Duration::from_secs(25);
const DEFAULT_RESTART_WINDOW: Duration = Duration::from_secs(300);

/// Which part of the cache a dump request writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DumpMode {
    Ab,
    Current,
    Continuous,
    Chapter,
    Segments,
}

impl DumpMode {
    pub const ALL: [Self; 5] = [
        Self::Ab,
        Self::Current,
        Self::Continuous,
        Self::Chapter,
        Self::Segments,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ab => "ab",
            Self::Current => "current",
            Self::Continuous => "continuous",
            Self::Chapter => "chapter",
            Self::Segments => "segments",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(value.trim()))
    }

    /// Returns the following mode, wrapping after the last one.
    pub fn next(self) -> Self {
        cycle(&Self::ALL, self)
    }
}

/// File naming policy for dump output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputLabel {
    Increment,
    Range,
    Timestamp,
    Overwrite,
    Chapter,
}

impl OutputLabel {
    pub const ALL: [Self; 5] = [
        Self::Increment,
        Self::Range,
        Self::Timestamp,
        Self::Overwrite,
        Self::Chapter,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Increment => "increment",
            Self::Range => "range",
            Self::Timestamp => "timestamp",
            Self::Overwrite => "overwrite",
            Self::Chapter => "chapter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn next(self) -> Self {
        cycle(&Self::ALL, self)
    }
}

fn cycle<T: Copy + PartialEq>(all: &[T], current: T) -> T {
    let index = all.iter().position(|item| *item == current).unwrap_or(0);
    all[(index + 1) % all.len()]
}

/// Validated runtime settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub save_directory: PathBuf,
    pub dump_mode: DumpMode,
    pub output_label: OutputLabel,
    pub force_extension: Option<String>,
    pub force_title: Option<String>,
    pub autostart: bool,
    /// Seconds of cache time after which automatic writes stop or split.
    pub autoend: Option<f64>,
    pub hostchange: bool,
    pub on_demand: bool,
    pub piecewise: bool,
    pub quit: Option<f64>,
    /// Cache time past which a closing suspension window forces a reload.
    pub stabilize_threshold: f64,
    pub suspend_window: Duration,
    pub restart_window: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            save_directory: expand_path("~"),
            dump_mode: DumpMode::Ab,
            output_label: OutputLabel::Increment,
            force_extension: None,
            force_title: None,
            autostart: false,
            autoend: None,
            hostchange: false,
            on_demand: false,
            piecewise: false,
            quit: None,
            stabilize_threshold: DEFAULT_STABILIZE_THRESHOLD,
            suspend_window: DEFAULT_SUSPEND_WINDOW,
            restart_window: DEFAULT_RESTART_WINDOW,
        }
    }
}

/// Settings as written in a JSON file; every field is optional and validated
/// by [`Settings::from_raw`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    pub save_directory: Option<String>,
    pub dump_mode: Option<String>,
    pub output_label: Option<String>,
    pub force_extension: Option<String>,
    pub force_title: Option<String>,
    pub autostart: Option<serde_json::Value>,
    pub autoend: Option<String>,
    pub hostchange: Option<serde_json::Value>,
    pub on_demand: Option<serde_json::Value>,
    pub piecewise: Option<serde_json::Value>,
    pub quit: Option<String>,
    pub stabilize_threshold: Option<f64>,
    pub suspend_window: Option<f64>,
    pub restart_window: Option<f64>,
}

impl Settings {
    /// Loads and validates settings from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| EngineError::SettingsIo {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: RawSettings =
            serde_json::from_str(&text).map_err(|source| EngineError::SettingsParse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self::from_raw(raw))
    }

    /// Validates raw settings. Invalid values are logged and replaced by
    /// their defaults.
    pub fn from_raw(raw: RawSettings) -> Self {
        let mut settings = Self::default();
        let mut apply = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                if let Err(error) = settings.apply(key, &value) {
                    warn!(key, %error, "ignoring setting");
                }
            }
        };

        apply("save_directory", raw.save_directory);
        apply("dump_mode", raw.dump_mode);
        apply("output_label", raw.output_label);
        apply("force_extension", raw.force_extension);
        apply("force_title", raw.force_title);
        apply("autostart", raw.autostart.map(json_flag));
        apply("autoend", raw.autoend);
        apply("hostchange", raw.hostchange.map(json_flag));
        apply("on_demand", raw.on_demand.map(json_flag));
        apply("piecewise", raw.piecewise.map(json_flag));
        apply("quit", raw.quit);
        apply(
            "stabilize_threshold",
            raw.stabilize_threshold.map(|value| value.to_string()),
        );
        apply(
            "suspend_window",
            raw.suspend_window.map(|value| value.to_string()),
        );
        apply(
            "restart_window",
            raw.restart_window.map(|value| value.to_string()),
        );

        settings
    }

    /// Applies one option by name and returns the effective value.
    ///
    /// Unknown keys are rejected. Invalid values reset the option to its
    /// default, log a warning and still succeed.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<String> {
        let defaults = Self::default();
        match key {
            "save_directory" => {
                self.save_directory = if value.trim().is_empty() {
                    defaults.save_directory
                } else {
                    expand_path(value.trim())
                };
            }
            "dump_mode" => {
                self.dump_mode = DumpMode::parse(value).unwrap_or_else(|| {
                    warn!(key, value, "invalid dump mode, using default");
                    defaults.dump_mode
                });
            }
            "output_label" => {
                self.output_label = OutputLabel::parse(value).unwrap_or_else(|| {
                    warn!(key, value, "invalid output label, using default");
                    defaults.output_label
                });
            }
            "force_extension" => self.force_extension = parse_extension(value),
            "force_title" => self.force_title = optional_text(value),
            "autostart" => self.autostart = parse_flag(key, value, defaults.autostart),
            "hostchange" => self.hostchange = parse_flag(key, value, defaults.hostchange),
            "on_demand" => self.on_demand = parse_flag(key, value, defaults.on_demand),
            "piecewise" => self.piecewise = parse_flag(key, value, defaults.piecewise),
            "autoend" => self.autoend = parse_optional_clock(key, value),
            "quit" => self.quit = parse_optional_clock(key, value),
            "stabilize_threshold" => {
                self.stabilize_threshold = parse_seconds(key, value)
                    .unwrap_or(defaults.stabilize_threshold);
            }
            "suspend_window" => {
                self.suspend_window = parse_seconds(key, value)
                    .map(Duration::from_secs_f64)
                    .unwrap_or(defaults.suspend_window);
            }
            "restart_window" => {
                self.restart_window = parse_seconds(key, value)
                    .map(Duration::from_secs_f64)
                    .unwrap_or(defaults.restart_window);
            }
            _ => {
                return Err(EngineError::UnknownOption {
                    key: key.to_string(),
                });
            }
        }

        Ok(self.describe(key).unwrap_or_default())
    }

    /// Renders the current value of one option for messages.
    pub fn describe(&self, key: &str) -> Option<String> {
        let text = match key {
            "save_directory" => self.save_directory.display().to_string(),
            "dump_mode" => self.dump_mode.as_str().to_string(),
            "output_label" => self.output_label.as_str().to_string(),
            "force_extension" => self.force_extension.clone().unwrap_or_else(no),
            "force_title" => self.force_title.clone().unwrap_or_else(no),
            "autostart" => yes_no(self.autostart),
            "hostchange" => yes_no(self.hostchange),
            "on_demand" => yes_no(self.on_demand),
            "piecewise" => yes_no(self.piecewise),
            "autoend" => describe_clock(self.autoend),
            "quit" => describe_clock(self.quit),
            "stabilize_threshold" => self.stabilize_threshold.to_string(),
            "suspend_window" => self.suspend_window.as_secs_f64().to_string(),
            "restart_window" => self.restart_window.as_secs_f64().to_string(),
            _ => return None,
        };
        Some(text)
    }
}

fn no() -> String {
    "no".to_string()
}

fn yes_no(value: bool) -> String {
    let text = if value { "yes" } else { "no" };
    text.to_string()
}

fn describe_clock(value: Option<f64>) -> String {
    value
        .map(|seconds| crate::time::format_clock(seconds, ':'))
        .unwrap_or_else(no)
}

fn json_flag(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    }
}

fn is_disabled(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "" | "no" | "none")
}

fn optional_text(value: &str) -> Option<String> {
    if is_disabled(value) {
        None
    } else {
        Some(value.trim().to_string())
    }
}

fn parse_extension(value: &str) -> Option<String> {
    optional_text(value).map(|ext| ext.trim_start_matches('.').to_string())
}

fn parse_flag(key: &str, value: &str, default: bool) -> bool {
    match value.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "1" => true,
        "no" | "false" | "0" => false,
        _ => {
            warn!(key, value, "invalid flag, using default");
            default
        }
    }
}

fn parse_optional_clock(key: &str, value: &str) -> Option<f64> {
    if is_disabled(value) {
        return None;
    }
    match parse_clock(value) {
        Ok(seconds) => Some(seconds),
        Err(error) => {
            warn!(key, value, %error, "invalid HH:MM:SS value, disabling");
            None
        }
    }
}

fn parse_seconds(key: &str, value: &str) -> Option<f64> {
    match value.trim().parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Some(seconds),
        _ => {
            warn!(key, value, "invalid number of seconds, using default");
            None
        }
    }
}

/// Expands a leading `~` to the home directory.
pub fn expand_path(value: &str) -> PathBuf {
    let home = dirs::home_dir();
    match (value, home) {
        ("~", Some(home)) => home,
        (value, Some(home)) if value.starts_with("~/") => home.join(&value[2..]),
        (value, _) => PathBuf::from(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_and_labels_cycle_in_fixed_order() {
        assert_eq!(DumpMode::Ab.next(), DumpMode::Current);
        assert_eq!(DumpMode::Segments.next(), DumpMode::Ab);
        assert_eq!(OutputLabel::Chapter.next(), OutputLabel::Increment);
        assert_eq!(DumpMode::parse(" Chapter "), Some(DumpMode::Chapter));
        assert_eq!(OutputLabel::parse("bogus"), None);
    }

    #[test]
    fn invalid_enum_values_fall_back_to_defaults() {
        let mut settings = Settings {
            dump_mode: DumpMode::Segments,
            ..Settings::default()
        };

        let effective = settings
            .apply("dump_mode", "sideways")
            .expect("known key should apply");

        assert_eq!(effective, "ab");
        assert_eq!(settings.dump_mode, DumpMode::Ab);
    }

    #[test]
    fn invalid_times_disable_the_option() {
        let mut settings = Settings::default();
        settings
            .apply("autoend", "00:00:10")
            .expect("known key should apply");
        assert_eq!(settings.autoend, Some(10.0));

        settings
            .apply("autoend", "ten seconds")
            .expect("known key should apply");
        assert_eq!(settings.autoend, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut settings = Settings::default();
        assert!(matches!(
            settings.apply("volume", "100"),
            Err(EngineError::UnknownOption { .. })
        ));
    }

    #[test]
    fn raw_settings_accept_json_booleans_and_strings() {
        let raw: RawSettings = serde_json::from_str(
            r#"{
                "save_directory": "/tmp/dumps",
                "dump_mode": "continuous",
                "autostart": true,
                "piecewise": "yes",
                "autoend": "00:30:00",
                "force_extension": ".ts",
                "output_label": "nonsense"
            }"#,
        )
        .expect("valid json");

        let settings = Settings::from_raw(raw);

        assert_eq!(settings.save_directory, PathBuf::from("/tmp/dumps"));
        assert_eq!(settings.dump_mode, DumpMode::Continuous);
        assert!(settings.autostart);
        assert!(settings.piecewise);
        assert_eq!(settings.autoend, Some(1_800.0));
        assert_eq!(settings.force_extension.as_deref(), Some("ts"));
        assert_eq!(settings.output_label, OutputLabel::Increment);
    }

    #[test]
    fn expands_home_prefix() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(expand_path("~/clips"), home.join("clips"));
        assert_eq!(expand_path("/abs"), PathBuf::from("/abs"));
    }
}
