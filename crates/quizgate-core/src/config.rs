use crate::labels::{self, Labels};
use crate::trigger::TriggerSettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub modal: ModalConfig,
    #[serde(default)]
    pub timeline: TimelineConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub locale: LocaleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "TriggerConfig::default_tolerance")]
    pub tolerance_s: f64,
    #[serde(default = "TriggerConfig::default_retrigger_window")]
    pub retrigger_window_s: f64,
    #[serde(default = "TriggerConfig::default_recently_shown")]
    pub recently_shown_ms: u64,
    #[serde(default = "TriggerConfig::default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl TriggerConfig {
    fn default_tolerance() -> f64 { 1.0 }
    fn default_retrigger_window() -> f64 { 0.5 }
    fn default_recently_shown() -> u64 { 10_000 }
    fn default_poll_interval() -> u64 { 1000 }

    pub fn settings(&self) -> TriggerSettings {
        TriggerSettings {
            tolerance_s: self.tolerance_s,
            retrigger_window_s: self.retrigger_window_s,
            recently_shown: Duration::from_millis(self.recently_shown_ms),
        }
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            tolerance_s: 1.0,
            retrigger_window_s: 0.5,
            recently_shown_ms: 10_000,
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModalConfig {
    /// Give up waiting for the fullscreen-exit event after this long.
    #[serde(default = "ModalConfig::default_fullscreen_exit_timeout")]
    pub fullscreen_exit_timeout_ms: u64,
    /// Delay before showing when the player was not fullscreen.
    #[serde(default)]
    pub settle_ms: u64,
    /// Continue stays disabled this long after feedback appears.
    #[serde(default = "ModalConfig::default_feedback_hold")]
    pub feedback_hold_ms: u64,
}

impl ModalConfig {
    fn default_fullscreen_exit_timeout() -> u64 { 1200 }
    fn default_feedback_hold() -> u64 { 1500 }
}

impl Default for ModalConfig {
    fn default() -> Self {
        Self {
            fullscreen_exit_timeout_ms: 1200,
            settle_ms: 0,
            feedback_hold_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    #[serde(default = "TimelineConfig::default_seek_margin")]
    pub seek_margin_s: f64,
}

impl TimelineConfig {
    fn default_seek_margin() -> f64 { 0.2 }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self { seek_margin_s: 0.2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "SourceConfig::default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub token: String,
    /// When non-empty, questions are read from `<dir>/<course>.json` instead of HTTP.
    #[serde(default)]
    pub questions_dir: String,
}

impl SourceConfig {
    fn default_base_url() -> String { "http://localhost:3000/api".into() }

    /// Bearer token; `QUIZGATE_TOKEN` overrides the config file.
    pub fn token(&self) -> Option<String> {
        if let Ok(token) = std::env::var("QUIZGATE_TOKEN") {
            if !token.trim().is_empty() {
                return Some(token.trim().to_string());
            }
        }
        let token = self.token.trim();
        (!token.is_empty()).then(|| token.to_string())
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".into(),
            token: String::new(),
            questions_dir: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    #[serde(default = "LocaleConfig::default_active")]
    pub active: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl LocaleConfig {
    fn default_active() -> String { "en".into() }
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            active: "en".into(),
            labels: HashMap::new(),
        }
    }
}

impl Config {
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("quizgate")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        toml::from_str(&contents).with_context(|| "parsing config TOML")
    }

    /// Resolve the active label set with config overrides applied.
    /// An unknown locale falls back to English.
    pub fn labels(&self) -> Labels {
        let base = labels::builtin_labels(&self.locale.active).unwrap_or_else(|| {
            warn!(locale = %self.locale.active, "unknown locale, using en");
            Labels::default()
        });
        let (labels, unknown) = base.with_overrides(&self.locale.labels);
        for key in unknown {
            warn!(key = %key, "ignoring unknown label override");
        }
        labels
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.trigger.poll_interval_ms.max(1))
    }
}

pub fn socket_path() -> PathBuf {
    // QUIZGATE_SOCK env var overrides for testing.
    if let Ok(path) = std::env::var("QUIZGATE_SOCK") {
        return PathBuf::from(path);
    }
    dirs::runtime_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("quizgate")
        .join("quizgate.sock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // --- defaults ---

    #[test]
    fn default_tolerance_is_one_second() {
        let config = Config::default();
        assert_eq!(config.trigger.tolerance_s, 1.0);
        assert_eq!(config.trigger.retrigger_window_s, 0.5);
    }

    #[test]
    fn default_recently_shown_is_ten_seconds() {
        let config = Config::default();
        assert_eq!(config.trigger.settings().recently_shown, Duration::from_secs(10));
    }

    #[test]
    fn default_modal_timings() {
        let config = Config::default();
        assert_eq!(config.modal.fullscreen_exit_timeout_ms, 1200);
        assert_eq!(config.modal.settle_ms, 0);
        assert_eq!(config.modal.feedback_hold_ms, 1500);
    }

    #[test]
    fn default_seek_margin() {
        assert_eq!(Config::default().timeline.seek_margin_s, 0.2);
    }

    #[test]
    fn default_poll_interval_is_one_second() {
        assert_eq!(Config::default().poll_interval(), Duration::from_secs(1));
    }

    // --- TOML parsing ---

    #[test]
    fn parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.trigger.poll_interval_ms, 1000);
        assert_eq!(config.locale.active, "en");
        assert_eq!(config.source.base_url, "http://localhost:3000/api");
    }

    #[test]
    fn parse_partial_section_keeps_other_defaults() {
        let toml = r#"
[modal]
settle_ms = 250
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.modal.settle_ms, 250);
        assert_eq!(config.modal.fullscreen_exit_timeout_ms, 1200);
    }

    #[test]
    fn parse_locale_overrides() {
        let toml = r#"
[locale]
active = "ar"

[locale.labels]
affirmative = "نعم"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        let labels = config.labels();
        assert_eq!(labels.affirmative, "نعم");
        assert_eq!(labels.negative, "خطأ");
    }

    #[test]
    fn unknown_locale_falls_back_to_english() {
        let mut config = Config::default();
        config.locale.active = "zz".into();
        assert_eq!(config.labels(), Labels::default());
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[timeline]\nseek_margin_s = 0.5").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.timeline.seek_margin_s, 0.5);
    }

    #[test]
    fn load_from_rejects_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[trigger\ntolerance_s = ").unwrap();
        assert!(Config::load_from(file.path()).is_err());
    }

    #[test]
    fn empty_token_is_none() {
        let source = SourceConfig::default();
        if std::env::var("QUIZGATE_TOKEN").is_err() {
            assert!(source.token().is_none());
        }
    }

    // --- socket path ---

    #[test]
    fn socket_path_ends_with_quizgate_sock() {
        let path = socket_path();
        if std::env::var("QUIZGATE_SOCK").is_err() {
            assert_eq!(path.file_name().unwrap(), "quizgate.sock");
        }
    }
}
