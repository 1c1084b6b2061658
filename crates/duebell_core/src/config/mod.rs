use crate::error::AppError;
use crate::model::{Priority, Tag};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "DUEBELL_CONFIG_PATH";

#[derive(Debug, Clone)]
pub struct Palette {
    pub accent: &'static str,
    pub muted: &'static str,
    pub reset: &'static str,
}

impl Palette {
    pub fn accentize(&self, text: &str) -> String {
        if self.accent.is_empty() {
            text.to_string()
        } else {
            format!("{}{}{}", self.accent, text, self.reset)
        }
    }

    pub fn mutedize(&self, text: &str) -> String {
        if self.muted.is_empty() {
            text.to_string()
        } else {
            format!("{}{}{}", self.muted, text, self.reset)
        }
    }

    /// Overdue and high-priority rows stand out; completed rows fade.
    pub fn paint_tag(&self, tag: Tag) -> String {
        match tag {
            Tag::Overdue | Tag::Priority(Priority::High) => self.accentize(tag.label()),
            Tag::Completed => self.mutedize(tag.label()),
            Tag::Priority(_) => tag.label().to_string(),
        }
    }
}

pub fn palette_for_theme(theme: Option<&str>) -> Palette {
    match canonical_theme_name_option(theme) {
        Some(ref name) if name == "noir" => Palette {
            accent: "\x1b[38;5;208m",
            muted: "\x1b[38;5;250m",
            reset: "\x1b[0m",
        },
        Some(ref name) if name == "solarized" => Palette {
            accent: "\x1b[38;5;108m",
            muted: "\x1b[38;5;250m",
            reset: "\x1b[0m",
        },
        _ => Palette {
            accent: "",
            muted: "",
            reset: "",
        },
    }
}

fn canonical_theme_name_option(theme: Option<&str>) -> Option<String> {
    theme.and_then(|value| canonical_theme_name(value))
}

pub fn canonical_theme_name(raw: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        return Some("default".into());
    }

    match trimmed {
        "vanilla" | "light" => Some("default".to_string()),
        "dark" | "dark_mode" | "darkmode" => Some("noir".to_string()),
        other => Some(other.to_string()),
    }
}

pub const DEFAULT_TICK_SECS: u64 = 2;
pub const DEFAULT_HIGH_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_NORMAL_INTERVAL_SECS: u64 = 900;

/// Reminder timing: how often the scheduler scans, and how long a reminded
/// task stays quiet before it is reminded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    pub tick_secs: u64,
    pub high_interval_secs: u64,
    pub normal_interval_secs: u64,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_TICK_SECS,
            high_interval_secs: DEFAULT_HIGH_INTERVAL_SECS,
            normal_interval_secs: DEFAULT_NORMAL_INTERVAL_SECS,
        }
    }
}

impl ReminderSettings {
    pub fn tick(&self) -> Duration {
        Duration::from_secs(self.tick_secs.max(1))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub reminders: ReminderSettings,
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub theme: Option<String>,
    pub tick_secs: Option<u64>,
    pub high_interval_secs: Option<u64>,
    pub normal_interval_secs: Option<u64>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata)
            .join("duebell")
            .join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("duebell")
            .join(CONFIG_FILE_NAME))
    }
}

pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    validate_reminders(&config.reminders)?;
    Ok(normalize_config_theme(config))
}

fn validate_reminders(reminders: &ReminderSettings) -> Result<(), AppError> {
    if reminders.tick_secs == 0 {
        return Err(AppError::invalid_data("reminders.tick_secs must be positive"));
    }
    if reminders.high_interval_secs == 0 || reminders.normal_interval_secs == 0 {
        return Err(AppError::invalid_data(
            "reminder intervals must be positive",
        ));
    }
    Ok(())
}

fn normalize_config_theme(mut config: Config) -> Config {
    config.theme = normalize_theme_value(config.theme);
    config
}

fn normalize_theme_value(value: Option<String>) -> Option<String> {
    value.and_then(|name| canonical_theme_name(&name))
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(theme) = overrides.theme.as_ref()
        && let Some(normalized) = canonical_theme_name(theme)
    {
        merged.theme = Some(normalized);
    }

    if let Some(secs) = overrides.tick_secs.filter(|secs| *secs > 0) {
        merged.reminders.tick_secs = secs;
    }
    if let Some(secs) = overrides.high_interval_secs.filter(|secs| *secs > 0) {
        merged.reminders.high_interval_secs = secs;
    }
    if let Some(secs) = overrides.normal_interval_secs.filter(|secs| *secs > 0) {
        merged.reminders.normal_interval_secs = secs;
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::{
        Config, ConfigOverrides, ReminderSettings, canonical_theme_name, load_config_from_path,
        load_config_with_fallback_from_path, merge_overrides, palette_for_theme,
    };
    use crate::model::{Priority, Tag};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    fn temp_path(file_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("duebell-{nanos}-{file_name}"))
    }

    #[test]
    fn load_config_missing_returns_defaults_without_error() {
        let path = temp_path("missing-config.json");
        let result = load_config_with_fallback_from_path(&path);

        assert_eq!(result.config, Config::default());
        assert_eq!(result.config.reminders.tick_secs, 2);
        assert_eq!(result.config.reminders.high_interval_secs, 300);
        assert_eq!(result.config.reminders.normal_interval_secs, 900);
        assert!(result.error.is_none());
    }

    #[test]
    fn load_config_invalid_returns_defaults_and_error() {
        let path = temp_path("invalid-config.json");
        fs::write(&path, "{ invalid json ").unwrap();

        let result = load_config_with_fallback_from_path(&path);
        fs::remove_file(&path).ok();

        assert_eq!(result.config, Config::default());
        assert!(result.error.is_some());
    }

    #[test]
    fn load_config_reads_valid_file() {
        let path = temp_path("valid-config.json");
        let content = serde_json::json!({
            "theme": "Dark Mode",
            "reminders": {
                "high_interval_secs": 120
            }
        });
        fs::write(&path, serde_json::to_string(&content).unwrap()).unwrap();

        let loaded = load_config_from_path(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(loaded.theme.as_deref(), Some("noir"));
        assert_eq!(loaded.reminders.high_interval_secs, 120);
        assert_eq!(loaded.reminders.normal_interval_secs, 900);
    }

    #[test]
    fn load_config_rejects_zero_tick() {
        let path = temp_path("zero-tick.json");
        fs::write(&path, r#"{"reminders": {"tick_secs": 0}}"#).unwrap();

        let result = load_config_with_fallback_from_path(&path);
        fs::remove_file(&path).ok();

        assert_eq!(result.config, Config::default());
        assert_eq!(result.error.unwrap().code(), "invalid_data");
    }

    #[test]
    fn merge_overrides_updates_theme_and_timing() {
        let base = Config {
            theme: Some("light".into()),
            reminders: ReminderSettings::default(),
        };

        let overrides = ConfigOverrides {
            theme: Some("noir".into()),
            tick_secs: Some(5),
            high_interval_secs: None,
            normal_interval_secs: Some(600),
        };

        let merged = merge_overrides(&base, &overrides);
        assert_eq!(merged.theme.as_deref(), Some("noir"));
        assert_eq!(merged.reminders.tick_secs, 5);
        assert_eq!(merged.reminders.high_interval_secs, 300);
        assert_eq!(merged.reminders.normal_interval_secs, 600);
        assert_eq!(base.reminders.tick_secs, 2);
    }

    #[test]
    fn merge_overrides_ignores_zero_durations() {
        let base = Config::default();
        let overrides = ConfigOverrides {
            tick_secs: Some(0),
            ..ConfigOverrides::default()
        };

        assert_eq!(merge_overrides(&base, &overrides), base);
    }

    #[test]
    fn tick_is_at_least_one_second() {
        let settings = ReminderSettings {
            tick_secs: 0,
            ..ReminderSettings::default()
        };
        assert_eq!(settings.tick(), Duration::from_secs(1));
    }

    #[test]
    fn canonical_theme_name_maps_variants() {
        assert_eq!(canonical_theme_name("Vanilla"), Some("default".into()));
        assert_eq!(canonical_theme_name("Noir"), Some("noir".into()));
        assert_eq!(canonical_theme_name("Solarized"), Some("solarized".into()));
        assert_eq!(canonical_theme_name("dark-mode"), Some("noir".into()));
        assert_eq!(canonical_theme_name("  "), Some("default".into()));
    }

    #[test]
    fn palette_for_theme_returns_palette() {
        let default_palette = palette_for_theme(Some("vanilla"));
        assert!(default_palette.accent.is_empty());
        assert_eq!(default_palette.accentize("Overdue"), "Overdue");

        let noir_palette = palette_for_theme(Some("noir"));
        assert_eq!(noir_palette.accent, "\x1b[38;5;208m");
        assert_eq!(
            noir_palette.mutedize("Completed"),
            "\x1b[38;5;250mCompleted\x1b[0m"
        );
    }

    #[test]
    fn paint_tag_highlights_overdue_and_fades_completed() {
        let palette = palette_for_theme(Some("solarized"));

        assert_eq!(palette.paint_tag(Tag::Overdue), "\x1b[38;5;108mOverdue\x1b[0m");
        assert_eq!(
            palette.paint_tag(Tag::Completed),
            "\x1b[38;5;250mCompleted\x1b[0m"
        );
        assert_eq!(palette.paint_tag(Tag::Priority(Priority::Low)), "Low");
    }
}
