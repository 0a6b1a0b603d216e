use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use directories::BaseDirs;

use crate::scheduler::Periods;

/// Overrides `base_url` from the config file when set.
pub const URL_ENV: &str = "WHATSPY_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AppState {
    pub base_url: String,
    #[serde(default)]
    pub polling: Polling,
}

/// Poll periods in seconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Polling {
    pub chat_secs: u64,
    pub conversations_secs: u64,
    pub stats_secs: u64,
}

impl Default for Polling {
    fn default() -> Self {
        Self { chat_secs: 3, conversations_secs: 10, stats_secs: 30 }
    }
}

impl Polling {
    pub fn periods(&self) -> Periods {
        let secs = |s: u64| Duration::from_secs(s.max(1));
        Periods {
            chat: secs(self.chat_secs),
            conversations: secs(self.conversations_secs),
            stats: secs(self.stats_secs),
        }
    }
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    fn toml_path() -> Option<PathBuf> {
        let base = BaseDirs::new()?;
        let cfg_dir = base.config_dir();
        Some(cfg_dir.join("whatspy.toml"))
    }

    pub fn load() -> Self {
        let state = Self::toml_path().map(|p| Self::load_from(&p)).unwrap_or_default();
        state.with_env_url(std::env::var(URL_ENV).ok())
    }

    /// Missing or malformed files fall back to defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(text) => toml::from_str::<AppState>(&text).unwrap_or_else(|e| {
                log::warn!("ignoring malformed {}: {}", path.display(), e);
                Self::new()
            }),
            Err(_) => Self::new(),
        }
    }

    pub fn with_env_url(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
    }

    pub fn save(&self) -> std::io::Result<()> {
        if let Some(path) = Self::toml_path() {
            self.save_to(&path)
        } else {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "No config dir"))
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let toml = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
        fs::write(path, toml)
    }
}

#[cfg(feature = "gui")]
pub fn build_ui(app: &adw::Application) {
    let state = AppState::load();
    if state.is_configured() {
        crate::ui::main_window::show_main_window(app, state);
    } else {
        crate::ui::login::show_login_window(app);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polling_defaults_when_missing() {
        let state: AppState = toml::from_str(r#"base_url = "http://localhost:8000""#).unwrap();
        assert_eq!(state.polling, Polling::default());
        assert_eq!(state.polling.periods(), Periods::default());
    }

    #[test]
    fn partial_polling_table_keeps_other_defaults() {
        let state: AppState =
            toml::from_str("base_url = \"h\"\n[polling]\nchat_secs = 0\n").unwrap();
        assert_eq!(state.polling.chat_secs, 0);
        assert_eq!(state.polling.stats_secs, 30);
        assert_eq!(state.polling.periods().chat, Duration::from_secs(1));
    }

    #[test]
    fn env_url_wins_over_file() {
        let state = AppState { base_url: "http://file".into(), ..Default::default() };
        assert_eq!(state.clone().with_env_url(Some("http://env".into())).base_url, "http://env");
        assert_eq!(state.clone().with_env_url(Some("  ".into())).base_url, "http://file");
        assert_eq!(state.with_env_url(None).base_url, "http://file");
    }

    #[test]
    fn save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("whatspy.toml");
        let state = AppState {
            base_url: "http://relay:8000".into(),
            polling: Polling { chat_secs: 5, ..Default::default() },
        };
        state.save_to(&path).unwrap();
        assert_eq!(AppState::load_from(&path), state);
        assert_eq!(AppState::load_from(&dir.path().join("missing.toml")), AppState::new());
    }
}
