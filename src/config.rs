use crate::db::{self, Database};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
pub const API_URL_ENV: &str = "REFLECT_BOX_API_URL";

pub const SETTING_KEYS: &[&str] = &["api_base_url", "input_mode"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Text,
    Voice,
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(InputMode::Text),
            "voice" => Ok(InputMode::Voice),
            other => Err(format!("Unknown input mode: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_base_url: String,
    pub input_mode: InputMode,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            input_mode: InputMode::default(),
        }
    }
}

impl AppConfig {
    /// Stored settings over defaults; the environment wins for the API URL.
    pub fn load(db: &Database) -> db::Result<Self> {
        let mut config = Self::default();
        if let Some(url) = db.get_setting("api_base_url")? {
            config.api_base_url = url;
        }
        if let Some(mode) = db.get_setting("input_mode")? {
            match mode.parse() {
                Ok(mode) => config.input_mode = mode,
                Err(e) => tracing::warn!(error = %e, "ignoring stored input mode"),
            }
        }
        Ok(config.with_env_override(std::env::var(API_URL_ENV).ok()))
    }

    fn with_env_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        self
    }
}

/// Checks a value before it is written to the settings table.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "api_base_url" => {
            let value = value.trim();
            if value.starts_with("http://") || value.starts_with("https://") {
                Ok(())
            } else {
                Err(format!("api_base_url must be an http(s) URL, got '{}'", value))
            }
        }
        "input_mode" => value.parse::<InputMode>().map(|_| ()),
        _ => Err(format!("Unknown setting key: {}", key)),
    }
}
