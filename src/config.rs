use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub auth: AuthConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub token: Option<String>,
    pub token_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token: None,
            token_path: "~/.wachat/token".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub poll_interval_seconds: u64,
    pub push_enabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 5,
            push_enabled: true,
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn resolve_config_path() -> PathBuf {
    env::var("WACHAT_CONFIG")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(|| expand_tilde("~/.wachat/config.json"))
}

pub fn load_config() -> Config {
    let config_path = resolve_config_path();

    let mut cfg = Config::default();

    if config_path.exists() {
        if let Ok(raw) = fs::read_to_string(&config_path) {
            if let Ok(file_cfg) = serde_json::from_str::<Config>(&raw) {
                cfg = file_cfg;
            }
        }
    }

    // Override from environment
    if let Ok(url) = env::var("WACHAT_API_BASE_URL") {
        if !url.trim().is_empty() {
            cfg.api.base_url = url.trim_end_matches('/').to_string();
        }
    }

    if let Ok(token) = env::var("WACHAT_TOKEN") {
        if !token.trim().is_empty() {
            cfg.auth.token = Some(token);
        }
    }

    if let Ok(interval) = env::var("WACHAT_POLL_INTERVAL_SECONDS") {
        if let Ok(seconds) = interval.trim().parse::<u64>() {
            if seconds > 0 {
                cfg.sync.poll_interval_seconds = seconds;
            }
        }
    }

    if let Ok(enabled) = env::var("WACHAT_PUSH_ENABLED") {
        match enabled.trim() {
            "0" | "false" | "no" => cfg.sync.push_enabled = false,
            "1" | "true" | "yes" => cfg.sync.push_enabled = true,
            _ => {}
        }
    }

    if cfg.auth.token.is_none() {
        cfg.auth.token = load_token(&cfg.auth.token_path);
    }

    cfg
}

/// Read the bearer token from its file, the persistent-storage analog of a
/// browser's local storage. Missing or empty file means no token.
pub fn load_token(token_path: &str) -> Option<String> {
    let path = expand_tilde(token_path);
    let raw = fs::read_to_string(path).ok()?;
    let token = raw.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub fn store_token(token_path: &str, token: &str) -> std::io::Result<()> {
    let path = expand_tilde(token_path);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, token)
}

pub fn clear_token(token_path: &str) -> std::io::Result<()> {
    let path = expand_tilde(token_path);
    match fs::remove_file(path) {
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
