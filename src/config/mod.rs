use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Recent symbols kept for Up/Down recall
pub const MAX_RECENT_SYMBOLS: usize = 10;

const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Optional colour overrides, as `#RRGGBB` or `#RGB`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThemeOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub danger: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_dim: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the stock data server
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Where exported charts are written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart_dir: Option<PathBuf>,

    /// Show desktop notifications when a result arrives
    #[serde(default)]
    pub notifications: bool,

    /// Most recent first
    #[serde(default)]
    pub recent_symbols: Vec<String>,

    #[serde(default)]
    pub theme: ThemeOverrides,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            chart_dir: None,
            notifications: false,
            recent_symbols: Vec::new(),
            theme: ThemeOverrides::default(),
        }
    }
}

impl AppConfig {
    /// Get the config directory, creating it if needed
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("tickerpane");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir)
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Ok(path) => Ok(Self::load_from(&path)),
            Err(_) => Ok(AppConfig::default()),
        }
    }

    fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Failed to parse config: {}", e),
                },
                Err(e) => tracing::warn!("Failed to read config: {}", e),
            }
            // A broken file is left as is
            return AppConfig::default();
        }

        let config = AppConfig::default();
        let _ = config.save_to(path);
        config
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        let mut clean_config = self.clone();

        clean_config.endpoint = clean_config.endpoint.trim().to_string();
        if clean_config.endpoint.is_empty() {
            clean_config.endpoint = default_endpoint();
        }
        clean_config.recent_symbols = clean_symbols(&clean_config.recent_symbols);

        let content = toml::to_string_pretty(&clean_config)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// Directory for exported charts
    pub fn chart_dir(&self) -> PathBuf {
        if let Some(dir) = &self.chart_dir {
            return dir.clone();
        }
        dirs::download_dir()
            .map(|d| d.join("tickerpane"))
            .unwrap_or_else(|| PathBuf::from("charts"))
    }

    /// Move `symbol` to the front of the recent list
    pub fn remember_symbol(&mut self, symbol: &str) {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return;
        }
        self.recent_symbols.retain(|s| s != &symbol);
        self.recent_symbols.insert(0, symbol);
        self.recent_symbols.truncate(MAX_RECENT_SYMBOLS);
    }
}

/// Drop blanks, escape codes and duplicates, keep order, cap length
fn clean_symbols(symbols: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for s in symbols {
        let s = s.trim().to_uppercase();
        if s.is_empty() || s.contains('\x1b') || out.contains(&s) {
            continue;
        }
        out.push(s);
        if out.len() == MAX_RECENT_SYMBOLS {
            break;
        }
    }
    out
}
