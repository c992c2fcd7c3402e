use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".TeamRules";
const CONFIG_FILE: &str = "config.json";
pub const DEFAULT_SAMPLE_INTERVAL_SECONDS: u64 = 5;
pub const MAX_SAMPLE_INTERVAL_SECONDS: u64 = 3600;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: PathBuf,
    pub api_port: u16,
    pub sample_interval_seconds: u64,
    pub top_apps_limit: usize,
    pub suggestion_limit: usize,
    pub seed_on_serve: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_root_dir().join("db").join("team_rules.db"),
            api_port: 7891,
            sample_interval_seconds: DEFAULT_SAMPLE_INTERVAL_SECONDS,
            top_apps_limit: 10,
            suggestion_limit: 20,
            seed_on_serve: true,
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        Ok(config)
    }

    /// Rejects values a hand-edited config file can carry but `set_value` refuses.
    pub fn validate(&self) -> Result<()> {
        check_sample_interval(self.sample_interval_seconds)?;
        if self.top_apps_limit == 0 {
            bail!("top_apps_limit must be greater than zero");
        }
        if self.suggestion_limit == 0 {
            bail!("suggestion_limit must be greater than zero");
        }

        Ok(())
    }

    /// Falls back to defaults when no config file has been written yet.
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load()
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "db_path" => {
                if value.trim().is_empty() {
                    bail!("db_path must not be empty");
                }
                self.db_path = expand_home(value.trim());
            }
            "api_port" => {
                self.api_port = value
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            "sample_interval_seconds" => {
                let parsed = value
                    .parse::<u64>()
                    .map_err(|_| anyhow!("sample_interval_seconds must be a number"))?;
                check_sample_interval(parsed)?;
                self.sample_interval_seconds = parsed;
            }
            "top_apps_limit" => {
                self.top_apps_limit = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("top_apps_limit must be a number"))?
                    .max(1);
            }
            "suggestion_limit" => {
                self.suggestion_limit = value
                    .parse::<usize>()
                    .map_err(|_| anyhow!("suggestion_limit must be a number"))?
                    .max(1);
            }
            "seed_on_serve" => {
                self.seed_on_serve = value
                    .parse::<bool>()
                    .map_err(|_| anyhow!("seed_on_serve must be true/false"))?;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: db_path|db.path, api_port|api.port, sample_interval_seconds|report.sample_interval_seconds, top_apps_limit|report.top_apps, suggestion_limit|suggest.limit, seed_on_serve|serve.seed"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "db_path" => Some(self.db_path.display().to_string()),
            "api_port" => Some(self.api_port.to_string()),
            "sample_interval_seconds" => Some(self.sample_interval_seconds.to_string()),
            "top_apps_limit" => Some(self.top_apps_limit.to_string()),
            "suggestion_limit" => Some(self.suggestion_limit.to_string()),
            "seed_on_serve" => Some(self.seed_on_serve.to_string()),
            _ => None,
        }
    }
}

fn check_sample_interval(seconds: u64) -> Result<()> {
    if !(1..=MAX_SAMPLE_INTERVAL_SECONDS).contains(&seconds) {
        bail!("sample_interval_seconds must be between 1 and {MAX_SAMPLE_INTERVAL_SECONDS}");
    }

    Ok(())
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "db_path" | "db.path" => "db_path",
        "api_port" | "api.port" => "api_port",
        "sample_interval_seconds" | "report.sample_interval_seconds" => "sample_interval_seconds",
        "top_apps_limit" | "report.top_apps" => "top_apps_limit",
        "suggestion_limit" | "suggest.limit" => "suggestion_limit",
        "seed_on_serve" | "serve.seed" => "seed_on_serve",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
