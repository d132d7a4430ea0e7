//! Configuration loader with tier-based merging.
//!
//! Tiers, lowest to highest precedence: embedded defaults, project file,
//! user file, environment variables. An explicit config file replaces both
//! file tiers.

use super::merge::deep_merge_all;
use super::types::Config;
use crate::logging::LogLevel;
use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "MIRROR_SYNC_CONFIG_PATH";
pub const ENV_API_TOKEN: &str = "MIRROR_SYNC_API_TOKEN";
pub const ENV_BASE_URL: &str = "MIRROR_SYNC_BASE_URL";
pub const ENV_DB_PATH: &str = "MIRROR_SYNC_DB_PATH";
pub const ENV_RULES_PATH: &str = "MIRROR_SYNC_RULES_PATH";
pub const ENV_LOG_LEVEL: &str = "MIRROR_SYNC_LOG_LEVEL";
pub const ENV_POLL_INTERVAL: &str = "MIRROR_SYNC_POLL_INTERVAL";

const CONFIG_FILE: &str = "config.yaml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    Defaults = 0,
    Project = 1,
    User = 2,
    Environment = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::Project => write!(f, "project"),
            ConfigTier::User => write!(f, "user"),
            ConfigTier::Environment => write!(f, "environment"),
        }
    }
}

/// Where each file tier is looked up.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// `./mirror-sync` by default.
    pub project_dir: Option<PathBuf>,
    /// `~/.mirror-sync` by default.
    pub user_dir: Option<PathBuf>,
    /// Replaces the project and user files when set.
    pub explicit_file: Option<PathBuf>,
}

impl ConfigPaths {
    pub fn discover() -> Self {
        Self {
            project_dir: Some(PathBuf::from("mirror-sync")),
            user_dir: dirs::home_dir().map(|home| home.join(".mirror-sync")),
            explicit_file: std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from),
        }
    }

    pub fn with_dirs(project_dir: Option<PathBuf>, user_dir: Option<PathBuf>) -> Self {
        Self {
            project_dir,
            user_dir,
            explicit_file: None,
        }
    }

    pub fn with_explicit_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_file = Some(path.into());
        self
    }
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let value: Value = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    Ok(value)
}

#[derive(Debug, Clone)]
pub struct ConfigLoader {
    pub paths: ConfigPaths,
    config: Config,
    /// Files that contributed, lowest tier first.
    sources: Vec<(ConfigTier, PathBuf)>,
}

impl ConfigLoader {
    /// Load from the discovered paths and the process environment.
    pub fn load() -> Result<Self> {
        Self::load_with(ConfigPaths::discover(), |name| std::env::var(name).ok())
    }

    /// Load with explicit paths and an environment lookup.
    pub fn load_with(paths: ConfigPaths, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut tiers = vec![serde_json::to_value(Config::default())?];
        let mut sources = Vec::new();

        match &paths.explicit_file {
            Some(file) => {
                tiers.push(read_yaml(file)?);
                sources.push((ConfigTier::Project, file.clone()));
            }
            None => {
                let tier_dirs = [
                    (ConfigTier::Project, &paths.project_dir),
                    (ConfigTier::User, &paths.user_dir),
                ];
                for (tier, dir) in tier_dirs {
                    let Some(dir) = dir else { continue };
                    let file = dir.join(CONFIG_FILE);
                    if file.exists() {
                        tiers.push(read_yaml(&file)?);
                        sources.push((tier, file));
                    }
                }
            }
        }

        let merged = deep_merge_all(tiers);
        let mut config: Config =
            serde_json::from_value(merged).context("invalid merged configuration")?;

        Self::apply_env_overrides(&mut config, env)?;

        Ok(Self {
            paths,
            config,
            sources,
        })
    }

    fn apply_env_overrides(
        config: &mut Config,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(token) = env(ENV_API_TOKEN) {
            config.service.api_token = token;
        }
        if let Some(base_url) = env(ENV_BASE_URL) {
            config.service.base_url = base_url;
        }
        if let Some(db_path) = env(ENV_DB_PATH) {
            config.store.db_path = PathBuf::from(db_path);
        }
        if let Some(rules_path) = env(ENV_RULES_PATH) {
            config.sync.rules_path = PathBuf::from(rules_path);
        }
        if let Some(level) = env(ENV_LOG_LEVEL) {
            config.logging.level = LogLevel::parse(&level)
                .ok_or_else(|| anyhow!("{ENV_LOG_LEVEL}: unknown log level {level:?}"))?;
        }
        if let Some(interval) = env(ENV_POLL_INTERVAL) {
            config.sync.poll_interval_seconds = interval
                .trim()
                .parse()
                .with_context(|| {
                    format!("{ENV_POLL_INTERVAL}: expected seconds, got {interval:?}")
                })?;
        }
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    pub fn sources(&self) -> &[(ConfigTier, PathBuf)] {
        &self.sources
    }
}
