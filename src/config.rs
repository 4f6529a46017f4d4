use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

pub const PROCESS_CHECK_NAME: &str = "bot_process";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub listen: String,
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default = "default_required")]
    pub required: Vec<RequiredPathConfig>,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub recent_logs: RecentLogsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_service_version")]
    pub version: String,
    #[serde(default)]
    pub bot: BotIdentity,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotIdentity {
    pub username: String,
    pub name: String,
    pub admin_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessBackend {
    Ps,
    Sysinfo,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_process_pattern")]
    pub pattern: String,
    #[serde(default = "default_process_backend")]
    pub backend: ProcessBackend,
    #[serde(default = "default_process_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_true")]
    pub critical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    File,
    Directory,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequiredPathConfig {
    pub path: String,
    #[serde(default = "default_path_kind")]
    pub kind: PathKind,
    #[serde(default)]
    pub critical: bool,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InventoryConfig {
    #[serde(default = "default_inventory_dirs")]
    pub dirs: Vec<String>,
    #[serde(default = "default_max_read_bytes")]
    pub max_read_bytes: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecentLogsConfig {
    #[serde(default = "default_log_files")]
    pub files: Vec<String>,
    #[serde(default = "default_tail_lines")]
    pub tail_lines: usize,
    #[serde(default = "default_tail_read_bytes")]
    pub max_read_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            root: default_root(),
            service: ServiceConfig::default(),
            process: ProcessConfig::default(),
            required: default_required(),
            inventory: InventoryConfig::default(),
            recent_logs: RecentLogsConfig::default(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            version: default_service_version(),
            bot: BotIdentity::default(),
        }
    }
}

impl Default for BotIdentity {
    fn default() -> Self {
        Self {
            username: "PremiumGeneratorBot".to_string(),
            name: "Premium Account Generator".to_string(),
            admin_id: 6675722513,
        }
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            pattern: default_process_pattern(),
            backend: default_process_backend(),
            timeout_ms: default_process_timeout_ms(),
            critical: true,
        }
    }
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            dirs: default_inventory_dirs(),
            max_read_bytes: default_max_read_bytes(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl Default for RecentLogsConfig {
    fn default() -> Self {
        Self {
            files: default_log_files(),
            tail_lines: default_tail_lines(),
            max_read_bytes: default_tail_read_bytes(),
        }
    }
}

impl RequiredPathConfig {
    pub fn check_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.path)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation("listen is required".to_string()));
        }
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "listen must be a valid host:port address".to_string(),
            ));
        }

        validate_process(&self.process)?;
        validate_required(&self.required)?;
        validate_inventory(&self.inventory)?;
        validate_recent_logs(&self.recent_logs)?;

        Ok(())
    }

    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_process(cfg: &ProcessConfig) -> Result<(), ConfigError> {
    if !cfg.enabled {
        return Ok(());
    }
    if cfg.pattern.trim().is_empty() {
        return Err(ConfigError::Validation(
            "process.pattern must not be empty".to_string(),
        ));
    }
    if cfg.timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "process.timeout_ms must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn validate_required(entries: &[RequiredPathConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    names.insert(PROCESS_CHECK_NAME.to_string());
    for entry in entries {
        if entry.path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "required[*].path must not be empty".to_string(),
            ));
        }
        let name = entry.check_name();
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "required '{}' name must not be empty",
                entry.path
            )));
        }
        if !names.insert(name.to_string()) {
            return Err(ConfigError::Validation(format!(
                "check name '{name}' must be unique"
            )));
        }
    }
    Ok(())
}

fn validate_inventory(cfg: &InventoryConfig) -> Result<(), ConfigError> {
    if cfg.max_read_bytes == 0 {
        return Err(ConfigError::Validation(
            "inventory.max_read_bytes must be > 0".to_string(),
        ));
    }
    if cfg.read_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "inventory.read_timeout_ms must be > 0".to_string(),
        ));
    }
    if cfg.dirs.iter().any(|d| d.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "inventory.dirs[*] must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_recent_logs(cfg: &RecentLogsConfig) -> Result<(), ConfigError> {
    if cfg.tail_lines < 1 {
        return Err(ConfigError::Validation(
            "recent_logs.tail_lines must be >= 1".to_string(),
        ));
    }
    if cfg.max_read_bytes == 0 {
        return Err(ConfigError::Validation(
            "recent_logs.max_read_bytes must be > 0".to_string(),
        ));
    }
    Ok(())
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_service_name() -> String {
    "telegram-bot".to_string()
}

fn default_service_version() -> String {
    "1.0.0".to_string()
}

const fn default_true() -> bool {
    true
}

fn default_process_pattern() -> String {
    "bot.py".to_string()
}

const fn default_process_backend() -> ProcessBackend {
    ProcessBackend::Ps
}

const fn default_process_timeout_ms() -> u64 {
    3000
}

const fn default_path_kind() -> PathKind {
    PathKind::File
}

fn default_required() -> Vec<RequiredPathConfig> {
    let entry = |path: &str, kind: PathKind, critical: bool| RequiredPathConfig {
        path: path.to_string(),
        kind,
        critical,
        name: None,
    };
    vec![
        entry("bot.py", PathKind::File, true),
        entry("Dockerfile", PathKind::File, true),
        entry("requirements.txt", PathKind::File, true),
        entry("keys.json", PathKind::File, false),
        entry("bot_data.pkl", PathKind::File, false),
        entry("logs", PathKind::Directory, false),
        entry("Generated_Results", PathKind::Directory, false),
        entry("database", PathKind::Directory, false),
        entry("backups", PathKind::Directory, false),
        entry("temp", PathKind::Directory, false),
    ]
}

fn default_inventory_dirs() -> Vec<String> {
    vec![
        "Generated_Results".to_string(),
        "logs".to_string(),
        "database".to_string(),
    ]
}

const fn default_max_read_bytes() -> u64 {
    4 * 1024 * 1024
}

const fn default_read_timeout_ms() -> u64 {
    2000
}

fn default_log_files() -> Vec<String> {
    vec!["error.log".to_string(), "bot.log".to_string()]
}

const fn default_tail_lines() -> usize {
    10
}

const fn default_tail_read_bytes() -> u64 {
    64 * 1024
}
