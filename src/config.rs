use std::path::{Path, PathBuf};
use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOGIN_URL: &str = "/login";
const APP_DIR_NAME: &str = ".tagmark";
const CONFIG_FILE_NAME: &str = "config.json";
const DB_FILE_NAME: &str = "tagmark.db.jsonl";

/// Settings persisted in the config file. Everything is optional; unset keys fall back to
/// defaults and command line arguments win over the file.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct FileConfig {
    pub workdir: Option<String>,
    pub port: Option<u16>,
    pub login_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub config_path: PathBuf,
    pub file_config: FileConfig,
    pub workdir: PathBuf,
    pub db_path: PathBuf,
    pub port: Option<u16>,
    pub login_url: String,
}

impl AppConfig {
    pub fn new(config_path: Option<PathBuf>, workdir: Option<String>, port: Option<u16>) -> anyhow::Result<Self> {
        let config_path = match config_path {
            Some(path) => path,
            None => default_app_dir()?.join(CONFIG_FILE_NAME),
        };
        let file_config = read_file_config(&config_path)?;

        let workdir = match workdir.or_else(|| file_config.workdir.clone()) {
            Some(dir) => PathBuf::from(dir),
            None => default_app_dir()?,
        };
        let workdir = get_or_create_workdir(&workdir)?;
        let db_path = workdir.join(DB_FILE_NAME);
        let port = port.or(file_config.port);
        let login_url = file_config.login_url.clone().unwrap_or_else(|| DEFAULT_LOGIN_URL.to_string());

        Ok(Self { config_path, file_config, workdir, db_path, port, login_url })
    }
}

fn default_app_dir() -> anyhow::Result<PathBuf> {
    let home = home::home_dir().context("failed to locate home directory")?;
    Ok(home.join(APP_DIR_NAME))
}

fn get_or_create_workdir(workdir: &Path) -> anyhow::Result<PathBuf> {
    if !workdir.exists() {
        std::fs::create_dir_all(workdir)
            .with_context(|| format!("failed to create workdir {}", workdir.display()))?;
    }
    if !workdir.is_dir() {
        anyhow::bail!("workdir is not a directory: {}", workdir.display());
    }
    let workdir = workdir.canonicalize()?;
    info!("workdir: {}", workdir.display());
    Ok(workdir)
}

pub fn read_file_config(config_path: &Path) -> anyhow::Result<FileConfig> {
    if !config_path.exists() {
        return Ok(FileConfig::default());
    }
    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read config {}", config_path.display()))?;
    if content.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    let file_config = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config {}", config_path.display()))?;
    Ok(file_config)
}

pub fn write_file_config(config_path: &Path, file_config: &FileConfig) -> anyhow::Result<()> {
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(file_config)?;
    std::fs::write(config_path, content)
        .with_context(|| format!("failed to write config {}", config_path.display()))?;
    Ok(())
}
