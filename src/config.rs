use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitor: MonitorConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub update_interval_ms: u64,
    pub show_kernel_threads: bool,
    pub copy_workers: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            update_interval_ms: 1000,
            show_kernel_threads: false,
            copy_workers: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub top: usize,
    pub show_parent_pid: bool,
    pub show_module_id: bool,
    pub show_threads: bool,
    pub show_priority: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            top: 20,
            show_parent_pid: false,
            show_module_id: false,
            show_threads: true,
            show_priority: false,
        }
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("procscope").join("config.toml"))
}

pub fn load_config() -> Config {
    match config_path() {
        Some(path) if path.exists() => load_config_from_path(&path),
        _ => Config::default(),
    }
}

pub fn load_config_from_path(path: &Path) -> Config {
    match std::fs::read_to_string(path) {
        Ok(contents) => toml::from_str(&contents).unwrap_or_default(),
        Err(_) => Config::default(),
    }
}
