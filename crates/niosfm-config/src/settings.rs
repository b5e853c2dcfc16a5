use crate::paths::AppPaths;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct AppConfig {
    pub grid: GridConfig,
    pub ui: UiConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppConfigLayer {
    pub grid: Option<GridConfigLayer>,
    pub ui: Option<UiConfigLayer>,
    pub logging: Option<LoggingConfigLayer>,
}

impl AppConfigLayer {
    pub fn apply_to(self, cfg: &mut AppConfig) {
        if let Some(layer) = self.grid {
            cfg.grid.apply(layer);
        }
        if let Some(layer) = self.ui {
            cfg.ui.apply(layer);
        }
        if let Some(layer) = self.logging {
            cfg.logging.apply(layer);
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct GridConfig {
    pub wapi_version: String,
    pub verify_tls: bool,
    pub timeout_ms: u64,
    pub directory: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            wapi_version: "2.13".to_string(),
            verify_tls: true,
            timeout_ms: 30000,
            directory: "/".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct GridConfigLayer {
    pub wapi_version: Option<String>,
    pub verify_tls: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub directory: Option<String>,
}

impl GridConfig {
    fn apply(&mut self, layer: GridConfigLayer) {
        if let Some(v) = layer.wapi_version {
            self.wapi_version = v;
        }
        if let Some(v) = layer.verify_tls {
            self.verify_tls = v;
        }
        if let Some(v) = layer.timeout_ms {
            self.timeout_ms = v;
        }
        if let Some(v) = layer.directory {
            self.directory = v;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UiConfig {
    pub scrollback_lines: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            scrollback_lines: 1000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct UiConfigLayer {
    pub scrollback_lines: Option<usize>,
}

impl UiConfig {
    fn apply(&mut self, layer: UiConfigLayer) {
        if let Some(v) = layer.scrollback_lines {
            self.scrollback_lines = v;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            stdout: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct LoggingConfigLayer {
    pub level: Option<String>,
    pub json: Option<bool>,
    pub stdout: Option<bool>,
}

impl LoggingConfig {
    fn apply(&mut self, layer: LoggingConfigLayer) {
        if let Some(v) = layer.level {
            self.level = v;
        }
        if let Some(v) = layer.json {
            self.json = v;
        }
        if let Some(v) = layer.stdout {
            self.stdout = v;
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConfigManager {
    pub paths: AppPaths,
}

impl ConfigManager {
    pub fn new(paths: AppPaths) -> Self {
        Self { paths }
    }

    pub fn load(
        &self,
        cwd: Option<&Path>,
        explicit: Option<&Path>,
        overrides: Option<AppConfigLayer>,
    ) -> Result<AppConfig> {
        let mut cfg = AppConfig::default();

        if self.paths.config_file.exists() {
            let layer = Self::load_layer(&self.paths.config_file)?;
            layer.apply_to(&mut cfg);
        }

        if let Some(dir) = cwd {
            let project_path = AppPaths::project_config_path(dir);
            if project_path.exists() {
                let layer = Self::load_layer(&project_path)?;
                layer.apply_to(&mut cfg);
            }
        }

        if let Some(path) = explicit {
            let layer = Self::load_layer(path)?;
            layer.apply_to(&mut cfg);
        }

        if let Some(layer) = overrides {
            layer.apply_to(&mut cfg);
        }

        Ok(cfg)
    }

    pub fn load_layer(path: &Path) -> Result<AppConfigLayer, ConfigError> {
        debug!(path = %path.display(), "loading config layer");
        let content = fs::read_to_string(path)?;
        let layer: AppConfigLayer = toml::from_str(&content)?;
        Ok(layer)
    }

    pub fn save_default(&self) -> Result<()> {
        self.save_config(&AppConfig::default())
    }

    pub fn save_config(&self, cfg: &AppConfig) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(cfg).map_err(|e| anyhow::anyhow!(e))?;
        fs::write(&self.paths.config_file, content)?;
        Ok(())
    }
}
