use flowgate_core::DEFAULT_TENANT;
use flowgate_core::engine::ModuleGrants;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub fixture: FixtureConfig,
    pub tenant: TenantConfig,
    pub modules: ModuleConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TenantConfig {
    pub default_id: String,
}

/// Module grants applied to users whose fixture entry carries none.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModuleConfig {
    pub view: bool,
    pub operate: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: String,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            default_id: DEFAULT_TENANT.to_string(),
        }
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            view: true,
            operate: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            level: "warn".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e.to_string()))?;
            toml::from_str::<AppConfig>(&contents)
                .map_err(|e| ConfigError::ParseToml(e.to_string()))?
        } else {
            AppConfig::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FLOWGATE_FIXTURE") {
            self.fixture.path = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("FLOWGATE_TENANT") {
            self.tenant.default_id = v;
        }
        if let Ok(v) = std::env::var("FLOWGATE_MODULE_VIEW")
            && let Ok(b) = v.parse()
        {
            self.modules.view = b;
        }
        if let Ok(v) = std::env::var("FLOWGATE_MODULE_OPERATE")
            && let Ok(b) = v.parse()
        {
            self.modules.operate = b;
        }
        if let Ok(v) = std::env::var("FLOWGATE_LOG_LEVEL") {
            self.log.level = v;
        }
        if let Ok(v) = std::env::var("FLOWGATE_LOG_FORMAT") {
            match v.as_str() {
                "json" => self.log.format = LogFormat::Json,
                "pretty" => self.log.format = LogFormat::Pretty,
                _ => {}
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tenant.default_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "tenant.default_id must not be empty".to_string(),
            ));
        }
        if self.log.level.trim().is_empty() {
            return Err(ConfigError::Validation(
                "log.level must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn module_grants(&self) -> ModuleGrants {
        ModuleGrants {
            view: self.modules.view,
            operate: self.modules.operate,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{0}': {1}")]
    ReadFile(String, String),

    #[error("failed to parse TOML config: {0}")]
    ParseToml(String),

    #[error("config validation failed: {0}")]
    Validation(String),
}
