use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for the work order service
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkOrderFlowConfig {
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Database settings (optional, in-memory store when absent)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level, or any `EnvFilter` directive
    pub log_level: String,
    /// Emit JSON lines instead of human readable logs
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://.work-order-flow/work-order-flow.db".to_string(),
            max_connections: 5,
            auto_migrate: true,
        }
    }
}

impl Default for WorkOrderFlowConfig {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig::default(),
            database: Some(DatabaseConfig::default()),
        }
    }
}

impl WorkOrderFlowConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (work-order-flow.toml, .work-order-flow-rc)
    /// 3. Environment variables (prefixed with WORK_ORDER_FLOW__)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`load`](Self::load) with config files resolved against `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        let toml_path = dir.join("work-order-flow.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".work-order-flow-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        // Override with environment variables, e.g. WORK_ORDER_FLOW__DATABASE__URL
        builder = builder.add_source(
            Environment::with_prefix("WORK_ORDER_FLOW")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<WorkOrderFlowConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = WorkOrderFlowConfig::load_env_file();
        WorkOrderFlowConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static WorkOrderFlowConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup, before telemetry exists)
pub fn init_config() -> Result<()> {
    config()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = WorkOrderFlowConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.observability.json);
        assert_eq!(config.database, Some(DatabaseConfig::default()));
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("work-order-flow.toml"),
            "[observability]\nlog_level = \"debug\"\njson = true\n\n[database]\nurl = \"sqlite://fleet.db\"\nmax_connections = 2\nauto_migrate = false\n",
        )
        .unwrap();

        let config = WorkOrderFlowConfig::load_from(dir.path()).unwrap();
        assert_eq!(config.observability.log_level, "debug");
        assert!(config.observability.json);
        let database = config.database.unwrap();
        assert_eq!(database.url, "sqlite://fleet.db");
        assert_eq!(database.max_connections, 2);
        assert!(!database.auto_migrate);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = WorkOrderFlowConfig::default();
        config.observability.log_level = "warn".to_string();
        config.save_to_file(dir.path().join("work-order-flow.toml")).unwrap();

        let reloaded = WorkOrderFlowConfig::load_from(dir.path()).unwrap();
        assert_eq!(reloaded, config);
    }
}
