use std::path::PathBuf;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::sort::{Column, SortDirection, SortSpec};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub network: NetworkConfig,
    pub refresh: RefreshConfig,
    pub notifications: NotificationConfig,
    pub table: TableConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Root of the local platform service, without the `/api` suffix.
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RefreshConfig {
    pub poll_interval_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationConfig {
    /// Seconds a notification stays visible before it is dismissed.
    pub dismiss_after_secs: u64,
    /// Also raise desktop notifications (needs the `desktop` feature).
    pub desktop: bool,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dismiss_after_secs: 6,
            desktop: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TableConfig {
    pub default_sort_column: String,
    pub default_descending: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            default_sort_column: "created".to_string(),
            default_descending: true,
        }
    }
}

impl TableConfig {
    /// Apply the configured default ordering to a table's spec.
    ///
    /// Falls back to the table's own default when the configured column is
    /// unknown or not part of that table.
    pub fn apply(&self, mut spec: SortSpec) -> SortSpec {
        let Ok(column) = self.default_sort_column.parse::<Column>() else {
            tracing::warn!(
                "Ignoring unknown default sort column '{}'",
                self.default_sort_column
            );
            return spec;
        };
        let wanted = if self.default_descending {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        let columns: Vec<Column> = spec.columns().iter().map(|c| c.column).collect();
        match SortSpec::new(&columns, column, wanted) {
            Ok(configured) => configured,
            Err(e) => {
                tracing::debug!("Keeping default ordering: {}", e);
                // `click` flips the stored direction, so compensate first.
                if spec.active().direction != wanted {
                    let active = spec.active().column;
                    let _ = spec.click(active);
                }
                spec
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExportConfig {
    /// Where CSV exports go; defaults to the user's download directory.
    pub directory: Option<PathBuf>,
}

impl ExportConfig {
    pub fn resolve_directory(&self) -> PathBuf {
        self.directory
            .clone()
            .or_else(dirs::download_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        // Load .env file (silently ignore if not present)
        let _ = dotenvy::dotenv();

        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("idm-monitor");

        let builder = Config::builder()
            // 1. Defaults
            .set_default("server.base_url", "http://localhost:5000")?
            .set_default("network.request_timeout_secs", 30)?
            .set_default("network.connect_timeout_secs", 10)?
            .set_default("refresh.poll_interval_secs", 30)?
            .set_default("notifications.dismiss_after_secs", 6)?
            .set_default("notifications.desktop", false)?
            .set_default("table.default_sort_column", "created")?
            .set_default("table.default_descending", true)?
            .set_default("export.directory", None::<String>)?
            // 2. Local config file (optional, lowest priority)
            .add_source(File::from(PathBuf::from("config.toml")).required(false))
            // 3. User config directory (optional, overrides local)
            .add_source(File::from(config_dir.join("config.toml")).required(false))
            // 4. Environment variables (IDM__SERVER__BASE_URL=...)
            .add_source(Environment::with_prefix("IDM").separator("__"));

        let s = builder.build().context("Failed to assemble configuration")?;
        s.try_deserialize().context("Invalid configuration")
    }
}
