use dockpanel_common::{DockpanelError, Result, MOUNT_SOURCE_RELATIVE};
use std::path::PathBuf;

pub const DEFAULT_LOG_FILTER: &str = "info,dockpanel_server=debug,dockpanel_runtime=debug";

/// Gateway configuration
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Deployment directory the mounted page is resolved against.
    pub base_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            base_dir: PathBuf::from("."),
        }
    }
}

impl GatewayConfig {
    /// Read `DOCKPANEL_HOST`, `DOCKPANEL_PORT` and `DOCKPANEL_BASE_DIR`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let host = lookup("DOCKPANEL_HOST").unwrap_or(defaults.host);
        let port = match lookup("DOCKPANEL_PORT") {
            Some(raw) => raw
                .parse()
                .map_err(|_| DockpanelError::Config(format!("Invalid DOCKPANEL_PORT: {}", raw)))?,
            None => defaults.port,
        };

        let base_dir = lookup("DOCKPANEL_BASE_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.base_dir);
        // bind mounts need an absolute host path
        let base_dir = if base_dir.is_absolute() {
            base_dir
        } else {
            std::env::current_dir()?.join(base_dir)
        };

        Ok(Self {
            host,
            port,
            base_dir,
        })
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Host file mounted into every created container.
    pub fn mount_source(&self) -> PathBuf {
        self.base_dir.join(MOUNT_SOURCE_RELATIVE)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
