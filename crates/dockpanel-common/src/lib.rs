// Re-export dependencies used in public interfaces of common types

use std::fmt::Display;
use std::str::FromStr;

pub use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Image launched by the create operation.
pub const NGINX_IMAGE: &str = "nginx:latest";
/// Name used when the create request does not carry one.
pub const DEFAULT_CONTAINER_NAME: &str = "my-nginx";
/// Mounted file, relative to the deployment directory.
pub const MOUNT_SOURCE_RELATIVE: &str = "nginx/index.html";
/// Where the mounted file lands inside the container.
pub const MOUNT_TARGET: &str = "/usr/share/nginx/html/index.html";
/// Container port published to a runtime-chosen host port.
pub const PUBLISHED_CONTAINER_PORT: u16 = 80;
pub const PUBLISHED_PROTOCOL: &str = "tcp";
/// Reported when no host port is bound to the published container port.
pub const PORT_UNAVAILABLE: &str = "N/A";
/// Reported when the container's image carries no tag.
pub const IMAGE_UNKNOWN: &str = "unknown";
/// Length of the short container identifier.
pub const SHORT_ID_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum DockpanelError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DockpanelError>;

/// Abbreviated identifier, as shown by `docker ps`.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(SHORT_ID_LEN) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// One row of the container listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub status: String,
    pub image: String,
    pub port: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateContainerRequest {
    #[serde(default)]
    pub name: Option<String>,
}

impl CreateContainerRequest {
    pub fn container_name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_CONTAINER_NAME)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContainerResponse {
    pub message: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerActionRequest {
    #[serde(default)]
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Lifecycle action accepted by the action endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerAction {
    Start,
    Stop,
    Delete,
}

impl ContainerAction {
    /// Past-tense verb used in confirmation messages.
    pub fn past_tense(self) -> &'static str {
        match self {
            Self::Start => "started",
            Self::Stop => "stopped",
            Self::Delete => "deleted",
        }
    }
}

impl FromStr for ContainerAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            "delete" => Ok(Self::Delete),
            _ => Err(format!("Invalid action: {}", s)),
        }
    }
}

impl Display for ContainerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let token = match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Delete => "delete",
        };
        f.write_str(token)
    }
}
