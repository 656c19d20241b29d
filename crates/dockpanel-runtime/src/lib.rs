use async_trait::async_trait;
use bollard::errors::Error as BollardError;
use dockpanel_common::{
    short_id, ContainerSummary, IMAGE_UNKNOWN, PORT_UNAVAILABLE, PUBLISHED_CONTAINER_PORT,
    PUBLISHED_PROTOCOL,
};
use std::path::PathBuf;
use thiserror::Error;

// Re-export dependencies potentially needed by consumers (like the gateway server)
pub use bollard;
pub use dockpanel_common as common;

pub mod docker;
pub mod test_utils;

pub use docker::DockerRuntime;

// --- Custom Error Type ---
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Docker connection failed: {0}")]
    Connection(#[source] BollardError),
    #[error("No such container: {0}")]
    ContainerNotFound(String),
    #[error("No such image: {0}")]
    ImageNotFound(String),
    /// The daemon answered with an error status; `message` is its own text.
    #[error("{message}")]
    Api { status: u16, message: String },
    #[error("Docker error: {0}")]
    Docker(#[source] BollardError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

/// What a failing daemon call was addressing, so a 404 can be attributed.
#[derive(Debug, Clone, Copy)]
pub enum Subject<'a> {
    Container(&'a str),
    Image(&'a str),
    Daemon,
}

/// Turns a bollard failure into a [`RuntimeError`].
pub fn classify(err: BollardError, subject: Subject<'_>) -> RuntimeError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404,
            message,
        } => match subject {
            Subject::Container(id) => RuntimeError::ContainerNotFound(id.to_string()),
            Subject::Image(image) => RuntimeError::ImageNotFound(image.to_string()),
            Subject::Daemon => RuntimeError::Api {
                status: 404,
                message,
            },
        },
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => RuntimeError::Api {
            status: status_code,
            message,
        },
        other => RuntimeError::Docker(other),
    }
}

/// A host port the runtime publishes for a container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedPort {
    pub container_port: u16,
    pub protocol: String,
    pub host_port: u16,
}

/// Container as reported by the runtime for one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub status: String,
    /// Tags of the container's image, in daemon order.
    pub image_tags: Vec<String>,
    pub ports: Vec<PublishedPort>,
}

impl ContainerRecord {
    /// Host port bound to the published web port, if any.
    pub fn web_port(&self) -> Option<u16> {
        self.ports
            .iter()
            .find(|p| p.container_port == PUBLISHED_CONTAINER_PORT && p.protocol == PUBLISHED_PROTOCOL)
            .map(|p| p.host_port)
    }

    pub fn summary(&self) -> ContainerSummary {
        ContainerSummary {
            id: short_id(&self.id).to_string(),
            name: self.name.clone(),
            status: self.status.clone(),
            // first tag wins
            image: self
                .image_tags
                .first()
                .cloned()
                .unwrap_or_else(|| IMAGE_UNKNOWN.to_string()),
            port: self
                .web_port()
                .map(|p| p.to_string())
                .unwrap_or_else(|| PORT_UNAVAILABLE.to_string()),
        }
    }
}

/// Resolved live container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub source: PathBuf,
    pub target: String,
    pub read_only: bool,
}

impl BindMount {
    /// `source:target[:ro]` as the daemon expects it.
    pub fn to_bind_spec(&self) -> String {
        let mut spec = format!("{}:{}", self.source.display(), self.target);
        if self.read_only {
            spec.push_str(":ro");
        }
        spec
    }
}

/// Everything needed to create and start a detached container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub image: String,
    pub name: String,
    pub mounts: Vec<BindMount>,
    /// `(container_port, protocol)` pairs published to runtime-chosen host ports.
    pub published_ports: Vec<(u16, String)>,
}

/// Operations the gateway needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn ping(&self) -> Result<()>;

    /// All containers, stopped ones included.
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>>;

    /// Resolve an identifier (full id, short id or name) to a live container.
    async fn get_container(&self, id: &str) -> Result<ContainerHandle>;

    /// Create and start a container; returns its full identifier.
    async fn run_container(&self, spec: &RunSpec) -> Result<String>;

    async fn start_container(&self, id: &str) -> Result<()>;

    async fn stop_container(&self, id: &str) -> Result<()>;

    /// Remove a container, killing it first if it is running.
    async fn remove_container(&self, id: &str) -> Result<()>;

    async fn pull_image(&self, image: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error(status_code: u16, message: &str) -> BollardError {
        BollardError::DockerResponseServerError {
            status_code,
            message: message.to_string(),
        }
    }

    fn record(tags: &[&str], ports: Vec<PublishedPort>) -> ContainerRecord {
        ContainerRecord {
            id: "0123456789abcdef0123456789abcdef".to_string(),
            name: "web".to_string(),
            status: "exited".to_string(),
            image_tags: tags.iter().map(|t| t.to_string()).collect(),
            ports,
        }
    }

    #[test]
    fn test_classify_not_found_by_subject() {
        let err = classify(server_error(404, "No such container: abc"), Subject::Container("abc"));
        assert!(matches!(err, RuntimeError::ContainerNotFound(ref id) if id == "abc"));

        let err = classify(server_error(404, "No such image: nginx:latest"), Subject::Image("nginx:latest"));
        assert!(matches!(err, RuntimeError::ImageNotFound(ref image) if image == "nginx:latest"));

        let err = classify(server_error(404, "page not found"), Subject::Daemon);
        assert!(matches!(err, RuntimeError::Api { status: 404, .. }));
    }

    #[test]
    fn test_classify_keeps_daemon_message() {
        let message = r#"Conflict. The container name "/my-nginx" is already in use"#;
        let err = classify(server_error(409, message), Subject::Image("nginx:latest"));
        assert!(matches!(err, RuntimeError::Api { status: 409, .. }));
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn test_summary_sentinels() {
        let summary = record(&[], vec![]).summary();
        assert_eq!(summary.id, "0123456789ab");
        assert_eq!(summary.image, "unknown");
        assert_eq!(summary.port, "N/A");
    }

    #[test]
    fn test_summary_first_tag_and_web_port() {
        let ports = vec![
            PublishedPort {
                container_port: 443,
                protocol: "tcp".to_string(),
                host_port: 40001,
            },
            PublishedPort {
                container_port: 80,
                protocol: "udp".to_string(),
                host_port: 40002,
            },
            PublishedPort {
                container_port: 80,
                protocol: "tcp".to_string(),
                host_port: 32768,
            },
        ];
        let summary = record(&["nginx:latest", "nginx:1.27"], ports).summary();
        assert_eq!(summary.image, "nginx:latest");
        assert_eq!(summary.port, "32768");
    }

    #[test]
    fn test_bind_spec() {
        let mount = BindMount {
            source: PathBuf::from("/srv/panel/nginx/index.html"),
            target: "/usr/share/nginx/html/index.html".to_string(),
            read_only: true,
        };
        assert_eq!(
            mount.to_bind_spec(),
            "/srv/panel/nginx/index.html:/usr/share/nginx/html/index.html:ro"
        );
    }
}
