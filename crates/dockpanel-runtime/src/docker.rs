//! Docker-backed [`ContainerRuntime`] using the daemon's HTTP API through bollard.

use crate::{
    classify, ContainerHandle, ContainerRecord, ContainerRuntime, PublishedPort, Result,
    RunSpec, RuntimeError, Subject,
};
use async_trait::async_trait;
use bollard::container::{
    Config as ContainerConfig, CreateContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::models::{
    ContainerSummary, HostConfig, ImageInspect, PortBinding, PortMap, PortTypeEnum,
};
use bollard::Docker;
use futures::TryStreamExt;
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    /// Connect with the local defaults (socket or `DOCKER_HOST`) and make sure
    /// the daemon answers.
    pub async fn connect() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults().map_err(RuntimeError::Connection)?;
        docker.ping().await.map_err(RuntimeError::Connection)?;
        Ok(Self::new(docker))
    }

    async fn image_tags(&self, image_id: &str) -> Vec<String> {
        tags_from_inspection(image_id, self.docker.inspect_image(image_id).await)
    }
}

/// Tag placeholder the daemon reports for dangling images.
const DANGLING_TAG: &str = "<none>:<none>";

/// Usable tags of an inspected image; a failed inspection yields none.
pub fn tags_from_inspection(
    image_id: &str,
    inspection: std::result::Result<ImageInspect, BollardError>,
) -> Vec<String> {
    match inspection {
        Ok(image) => image
            .repo_tags
            .unwrap_or_default()
            .into_iter()
            .filter(|tag| tag != DANGLING_TAG)
            .collect(),
        Err(e) => {
            debug!(%image_id, error = %e, "Image inspection failed, reporting no tags");
            Vec::new()
        }
    }
}

fn protocol_name(typ: Option<&PortTypeEnum>) -> &'static str {
    match typ {
        Some(PortTypeEnum::UDP) => "udp",
        Some(PortTypeEnum::SCTP) => "sctp",
        _ => "tcp",
    }
}

/// Reduce a listing entry to a [`ContainerRecord`] given its image tags.
pub fn record_from_summary(summary: ContainerSummary, image_tags: Vec<String>) -> ContainerRecord {
    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();

    let ports = summary
        .ports
        .unwrap_or_default()
        .into_iter()
        .filter_map(|port| {
            port.public_port.map(|host_port| PublishedPort {
                container_port: port.private_port,
                protocol: protocol_name(port.typ.as_ref()).to_string(),
                host_port,
            })
        })
        .collect();

    ContainerRecord {
        id: summary.id.unwrap_or_default(),
        name,
        status: summary.state.unwrap_or_default(),
        image_tags,
        ports,
    }
}

/// Container creation payload for a [`RunSpec`].
pub fn container_config(spec: &RunSpec) -> ContainerConfig<String> {
    let mut exposed_ports = HashMap::new();
    let mut port_bindings: PortMap = HashMap::new();
    for (port, protocol) in &spec.published_ports {
        let key = format!("{}/{}", port, protocol);
        exposed_ports.insert(key.clone(), HashMap::<(), ()>::new());
        // empty host port lets the daemon pick a free one
        port_bindings.insert(
            key,
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(String::new()),
            }]),
        );
    }

    let host_config = HostConfig {
        binds: Some(spec.mounts.iter().map(|m| m.to_bind_spec()).collect()),
        port_bindings: Some(port_bindings),
        ..Default::default()
    };

    ContainerConfig {
        image: Some(spec.image.clone()),
        exposed_ports: Some(exposed_ports),
        host_config: Some(host_config),
        ..Default::default()
    }
}

/// 304 from start/stop means the container is already in the requested state.
fn not_modified_is_ok(result: std::result::Result<(), BollardError>) -> std::result::Result<(), BollardError> {
    match result {
        Err(BollardError::DockerResponseServerError {
            status_code: 304, ..
        }) => Ok(()),
        other => other,
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn ping(&self) -> Result<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| classify(e, Subject::Daemon))
    }

    #[instrument(skip(self))]
    async fn list_containers(&self) -> Result<Vec<ContainerRecord>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let summaries = self
            .docker
            .list_containers(Some(options))
            .await
            .map_err(|e| classify(e, Subject::Daemon))?;

        let mut tags_by_image: HashMap<String, Vec<String>> = HashMap::new();
        let mut records = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let tags = match summary.image_id.clone() {
                Some(image_id) => {
                    if !tags_by_image.contains_key(&image_id) {
                        let tags = self.image_tags(&image_id).await;
                        tags_by_image.insert(image_id.clone(), tags);
                    }
                    tags_by_image.get(&image_id).cloned().unwrap_or_default()
                }
                None => Vec::new(),
            };
            records.push(record_from_summary(summary, tags));
        }

        debug!(count = records.len(), "Listed containers");
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn get_container(&self, id: &str) -> Result<ContainerHandle> {
        let inspect = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| classify(e, Subject::Container(id)))?;

        Ok(ContainerHandle {
            id: inspect.id.unwrap_or_else(|| id.to_string()),
            name: inspect
                .name
                .map(|n| n.trim_start_matches('/').to_string())
                .unwrap_or_default(),
        })
    }

    #[instrument(skip(self, spec), fields(image = %spec.image, name = %spec.name))]
    async fn run_container(&self, spec: &RunSpec) -> Result<String> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };

        let created = self
            .docker
            .create_container(Some(options), container_config(spec))
            .await
            .map_err(|e| classify(e, Subject::Image(&spec.image)))?;

        for warning in &created.warnings {
            warn!(container_id = %created.id, "Daemon warning: {}", warning);
        }

        self.docker
            .start_container::<String>(&created.id, None)
            .await
            .map_err(|e| classify(e, Subject::Container(&created.id)))?;

        info!(container_id = %created.id, "Created and started container");
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn start_container(&self, id: &str) -> Result<()> {
        not_modified_is_ok(self.docker.start_container::<String>(id, None).await)
            .map_err(|e| classify(e, Subject::Container(id)))
    }

    #[instrument(skip(self))]
    async fn stop_container(&self, id: &str) -> Result<()> {
        not_modified_is_ok(
            self.docker
                .stop_container(id, None::<StopContainerOptions>)
                .await,
        )
        .map_err(|e| classify(e, Subject::Container(id)))
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, id: &str) -> Result<()> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| classify(e, Subject::Container(id)))
    }

    #[instrument(skip(self))]
    async fn pull_image(&self, image: &str) -> Result<()> {
        info!("Pulling image");
        self.docker
            .create_image(
                Some(CreateImageOptions {
                    from_image: image.to_string(),
                    ..Default::default()
                }),
                None,
                None,
            )
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| classify(e, Subject::Image(image)))?;
        info!("Image pulled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BindMount;
    use bollard::models::Port;
    use std::path::PathBuf;

    fn summary(names: &[&str], ports: Vec<Port>) -> ContainerSummary {
        ContainerSummary {
            id: Some("f00dfeedbeef0011223344556677".to_string()),
            names: Some(names.iter().map(|n| n.to_string()).collect()),
            state: Some("running".to_string()),
            ports: Some(ports),
            ..Default::default()
        }
    }

    #[test]
    fn test_record_from_summary() {
        let ports = vec![
            Port {
                private_port: 80,
                public_port: Some(49153),
                typ: Some(PortTypeEnum::TCP),
                ip: Some("0.0.0.0".to_string()),
            },
            // exposed but not published
            Port {
                private_port: 8080,
                public_port: None,
                typ: Some(PortTypeEnum::TCP),
                ip: None,
            },
        ];
        let record = record_from_summary(summary(&["/my-nginx"], ports), vec!["nginx:latest".to_string()]);

        assert_eq!(record.name, "my-nginx");
        assert_eq!(record.status, "running");
        assert_eq!(record.ports.len(), 1);
        assert_eq!(record.web_port(), Some(49153));
        assert_eq!(record.summary().id, "f00dfeedbeef");
    }

    #[test]
    fn test_record_without_ports_or_names() {
        let mut raw = summary(&[], vec![]);
        raw.ports = None;
        let record = record_from_summary(raw, vec![]);
        assert_eq!(record.name, "");
        assert_eq!(record.summary().port, "N/A");
    }

    #[test]
    fn test_container_config_publishes_and_mounts() {
        let spec = RunSpec {
            image: "nginx:latest".to_string(),
            name: "my-nginx".to_string(),
            mounts: vec![BindMount {
                source: PathBuf::from("/opt/panel/nginx/index.html"),
                target: "/usr/share/nginx/html/index.html".to_string(),
                read_only: true,
            }],
            published_ports: vec![(80, "tcp".to_string())],
        };

        let config = container_config(&spec);
        assert_eq!(config.image.as_deref(), Some("nginx:latest"));
        assert!(config.exposed_ports.unwrap().contains_key("80/tcp"));

        let host_config = config.host_config.unwrap();
        assert_eq!(
            host_config.binds.unwrap(),
            vec!["/opt/panel/nginx/index.html:/usr/share/nginx/html/index.html:ro".to_string()]
        );
        let bindings = host_config.port_bindings.unwrap();
        let binding = bindings["80/tcp"].as_ref().unwrap();
        assert_eq!(binding[0].host_port.as_deref(), Some(""));
    }

    #[test]
    fn test_dangling_tag_is_dropped() {
        let image = ImageInspect {
            repo_tags: Some(vec![DANGLING_TAG.to_string()]),
            ..Default::default()
        };
        let tags = tags_from_inspection("sha256:0bad", Ok(image));
        assert!(tags.is_empty());

        let record = record_from_summary(summary(&["/orphan"], vec![]), tags);
        assert_eq!(record.summary().image, "unknown");

        let image = ImageInspect {
            repo_tags: Some(vec![
                DANGLING_TAG.to_string(),
                "nginx:latest".to_string(),
            ]),
            ..Default::default()
        };
        assert_eq!(
            tags_from_inspection("sha256:0bad", Ok(image)),
            vec!["nginx:latest".to_string()]
        );
    }

    #[test]
    fn test_failed_inspection_reports_unknown_image() {
        let missing = Err(BollardError::DockerResponseServerError {
            status_code: 404,
            message: "No such image: sha256:0bad".to_string(),
        });
        let tags = tags_from_inspection("sha256:0bad", missing);
        assert!(tags.is_empty());

        let record = record_from_summary(summary(&["/orphan"], vec![]), tags);
        assert_eq!(record.summary().image, "unknown");
    }

    #[test]
    fn test_not_modified_is_ok() {
        let already = Err(BollardError::DockerResponseServerError {
            status_code: 304,
            message: String::new(),
        });
        assert!(not_modified_is_ok(already).is_ok());

        let missing = Err(BollardError::DockerResponseServerError {
            status_code: 404,
            message: "No such container".to_string(),
        });
        assert!(not_modified_is_ok(missing).is_err());
    }
}
