//! HTTP endpoint handlers for the container gateway

use crate::error::AppError;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse},
    Json,
};
use dockpanel_common::{
    short_id, ContainerAction, ContainerActionRequest, ContainerSummary, CreateContainerRequest,
    CreateContainerResponse, MessageResponse, MOUNT_TARGET, NGINX_IMAGE,
    PUBLISHED_CONTAINER_PORT, PUBLISHED_PROTOCOL,
};
use dockpanel_runtime::{BindMount, RunSpec, RuntimeError};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

const INDEX_HTML: &str = include_str!("../static/index.html");
const SCRIPT_JS: &str = include_str!("../static/script.js");

/// Empty bodies count as `{}`.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {}", e)))
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/javascript")], SCRIPT_JS)
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let docker = match state.runtime() {
        Ok(runtime) => match runtime.ping().await {
            Ok(()) => "connected",
            Err(e) => {
                warn!("Docker ping failed: {}", e);
                "unreachable"
            }
        },
        Err(_) => "not connected",
    };

    Json(serde_json::json!({
        "status": if docker == "connected" { "healthy" } else { "degraded" },
        "docker": docker,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[instrument(skip(state))]
pub async fn list_containers(
    State(state): State<AppState>,
) -> Result<Json<Vec<ContainerSummary>>, AppError> {
    let runtime = state.runtime()?;

    let records = runtime.list_containers().await.map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(records.iter().map(|r| r.summary()).collect()))
}

#[instrument(skip(state, body))]
pub async fn create_container(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<CreateContainerResponse>), AppError> {
    let runtime = state.runtime()?;
    let req: CreateContainerRequest = parse_body(&body)?;

    let host_file = state.config.mount_source();
    if tokio::fs::metadata(&host_file).await.is_err() {
        return Err(AppError::BadRequest(format!(
            "Custom index.html not found at {}",
            host_file.display()
        )));
    }

    let spec = nginx_spec(req.container_name(), host_file);
    info!(name = %spec.name, "Creating container");

    match runtime.run_container(&spec).await {
        Ok(id) => Ok((
            StatusCode::CREATED,
            Json(CreateContainerResponse {
                message: "Container created".to_string(),
                id: short_id(&id).to_string(),
            }),
        )),
        Err(RuntimeError::ImageNotFound(image)) => {
            let runtime = runtime.clone();
            tokio::spawn(async move {
                if let Err(e) = runtime.pull_image(&image).await {
                    warn!(%image, "Background pull failed: {}", e);
                }
            });
            Err(AppError::NotFound(format!(
                "Image '{}' not found. Pulling it now... try again in a moment.",
                NGINX_IMAGE
            )))
        }
        // naming conflicts and other daemon rejections
        Err(RuntimeError::Api { message, .. }) => Err(AppError::BadRequest(message)),
        Err(e) => Err(AppError::Internal(e.to_string())),
    }
}

fn nginx_spec(name: &str, host_file: PathBuf) -> RunSpec {
    RunSpec {
        image: NGINX_IMAGE.to_string(),
        name: name.to_string(),
        mounts: vec![BindMount {
            source: host_file,
            target: MOUNT_TARGET.to_string(),
            read_only: true,
        }],
        published_ports: vec![(PUBLISHED_CONTAINER_PORT, PUBLISHED_PROTOCOL.to_string())],
    }
}

#[instrument(skip(state, body))]
pub async fn container_action(
    State(state): State<AppState>,
    Path(container_id): Path<String>,
    body: Bytes,
) -> Result<Json<MessageResponse>, AppError> {
    let runtime = state.runtime()?;
    let req: ContainerActionRequest = parse_body(&body)?;

    let action: ContainerAction = req
        .action
        .as_deref()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| AppError::BadRequest("Invalid action".to_string()))?;

    let container = runtime.get_container(&container_id).await?;

    match action {
        ContainerAction::Start => runtime.start_container(&container.id).await?,
        ContainerAction::Stop => runtime.stop_container(&container.id).await?,
        ContainerAction::Delete => runtime.remove_container(&container.id).await?,
    }

    info!(container = %container.name, %action, "Container action applied");
    Ok(Json(MessageResponse {
        message: format!("Container {} {}", container.name, action.past_tense()),
    }))
}
