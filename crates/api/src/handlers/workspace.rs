//! Workspace CRUD handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use ideaflow_core::error::CoreError;
use ideaflow_core::types::DbId;
use ideaflow_db::models::workspace::CreateWorkspace;
use ideaflow_db::repositories::WorkspaceRepo;
use serde::Deserialize;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for workspace creation.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkspaceRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

/// POST /api/v1/workspaces
pub async fn create_workspace(
    State(state): State<AppState>,
    Json(input): Json<CreateWorkspaceRequest>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let workspace = WorkspaceRepo::create(
        &state.pool,
        &CreateWorkspace {
            name: input.name,
        },
    )
    .await?;

    tracing::info!(workspace_id = workspace.id, "Workspace created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: workspace })))
}

/// GET /api/v1/workspaces/{id}
pub async fn get_workspace(
    State(state): State<AppState>,
    Path(workspace_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let workspace = WorkspaceRepo::find_by_id(&state.pool, workspace_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workspace",
            id: workspace_id,
        }))?;

    Ok(Json(DataResponse { data: workspace }))
}

/// GET /api/v1/workspaces
pub async fn list_workspaces(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let workspaces = WorkspaceRepo::list(&state.pool).await?;
    Ok(Json(DataResponse { data: workspaces }))
}
