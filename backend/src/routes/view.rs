use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use crate::{
    error::error_response,
    middleware::staff::StaffAuth,
    models::{
        credential::ChildCredentials,
        view::{ChildViewer, ViewTokenResponse},
    },
    services::{credentials::CredentialService, view_tokens::ViewTokenService},
    AppState,
};

/// POST /children/{id}/view-token: staff hand out read-only access to one child.
pub async fn issue_view_token(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<ViewTokenResponse>), (StatusCode, Json<Value>)> {
    ViewTokenService::issue(
        state.store.as_ref(),
        &id,
        &state.config.view_token_secret,
        state.config.view_token_ttl_seconds,
    )
    .await
    .map(|token| (StatusCode::CREATED, Json(token)))
    .map_err(error_response)
}

/// GET /view/child: the child named by the bearer token, with its credentials.
pub async fn view_child(
    State(state): State<AppState>,
    viewer: ChildViewer,
) -> Result<Json<ChildCredentials>, (StatusCode, Json<Value>)> {
    CredentialService::list_for_child(state.store.as_ref(), &viewer.child_id)
        .await
        .map(Json)
        .map_err(error_response)
}
