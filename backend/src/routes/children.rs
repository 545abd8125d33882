use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use crate::{
    error::error_response,
    middleware::staff::StaffAuth,
    models::child::{ChildRecord, CreateChildRequest, CreateChildResponse, UpdateChildRequest},
    services::children::ChildService,
    AppState,
};

pub async fn list_children(
    State(state): State<AppState>,
    _staff: StaffAuth,
) -> Result<Json<Vec<ChildRecord>>, (StatusCode, Json<Value>)> {
    ChildService::list(state.store.as_ref())
        .await
        .map(Json)
        .map_err(error_response)
}

/// The response carries the wallet seed; it is not retrievable afterwards.
pub async fn create_child(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Json(body): Json<CreateChildRequest>,
) -> Result<(StatusCode, Json<CreateChildResponse>), (StatusCode, Json<Value>)> {
    ChildService::create(
        state.store.as_ref(),
        state.ledger.as_ref(),
        state.issuer.as_deref(),
        &state.anchor_builder,
        body,
    )
    .await
    .map(|created| (StatusCode::CREATED, Json(created)))
    .map_err(error_response)
}

pub async fn get_child(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Path(id): Path<String>,
) -> Result<Json<ChildRecord>, (StatusCode, Json<Value>)> {
    ChildService::get(state.store.as_ref(), &id)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn update_child(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Path(id): Path<String>,
    Json(body): Json<UpdateChildRequest>,
) -> Result<Json<ChildRecord>, (StatusCode, Json<Value>)> {
    ChildService::update(state.store.as_ref(), &id, &body)
        .await
        .map(Json)
        .map_err(error_response)
}
