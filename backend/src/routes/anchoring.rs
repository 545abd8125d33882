use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::error_response,
    middleware::staff::StaffAuth,
    models::{
        child::{AnchorResponse, RecordAnchorRequest},
        verification::VerificationResult,
    },
    services::{anchoring::AnchorService, verification::IntegrityVerifier},
    AppState,
};

/// POST /children/{id}/anchor: hash (if needed) and anchor with the server's issuer.
pub async fn anchor_child(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Path(id): Path<String>,
) -> Result<Json<AnchorResponse>, (StatusCode, Json<Value>)> {
    AnchorService::anchor(
        state.store.as_ref(),
        state.ledger.as_ref(),
        state.issuer.as_deref(),
        &state.anchor_builder,
        &id,
    )
    .await
    .map(Json)
    .map_err(error_response)
}

/// POST /children/{id}/blockchain: record a transaction signed by the client.
pub async fn record_anchor(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Path(id): Path<String>,
    Json(body): Json<RecordAnchorRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let reference = AnchorService::record_anchor(state.store.as_ref(), &id, body)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({
        "transaction": { "hash": reference.tx_hash, "id": reference.tx_id },
        "network": reference.network,
        "childUpdated": true,
    })))
}

pub async fn verify_child(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Path(id): Path<String>,
) -> Result<Json<VerificationResult>, (StatusCode, Json<Value>)> {
    IntegrityVerifier::verify(state.store.as_ref(), state.ledger.as_ref(), &id)
        .await
        .map(Json)
        .map_err(error_response)
}
