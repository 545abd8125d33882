use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{error_response, RegistryError},
    middleware::staff::StaffAuth,
    models::credential::{
        ChildCredentials, CreateCredentialRequest, CredentialRecord, CredentialWithChild,
    },
    services::credentials::CredentialService,
    AppState,
};

pub async fn create_credential(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Path(child_id): Path<String>,
    Json(body): Json<CreateCredentialRequest>,
) -> Result<(StatusCode, Json<CredentialRecord>), (StatusCode, Json<Value>)> {
    CredentialService::create(state.store.as_ref(), &child_id, body)
        .await
        .map(|credential| (StatusCode::CREATED, Json(credential)))
        .map_err(error_response)
}

pub async fn list_credentials(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Path(child_id): Path<String>,
) -> Result<Json<ChildCredentials>, (StatusCode, Json<Value>)> {
    CredentialService::list_for_child(state.store.as_ref(), &child_id)
        .await
        .map(Json)
        .map_err(error_response)
}

pub async fn get_credential(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Path(id): Path<Uuid>,
) -> Result<Json<CredentialWithChild>, (StatusCode, Json<Value>)> {
    CredentialService::get(state.store.as_ref(), id)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /credentials/{id}/file: decoded attachment, served for download.
pub async fn download_credential_file(
    State(state): State<AppState>,
    _staff: StaffAuth,
    Path(id): Path<Uuid>,
) -> Result<Response, (StatusCode, Json<Value>)> {
    let file = CredentialService::file(state.store.as_ref(), id)
        .await
        .map_err(error_response)?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, file.content_type)
        .header(header::CONTENT_LENGTH, file.bytes.len().to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", header_safe(&file.file_name)),
        )
        .body(Body::from(file.bytes))
        .map_err(|e| error_response(RegistryError::Internal(e.to_string())))
}

/// Keeps a caller-supplied file name from breaking out of the quoted header value.
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c == '"' || c == '\\' || !(' '..='~').contains(&c) { '_' } else { c })
        .collect()
}
