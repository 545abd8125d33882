use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::{models::view::ChildViewer, services::view_tokens::ViewTokenService, AppState};

impl FromRequestParts<AppState> for ChildViewer {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or((StatusCode::UNAUTHORIZED, "Invalid Authorization header format"))?;

        ViewTokenService::decode(token, &state.config.view_token_secret)
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Invalid or expired view token"))
    }
}
