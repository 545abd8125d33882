use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::AppState;

pub const STAFF_KEY_HEADER: &str = "X-Staff-Key";

/// Extractor that validates the `X-Staff-Key` header against `config.staff_api_key`.
/// Every registry route except health, metrics and `/view` requires it.
pub struct StaffAuth;

impl FromRequestParts<AppState> for StaffAuth {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = parts
            .headers
            .get(STAFF_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing X-Staff-Key header"))?;

        if key != state.config.staff_api_key {
            return Err((StatusCode::UNAUTHORIZED, "Invalid staff key"));
        }

        Ok(StaffAuth)
    }
}
