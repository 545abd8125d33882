use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const VIEW_SCOPE: &str = "child:view";

/// Claims embedded in a view capability token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewClaims {
    pub sub: String,   // child id
    pub scope: String, // always VIEW_SCOPE
    pub exp: usize,
    pub iat: usize,
}

/// Extracted from a validated view token; grants read access to one child
#[derive(Debug, Clone)]
pub struct ChildViewer {
    pub child_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewTokenResponse {
    pub token: String,
    pub child_id: String,
    pub expires_at: DateTime<Utc>,
}
