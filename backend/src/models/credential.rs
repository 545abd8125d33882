use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use super::child::ChildRecord;

/// Attestation types offered by the NGO portal. Other values are accepted.
pub const KNOWN_CREDENTIAL_TYPES: &[&str] = &[
    "vaccination",
    "schooling",
    "identity",
    "age-assessment",
    "health",
    "protection",
];

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    pub id: Uuid,
    pub child_id: String,
    #[serde(rename = "type")]
    pub credential_type: String,
    /// Free text (a JSON string) or a structured payload.
    #[sqlx(json)]
    pub data: Value,
    /// Issuing account as claimed by the caller; never checked.
    pub signer_address: String,
    pub signature: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    /// Attachment, standard base64.
    pub file_blob: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCredentialRequest {
    #[serde(rename = "type")]
    pub credential_type: Option<String>,
    pub data: Option<Value>,
    pub signer_address: Option<String>,
    pub signature: Option<String>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_blob: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChildCredentials {
    pub child: ChildRecord,
    pub credentials: Vec<CredentialRecord>,
}

#[derive(Debug, Serialize)]
pub struct CredentialWithChild {
    pub child: Option<ChildRecord>,
    pub credential: CredentialRecord,
}

/// Decoded attachment ready to be served.
#[derive(Debug)]
pub struct CredentialFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}
