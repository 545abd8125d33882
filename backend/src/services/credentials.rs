use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    db::RegistryStore,
    error::{RegistryError, Result},
    models::{
        child::{non_blank, ChildRecord},
        credential::{
            ChildCredentials, CreateCredentialRequest, CredentialFile, CredentialRecord,
            CredentialWithChild, KNOWN_CREDENTIAL_TYPES,
        },
    },
    services::metrics::CREDENTIALS_CREATED_COUNTER,
};

/// Decoded attachments larger than this are refused.
pub const MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

const DEFAULT_FILE_NAME: &str = "attachment";

pub struct CredentialService;

impl CredentialService {
    /// Attaches a credential to an existing child. `signature` and
    /// `signer_address` are stored as given.
    pub async fn create(
        store: &dyn RegistryStore,
        child_id: &str,
        req: CreateCredentialRequest,
    ) -> Result<CredentialRecord> {
        let (credential_type, data, signer_address) = match (
            non_blank(req.credential_type),
            req.data.filter(has_content),
            non_blank(req.signer_address),
        ) {
            (Some(t), Some(d), Some(s)) => (t, d, s),
            _ => {
                return Err(RegistryError::Validation(
                    "Missing required fields: type, data, signerAddress".into(),
                ))
            }
        };
        let attachment = attachment_fields(req.file_blob, req.file_name, req.file_type)?;

        Self::existing_child(store, child_id).await?;

        if !KNOWN_CREDENTIAL_TYPES.contains(&credential_type.as_str()) {
            debug!("Credential type {credential_type:?} is not one of the portal types");
        }

        let (file_name, file_type, file_blob) = match attachment {
            Some((name, mime, blob)) => (Some(name), Some(mime), Some(blob)),
            None => (None, None, None),
        };
        let credential = CredentialRecord {
            id: Uuid::new_v4(),
            child_id: child_id.to_string(),
            credential_type,
            data,
            signer_address,
            signature: non_blank(req.signature),
            file_name,
            file_type,
            file_blob,
            created_at: Utc::now(),
        };
        store.insert_credential(&credential).await?;

        CREDENTIALS_CREATED_COUNTER.inc();
        info!(
            "Credential {} ({}) added to {child_id}",
            credential.id, credential.credential_type
        );
        Ok(credential)
    }

    pub async fn list_for_child(
        store: &dyn RegistryStore,
        child_id: &str,
    ) -> Result<ChildCredentials> {
        let child = Self::existing_child(store, child_id).await?;
        let credentials = store.list_credentials_for_child(child_id).await?;
        Ok(ChildCredentials { child, credentials })
    }

    pub async fn get(store: &dyn RegistryStore, id: Uuid) -> Result<CredentialWithChild> {
        let credential = store
            .get_credential(id)
            .await?
            .ok_or(RegistryError::CredentialNotFound(id))?;
        let child = store.get_child(&credential.child_id).await?;
        Ok(CredentialWithChild { child, credential })
    }

    pub async fn file(store: &dyn RegistryStore, id: Uuid) -> Result<CredentialFile> {
        let credential = store
            .get_credential(id)
            .await?
            .ok_or(RegistryError::CredentialNotFound(id))?;
        let blob = credential
            .file_blob
            .ok_or(RegistryError::AttachmentNotFound(id))?;
        let bytes = STANDARD
            .decode(blob.as_bytes())
            .map_err(|e| RegistryError::Internal(format!("stored attachment of {id} is corrupt: {e}")))?;
        let file_name = credential
            .file_name
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
        let content_type = credential
            .file_type
            .unwrap_or_else(|| guess_mime(&file_name));
        Ok(CredentialFile {
            file_name,
            content_type,
            bytes,
        })
    }

    async fn existing_child(store: &dyn RegistryStore, child_id: &str) -> Result<ChildRecord> {
        store
            .get_child(child_id)
            .await?
            .ok_or_else(|| RegistryError::ChildNotFound(child_id.to_string()))
    }
}

/// `null`, blank strings and empty containers count as missing.
fn has_content(data: &Value) -> bool {
    match data {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        _ => true,
    }
}

/// Validates an optional base64 attachment; name and type without a blob
/// are ignored.
fn attachment_fields(
    blob: Option<String>,
    name: Option<String>,
    mime: Option<String>,
) -> Result<Option<(String, String, String)>> {
    let Some(blob) = non_blank(blob) else {
        return Ok(None);
    };
    let decoded = STANDARD
        .decode(blob.as_bytes())
        .map_err(|_| RegistryError::Validation("fileBlob must be standard base64".into()))?;
    if decoded.len() > MAX_ATTACHMENT_BYTES {
        return Err(RegistryError::Validation(format!(
            "Attachment exceeds {} MiB",
            MAX_ATTACHMENT_BYTES / (1024 * 1024)
        )));
    }
    let name = non_blank(name).unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());
    let mime = non_blank(mime).unwrap_or_else(|| guess_mime(&name));
    Ok(Some((name, mime, blob)))
}

fn guess_mime(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
