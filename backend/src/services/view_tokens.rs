use chrono::{TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::info;

use crate::{
    db::RegistryStore,
    error::{RegistryError, Result},
    models::view::{ChildViewer, ViewClaims, ViewTokenResponse, VIEW_SCOPE},
};

/// Read-only capability tokens handed to guardians or partner organizations.
pub struct ViewTokenService;

impl ViewTokenService {
    pub async fn issue(
        store: &dyn RegistryStore,
        child_id: &str,
        secret: &str,
        ttl_seconds: u64,
    ) -> Result<ViewTokenResponse> {
        if store.get_child(child_id).await?.is_none() {
            return Err(RegistryError::ChildNotFound(child_id.to_string()));
        }

        let now = Utc::now().timestamp() as usize;
        let exp = now + ttl_seconds as usize;
        let claims = ViewClaims {
            sub: child_id.to_string(),
            scope: VIEW_SCOPE.to_string(),
            iat: now,
            exp,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| RegistryError::Internal(format!("view token encoding failed: {e}")))?;

        let expires_at = Utc
            .timestamp_opt(exp as i64, 0)
            .single()
            .ok_or_else(|| RegistryError::Internal(format!("expiry {exp} out of range")))?;
        info!("Issued view token for {child_id} until {expires_at}");
        Ok(ViewTokenResponse {
            token,
            child_id: child_id.to_string(),
            expires_at,
        })
    }

    pub fn decode(token: &str, secret: &str) -> Result<ChildViewer> {
        let key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let claims = decode::<ViewClaims>(token, &key, &validation)
            .map_err(|_| RegistryError::InvalidToken)?
            .claims;
        if claims.scope != VIEW_SCOPE {
            return Err(RegistryError::InvalidToken);
        }
        Ok(ChildViewer {
            child_id: claims.sub,
        })
    }
}
