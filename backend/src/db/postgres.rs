use async_trait::async_trait;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use super::RegistryStore;
use crate::{
    error::{RegistryError, Result},
    models::{
        child::{AnchorReference, ChildRecord, UpdateChildRequest},
        credential::CredentialRecord,
    },
};

/// Explicit column list for ChildRecord.
const CHILD_COLS: &str =
    "id, full_name, alias, date_of_birth, birth_place, gender, parents_names,
     wallet_address, wallet_public_key, data_hash, issuer_address, anchor_tx_hash,
     anchor_tx_id, anchor_network, is_anchor_activated, anchored_at, legacy_id,
     hash_address, created_at, updated_at";

const CREDENTIAL_COLS: &str =
    "id, child_id, credential_type, data, signer_address, signature,
     file_name, file_type, file_blob, created_at";

#[derive(Clone)]
pub struct PgRegistryStore {
    pool: PgPool,
}

impl PgRegistryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_check_violation(e: sqlx::Error) -> RegistryError {
    match e {
        sqlx::Error::Database(ref db)
            if db.constraint() == Some("children_identifier_present") =>
        {
            RegistryError::Validation(
                "At least one identifier is required (alias or fullName)".into(),
            )
        }
        other => other.into(),
    }
}

#[async_trait]
impl RegistryStore for PgRegistryStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_child(&self, child: &ChildRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO children
             (id, full_name, alias, date_of_birth, birth_place, gender, parents_names,
              wallet_address, wallet_public_key, data_hash, issuer_address, anchor_tx_hash,
              anchor_tx_id, anchor_network, is_anchor_activated, anchored_at, legacy_id,
              hash_address, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)",
        )
        .bind(&child.id)
        .bind(&child.full_name)
        .bind(&child.alias)
        .bind(&child.date_of_birth)
        .bind(&child.birth_place)
        .bind(&child.gender)
        .bind(&child.parents_names)
        .bind(&child.wallet_address)
        .bind(&child.wallet_public_key)
        .bind(&child.data_hash)
        .bind(&child.issuer_address)
        .bind(&child.anchor_tx_hash)
        .bind(&child.anchor_tx_id)
        .bind(child.anchor_network.to_string())
        .bind(child.is_anchor_activated)
        .bind(child.anchored_at)
        .bind(&child.legacy_id)
        .bind(&child.hash_address)
        .bind(child.created_at)
        .bind(child.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_check_violation)?;
        Ok(())
    }

    async fn get_child(&self, id: &str) -> Result<Option<ChildRecord>> {
        let child = sqlx::query_as::<_, ChildRecord>(&format!(
            "SELECT {CHILD_COLS} FROM children WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(child)
    }

    async fn list_children(&self) -> Result<Vec<ChildRecord>> {
        let children = sqlx::query_as::<_, ChildRecord>(&format!(
            "SELECT {CHILD_COLS} FROM children ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(children)
    }

    async fn update_child_identity(
        &self,
        id: &str,
        patch: &UpdateChildRequest,
    ) -> Result<Option<ChildRecord>> {
        // NULL parameter = keep; blank = clear.
        let child = sqlx::query_as::<_, ChildRecord>(&format!(
            "UPDATE children
             SET full_name     = CASE WHEN $1::TEXT IS NULL THEN full_name     ELSE NULLIF(BTRIM($1), '') END,
                 alias         = CASE WHEN $2::TEXT IS NULL THEN alias         ELSE NULLIF(BTRIM($2), '') END,
                 date_of_birth = CASE WHEN $3::TEXT IS NULL THEN date_of_birth ELSE NULLIF(BTRIM($3), '') END,
                 birth_place   = CASE WHEN $4::TEXT IS NULL THEN birth_place   ELSE NULLIF(BTRIM($4), '') END,
                 gender        = CASE WHEN $5::TEXT IS NULL THEN gender        ELSE NULLIF(BTRIM($5), '') END,
                 parents_names = CASE WHEN $6::TEXT IS NULL THEN parents_names ELSE NULLIF(BTRIM($6), '') END,
                 updated_at    = NOW()
             WHERE id = $7
             RETURNING {CHILD_COLS}"
        ))
        .bind(&patch.full_name)
        .bind(&patch.alias)
        .bind(&patch.date_of_birth)
        .bind(&patch.birth_place)
        .bind(&patch.gender)
        .bind(&patch.parents_names)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_check_violation)?;
        Ok(child)
    }

    async fn set_anchor_hash(
        &self,
        id: &str,
        data_hash: &str,
        issuer_address: &str,
    ) -> Result<Option<ChildRecord>> {
        // Right-hand sides see the row before the update.
        let child = sqlx::query_as::<_, ChildRecord>(&format!(
            "UPDATE children
             SET data_hash      = COALESCE(data_hash, $2),
                 issuer_address = CASE WHEN data_hash IS NULL THEN $3 ELSE issuer_address END,
                 updated_at     = CASE WHEN data_hash IS NULL THEN NOW() ELSE updated_at END
             WHERE id = $1
             RETURNING {CHILD_COLS}"
        ))
        .bind(id)
        .bind(data_hash)
        .bind(issuer_address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(child)
    }

    async fn record_anchor(&self, id: &str, anchor: &AnchorReference) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE children
             SET anchor_tx_hash      = $2,
                 anchor_tx_id        = $3,
                 anchor_network      = $4,
                 is_anchor_activated = TRUE,
                 anchored_at         = NOW(),
                 updated_at          = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(&anchor.tx_hash)
        .bind(&anchor.tx_id)
        .bind(anchor.network.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_credential(&self, credential: &CredentialRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO credentials
             (id, child_id, credential_type, data, signer_address, signature,
              file_name, file_type, file_blob, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(credential.id)
        .bind(&credential.child_id)
        .bind(&credential.credential_type)
        .bind(Json(&credential.data))
        .bind(&credential.signer_address)
        .bind(&credential.signature)
        .bind(&credential.file_name)
        .bind(&credential.file_type)
        .bind(&credential.file_blob)
        .bind(credential.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_credential(&self, id: Uuid) -> Result<Option<CredentialRecord>> {
        let credential = sqlx::query_as::<_, CredentialRecord>(&format!(
            "SELECT {CREDENTIAL_COLS} FROM credentials WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(credential)
    }

    async fn list_credentials_for_child(&self, child_id: &str) -> Result<Vec<CredentialRecord>> {
        let credentials = sqlx::query_as::<_, CredentialRecord>(&format!(
            "SELECT {CREDENTIAL_COLS} FROM credentials
             WHERE child_id = $1
             ORDER BY created_at DESC, seq DESC"
        ))
        .bind(child_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(credentials)
    }

    async fn legacy_child_ids(&self) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT id FROM children WHERE id NOT LIKE 'r%' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn rekey_child(
        &self,
        old_id: &str,
        new_id: &str,
        public_key: Option<&str>,
    ) -> Result<bool> {
        // credentials.child_id follows through ON UPDATE CASCADE.
        // Right-hand sides see the row before the update.
        let result = sqlx::query(
            "UPDATE children
             SET id                = $2,
                 wallet_address    = $2,
                 wallet_public_key = COALESCE($3, wallet_public_key),
                 hash_address      = CASE
                     WHEN data_hash IS NOT NULL AND hash_address IS NULL
                          AND COALESCE(wallet_address, id) <> $2
                     THEN COALESCE(wallet_address, id)
                     ELSE hash_address
                 END,
                 legacy_id         = $1,
                 updated_at        = NOW()
             WHERE id = $1",
        )
        .bind(old_id)
        .bind(new_id)
        .bind(public_key)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
