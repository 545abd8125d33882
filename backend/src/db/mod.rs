pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        child::{AnchorReference, ChildRecord, UpdateChildRequest},
        credential::CredentialRecord,
    },
};

pub use memory::MemoryRegistryStore;
pub use postgres::PgRegistryStore;

/// Persistence for child and credential records.
///
/// Each operation is atomic for the record it touches; implementations
/// never hold a lock past the end of a call.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Cheap reachability check for the health endpoint.
    async fn ping(&self) -> Result<()>;

    async fn insert_child(&self, child: &ChildRecord) -> Result<()>;

    async fn get_child(&self, id: &str) -> Result<Option<ChildRecord>>;

    /// Newest first.
    async fn list_children(&self) -> Result<Vec<ChildRecord>>;

    /// Applies `patch` and returns the updated record, `None` if absent.
    /// Fails with `Validation` if the result has neither alias nor full name.
    async fn update_child_identity(
        &self,
        id: &str,
        patch: &UpdateChildRequest,
    ) -> Result<Option<ChildRecord>>;

    /// Stores the first hash computed for a child that had none. An
    /// existing hash is left untouched; returns the record as stored.
    async fn set_anchor_hash(
        &self,
        id: &str,
        data_hash: &str,
        issuer_address: &str,
    ) -> Result<Option<ChildRecord>>;

    /// Overwrites the anchor pointer and marks the anchor active.
    /// Returns `false` if the child does not exist.
    async fn record_anchor(&self, id: &str, anchor: &AnchorReference) -> Result<bool>;

    async fn insert_credential(&self, credential: &CredentialRecord) -> Result<()>;

    async fn get_credential(&self, id: Uuid) -> Result<Option<CredentialRecord>>;

    /// Newest first; records created in the same instant keep reverse
    /// insertion order.
    async fn list_credentials_for_child(&self, child_id: &str) -> Result<Vec<CredentialRecord>>;

    /// Ids of children still carrying a generated (non-address) id.
    async fn legacy_child_ids(&self) -> Result<Vec<String>>;

    /// Moves a child and its credentials to `new_id` (also its wallet
    /// address), remembering the old id. `public_key: None` keeps the
    /// stored key. A stored hash keeps covering the address it was computed
    /// over. Returns `false` if the child does not exist.
    async fn rekey_child(
        &self,
        old_id: &str,
        new_id: &str,
        public_key: Option<&str>,
    ) -> Result<bool>;
}

pub async fn create_pool(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run the migrations embedded from ./migrations/
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Legacy ids were generated as `child_<random>`; current ids are ledger
/// addresses (`r...`).
pub fn is_legacy_child_id(id: &str) -> bool {
    !id.starts_with('r')
}
