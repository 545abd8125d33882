use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{is_legacy_child_id, RegistryStore};
use crate::{
    error::{RegistryError, Result},
    models::{
        child::{AnchorReference, ChildRecord, UpdateChildRequest},
        credential::CredentialRecord,
    },
};

/// Process-local store. Used when no database is configured and in tests;
/// everything is lost on restart.
#[derive(Default)]
pub struct MemoryRegistryStore {
    children: RwLock<HashMap<String, ChildRecord>>,
    // Insertion order doubles as the tie-breaker for equal timestamps.
    credentials: RwLock<Vec<CredentialRecord>>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn insert_child(&self, child: &ChildRecord) -> Result<()> {
        let mut children = self.children.write().await;
        if children.contains_key(&child.id) {
            return Err(RegistryError::Storage(format!(
                "child {} already exists",
                child.id
            )));
        }
        children.insert(child.id.clone(), child.clone());
        Ok(())
    }

    async fn get_child(&self, id: &str) -> Result<Option<ChildRecord>> {
        Ok(self.children.read().await.get(id).cloned())
    }

    async fn list_children(&self) -> Result<Vec<ChildRecord>> {
        let mut children: Vec<ChildRecord> = self.children.read().await.values().cloned().collect();
        children.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(children)
    }

    async fn update_child_identity(
        &self,
        id: &str,
        patch: &UpdateChildRequest,
    ) -> Result<Option<ChildRecord>> {
        let mut children = self.children.write().await;
        let Some(current) = children.get(id) else {
            return Ok(None);
        };

        let mut updated = current.clone();
        patch.apply_to(&mut updated);
        if !updated.identity().has_identifier() {
            return Err(RegistryError::Validation(
                "At least one identifier is required (alias or fullName)".into(),
            ));
        }
        children.insert(id.to_string(), updated.clone());
        Ok(Some(updated))
    }

    async fn set_anchor_hash(
        &self,
        id: &str,
        data_hash: &str,
        issuer_address: &str,
    ) -> Result<Option<ChildRecord>> {
        let mut children = self.children.write().await;
        let Some(child) = children.get_mut(id) else {
            return Ok(None);
        };
        if child.data_hash.is_none() {
            child.data_hash = Some(data_hash.to_string());
            child.issuer_address = Some(issuer_address.to_string());
            child.updated_at = Utc::now();
        }
        Ok(Some(child.clone()))
    }

    async fn record_anchor(&self, id: &str, anchor: &AnchorReference) -> Result<bool> {
        let mut children = self.children.write().await;
        let Some(child) = children.get_mut(id) else {
            return Ok(false);
        };
        let now = Utc::now();
        child.anchor_tx_hash = Some(anchor.tx_hash.clone());
        child.anchor_tx_id = Some(anchor.tx_id.clone());
        child.anchor_network = anchor.network;
        child.is_anchor_activated = true;
        child.anchored_at = Some(now);
        child.updated_at = now;
        Ok(true)
    }

    async fn insert_credential(&self, credential: &CredentialRecord) -> Result<()> {
        self.credentials.write().await.push(credential.clone());
        Ok(())
    }

    async fn get_credential(&self, id: Uuid) -> Result<Option<CredentialRecord>> {
        Ok(self
            .credentials
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned())
    }

    async fn list_credentials_for_child(&self, child_id: &str) -> Result<Vec<CredentialRecord>> {
        let mut credentials: Vec<CredentialRecord> = self
            .credentials
            .read()
            .await
            .iter()
            .rev()
            .filter(|c| c.child_id == child_id)
            .cloned()
            .collect();
        // Stable sort keeps reverse insertion order for equal timestamps.
        credentials.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(credentials)
    }

    async fn legacy_child_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .children
            .read()
            .await
            .keys()
            .filter(|id| is_legacy_child_id(id))
            .cloned()
            .collect())
    }

    async fn rekey_child(
        &self,
        old_id: &str,
        new_id: &str,
        public_key: Option<&str>,
    ) -> Result<bool> {
        let mut children = self.children.write().await;
        if old_id != new_id && children.contains_key(new_id) {
            return Err(RegistryError::Storage(format!("child {new_id} already exists")));
        }
        let Some(mut child) = children.remove(old_id) else {
            return Ok(false);
        };
        if child.data_hash.is_some()
            && child.hash_address.is_none()
            && child.ledger_address() != new_id
        {
            child.hash_address = Some(child.ledger_address().to_string());
        }
        child.id = new_id.to_string();
        child.wallet_address = Some(new_id.to_string());
        if let Some(public_key) = public_key {
            child.wallet_public_key = Some(public_key.to_string());
        }
        child.legacy_id = Some(old_id.to_string());
        child.updated_at = Utc::now();
        children.insert(new_id.to_string(), child);

        let mut credentials = self.credentials.write().await;
        for credential in credentials.iter_mut().filter(|c| c.child_id == old_id) {
            credential.child_id = new_id.to_string();
        }
        Ok(true)
    }
}
