use tracing::{error, info, warn};

use crate::{
    db::{is_legacy_child_id, RegistryStore},
    error::{RegistryError, Result},
    models::child::{
        AnchorOutcome, AnchorStatus, ChildRecord, CreateChildRequest, CreateChildResponse,
        UpdateChildRequest, WalletDisclosure,
    },
    services::{
        anchor_tx::AnchorTransactionBuilder,
        anchoring::AnchorService,
        hashing::hash_child,
        ledger::{IssuerIdentity, LedgerGateway, LedgerSeed},
        metrics::CHILDREN_CREATED_COUNTER,
    },
};

const MISSING_IDENTIFIER: &str = "At least one identifier is required (alias or fullName)";

pub struct ChildService;

/// A legacy child moved to address-as-id.
#[derive(Debug)]
pub struct LegacyRekey {
    pub old_id: String,
    pub new_id: String,
    /// Set only when the migration had to generate the wallet.
    pub seed: Option<LedgerSeed>,
}

impl ChildService {
    /// Registers a child under a freshly generated ledger wallet.
    ///
    /// With `anchor: true` the creation state is hashed, stored with the
    /// record, and (when the issuer can sign) submitted to the ledger.
    /// Nothing after the insert can fail the call: a failed submission or
    /// bookkeeping error shows up in the anchor outcome. The wallet seed is
    /// returned once and never persisted.
    pub async fn create(
        store: &dyn RegistryStore,
        ledger: &dyn LedgerGateway,
        issuer: Option<&IssuerIdentity>,
        builder: &AnchorTransactionBuilder,
        req: CreateChildRequest,
    ) -> Result<CreateChildResponse> {
        let identity = req.identity.normalized();
        if !identity.has_identifier() {
            return Err(RegistryError::Validation(MISSING_IDENTIFIER.into()));
        }
        let issuer = if req.anchor {
            Some(issuer.ok_or(RegistryError::IssuerNotConfigured)?)
        } else {
            None
        };

        let wallet = ledger.generate_wallet().await?;
        let mut child = ChildRecord::new(identity, wallet.address.clone(), wallet.public_key.clone());

        let template = issuer.map(|issuer| {
            let hash = hash_child(&child);
            let tx = builder.build(&child.id, &hash, &issuer.address);
            child.data_hash = Some(hash);
            child.issuer_address = Some(issuer.address.clone());
            tx
        });

        store.insert_child(&child).await?;
        CHILDREN_CREATED_COUNTER
            .with_label_values(&[if template.is_some() { "true" } else { "false" }])
            .inc();
        info!("Registered child {} ({})", child.id, child.display_name());

        // The child exists from here on: failures are reported, never
        // returned, so the seed still reaches the caller.
        let anchor = match (issuer, template.as_ref()) {
            (Some(issuer), Some(tx)) => {
                let outcome = AnchorService::submit(store, ledger, issuer, &child.id, tx)
                    .await
                    .unwrap_or_else(|e| {
                        error!("Anchoring new child {} failed: {e}", child.id);
                        AnchorOutcome {
                            status: AnchorStatus::Failed,
                            tx_hash: None,
                            error: Some(e.to_string()),
                        }
                    });
                match store.get_child(&child.id).await {
                    Ok(Some(current)) => child = current,
                    Ok(None) => warn!("Child {} vanished right after creation", child.id),
                    Err(e) => warn!("Could not re-read child {} after anchoring: {e}", child.id),
                }
                Some(outcome)
            }
            _ => None,
        };

        Ok(CreateChildResponse {
            data_hash: child.data_hash.clone(),
            child,
            wallet: WalletDisclosure {
                address: wallet.address,
                public_key: wallet.public_key,
                seed: wallet.seed.into_inner(),
            },
            anchor_transaction: template,
            anchor,
        })
    }

    /// Re-keys a child still carrying a generated `child_<random>` id.
    ///
    /// A child that already owns a wallet moves to that address; otherwise
    /// a wallet is generated for it. A stored hash stays valid either way.
    /// Returns `None` if the child is gone.
    pub async fn migrate_legacy(
        store: &dyn RegistryStore,
        ledger: &dyn LedgerGateway,
        old_id: &str,
    ) -> Result<Option<LegacyRekey>> {
        if !is_legacy_child_id(old_id) {
            return Err(RegistryError::Validation(format!(
                "{old_id} is already a ledger address"
            )));
        }
        let Some(child) = store.get_child(old_id).await? else {
            return Ok(None);
        };

        let existing = child
            .wallet_address
            .as_deref()
            .filter(|address| !is_legacy_child_id(address));
        let (new_id, public_key, seed) = match existing {
            Some(address) => (address.to_string(), None, None),
            None => {
                let wallet = ledger.generate_wallet().await?;
                (wallet.address, Some(wallet.public_key), Some(wallet.seed))
            }
        };

        if !store
            .rekey_child(old_id, &new_id, public_key.as_deref())
            .await?
        {
            return Ok(None);
        }
        info!(
            "Re-keyed legacy child {old_id} to {new_id} ({} wallet)",
            if seed.is_some() { "new" } else { "existing" }
        );
        Ok(Some(LegacyRekey {
            old_id: old_id.to_string(),
            new_id,
            seed,
        }))
    }

    pub async fn list(store: &dyn RegistryStore) -> Result<Vec<ChildRecord>> {
        store.list_children().await
    }

    pub async fn get(store: &dyn RegistryStore, id: &str) -> Result<ChildRecord> {
        store
            .get_child(id)
            .await?
            .ok_or_else(|| RegistryError::ChildNotFound(id.to_string()))
    }

    /// Edits identity fields. The stored hash is left alone, so an edit
    /// after anchoring shows up as a mismatch on the next verification.
    pub async fn update(
        store: &dyn RegistryStore,
        id: &str,
        req: &UpdateChildRequest,
    ) -> Result<ChildRecord> {
        let child = store
            .update_child_identity(id, req)
            .await?
            .ok_or_else(|| RegistryError::ChildNotFound(id.to_string()))?;
        info!("Updated child {id}");
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryRegistryStore,
        models::{child::IdentityFields, verification::IntegrityStatus},
        services::{
            hashing::compute_data_hash,
            verification::IntegrityVerifier,
        },
        test_support::{issuer, signing_issuer, FakeLedger, FlakyStore},
    };

    fn request(alias: Option<&str>, full_name: Option<&str>, anchor: bool) -> CreateChildRequest {
        CreateChildRequest {
            identity: IdentityFields {
                alias: alias.map(Into::into),
                full_name: full_name.map(Into::into),
                birth_place: Some("Homs".into()),
                ..Default::default()
            },
            anchor,
        }
    }

    #[tokio::test]
    async fn test_create_requires_identifier() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();

        let result = ChildService::create(
            &store,
            &ledger,
            None,
            &AnchorTransactionBuilder::default(),
            request(Some("   "), None, false),
        )
        .await;
        assert!(matches!(result, Err(RegistryError::Validation(_))));
        assert!(store.list_children().await.unwrap().is_empty());
        assert_eq!(ledger.wallets_generated(), 0);
    }

    #[tokio::test]
    async fn test_create_without_anchor() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();

        let created = ChildService::create(
            &store,
            &ledger,
            None,
            &AnchorTransactionBuilder::default(),
            request(Some("Ahmed"), None, false),
        )
        .await
        .unwrap();

        assert_eq!(created.child.id, created.wallet.address);
        assert_eq!(created.child.ledger_address(), created.wallet.address);
        assert!(created.wallet.seed.starts_with('s'));
        assert!(created.data_hash.is_none());
        assert!(created.anchor.is_none());
        assert!(created.child.data_hash.is_none());

        let stored = store.get_child(&created.child.id).await.unwrap().unwrap();
        // The seed is never persisted.
        let serialized = serde_json::to_string(&stored).unwrap();
        assert!(!serialized.contains(&created.wallet.seed));
    }

    #[tokio::test]
    async fn test_create_with_anchor_records_creation_hash() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        let issuer = signing_issuer();

        let created = ChildService::create(
            &store,
            &ledger,
            Some(&issuer),
            &AnchorTransactionBuilder::default(),
            request(None, Some("Amina"), true),
        )
        .await
        .unwrap();

        let expected = compute_data_hash(&created.child.identity(), &created.wallet.address);
        assert_eq!(created.data_hash.as_deref(), Some(expected.as_str()));
        let tx = created.anchor_transaction.as_ref().unwrap();
        assert_eq!(tx.memo_hash(), Some(expected.as_str()));
        assert_eq!(tx.destination, created.wallet.address);

        let outcome = created.anchor.unwrap();
        assert!(matches!(outcome.status, AnchorStatus::Recorded));
        assert!(created.child.is_anchor_activated);
        assert_eq!(created.child.anchor_tx_hash, outcome.tx_hash);
        assert_eq!(created.child.issuer_address.as_deref(), Some(issuer.address.as_str()));
    }

    #[tokio::test]
    async fn test_create_anchor_requires_issuer() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();

        let result = ChildService::create(
            &store,
            &ledger,
            None,
            &AnchorTransactionBuilder::default(),
            request(Some("Ahmed"), None, true),
        )
        .await;
        assert!(matches!(result, Err(RegistryError::IssuerNotConfigured)));
        assert!(store.list_children().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_keeps_child_when_submission_fails() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        ledger.fail_submissions("tecUNFUNDED_PAYMENT");
        let issuer = signing_issuer();

        let created = ChildService::create(
            &store,
            &ledger,
            Some(&issuer),
            &AnchorTransactionBuilder::default(),
            request(Some("Ahmed"), None, true),
        )
        .await
        .unwrap();

        assert!(matches!(created.anchor.unwrap().status, AnchorStatus::Failed));
        let stored = store.get_child(&created.child.id).await.unwrap().unwrap();
        assert!(!stored.is_anchor_activated);
        assert!(stored.data_hash.is_some());
    }

    #[tokio::test]
    async fn test_create_with_template_only_issuer() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        let issuer = issuer();

        let created = ChildService::create(
            &store,
            &ledger,
            Some(&issuer),
            &AnchorTransactionBuilder::default(),
            request(Some("Ahmed"), None, true),
        )
        .await
        .unwrap();

        assert!(matches!(created.anchor.unwrap().status, AnchorStatus::Pending));
        assert!(created.anchor_transaction.is_some());
        assert!(ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_wallet_failure_creates_nothing() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        ledger.go_offline();

        let result = ChildService::create(
            &store,
            &ledger,
            None,
            &AnchorTransactionBuilder::default(),
            request(Some("Ahmed"), None, false),
        )
        .await;
        assert!(matches!(result, Err(RegistryError::NetworkUnavailable(_))));
        assert!(store.list_children().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_and_get() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        let created = ChildService::create(
            &store,
            &ledger,
            None,
            &AnchorTransactionBuilder::default(),
            request(Some("Ahmed"), None, false),
        )
        .await
        .unwrap();
        let id = created.child.id;

        let patch = UpdateChildRequest {
            full_name: Some("Ahmed Karim".into()),
            ..Default::default()
        };
        let updated = ChildService::update(&store, &id, &patch).await.unwrap();
        assert_eq!(updated.full_name.as_deref(), Some("Ahmed Karim"));
        assert_eq!(ChildService::get(&store, &id).await.unwrap(), updated);

        assert!(matches!(
            ChildService::get(&store, "rNobody").await,
            Err(RegistryError::ChildNotFound(_))
        ));
        assert!(matches!(
            ChildService::update(&store, "rNobody", &patch).await,
            Err(RegistryError::ChildNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_anchor_bookkeeping_failure_still_discloses_seed() {
        let store = FlakyStore::new();
        store.fail_record_anchor();
        let ledger = FakeLedger::new();
        let issuer = signing_issuer();

        let created = ChildService::create(
            &store,
            &ledger,
            Some(&issuer),
            &AnchorTransactionBuilder::default(),
            request(Some("Ahmed"), None, true),
        )
        .await
        .unwrap();

        assert!(created.wallet.seed.starts_with('s'));
        let outcome = created.anchor.unwrap();
        assert!(matches!(outcome.status, AnchorStatus::Failed));
        assert!(outcome.error.is_some());
        // The payment went out; only recording it failed.
        assert_eq!(ledger.submissions().len(), 1);
        assert!(store.get_child(&created.child.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_reread_failure_falls_back_to_created_record() {
        let store = FlakyStore::new();
        let ledger = FakeLedger::new();
        let issuer = signing_issuer();
        store.fail_reads();

        let created = ChildService::create(
            &store,
            &ledger,
            Some(&issuer),
            &AnchorTransactionBuilder::default(),
            request(Some("Ahmed"), None, true),
        )
        .await
        .unwrap();

        assert!(matches!(created.anchor.unwrap().status, AnchorStatus::Recorded));
        assert_eq!(created.child.id, created.wallet.address);
        assert!(created.child.data_hash.is_some());
        assert!(!created.wallet.seed.is_empty());
    }

    fn legacy_child(id: &str, wallet_address: Option<&str>) -> ChildRecord {
        let identity = IdentityFields {
            alias: Some("Ahmed".into()),
            ..Default::default()
        };
        let mut child = ChildRecord::new(identity, id.into(), "ED00".into());
        child.wallet_address = wallet_address.map(Into::into);
        child.data_hash = Some(hash_child(&child));
        child
    }

    #[tokio::test]
    async fn test_migrating_legacy_id_keeps_hash_valid() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        store
            .insert_child(&legacy_child("child_ab12cd", None))
            .await
            .unwrap();
        let before = IntegrityVerifier::verify(&store, &ledger, "child_ab12cd")
            .await
            .unwrap();
        assert!(before.hash_match);

        let rekey = ChildService::migrate_legacy(&store, &ledger, "child_ab12cd")
            .await
            .unwrap()
            .unwrap();
        assert!(rekey.seed.is_some());
        assert_eq!(ledger.wallets_generated(), 1);

        let after = IntegrityVerifier::verify(&store, &ledger, &rekey.new_id)
            .await
            .unwrap();
        assert!(after.hash_match);
        assert_eq!(after.stored_hash, before.stored_hash);
        assert_eq!(after.status, IntegrityStatus::Unanchored);

        let moved = ChildService::get(&store, &rekey.new_id).await.unwrap();
        assert_eq!(moved.legacy_id.as_deref(), Some("child_ab12cd"));
        assert_eq!(moved.ledger_address(), rekey.new_id);

        // Edits are still caught after the move.
        let patch = UpdateChildRequest {
            alias: Some("Omar".into()),
            ..Default::default()
        };
        ChildService::update(&store, &rekey.new_id, &patch).await.unwrap();
        let edited = IntegrityVerifier::verify(&store, &ledger, &rekey.new_id)
            .await
            .unwrap();
        assert_eq!(edited.status, IntegrityStatus::Tampered);
    }

    #[tokio::test]
    async fn test_migrating_legacy_id_reuses_existing_wallet() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        store
            .insert_child(&legacy_child("child_ab12cd", Some("rExistingWallet")))
            .await
            .unwrap();

        let rekey = ChildService::migrate_legacy(&store, &ledger, "child_ab12cd")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rekey.new_id, "rExistingWallet");
        assert!(rekey.seed.is_none());
        assert_eq!(ledger.wallets_generated(), 0);

        let moved = ChildService::get(&store, "rExistingWallet").await.unwrap();
        assert_eq!(moved.wallet_public_key.as_deref(), Some("ED00"));
        assert!(moved.hash_address.is_none());
        let result = IntegrityVerifier::verify(&store, &ledger, "rExistingWallet")
            .await
            .unwrap();
        assert!(result.hash_match);
        assert_ne!(result.status, IntegrityStatus::Tampered);
    }

    #[tokio::test]
    async fn test_migrate_rejects_addresses_and_skips_missing() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        assert!(matches!(
            ChildService::migrate_legacy(&store, &ledger, "rAlreadyAnAddress").await,
            Err(RegistryError::Validation(_))
        ));
        assert!(ChildService::migrate_legacy(&store, &ledger, "child_gone")
            .await
            .unwrap()
            .is_none());
    }
}
