use tracing::warn;

use crate::{
    db::RegistryStore,
    error::{RegistryError, Result},
    models::{
        child::ChildRecord,
        verification::{IntegrityStatus, VerificationResult, VerifiedChildSummary},
    },
    services::{
        hashing::{hash_child, normalize_hash},
        ledger::LedgerGateway,
        metrics::VERIFICATIONS_COUNTER,
    },
};

pub struct IntegrityVerifier;

impl IntegrityVerifier {
    /// Recomputes the child's hash and compares it with the stored hash and
    /// with the hash carried by the anchor transaction.
    ///
    /// Ledger errors never fail the check: the on-chain side is reported as
    /// absent and the reason is carried in `gateway_error`. The same goes
    /// for an anchor that is not validated yet or has no memo.
    pub async fn verify(
        store: &dyn RegistryStore,
        ledger: &dyn LedgerGateway,
        child_id: &str,
    ) -> Result<VerificationResult> {
        let child = store
            .get_child(child_id)
            .await?
            .ok_or_else(|| RegistryError::ChildNotFound(child_id.to_string()))?;

        let calculated_hash = hash_child(&child);
        let stored_hash = child.data_hash.as_deref().map(normalize_hash);
        let hash_match = stored_hash.as_deref() == Some(calculated_hash.as_str());

        let (transaction, gateway_error) = match child.anchor_tx_hash.as_deref() {
            Some(tx_hash) => match ledger.fetch_transaction(tx_hash).await {
                Ok(tx) => (Some(tx), None),
                Err(e) => {
                    warn!("Could not read anchor {tx_hash} for {child_id}: {e}");
                    (None, Some(e.to_string()))
                }
            },
            None => (None, None),
        };

        // Only a validated transaction speaks for the ledger.
        let (blockchain_hash, unusable) = match transaction.as_ref() {
            Some(tx) if !tx.validated => (
                None,
                Some(format!("transaction {} is not validated yet", tx.hash)),
            ),
            Some(tx) => match tx.memo_data.as_deref() {
                Some(memo) => (Some(normalize_hash(memo)), None),
                None => (None, Some(format!("transaction {} carries no memo", tx.hash))),
            },
            None => (None, None),
        };
        let gateway_error = gateway_error.or(unusable);
        let blockchain_verified = blockchain_hash.as_deref() == Some(calculated_hash.as_str());
        let integrity = hash_match && (blockchain_hash.is_none() || blockchain_verified);

        let status = integrity_status(
            stored_hash.is_some(),
            hash_match,
            child.anchor_tx_hash.is_some(),
            blockchain_hash.is_some(),
            blockchain_verified,
        );
        let label = status.to_string();
        VERIFICATIONS_COUNTER.with_label_values(&[label.as_str()]).inc();
        if status == IntegrityStatus::Tampered {
            warn!(
                "Integrity mismatch for {child_id}: calculated {calculated_hash}, stored {:?}, on-chain {:?}",
                stored_hash, blockchain_hash
            );
        }

        Ok(VerificationResult {
            child_id: child.id.clone(),
            calculated_hash,
            stored_hash,
            blockchain_hash,
            hash_match,
            blockchain_verified,
            integrity,
            status,
            transaction,
            gateway_error,
            child: summary(&child),
        })
    }
}

fn integrity_status(
    has_stored_hash: bool,
    hash_match: bool,
    has_anchor: bool,
    has_chain_hash: bool,
    chain_match: bool,
) -> IntegrityStatus {
    if has_chain_hash && !chain_match {
        return IntegrityStatus::Tampered;
    }
    if !has_stored_hash {
        // Nothing was hashed at anchoring time, so a matching memo proves
        // nothing about the record's history.
        return IntegrityStatus::Unanchored;
    }
    if !hash_match {
        return IntegrityStatus::Tampered;
    }
    match (has_anchor, has_chain_hash) {
        (false, _) => IntegrityStatus::Unanchored,
        (true, false) => IntegrityStatus::Unconfirmed,
        (true, true) => IntegrityStatus::Verified,
    }
}

fn summary(child: &ChildRecord) -> VerifiedChildSummary {
    VerifiedChildSummary {
        id: child.id.clone(),
        alias: child.alias.clone(),
        full_name: child.full_name.clone(),
        wallet_address: child.ledger_address().to_string(),
        anchor_tx_hash: child.anchor_tx_hash.clone(),
        is_anchor_activated: child.is_anchor_activated,
        created_at: child.created_at,
        updated_at: child.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::MemoryRegistryStore,
        models::child::{CreateChildRequest, IdentityFields, RecordAnchorRequest, UpdateChildRequest},
        services::{
            anchor_tx::AnchorTransactionBuilder, anchoring::AnchorService, children::ChildService,
        },
        test_support::{signing_issuer, FakeLedger},
    };

    async fn create(store: &MemoryRegistryStore, ledger: &FakeLedger, anchor: bool) -> String {
        let issuer = signing_issuer();
        let req = CreateChildRequest {
            identity: IdentityFields {
                alias: Some("Ahmed".into()),
                date_of_birth: Some("2015-03-02".into()),
                ..Default::default()
            },
            anchor,
        };
        ChildService::create(
            store,
            ledger,
            Some(&issuer),
            &AnchorTransactionBuilder::default(),
            req,
        )
        .await
        .unwrap()
        .child
        .id
    }

    #[tokio::test]
    async fn test_fresh_anchor_verifies() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        let id = create(&store, &ledger, true).await;

        let result = IntegrityVerifier::verify(&store, &ledger, &id).await.unwrap();
        assert!(result.hash_match);
        assert!(result.blockchain_verified);
        assert!(result.integrity);
        assert_eq!(result.status, IntegrityStatus::Verified);
        assert_eq!(result.blockchain_hash.as_deref(), Some(result.calculated_hash.as_str()));
        assert!(result.transaction.is_some());
        assert!(result.gateway_error.is_none());
        assert_eq!(result.child.wallet_address, id);
    }

    #[tokio::test]
    async fn test_edit_after_anchor_is_tampering() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        let id = create(&store, &ledger, true).await;
        let anchored_hash = store.get_child(&id).await.unwrap().unwrap().data_hash;

        let patch = UpdateChildRequest {
            date_of_birth: Some("2014-03-02".into()),
            ..Default::default()
        };
        ChildService::update(&store, &id, &patch).await.unwrap();

        let result = IntegrityVerifier::verify(&store, &ledger, &id).await.unwrap();
        assert!(!result.hash_match);
        assert!(!result.blockchain_verified);
        assert!(!result.integrity);
        assert_eq!(result.status, IntegrityStatus::Tampered);
        // The ledger still agrees with what was stored at anchoring time.
        assert_eq!(result.blockchain_hash, anchored_hash);
        assert_eq!(result.stored_hash, anchored_hash);
    }

    #[tokio::test]
    async fn test_unanchored_child() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        let id = create(&store, &ledger, false).await;

        let result = IntegrityVerifier::verify(&store, &ledger, &id).await.unwrap();
        assert!(result.stored_hash.is_none());
        assert!(!result.hash_match);
        assert!(!result.integrity);
        assert!(result.blockchain_hash.is_none());
        assert_eq!(result.status, IntegrityStatus::Unanchored);
        assert_eq!(ledger.lookups(), 0);
    }

    #[tokio::test]
    async fn test_ledger_outage_is_not_an_error() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        let id = create(&store, &ledger, true).await;
        ledger.go_offline();

        let result = IntegrityVerifier::verify(&store, &ledger, &id).await.unwrap();
        assert!(result.hash_match);
        assert!(result.blockchain_hash.is_none());
        assert!(!result.blockchain_verified);
        assert!(result.integrity);
        assert_eq!(result.status, IntegrityStatus::Unconfirmed);
        assert!(result.gateway_error.is_some());
    }

    #[tokio::test]
    async fn test_forged_onchain_memo_is_tampering() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        let id = create(&store, &ledger, true).await;
        let tx_hash = store
            .get_child(&id)
            .await
            .unwrap()
            .unwrap()
            .anchor_tx_hash
            .unwrap();
        ledger.overwrite_memo(&tx_hash, &"0".repeat(64));

        let result = IntegrityVerifier::verify(&store, &ledger, &id).await.unwrap();
        assert!(result.hash_match);
        assert!(!result.blockchain_verified);
        assert!(!result.integrity);
        assert_eq!(result.status, IntegrityStatus::Tampered);
    }

    async fn anchor_hash(store: &MemoryRegistryStore, id: &str) -> String {
        store
            .get_child(id)
            .await
            .unwrap()
            .unwrap()
            .anchor_tx_hash
            .unwrap()
    }

    #[tokio::test]
    async fn test_unvalidated_anchor_is_unconfirmed() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        let id = create(&store, &ledger, true).await;
        let tx_hash = anchor_hash(&store, &id).await;
        ledger.mark_unvalidated(&tx_hash);

        let result = IntegrityVerifier::verify(&store, &ledger, &id).await.unwrap();
        assert!(result.hash_match);
        assert!(result.blockchain_hash.is_none());
        assert!(!result.blockchain_verified);
        assert_eq!(result.status, IntegrityStatus::Unconfirmed);
        assert!(!result.transaction.as_ref().unwrap().validated);
        assert!(result.gateway_error.unwrap().contains("not validated"));
    }

    #[tokio::test]
    async fn test_anchor_without_memo_is_unconfirmed() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        let id = create(&store, &ledger, true).await;
        let tx_hash = anchor_hash(&store, &id).await;
        ledger.strip_memo(&tx_hash);

        let result = IntegrityVerifier::verify(&store, &ledger, &id).await.unwrap();
        assert!(result.blockchain_hash.is_none());
        assert!(!result.blockchain_verified);
        assert!(result.integrity);
        assert_eq!(result.status, IntegrityStatus::Unconfirmed);
        assert!(result.transaction.is_some());
        assert!(result.gateway_error.unwrap().contains("no memo"));
    }

    #[tokio::test]
    async fn test_anchor_unknown_to_ledger_is_unconfirmed() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        let id = create(&store, &ledger, true).await;
        let unknown = "F".repeat(64);
        AnchorService::record_anchor(
            &store,
            &id,
            RecordAnchorRequest {
                transaction_hash: unknown.clone(),
                transaction_id: None,
                network: None,
            },
        )
        .await
        .unwrap();

        let result = IntegrityVerifier::verify(&store, &ledger, &id).await.unwrap();
        assert!(result.hash_match);
        assert!(result.transaction.is_none());
        assert!(result.blockchain_hash.is_none());
        assert_eq!(result.status, IntegrityStatus::Unconfirmed);
        assert!(result.gateway_error.unwrap().contains(&unknown));
    }

    #[tokio::test]
    async fn test_unknown_child() {
        let store = MemoryRegistryStore::new();
        let ledger = FakeLedger::new();
        assert!(matches!(
            IntegrityVerifier::verify(&store, &ledger, "rNobody").await,
            Err(RegistryError::ChildNotFound(_))
        ));
    }

    #[test]
    fn test_status_table() {
        use IntegrityStatus::*;
        assert_eq!(integrity_status(false, false, false, false, false), Unanchored);
        assert_eq!(integrity_status(true, true, false, false, false), Unanchored);
        assert_eq!(integrity_status(true, true, true, false, false), Unconfirmed);
        assert_eq!(integrity_status(true, true, true, true, true), Verified);
        assert_eq!(integrity_status(true, false, true, true, false), Tampered);
        assert_eq!(integrity_status(true, false, true, false, false), Tampered);
        assert_eq!(integrity_status(true, true, true, true, false), Tampered);
        assert_eq!(integrity_status(false, false, true, true, true), Unanchored);
        assert_eq!(integrity_status(false, false, true, true, false), Tampered);
    }
}
