use tracing::{error, info, warn};

use crate::{
    db::RegistryStore,
    error::{RegistryError, Result},
    models::child::{
        AnchorOutcome, AnchorReference, AnchorResponse, AnchorStatus, RecordAnchorRequest,
    },
    services::{
        anchor_tx::{AnchorTransaction, AnchorTransactionBuilder},
        hashing::hash_child,
        ledger::{IssuerIdentity, LedgerGateway},
        metrics::{ANCHORS_RECORDED_COUNTER, ANCHOR_SUBMISSIONS_COUNTER},
    },
};

pub struct AnchorService;

impl AnchorService {
    /// Anchors (or re-anchors) an existing child.
    ///
    /// The hash stored at first anchoring is reused as is, so a child edited
    /// since then is re-anchored with its original hash. A child without a
    /// stored hash gets one computed from its current fields.
    pub async fn anchor(
        store: &dyn RegistryStore,
        ledger: &dyn LedgerGateway,
        issuer: Option<&IssuerIdentity>,
        builder: &AnchorTransactionBuilder,
        child_id: &str,
    ) -> Result<AnchorResponse> {
        let issuer = issuer.ok_or(RegistryError::IssuerNotConfigured)?;
        let child = store
            .get_child(child_id)
            .await?
            .ok_or_else(|| RegistryError::ChildNotFound(child_id.to_string()))?;

        let child = match child.data_hash {
            Some(_) => child,
            None => store
                .set_anchor_hash(child_id, &hash_child(&child), &issuer.address)
                .await?
                .ok_or_else(|| RegistryError::ChildNotFound(child_id.to_string()))?,
        };
        let data_hash = child.data_hash.clone().ok_or_else(|| {
            RegistryError::Internal(format!("child {child_id} has no hash after hashing"))
        })?;

        let tx = builder.build(child.ledger_address(), &data_hash, &issuer.address);
        let anchor = Self::submit(store, ledger, issuer, child_id, &tx).await?;

        let child = store
            .get_child(child_id)
            .await?
            .ok_or_else(|| RegistryError::ChildNotFound(child_id.to_string()))?;

        Ok(AnchorResponse {
            child,
            data_hash,
            anchor_transaction: tx,
            anchor,
        })
    }

    /// Submits `tx` when the issuer can sign, then records the anchor pointer.
    ///
    /// Ledger failures are reported in the outcome and leave the child as
    /// it was; only storage failures are returned as errors. No store call
    /// is in flight while the ledger is being waited on.
    pub async fn submit(
        store: &dyn RegistryStore,
        ledger: &dyn LedgerGateway,
        issuer: &IssuerIdentity,
        child_id: &str,
        tx: &AnchorTransaction,
    ) -> Result<AnchorOutcome> {
        let Some(seed) = issuer.seed.as_ref() else {
            ANCHOR_SUBMISSIONS_COUNTER.with_label_values(&["pending"]).inc();
            return Ok(AnchorOutcome {
                status: AnchorStatus::Pending,
                tx_hash: None,
                error: None,
            });
        };

        let receipt = match ledger.sign_and_submit(tx, seed).await {
            Ok(receipt) => receipt,
            Err(e @ (RegistryError::SubmissionFailed(_) | RegistryError::NetworkUnavailable(_))) => {
                warn!("Anchor submission for {child_id} failed: {e}");
                ANCHOR_SUBMISSIONS_COUNTER.with_label_values(&["failed"]).inc();
                return Ok(AnchorOutcome {
                    status: AnchorStatus::Failed,
                    tx_hash: None,
                    error: Some(e.to_string()),
                });
            }
            Err(e) => return Err(e),
        };

        let reference = AnchorReference {
            tx_hash: receipt.tx_hash.clone(),
            tx_id: receipt.tx_id,
            network: ledger.network(),
        };
        match store.record_anchor(child_id, &reference).await {
            Ok(true) => {}
            Ok(false) => return Err(RegistryError::ChildNotFound(child_id.to_string())),
            Err(e) => {
                // The payment is on the ledger; keep the hash findable in logs.
                error!(
                    "Anchor {} validated for {child_id} but could not be recorded: {e}",
                    receipt.tx_hash
                );
                return Err(e);
            }
        }

        ANCHOR_SUBMISSIONS_COUNTER.with_label_values(&["recorded"]).inc();
        info!(
            "Anchored {child_id} on {} in {} (ledger {:?})",
            reference.network, reference.tx_hash, receipt.ledger_index
        );
        Ok(AnchorOutcome {
            status: AnchorStatus::Recorded,
            tx_hash: Some(receipt.tx_hash),
            error: None,
        })
    }

    /// Stores an anchor pointer for a transaction signed and submitted
    /// outside the server (e.g. from a browser wallet).
    pub async fn record_anchor(
        store: &dyn RegistryStore,
        child_id: &str,
        req: RecordAnchorRequest,
    ) -> Result<AnchorReference> {
        if req.transaction_hash.trim().is_empty() {
            return Err(RegistryError::Validation("transactionHash is required".into()));
        }
        let reference = req.into_reference();
        if !store.record_anchor(child_id, &reference).await? {
            return Err(RegistryError::ChildNotFound(child_id.to_string()));
        }
        ANCHORS_RECORDED_COUNTER.inc();
        info!("Recorded anchor {} for {child_id}", reference.tx_hash);
        Ok(reference)
    }
}
