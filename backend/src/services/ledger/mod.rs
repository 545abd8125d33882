//! Ledger gateway: the only component that talks to the XRP Ledger.
//!
//! The registry treats the ledger as a black box offering three things:
//! generate a keypair, sign+submit a transaction and wait for validation,
//! and fetch a transaction by hash. Keypairs are derived in-process; the
//! other two are network-bound and may suspend for a full consensus round,
//! so callers must not hold store locks across them.

pub mod codec;
pub mod keys;
pub mod xrpl;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::{error::Result, models::child::AnchorNetwork, services::anchor_tx::AnchorTransaction};

/// Ledger secret. `Debug` never prints the value.
#[derive(Clone)]
pub struct LedgerSeed(String);

impl LedgerSeed {
    pub fn new(seed: impl Into<String>) -> Self {
        Self(seed.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consumes the seed, for the one-time disclosure to the caller.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Debug for LedgerSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("LedgerSeed(<redacted>)")
    }
}

/// The organization's issuing account, built from configuration at startup
/// and passed to every anchoring call.
#[derive(Debug, Clone)]
pub struct IssuerIdentity {
    pub address: String,
    /// Present when the server signs anchors itself.
    pub seed: Option<LedgerSeed>,
}

impl IssuerIdentity {
    pub fn from_config(address: Option<String>, seed: Option<String>) -> Option<Self> {
        address.map(|address| IssuerIdentity {
            address,
            seed: seed.map(LedgerSeed::new),
        })
    }

    pub fn can_sign(&self) -> bool {
        self.seed.is_some()
    }
}

/// Fresh keypair for a child. The seed must not outlive the create call.
#[derive(Debug)]
pub struct GeneratedWallet {
    pub address: String,
    pub public_key: String,
    pub seed: LedgerSeed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub tx_hash: String,
    pub tx_id: String,
    pub ledger_index: Option<u32>,
    pub validated: bool,
}

/// Transaction as read back from the ledger, kept for audit display.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerTransaction {
    pub hash: String,
    pub ledger_index: Option<u32>,
    pub validated: bool,
    pub account: String,
    pub destination: Option<String>,
    pub amount: Option<Value>,
    pub fee: Option<String>,
    /// Seconds since the ripple epoch (2000-01-01).
    pub date: Option<u64>,
    /// Hash carried in the memo, uppercase hex.
    pub memo_data: Option<String>,
}

#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Network the gateway submits to.
    fn network(&self) -> AnchorNetwork;

    /// Fresh ed25519 wallet. Needs no ledger round trip.
    async fn generate_wallet(&self) -> Result<GeneratedWallet>;

    /// Signs with `signer`, submits, and waits until the network reports
    /// the validated outcome. Fails with `SubmissionFailed` when the
    /// transaction is rejected or not validated within the gateway's
    /// polling budget.
    async fn sign_and_submit(
        &self,
        tx: &AnchorTransaction,
        signer: &LedgerSeed,
    ) -> Result<SubmissionReceipt>;

    /// Fails with `TransactionNotFound` for unknown hashes and
    /// `NetworkUnavailable` on connectivity failures.
    async fn fetch_transaction(&self, tx_hash: &str) -> Result<LedgerTransaction>;
}
