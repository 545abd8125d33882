use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::ledger::LedgerTransaction;

/// Outcome of cross-checking the recomputed, stored and on-chain hashes.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityStatus {
    /// Stored and on-chain hashes both equal the recomputed one.
    Verified,
    /// Nothing to check against: no stored hash, or no anchor transaction.
    Unanchored,
    /// A stored or on-chain hash disagrees with the current data.
    Tampered,
    /// Local hash matches but the anchor could not be read from the ledger.
    Unconfirmed,
}

impl std::fmt::Display for IntegrityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IntegrityStatus::Verified => "verified",
            IntegrityStatus::Unanchored => "unanchored",
            IntegrityStatus::Tampered => "tampered",
            IntegrityStatus::Unconfirmed => "unconfirmed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub child_id: String,
    pub calculated_hash: String,
    pub stored_hash: Option<String>,
    pub blockchain_hash: Option<String>,
    pub hash_match: bool,
    pub blockchain_verified: bool,
    /// `hash_match && (blockchain_hash.is_none() || blockchain_verified)`.
    pub integrity: bool,
    pub status: IntegrityStatus,
    pub transaction: Option<LedgerTransaction>,
    pub gateway_error: Option<String>,
    pub child: VerifiedChildSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedChildSummary {
    pub id: String,
    pub alias: Option<String>,
    pub full_name: Option<String>,
    pub wallet_address: String,
    pub anchor_tx_hash: Option<String>,
    pub is_anchor_activated: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
