use serde::{Deserialize, Serialize};

/// Default anchor payment: one XRP, the current base reserve, so the
/// child's account exists once the anchor validates.
pub const DEFAULT_ANCHOR_AMOUNT_DROPS: u64 = 1_000_000;

/// `MemoType` marking a memo that carries a data hash.
pub const HASH_MEMO_TYPE: &str = "Hash";

/// Unsigned XRPL `Payment` carrying a data hash as memo data.
/// Serializes with ledger field names, ready to be autofilled and signed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct AnchorTransaction {
    pub transaction_type: String,
    pub account: String,
    pub destination: String,
    /// Drops, as a decimal string.
    pub amount: String,
    pub memos: Vec<MemoEnvelope>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemoEnvelope {
    #[serde(rename = "Memo")]
    pub memo: Memo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Memo {
    pub memo_type: String,
    pub memo_data: String,
}

impl AnchorTransaction {
    /// Data of the first memo.
    pub fn memo_hash(&self) -> Option<&str> {
        self.memos
            .first()
            .map(|envelope| envelope.memo.memo_data.as_str())
    }
}

/// Builds anchor transactions; no signing or network I/O happens here.
#[derive(Debug, Clone, Copy)]
pub struct AnchorTransactionBuilder {
    amount_drops: u64,
}

impl Default for AnchorTransactionBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ANCHOR_AMOUNT_DROPS)
    }
}

impl AnchorTransactionBuilder {
    pub fn new(amount_drops: u64) -> Self {
        Self { amount_drops }
    }

    /// Payment from `issuer_address` to `child_address` with `hash_hex`
    /// (uppercased) as memo data and hex("Hash") as memo type.
    pub fn build(
        &self,
        child_address: &str,
        hash_hex: &str,
        issuer_address: &str,
    ) -> AnchorTransaction {
        AnchorTransaction {
            transaction_type: "Payment".to_string(),
            account: issuer_address.to_string(),
            destination: child_address.to_string(),
            amount: self.amount_drops.to_string(),
            memos: vec![MemoEnvelope {
                memo: Memo {
                    memo_type: hex::encode_upper(HASH_MEMO_TYPE),
                    memo_data: hash_hex.trim().to_ascii_uppercase(),
                },
            }],
        }
    }
}
