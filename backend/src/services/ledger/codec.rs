//! Canonical binary form of an anchor payment, for signing in-process.
//!
//! Only the fields an anchor carries are supported. Fields are written in
//! canonical order (type code, then field code).

use sha2::{Digest, Sha512};

use super::keys::{decode_address, LedgerKeypair};
use crate::{
    error::{RegistryError, Result},
    services::anchor_tx::AnchorTransaction,
};

const SIGNING_PREFIX: [u8; 4] = *b"STX\0";
const TX_ID_PREFIX: [u8; 4] = *b"TXN\0";

const PAYMENT: u16 = 0;
const XRP_POSITIVE: u64 = 0x4000_0000_0000_0000;
const MAX_XRP_DROPS: u64 = 100_000_000_000_000_000;

/// Account-specific fields filled in just before signing.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionFields {
    pub sequence: u32,
    pub last_ledger_sequence: u32,
    pub fee_drops: u64,
}

/// Signed blob ready for `submit`, with its transaction hash.
#[derive(Debug, Clone)]
pub struct SignedBlob {
    pub blob_hex: String,
    pub hash: String,
}

pub fn sign_payment(
    tx: &AnchorTransaction,
    fields: SubmissionFields,
    keypair: &LedgerKeypair,
) -> Result<SignedBlob> {
    let mut signing_data = SIGNING_PREFIX.to_vec();
    signing_data.extend(encode_payment(tx, fields, keypair.public_key(), None)?);
    let signature = keypair.sign(&signing_data);

    let blob = encode_payment(tx, fields, keypair.public_key(), Some(&signature[..]))?;
    Ok(SignedBlob {
        hash: transaction_hash(&blob),
        blob_hex: hex::encode_upper(&blob),
    })
}

/// SHA-512Half over the prefixed blob, uppercase hex.
pub fn transaction_hash(blob: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(TX_ID_PREFIX);
    hasher.update(blob);
    hex::encode_upper(&hasher.finalize()[..32])
}

fn invalid(msg: String) -> RegistryError {
    RegistryError::SubmissionFailed(msg)
}

fn encode_payment(
    tx: &AnchorTransaction,
    fields: SubmissionFields,
    signing_pub_key: &[u8],
    signature: Option<&[u8]>,
) -> Result<Vec<u8>> {
    if tx.transaction_type != "Payment" {
        return Err(invalid(format!("cannot encode {}", tx.transaction_type)));
    }
    let amount: u64 = tx
        .amount
        .parse()
        .map_err(|_| invalid(format!("amount {} is not a drop count", tx.amount)))?;
    let account = decode_address(&tx.account)
        .ok_or_else(|| invalid(format!("invalid account {}", tx.account)))?;
    let destination = decode_address(&tx.destination)
        .ok_or_else(|| invalid(format!("invalid destination {}", tx.destination)))?;

    let mut out = Vec::with_capacity(256);
    // TransactionType
    out.push(0x12);
    out.extend(PAYMENT.to_be_bytes());
    // Sequence
    out.push(0x24);
    out.extend(fields.sequence.to_be_bytes());
    // LastLedgerSequence
    out.extend([0x20, 0x1B]);
    out.extend(fields.last_ledger_sequence.to_be_bytes());
    // Amount, Fee
    out.push(0x61);
    out.extend(xrp_amount(amount)?);
    out.push(0x68);
    out.extend(xrp_amount(fields.fee_drops)?);
    // SigningPubKey, TxnSignature
    out.push(0x73);
    push_vl(&mut out, signing_pub_key)?;
    if let Some(signature) = signature {
        out.push(0x74);
        push_vl(&mut out, signature)?;
    }
    // Account, Destination
    out.push(0x81);
    push_vl(&mut out, &account)?;
    out.push(0x83);
    push_vl(&mut out, &destination)?;

    if !tx.memos.is_empty() {
        out.push(0xF9);
        for envelope in &tx.memos {
            let memo_type = hex::decode(&envelope.memo.memo_type)
                .map_err(|_| invalid("MemoType is not hex".into()))?;
            let memo_data = hex::decode(&envelope.memo.memo_data)
                .map_err(|_| invalid("MemoData is not hex".into()))?;
            out.push(0xEA);
            out.push(0x7C);
            push_vl(&mut out, &memo_type)?;
            out.push(0x7D);
            push_vl(&mut out, &memo_data)?;
            out.push(0xE1);
        }
        out.push(0xF1);
    }
    Ok(out)
}

fn xrp_amount(drops: u64) -> Result<[u8; 8]> {
    if drops > MAX_XRP_DROPS {
        return Err(invalid(format!("{drops} drops exceeds the XRP supply")));
    }
    Ok((drops | XRP_POSITIVE).to_be_bytes())
}

/// Single-byte length prefix; anchors never carry longer blobs.
fn push_vl(out: &mut Vec<u8>, bytes: &[u8]) -> Result<()> {
    if bytes.len() > 192 {
        return Err(invalid(format!("{}-byte field too long to encode", bytes.len())));
    }
    out.push(bytes.len() as u8);
    out.extend_from_slice(bytes);
    Ok(())
}
