use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::child::{ChildRecord, IdentityFields};

/// Key order of the canonical serialization. Frozen: every anchored hash
/// on the ledger was computed over exactly these keys in this order.
pub const CANONICAL_FIELDS: [&str; 7] = [
    "fullName",
    "alias",
    "dateOfBirth",
    "birthPlace",
    "gender",
    "parentsNames",
    "walletAddress",
];

/// Compact JSON object over [`CANONICAL_FIELDS`]. Absent fields are written
/// as `""`, never omitted or `null`.
pub fn canonical_json(identity: &IdentityFields, wallet_address: &str) -> String {
    let values = [
        identity.full_name.as_deref(),
        identity.alias.as_deref(),
        identity.date_of_birth.as_deref(),
        identity.birth_place.as_deref(),
        identity.gender.as_deref(),
        identity.parents_names.as_deref(),
        Some(wallet_address),
    ];

    let mut out = String::from("{");
    for (i, (key, value)) in CANONICAL_FIELDS.iter().zip(values).enumerate() {
        if i > 0 {
            out.push(',');
        }
        // Value's Display is compact JSON with standard string escaping.
        out.push_str(&Value::from(*key).to_string());
        out.push(':');
        out.push_str(&Value::from(value.unwrap_or("")).to_string());
    }
    out.push('}');
    out
}

/// SHA-256 of the canonical serialization, uppercase hex.
pub fn compute_data_hash(identity: &IdentityFields, wallet_address: &str) -> String {
    let digest = Sha256::digest(canonical_json(identity, wallet_address).as_bytes());
    hex::encode_upper(digest)
}

/// Hash of a record's current field values.
pub fn hash_child(child: &ChildRecord) -> String {
    compute_data_hash(&child.identity(), child.hashed_address())
}

/// Canonical form for comparisons: trimmed, uppercase.
pub fn normalize_hash(hash: &str) -> String {
    hash.trim().to_ascii_uppercase()
}
