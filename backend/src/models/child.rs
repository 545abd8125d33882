use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::services::anchor_tx::AnchorTransaction;

/// Ledger network an anchor transaction was submitted to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnchorNetwork {
    #[default]
    Testnet,
    Devnet,
    Alphanet,
}

impl AnchorNetwork {
    /// Numeric network ids reported by wallet providers.
    pub fn from_network_id(id: u32) -> Option<Self> {
        match id {
            1 => Some(AnchorNetwork::Testnet),
            2 => Some(AnchorNetwork::Devnet),
            21465 => Some(AnchorNetwork::Alphanet),
            _ => None,
        }
    }
}

impl std::fmt::Display for AnchorNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AnchorNetwork::Testnet => "testnet",
            AnchorNetwork::Devnet => "devnet",
            AnchorNetwork::Alphanet => "alphanet",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Unknown anchor network: {0}")]
pub struct UnknownNetwork(pub String);

impl std::str::FromStr for AnchorNetwork {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "testnet" => Ok(AnchorNetwork::Testnet),
            "devnet" => Ok(AnchorNetwork::Devnet),
            "alphanet" => Ok(AnchorNetwork::Alphanet),
            _ => Err(UnknownNetwork(s.to_string())),
        }
    }
}

/// Column is TEXT; decoded through this conversion by `FromRow`.
impl TryFrom<String> for AnchorNetwork {
    type Error = UnknownNetwork;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChildRecord {
    /// Ledger address of the child's wallet. Legacy rows keep their
    /// `child_<random>` id until migrated.
    pub id: String,
    pub full_name: Option<String>,
    pub alias: Option<String>,
    pub date_of_birth: Option<String>,
    pub birth_place: Option<String>,
    pub gender: Option<String>,
    pub parents_names: Option<String>,
    pub wallet_address: Option<String>,
    pub wallet_public_key: Option<String>,
    pub data_hash: Option<String>,
    pub issuer_address: Option<String>,
    pub anchor_tx_hash: Option<String>,
    pub anchor_tx_id: Option<String>,
    #[sqlx(try_from = "String")]
    pub anchor_network: AnchorNetwork,
    pub is_anchor_activated: bool,
    pub anchored_at: Option<DateTime<Utc>>,
    pub legacy_id: Option<String>,
    /// Address `data_hash` was computed over, when the child was re-keyed
    /// after hashing.
    pub hash_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChildRecord {
    /// A fresh, un-anchored record whose id is its wallet address.
    pub fn new(identity: IdentityFields, address: String, public_key: String) -> Self {
        let now = Utc::now();
        Self {
            id: address.clone(),
            full_name: identity.full_name,
            alias: identity.alias,
            date_of_birth: identity.date_of_birth,
            birth_place: identity.birth_place,
            gender: identity.gender,
            parents_names: identity.parents_names,
            wallet_address: Some(address),
            wallet_public_key: Some(public_key),
            data_hash: None,
            issuer_address: None,
            anchor_tx_hash: None,
            anchor_tx_id: None,
            anchor_network: AnchorNetwork::default(),
            is_anchor_activated: false,
            anchored_at: None,
            legacy_id: None,
            hash_address: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Address the record is anchored to; falls back to the id for rows
    /// written before wallets were stored separately.
    pub fn ledger_address(&self) -> &str {
        self.wallet_address.as_deref().unwrap_or(&self.id)
    }

    /// Address the canonical hash covers.
    pub fn hashed_address(&self) -> &str {
        self.hash_address
            .as_deref()
            .unwrap_or_else(|| self.ledger_address())
    }

    pub fn identity(&self) -> IdentityFields {
        IdentityFields {
            full_name: self.full_name.clone(),
            alias: self.alias.clone(),
            date_of_birth: self.date_of_birth.clone(),
            birth_place: self.birth_place.clone(),
            gender: self.gender.clone(),
            parents_names: self.parents_names.clone(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.alias
            .as_deref()
            .or(self.full_name.as_deref())
            .unwrap_or(&self.id)
    }
}

/// The identity part of a child record, as entered by NGO staff.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IdentityFields {
    pub full_name: Option<String>,
    pub alias: Option<String>,
    pub date_of_birth: Option<String>,
    pub birth_place: Option<String>,
    pub gender: Option<String>,
    pub parents_names: Option<String>,
}

impl IdentityFields {
    /// Trims every field and turns blank strings into `None`.
    pub fn normalized(self) -> Self {
        Self {
            full_name: non_blank(self.full_name),
            alias: non_blank(self.alias),
            date_of_birth: non_blank(self.date_of_birth),
            birth_place: non_blank(self.birth_place),
            gender: non_blank(self.gender),
            parents_names: non_blank(self.parents_names),
        }
    }

    pub fn has_identifier(&self) -> bool {
        self.alias.is_some() || self.full_name.is_some()
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChildRequest {
    #[serde(flatten)]
    pub identity: IdentityFields,
    /// Hash the creation state and anchor it on the ledger.
    #[serde(default)]
    pub anchor: bool,
}

/// Absent fields are left untouched; an empty string clears the field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateChildRequest {
    pub full_name: Option<String>,
    pub alias: Option<String>,
    pub date_of_birth: Option<String>,
    pub birth_place: Option<String>,
    pub gender: Option<String>,
    pub parents_names: Option<String>,
}

impl UpdateChildRequest {
    /// Applies the patch in place. `data_hash` is never touched: a stale
    /// hash is what verification reports as tampering.
    pub fn apply_to(&self, child: &mut ChildRecord) {
        fn patch(field: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                *field = non_blank(Some(v.clone()));
            }
        }
        patch(&mut child.full_name, &self.full_name);
        patch(&mut child.alias, &self.alias);
        patch(&mut child.date_of_birth, &self.date_of_birth);
        patch(&mut child.birth_place, &self.birth_place);
        patch(&mut child.gender, &self.gender);
        patch(&mut child.parents_names, &self.parents_names);
        child.updated_at = Utc::now();
    }
}

/// Network as sent by clients: either a name or a numeric network id.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NetworkRef {
    Id(u32),
    Name(String),
}

impl NetworkRef {
    pub fn resolve(&self) -> AnchorNetwork {
        match self {
            NetworkRef::Id(id) => AnchorNetwork::from_network_id(*id).unwrap_or_default(),
            NetworkRef::Name(name) => name.to_lowercase().parse().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAnchorRequest {
    pub transaction_hash: String,
    pub transaction_id: Option<String>,
    pub network: Option<NetworkRef>,
}

/// Pointer to the transaction that carries a child's hash.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnchorReference {
    pub tx_hash: String,
    pub tx_id: String,
    pub network: AnchorNetwork,
}

impl RecordAnchorRequest {
    pub fn into_reference(self) -> AnchorReference {
        let tx_hash = self.transaction_hash.trim().to_string();
        let tx_id = self
            .transaction_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| tx_hash.clone());
        AnchorReference {
            tx_hash,
            tx_id,
            network: self.network.map(|n| n.resolve()).unwrap_or_default(),
        }
    }
}

/// Wallet key material, disclosed to the caller once at creation and never stored.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDisclosure {
    pub address: String,
    pub public_key: String,
    pub seed: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorStatus {
    /// Template built, nobody has submitted it yet.
    Pending,
    Recorded,
    Failed,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorOutcome {
    pub status: AnchorStatus,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorResponse {
    pub child: ChildRecord,
    pub data_hash: String,
    pub anchor_transaction: AnchorTransaction,
    pub anchor: AnchorOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChildResponse {
    pub child: ChildRecord,
    pub wallet: WalletDisclosure,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_transaction: Option<AnchorTransaction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<AnchorOutcome>,
}
