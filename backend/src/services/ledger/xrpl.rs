//! rippled JSON-RPC gateway.
//!
//! Keys never leave the process: child wallets are generated locally and
//! an ed25519 issuer seed signs anchors locally. The node only serves
//! public reads (`ledger_current`, `account_info`, `fee`, `tx`) and
//! `submit` with a signed blob, which any public server accepts.
//!
//! An issuer seed of another key type is handed to the node in
//! sign-and-submit mode, which only a node with signing enabled accepts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::{
    codec::{self, SubmissionFields},
    keys::{self, LedgerKeypair},
    GeneratedWallet, LedgerGateway, LedgerSeed, LedgerTransaction, SubmissionReceipt,
};
use crate::{
    config::Config,
    error::{RegistryError, Result},
    models::child::AnchorNetwork,
    services::{anchor_tx::{AnchorTransaction, HASH_MEMO_TYPE}, hashing::normalize_hash},
};

/// Ledgers a submitted anchor may take to get into a validated ledger.
pub const LAST_LEDGER_OFFSET: u64 = 20;

/// Fee bounds for locally signed anchors, in drops.
pub const BASE_FEE_DROPS: u64 = 12;
pub const MAX_FEE_DROPS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct XrplConfig {
    /// JSON-RPC endpoint, e.g. `https://s.altnet.rippletest.net:51234`.
    pub rpc_url: String,
    pub network: AnchorNetwork,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl XrplConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            rpc_url: config.xrpl_rpc_url.clone(),
            network: config.xrpl_network,
            poll_interval: Duration::from_millis(config.ledger_poll_interval_ms),
            max_polls: config.ledger_max_polls,
        }
    }
}

pub struct XrplRpcGateway {
    config: XrplConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope {
    result: Value,
}

/// Why an RPC call produced no usable result.
#[derive(Debug)]
enum RpcFailure {
    /// Could not reach the node or read its answer.
    Transport(String),
    /// The node answered with `status: "error"`.
    Rejected { code: String, message: String },
}

impl std::fmt::Display for RpcFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RpcFailure::Transport(msg) => write!(f, "{msg}"),
            RpcFailure::Rejected { code, message } => write!(f, "{code}: {message}"),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum EngineOutcome {
    /// Applied or queued; wait for validation.
    Provisional,
    /// Will never make it into a ledger.
    Rejected,
}

fn classify_engine_result(code: &str) -> EngineOutcome {
    if code.starts_with("tem") || code.starts_with("tef") || code.starts_with("tel") {
        EngineOutcome::Rejected
    } else {
        EngineOutcome::Provisional
    }
}

fn check_rpc_result(result: Value) -> std::result::Result<Value, RpcFailure> {
    if result.get("status").and_then(Value::as_str) == Some("error") {
        let code = result
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let message = result
            .get("error_message")
            .and_then(Value::as_str)
            .unwrap_or(&code)
            .to_string();
        return Err(RpcFailure::Rejected { code, message });
    }
    Ok(result)
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Memo data of the first memo typed hex("Hash"), else of the first memo.
fn extract_memo_hash(memos: Option<&Value>) -> Option<String> {
    let memos = memos?.as_array()?;
    let hash_type = hex::encode_upper(HASH_MEMO_TYPE);
    let typed = memos.iter().filter_map(|m| m.get("Memo")).find(|memo| {
        memo.get("MemoType")
            .and_then(Value::as_str)
            .is_some_and(|t| t.eq_ignore_ascii_case(&hash_type))
    });
    let memo = typed.or_else(|| memos.first().and_then(|m| m.get("Memo")))?;
    memo.get("MemoData")
        .and_then(Value::as_str)
        .map(normalize_hash)
}

/// Reads a `tx` result in either API v1 (flat) or v2 (`tx_json`) shape.
/// Also returns the final engine result from the metadata, if any.
fn parse_transaction(result: &Value) -> Result<(LedgerTransaction, Option<String>)> {
    let body = result.get("tx_json").unwrap_or(result);

    let hash = str_field(result, "hash")
        .or_else(|| str_field(body, "hash"))
        .ok_or_else(|| RegistryError::NetworkUnavailable("tx response without hash".into()))?;
    let account = str_field(body, "Account").ok_or_else(|| {
        RegistryError::NetworkUnavailable(format!("tx response for {hash} without Account"))
    })?;

    let ledger_index = result
        .get("ledger_index")
        .or_else(|| body.get("ledger_index"))
        .and_then(Value::as_u64)
        .map(|i| i as u32);
    let date = result
        .get("date")
        .or_else(|| body.get("date"))
        .and_then(Value::as_u64);
    let transaction_result = result
        .get("meta")
        .and_then(|meta| meta.get("TransactionResult"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let tx = LedgerTransaction {
        hash,
        ledger_index,
        validated: result
            .get("validated")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        account,
        destination: str_field(body, "Destination"),
        // API v2 reports Payment amounts as DeliverMax.
        amount: body
            .get("Amount")
            .or_else(|| body.get("DeliverMax"))
            .cloned(),
        fee: str_field(body, "Fee"),
        date,
        memo_data: extract_memo_hash(body.get("Memos")),
    };
    Ok((tx, transaction_result))
}

impl XrplRpcGateway {
    pub fn new(config: XrplConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    /// Send a JSON-RPC request to the rippled node.
    async fn rpc_call(&self, method: &str, params: Value) -> std::result::Result<Value, RpcFailure> {
        let body = json!({
            "method": method,
            "params": [params],
        });

        let resp = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcFailure::Transport(format!("{method}: {e}")))?;

        if !resp.status().is_success() {
            return Err(RpcFailure::Transport(format!(
                "{method}: HTTP {}",
                resp.status()
            )));
        }

        let envelope: RpcEnvelope = resp
            .json()
            .await
            .map_err(|e| RpcFailure::Transport(format!("{method}: unreadable response: {e}")))?;

        check_rpc_result(envelope.result)
    }

    async fn read_transaction(&self, tx_hash: &str) -> Result<(LedgerTransaction, Option<String>)> {
        let params = json!({ "transaction": tx_hash, "binary": false });
        match self.rpc_call("tx", params).await {
            Ok(result) => parse_transaction(&result),
            Err(RpcFailure::Rejected { code, .. }) if code == "txnNotFound" => {
                Err(RegistryError::TransactionNotFound(tx_hash.to_string()))
            }
            Err(e) => Err(RegistryError::NetworkUnavailable(e.to_string())),
        }
    }

    async fn current_ledger_index(&self) -> Result<u64> {
        let result = self
            .rpc_call("ledger_current", json!({}))
            .await
            .map_err(|e| RegistryError::NetworkUnavailable(e.to_string()))?;
        result
            .get("ledger_current_index")
            .and_then(Value::as_u64)
            .ok_or_else(|| RegistryError::NetworkUnavailable("ledger_current without index".into()))
    }

    async fn account_sequence(&self, address: &str) -> Result<u32> {
        let params = json!({ "account": address, "ledger_index": "current" });
        let result = match self.rpc_call("account_info", params).await {
            Ok(result) => result,
            Err(RpcFailure::Transport(e)) => return Err(RegistryError::NetworkUnavailable(e)),
            Err(rejected) => {
                return Err(RegistryError::SubmissionFailed(format!(
                    "account_info {address}: {rejected}"
                )))
            }
        };
        result
            .get("account_data")
            .and_then(|data| data.get("Sequence"))
            .and_then(Value::as_u64)
            .map(|sequence| sequence as u32)
            .ok_or_else(|| {
                RegistryError::NetworkUnavailable(format!("account_info {address} without Sequence"))
            })
    }

    /// Open-ledger fee, clamped to the anchor fee bounds.
    async fn anchor_fee(&self) -> u64 {
        let open_ledger_fee = self.rpc_call("fee", json!({})).await.ok().and_then(|result| {
            result
                .get("drops")?
                .get("open_ledger_fee")?
                .as_str()?
                .parse::<u64>()
                .ok()
        });
        open_ledger_fee
            .unwrap_or(BASE_FEE_DROPS)
            .clamp(BASE_FEE_DROPS, MAX_FEE_DROPS)
    }

    async fn submit_request(&self, params: Value) -> Result<Value> {
        match self.rpc_call("submit", params).await {
            Ok(result) => Ok(result),
            Err(RpcFailure::Transport(e)) => Err(RegistryError::NetworkUnavailable(e)),
            Err(rejected) => Err(RegistryError::SubmissionFailed(rejected.to_string())),
        }
    }

    /// Node-side signing, for issuer seeds that cannot be used locally.
    async fn submit_with_secret(
        &self,
        tx: &AnchorTransaction,
        signer: &LedgerSeed,
        last_ledger: u64,
    ) -> Result<Value> {
        let mut tx_json = serde_json::to_value(tx)
            .map_err(|e| RegistryError::SubmissionFailed(format!("unserializable transaction: {e}")))?;
        if let Some(fields) = tx_json.as_object_mut() {
            fields.insert("LastLedgerSequence".into(), json!(last_ledger));
        }
        self.submit_request(json!({
            "tx_json": tx_json,
            "secret": signer.expose(),
            "fee_mult_max": 1000,
        }))
        .await
    }

    /// Checks the provisional engine result, then waits for validation.
    async fn follow_submission(
        &self,
        result: Value,
        signed_hash: Option<String>,
        last_ledger: u64,
    ) -> Result<SubmissionReceipt> {
        let engine_result = str_field(&result, "engine_result").unwrap_or_default();
        let engine_message = str_field(&result, "engine_result_message").unwrap_or_default();
        if classify_engine_result(&engine_result) == EngineOutcome::Rejected {
            return Err(RegistryError::SubmissionFailed(format!(
                "{engine_result}: {engine_message}"
            )));
        }

        let tx_hash = result
            .get("tx_json")
            .and_then(|tx| str_field(tx, "hash"))
            .or(signed_hash)
            .ok_or_else(|| RegistryError::SubmissionFailed("submit response without hash".into()))?;
        info!("anchor {tx_hash} submitted ({engine_result}), waiting for validation");

        self.wait_for_validation(&tx_hash, last_ledger).await
    }

    async fn validated_ledger_index(&self) -> Option<u64> {
        let result = self
            .rpc_call("ledger", json!({ "ledger_index": "validated" }))
            .await
            .ok()?;
        result.get("ledger_index").and_then(Value::as_u64)
    }

    /// Polls `tx` until the transaction is validated or can no longer be.
    async fn wait_for_validation(&self, tx_hash: &str, last_ledger: u64) -> Result<SubmissionReceipt> {
        for attempt in 1..=self.config.max_polls {
            tokio::time::sleep(self.config.poll_interval).await;

            match self.read_transaction(tx_hash).await {
                Ok((tx, outcome)) if tx.validated => {
                    let outcome = outcome.unwrap_or_else(|| "unknown".into());
                    if outcome != "tesSUCCESS" {
                        return Err(RegistryError::SubmissionFailed(format!(
                            "{tx_hash} validated with result {outcome}"
                        )));
                    }
                    return Ok(SubmissionReceipt {
                        tx_hash: tx.hash.clone(),
                        tx_id: tx.hash,
                        ledger_index: tx.ledger_index,
                        validated: true,
                    });
                }
                Ok(_) | Err(RegistryError::TransactionNotFound(_)) => {
                    debug!("anchor {tx_hash} not validated yet (poll {attempt})");
                }
                Err(RegistryError::NetworkUnavailable(e)) => {
                    warn!("poll {attempt} for {tx_hash} failed: {e}");
                }
                Err(e) => return Err(e),
            }

            if let Some(validated) = self.validated_ledger_index().await {
                if validated > last_ledger {
                    return Err(RegistryError::SubmissionFailed(format!(
                        "{tx_hash} expired: validated ledger {validated} passed LastLedgerSequence {last_ledger}"
                    )));
                }
            }
        }

        Err(RegistryError::SubmissionFailed(format!(
            "{tx_hash} not validated after {} polls; record it once it validates",
            self.config.max_polls
        )))
    }
}

#[async_trait]
impl LedgerGateway for XrplRpcGateway {
    fn network(&self) -> AnchorNetwork {
        self.config.network
    }

    async fn generate_wallet(&self) -> Result<GeneratedWallet> {
        Ok(keys::generate_wallet())
    }

    async fn sign_and_submit(
        &self,
        tx: &AnchorTransaction,
        signer: &LedgerSeed,
    ) -> Result<SubmissionReceipt> {
        let last_ledger = self.current_ledger_index().await? + LAST_LEDGER_OFFSET;

        let Some(keypair) = LedgerKeypair::from_seed(signer) else {
            debug!("issuer seed is not ed25519, submitting in sign-and-submit mode");
            let result = self.submit_with_secret(tx, signer, last_ledger).await?;
            return self.follow_submission(result, None, last_ledger).await;
        };
        if keypair.address() != tx.account {
            return Err(RegistryError::SubmissionFailed(format!(
                "issuer seed does not control {}",
                tx.account
            )));
        }

        let fields = SubmissionFields {
            sequence: self.account_sequence(&tx.account).await?,
            last_ledger_sequence: last_ledger as u32,
            fee_drops: self.anchor_fee().await,
        };
        let signed = codec::sign_payment(tx, fields, &keypair)?;
        let result = self
            .submit_request(json!({ "tx_blob": signed.blob_hex }))
            .await?;
        self.follow_submission(result, Some(signed.hash), last_ledger)
            .await
    }

    async fn fetch_transaction(&self, tx_hash: &str) -> Result<LedgerTransaction> {
        self.read_transaction(tx_hash).await.map(|(tx, _)| tx)
    }
}
