use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    config::Config,
    db::{MemoryRegistryStore, RegistryStore},
    error::{RegistryError, Result},
    models::{
        child::{AnchorNetwork, AnchorReference, ChildRecord, UpdateChildRequest},
        credential::CredentialRecord,
    },
    services::{
        anchor_tx::AnchorTransaction,
        hashing::normalize_hash,
        ledger::{
            GeneratedWallet, IssuerIdentity, LedgerGateway, LedgerSeed, LedgerTransaction,
            SubmissionReceipt,
        },
    },
    AppState,
};

pub const STAFF_KEY: &str = "test-staff-key";
pub const ISSUER_ADDRESS: &str = "rPT1Sjq2YGrBMTttX4GZHjKu9dyfzbpAYe";

/// Issuer that only builds templates.
pub fn issuer() -> IssuerIdentity {
    IssuerIdentity::from_config(Some(ISSUER_ADDRESS.into()), None).unwrap()
}

pub fn signing_issuer() -> IssuerIdentity {
    IssuerIdentity::from_config(Some(ISSUER_ADDRESS.into()), Some("sEdTESTISSUER".into())).unwrap()
}

#[derive(Default)]
struct FakeLedgerState {
    offline: bool,
    submission_failure: Option<String>,
    wallets: u32,
    lookups: u32,
    submissions: Vec<AnchorTransaction>,
    transactions: HashMap<String, LedgerTransaction>,
}

/// In-process ledger: validates every submission immediately and serves
/// the recorded transactions back.
#[derive(Default)]
pub struct FakeLedger {
    state: Mutex<FakeLedgerState>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later call fails with `NetworkUnavailable`.
    pub fn go_offline(&self) {
        self.state.lock().unwrap().offline = true;
    }

    /// Later submissions fail with the given engine result.
    pub fn fail_submissions(&self, engine_result: &str) {
        self.state.lock().unwrap().submission_failure = Some(engine_result.to_string());
    }

    /// Simulates a ledger that reports a different memo for `tx_hash`.
    pub fn overwrite_memo(&self, tx_hash: &str, memo: &str) {
        let mut state = self.state.lock().unwrap();
        let tx = state.transactions.get_mut(tx_hash).unwrap();
        tx.memo_data = Some(memo.to_string());
    }

    /// The ledger reports `tx_hash` as not yet validated.
    pub fn mark_unvalidated(&self, tx_hash: &str) {
        let mut state = self.state.lock().unwrap();
        state.transactions.get_mut(tx_hash).unwrap().validated = false;
    }

    pub fn strip_memo(&self, tx_hash: &str) {
        let mut state = self.state.lock().unwrap();
        state.transactions.get_mut(tx_hash).unwrap().memo_data = None;
    }

    pub fn wallets_generated(&self) -> u32 {
        self.state.lock().unwrap().wallets
    }

    pub fn lookups(&self) -> u32 {
        self.state.lock().unwrap().lookups
    }

    pub fn submissions(&self) -> Vec<AnchorTransaction> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn submitted_memos(&self) -> Vec<String> {
        self.submissions()
            .iter()
            .filter_map(|tx| tx.memo_hash().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl LedgerGateway for FakeLedger {
    fn network(&self) -> AnchorNetwork {
        AnchorNetwork::Testnet
    }

    async fn generate_wallet(&self) -> Result<GeneratedWallet> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err(RegistryError::NetworkUnavailable("fake ledger offline".into()));
        }
        state.wallets += 1;
        let n = state.wallets;
        Ok(GeneratedWallet {
            address: format!("rTestChild{n:024}"),
            public_key: format!("ED{n:064X}"),
            seed: LedgerSeed::new(format!("sEdTestChild{n:016}")),
        })
    }

    async fn sign_and_submit(
        &self,
        tx: &AnchorTransaction,
        _signer: &LedgerSeed,
    ) -> Result<SubmissionReceipt> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err(RegistryError::NetworkUnavailable("fake ledger offline".into()));
        }
        if let Some(code) = state.submission_failure.clone() {
            return Err(RegistryError::SubmissionFailed(code));
        }

        state.submissions.push(tx.clone());
        let ledger_index = 1_000 + state.submissions.len() as u32;
        let tx_hash = format!("{:064X}", state.submissions.len());
        state.transactions.insert(
            tx_hash.clone(),
            LedgerTransaction {
                hash: tx_hash.clone(),
                ledger_index: Some(ledger_index),
                validated: true,
                account: tx.account.clone(),
                destination: Some(tx.destination.clone()),
                amount: Some(tx.amount.clone().into()),
                fee: Some("12".into()),
                date: Some(800_000_000),
                memo_data: tx.memo_hash().map(normalize_hash),
            },
        );
        Ok(SubmissionReceipt {
            tx_id: tx_hash.clone(),
            tx_hash,
            ledger_index: Some(ledger_index),
            validated: true,
        })
    }

    async fn fetch_transaction(&self, tx_hash: &str) -> Result<LedgerTransaction> {
        let mut state = self.state.lock().unwrap();
        state.lookups += 1;
        if state.offline {
            return Err(RegistryError::NetworkUnavailable("fake ledger offline".into()));
        }
        state
            .transactions
            .get(tx_hash)
            .cloned()
            .ok_or_else(|| RegistryError::TransactionNotFound(tx_hash.to_string()))
    }
}

/// Memory store that can be told to fail specific calls.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryRegistryStore,
    fail_record_anchor: AtomicBool,
    fail_reads: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_record_anchor(&self) {
        self.fail_record_anchor.store(true, Ordering::SeqCst);
    }

    /// `get_child` fails from now on.
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RegistryStore for FlakyStore {
    async fn ping(&self) -> Result<()> {
        self.inner.ping().await
    }

    async fn insert_child(&self, child: &ChildRecord) -> Result<()> {
        self.inner.insert_child(child).await
    }

    async fn get_child(&self, id: &str) -> Result<Option<ChildRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RegistryError::Storage("read failed".into()));
        }
        self.inner.get_child(id).await
    }

    async fn list_children(&self) -> Result<Vec<ChildRecord>> {
        self.inner.list_children().await
    }

    async fn update_child_identity(
        &self,
        id: &str,
        patch: &UpdateChildRequest,
    ) -> Result<Option<ChildRecord>> {
        self.inner.update_child_identity(id, patch).await
    }

    async fn set_anchor_hash(
        &self,
        id: &str,
        data_hash: &str,
        issuer_address: &str,
    ) -> Result<Option<ChildRecord>> {
        self.inner.set_anchor_hash(id, data_hash, issuer_address).await
    }

    async fn record_anchor(&self, id: &str, anchor: &AnchorReference) -> Result<bool> {
        if self.fail_record_anchor.load(Ordering::SeqCst) {
            return Err(RegistryError::Storage("write failed".into()));
        }
        self.inner.record_anchor(id, anchor).await
    }

    async fn insert_credential(&self, credential: &CredentialRecord) -> Result<()> {
        self.inner.insert_credential(credential).await
    }

    async fn get_credential(&self, id: Uuid) -> Result<Option<CredentialRecord>> {
        self.inner.get_credential(id).await
    }

    async fn list_credentials_for_child(&self, child_id: &str) -> Result<Vec<CredentialRecord>> {
        self.inner.list_credentials_for_child(child_id).await
    }

    async fn legacy_child_ids(&self) -> Result<Vec<String>> {
        self.inner.legacy_child_ids().await
    }

    async fn rekey_child(
        &self,
        old_id: &str,
        new_id: &str,
        public_key: Option<&str>,
    ) -> Result<bool> {
        self.inner.rekey_child(old_id, new_id, public_key).await
    }
}

pub fn test_config(with_issuer: bool) -> Config {
    Config {
        database_url: None,
        database_max_connections: 1,
        host: "127.0.0.1".into(),
        port: 0,
        app_base_url: "http://localhost".into(),
        xrpl_rpc_url: "http://127.0.0.1:9".into(),
        xrpl_network: AnchorNetwork::Testnet,
        issuer_address: with_issuer.then(|| ISSUER_ADDRESS.to_string()),
        issuer_seed: with_issuer.then(|| "sEdTESTISSUER".to_string()),
        anchor_amount_drops: 1_000_000,
        ledger_poll_interval_ms: 1,
        ledger_max_polls: 3,
        staff_api_key: STAFF_KEY.into(),
        view_token_secret: "test-view-secret".into(),
        view_token_ttl_seconds: 3600,
    }
}

/// Memory-backed state around `ledger`.
pub fn test_state(ledger: Arc<FakeLedger>, with_issuer: bool) -> AppState {
    AppState::new(
        Arc::new(MemoryRegistryStore::new()),
        ledger,
        Arc::new(test_config(with_issuer)),
    )
}
