pub mod anchor_tx;
pub mod anchoring;
pub mod children;
pub mod credentials;
pub mod hashing;
pub mod ledger;
pub mod metrics;
pub mod verification;
pub mod view_tokens;
