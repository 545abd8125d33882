use lazy_static::lazy_static;
use prometheus::{register_counter, register_counter_vec, Counter, CounterVec};

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref CHILDREN_CREATED_COUNTER: CounterVec = register_counter_vec!(
        "registry_children_created_total",
        "Child records created, by whether an anchor was requested",
        &["anchored"]
    ).unwrap();

    pub static ref ANCHOR_SUBMISSIONS_COUNTER: CounterVec = register_counter_vec!(
        "registry_anchor_submissions_total",
        "Anchor attempts by outcome (recorded, failed, pending)",
        &["outcome"]
    ).unwrap();

    pub static ref ANCHORS_RECORDED_COUNTER: Counter = register_counter!(
        "registry_anchors_recorded_total",
        "Anchor pointers reported by clients that signed themselves"
    ).unwrap();

    pub static ref VERIFICATIONS_COUNTER: CounterVec = register_counter_vec!(
        "registry_verifications_total",
        "Integrity checks by resulting status",
        &["status"]
    ).unwrap();

    pub static ref CREDENTIALS_CREATED_COUNTER: Counter = register_counter!(
        "registry_credentials_created_total",
        "Credentials attached to children"
    ).unwrap();
}
