pub mod anchoring;
pub mod children;
pub mod credentials;
pub mod health;
pub mod metrics;
pub mod view;
