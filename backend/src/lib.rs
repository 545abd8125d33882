// Library exports for the API binary, the migration tool and tests
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use db::RegistryStore;
use services::{
    anchor_tx::AnchorTransactionBuilder,
    ledger::{IssuerIdentity, LedgerGateway},
};

/// Request bodies may carry a base64 attachment of up to 10 MiB.
const BODY_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RegistryStore>,
    pub ledger: Arc<dyn LedgerGateway>,
    /// `None` when no issuing account is configured; anchoring is then refused.
    pub issuer: Option<Arc<IssuerIdentity>>,
    pub anchor_builder: AnchorTransactionBuilder,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RegistryStore>,
        ledger: Arc<dyn LedgerGateway>,
        config: Arc<Config>,
    ) -> Self {
        let issuer =
            IssuerIdentity::from_config(config.issuer_address.clone(), config.issuer_seed.clone())
                .map(Arc::new);
        Self {
            store,
            ledger,
            issuer,
            anchor_builder: AnchorTransactionBuilder::new(config.anchor_amount_drops),
            config,
        }
    }
}

pub fn app(state: AppState) -> Router {
    let cors = cors_layer(state.config.app_base_url.clone());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // Children
        .route("/children", get(routes::children::list_children).post(routes::children::create_child))
        .route("/children/{id}", get(routes::children::get_child).put(routes::children::update_child))
        // Anchoring
        .route("/children/{id}/anchor", post(routes::anchoring::anchor_child))
        .route("/children/{id}/blockchain", post(routes::anchoring::record_anchor))
        .route("/children/{id}/verify", get(routes::anchoring::verify_child))
        // Credentials
        .route(
            "/children/{id}/credentials",
            get(routes::credentials::list_credentials).post(routes::credentials::create_credential),
        )
        .route("/credentials/{id}", get(routes::credentials::get_credential))
        .route("/credentials/{id}/file", get(routes::credentials::download_credential_file))
        // Read-only access
        .route("/children/{id}/view-token", post(routes::view::issue_view_token))
        .route("/view/child", get(routes::view::view_child))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .with_state(state)
}

/// Allows the staff portal's origin and its subdomains. Localhost is always
/// allowed for development.
fn cors_layer(base_url: String) -> CorsLayer {
    let origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        origin
            .to_str()
            .map(|o| origin_allowed(o, &base_url))
            .unwrap_or(false)
    });

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static("x-staff-key"),
        ]))
        .allow_origin(origin)
}

fn origin_allowed(origin: &str, base_url: &str) -> bool {
    if origin.starts_with("http://localhost") || origin.starts_with("http://127.0.0.1") {
        return true;
    }
    if origin == base_url {
        return true;
    }
    let Some(idx) = base_url.find("://") else {
        return false;
    };
    let after_scheme = &base_url[idx + 3..];
    let domain = after_scheme.split('/').next().unwrap_or(after_scheme);
    let domain = domain.split(':').next().unwrap_or(domain);
    origin.ends_with(&format!(".{domain}"))
}
