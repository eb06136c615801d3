use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::services::stores::StoreService;
use crate::AppState;

pub mod health;
pub mod orders;
pub mod receiving;
pub mod stores;

/// Aggregated services used by HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub stores: Arc<StoreService>,
}

impl AppServices {
    pub fn new(stores: Arc<StoreService>) -> Self {
        Self { stores }
    }
}

/// Builds the full route table. Authentication/session handling sits in front
/// of this router and is not re-checked here.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/create-order", post(orders::create_order))
        .route("/api/fetch-orders", get(orders::fetch_orders))
        .route("/api/store-orders", get(orders::store_orders))
        .route("/api/approve-order", put(orders::approve_order))
        .route("/api/pack-order", put(orders::pack_order))
        .route("/api/dispatch-order", put(orders::dispatch_order))
        .route("/api/receive-order", put(orders::receive_order))
        .route("/api/update-order-status", put(orders::update_order_status))
        .route("/api/order-discrepancies", get(orders::order_discrepancies))
        .route("/api/sync/pending", get(orders::pending_sync))
        .route("/api/confirm-receipt", post(receiving::confirm_receipt))
        .route("/api/create-shop", post(stores::create_shop))
        .route("/api/shops", get(stores::shops))
        .route("/health", get(health::healthz))
        .with_state(state)
}
