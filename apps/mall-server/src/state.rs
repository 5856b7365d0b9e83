//! Shared application state handed to every handler.

use std::sync::Arc;

use mall_core::GatewayRegistry;
use mall_db::Database;

use crate::services::{CallbackReconciler, OrderService, PaymentService, Stores};

pub struct AppState {
    pub orders: OrderService,
    pub payments: PaymentService,
    pub callbacks: CallbackReconciler,
    /// Present when backed by SQLite; used by `/health`.
    pub db: Option<Database>,
}

impl AppState {
    pub fn new(stores: Stores, gateways: GatewayRegistry) -> Self {
        let gateways = Arc::new(gateways);
        AppState {
            orders: OrderService::new(&stores),
            payments: PaymentService::new(&stores, gateways.clone()),
            callbacks: CallbackReconciler::new(&stores, gateways),
            db: None,
        }
    }

    /// State over the SQLite repositories of `db`.
    pub fn with_database(db: Database, gateways: GatewayRegistry) -> Self {
        let mut state = AppState::new(Stores::sqlite(&db), gateways);
        state.db = Some(db);
        state
    }

    pub async fn is_healthy(&self) -> bool {
        match &self.db {
            Some(db) => db.health_check().await,
            None => true,
        }
    }
}
