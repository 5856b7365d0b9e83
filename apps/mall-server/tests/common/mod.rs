//! Shared fixtures for the integration tests.
//!
//! Every scenario runs against both storage adapters.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::Sha256;
use tempfile::TempDir;

use mall_core::provider::{Alipay, WechatPay};
use mall_core::validation::LineRequest;
use mall_core::{GatewayRegistry, Money, SaleStatus, ShippingInfo, UserStatus};
use mall_db::{Database, DbConfig, MemoryStore};
use mall_server::services::{
    CallbackReconciler, CreateOrderRequest, OrderService, PaymentService, Stores,
};
use mall_server::AppState;

pub const WECHAT_APP_ID: &str = "wx8888888888888888";
pub const WECHAT_API_KEY: &str = "192006250b4c09247ec02edce69f6a2d";
pub const ALIPAY_APP_ID: &str = "2021000000000001";

// =============================================================================
// Backends
// =============================================================================

pub enum Backend {
    Memory(Arc<MemoryStore>),
    /// In-memory SQLite: one connection, so writes never overlap.
    Sqlite(Database),
    /// File-backed SQLite with a multi-connection pool, where concurrent
    /// writers really contend for the database lock.
    SqliteFile(Database, TempDir),
}

impl Backend {
    pub fn memory() -> Self {
        Backend::Memory(Arc::new(MemoryStore::new()))
    }

    pub async fn sqlite() -> Self {
        Backend::Sqlite(Database::new(DbConfig::in_memory()).await.unwrap())
    }

    pub async fn sqlite_file() -> Self {
        let dir = TempDir::new().unwrap();
        let config = DbConfig::new(dir.path().join("mall.db")).max_connections(8);
        Backend::SqliteFile(Database::new(config).await.unwrap(), dir)
    }

    /// One of each, for scenarios that must hold on every adapter.
    pub async fn all() -> Vec<Backend> {
        vec![
            Backend::memory(),
            Backend::sqlite().await,
            Backend::sqlite_file().await,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            Backend::Sqlite(_) => "sqlite",
            Backend::SqliteFile(..) => "sqlite-file",
        }
    }

    fn database(&self) -> Option<&Database> {
        match self {
            Backend::Memory(_) => None,
            Backend::Sqlite(db) | Backend::SqliteFile(db, _) => Some(db),
        }
    }

    pub fn stores(&self) -> Stores {
        match self {
            Backend::Sqlite(db) | Backend::SqliteFile(db, _) => Stores::sqlite(db),
            Backend::Memory(store) => Stores::memory(store.clone()),
        }
    }

    pub async fn user(&self, username: &str) -> i64 {
        match self {
            Backend::Sqlite(db) | Backend::SqliteFile(db, _) => db
                .catalog()
                .insert_user(username, UserStatus::Active)
                .await
                .unwrap()
                .id,
            Backend::Memory(store) => store.add_user(username, UserStatus::Active).await.id,
        }
    }

    pub async fn product(&self, name: &str, price_cents: i64, stock: i64) -> i64 {
        let price = Money::from_cents(price_cents);
        match self {
            Backend::Memory(store) => {
                store.add_product(name, price, stock, SaleStatus::OnSale).await.id
            }
            Backend::Sqlite(db) | Backend::SqliteFile(db, _) => db
                .catalog()
                .insert_product(name, price, stock, SaleStatus::OnSale)
                .await
                .unwrap()
                .id,
        }
    }

    pub async fn sku(&self, product_id: i64, code: &str, name: &str, price_cents: i64, stock: i64) -> i64 {
        let price = Money::from_cents(price_cents);
        match self {
            Backend::Memory(store) => {
                store
                    .add_sku(product_id, code, name, price, stock, SaleStatus::OnSale)
                    .await
                    .id
            }
            Backend::Sqlite(db) | Backend::SqliteFile(db, _) => db
                .catalog()
                .insert_sku(product_id, code, name, price, stock, SaleStatus::OnSale)
                .await
                .unwrap()
                .id,
        }
    }

    pub fn app_state(&self) -> AppState {
        match self.database() {
            Some(db) => AppState::with_database(db.clone(), gateways()),
            None => AppState::new(self.stores(), gateways()),
        }
    }
}

// =============================================================================
// Services
// =============================================================================

pub struct Services {
    pub orders: OrderService,
    pub payments: PaymentService,
    pub callbacks: CallbackReconciler,
}

impl Services {
    pub fn new(backend: &Backend) -> Self {
        let stores = backend.stores();
        let gateways = Arc::new(gateways());
        Services {
            orders: OrderService::new(&stores),
            payments: PaymentService::new(&stores, gateways.clone()),
            callbacks: CallbackReconciler::new(&stores, gateways),
        }
    }
}

pub fn order_request(lines: &[(i64, Option<i64>, i64)]) -> CreateOrderRequest {
    CreateOrderRequest {
        items: lines
            .iter()
            .map(|(product_id, sku_id, quantity)| LineRequest {
                product_id: *product_id,
                sku_id: *sku_id,
                quantity: *quantity,
            })
            .collect(),
        shipping: ShippingInfo {
            receiver_name: "Li Lei".to_string(),
            receiver_phone: "13800138000".to_string(),
            receiver_address: "1 Nanjing Rd, Shanghai".to_string(),
        },
        buyer_message: None,
    }
}

// =============================================================================
// Providers
// =============================================================================

/// Merchant key pair and platform key pair, generated once per test binary.
fn alipay_keys() -> &'static (RsaPrivateKey, RsaPrivateKey) {
    static KEYS: OnceLock<(RsaPrivateKey, RsaPrivateKey)> = OnceLock::new();
    KEYS.get_or_init(|| {
        let mut rng = rand::thread_rng();
        (
            RsaPrivateKey::new(&mut rng, 1024).unwrap(),
            RsaPrivateKey::new(&mut rng, 1024).unwrap(),
        )
    })
}

pub fn wechat() -> WechatPay {
    WechatPay::new(
        WECHAT_APP_ID,
        "1900000109",
        WECHAT_API_KEY,
        "https://mall.example.com/api/v1/payment/wechat/callback",
        "127.0.0.1",
    )
    .unwrap()
}

pub fn alipay() -> Alipay {
    let (merchant, platform) = alipay_keys();
    Alipay::new(
        ALIPAY_APP_ID,
        merchant.clone(),
        platform.to_public_key(),
        "https://mall.example.com/api/v1/payment/alipay/callback",
    )
    .unwrap()
}

pub fn gateways() -> GatewayRegistry {
    GatewayRegistry::new().register(wechat()).register(alipay())
}

/// A WeChat notification signed with the merchant API key.
pub fn wechat_callback(payment_no: &str, paid: bool, total_fee_cents: i64) -> Vec<u8> {
    let code = if paid { "SUCCESS" } else { "FAIL" };
    let mut fields = BTreeMap::new();
    fields.insert("appid".to_string(), WECHAT_APP_ID.to_string());
    fields.insert("mch_id".to_string(), "1900000109".to_string());
    fields.insert("return_code".to_string(), "SUCCESS".to_string());
    fields.insert("result_code".to_string(), code.to_string());
    fields.insert("out_trade_no".to_string(), payment_no.to_string());
    fields.insert("transaction_id".to_string(), format!("4200{}", payment_no));
    fields.insert("total_fee".to_string(), total_fee_cents.to_string());
    let sign = wechat().sign(&fields).unwrap();
    fields.insert("sign".to_string(), sign);
    serde_json::to_vec(&fields).unwrap()
}

/// An Alipay notification signed with the platform private key.
pub fn alipay_callback(payment_no: &str, trade_status: &str, total_amount: &str) -> Vec<u8> {
    let mut fields = BTreeMap::new();
    fields.insert("app_id".to_string(), ALIPAY_APP_ID.to_string());
    fields.insert("out_trade_no".to_string(), payment_no.to_string());
    fields.insert("trade_no".to_string(), format!("2026{}", payment_no));
    fields.insert("trade_status".to_string(), trade_status.to_string());
    fields.insert("total_amount".to_string(), total_amount.to_string());

    let content = fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    let (_, platform) = alipay_keys();
    let signature = SigningKey::<Sha256>::new(platform.clone()).sign(content.as_bytes());

    fields.insert("sign".to_string(), STANDARD.encode(signature.to_bytes()));
    fields.insert("sign_type".to_string(), "RSA2".to_string());
    serde_json::to_vec(&fields).unwrap()
}
