//! # mall-server
//!
//! Services and HTTP surface of the mall backend.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Mall Server                                      │
//! │                                                                         │
//! │  Client ───► axum (8080) ───► Services ───► Stores ───► SQLite         │
//! │                                   │                                     │
//! │  Provider ──► /payment/*/callback ┘──► GatewayRegistry (verify/sign)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`] - `ServerConfig` (defaults, TOML, `MALL_*` environment)
//! - [`services`] - Order lifecycle, payment intents, callback reconciler
//! - [`http`] - Router, handlers, extractors
//! - [`state`] - Shared handler state
//! - [`error`] - `ServiceError` and the client-facing `ApiError`

pub mod config;
pub mod error;
pub mod http;
pub mod services;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use error::{ApiError, ErrorCode, ServiceError, ServiceResult};
pub use state::AppState;
