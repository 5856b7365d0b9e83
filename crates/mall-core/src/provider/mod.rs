//! # Payment Providers
//!
//! Builds signed payment-intent parameters and verifies asynchronous
//! callbacks for the two supported providers.
//!
//! ## Provider Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        PaymentGateway (tagged)                          │
//! │                                                                         │
//! │           ┌────────────────────┐        ┌────────────────────┐          │
//! │           │  Wechat(WechatPay) │        │  Alipay(Alipay)    │          │
//! │           │  HMAC-SHA256 sign  │        │  RSA2 sign/verify  │          │
//! │           │  total_fee (fen)   │        │  total_amount "x.yy"│         │
//! │           │  ack SUCCESS/FAIL  │        │  ack success/failure│         │
//! │           └─────────┬──────────┘        └─────────┬──────────┘          │
//! │                     └──────────────┬──────────────┘                     │
//! │                                    ▼                                    │
//! │   build_intent(IntentRequest) ──► ProviderParams (relayed to client)    │
//! │   verify_callback(fields)     ──► CallbackNotice (or ProviderError)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Canonical String
//! Both providers sign the same shape of string: every non-empty parameter
//! except the excluded ones, sorted by key, joined as `k=v` with `&`, raw
//! (not URL-encoded).

pub mod alipay;
pub mod wechat;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::value::RawValue;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

use crate::money::Money;
use crate::types::PaymentMethod;

pub use alipay::Alipay;
pub use wechat::WechatPay;

/// Flat key/value view of a callback payload.
pub type CallbackFields = BTreeMap<String, String>;

// =============================================================================
// Errors
// =============================================================================

/// Provider signing and callback verification failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// A credential is missing or unusable (e.g., malformed PEM key).
    #[error("Invalid {provider} credentials: {reason}")]
    InvalidCredentials {
        provider: PaymentMethod,
        reason: String,
    },

    /// Signing failed.
    #[error("Failed to sign {provider} request: {reason}")]
    SigningFailed {
        provider: PaymentMethod,
        reason: String,
    },

    /// The amount cannot be charged (zero or negative).
    #[error("Invalid payment amount {0}")]
    InvalidAmount(Money),

    /// The callback body is not a flat JSON object.
    #[error("Malformed callback payload: {0}")]
    MalformedPayload(String),

    /// A required callback field is absent or empty.
    #[error("Callback field '{0}' is missing")]
    MissingField(&'static str),

    /// A callback field holds an unexpected value.
    #[error("Callback field '{field}' has unexpected value '{value}'")]
    UnexpectedValue { field: &'static str, value: String },

    /// The callback signature does not verify.
    #[error("{0} callback signature verification failed")]
    BadSignature(PaymentMethod),
}

// =============================================================================
// Intent / Callback Types
// =============================================================================

/// Inputs of one payment intent.
///
/// `nonce` and `timestamp` are supplied by the caller so that building the
/// parameters is deterministic.
#[derive(Debug, Clone)]
pub struct IntentRequest<'a> {
    /// Merchant-side identifier sent to the provider (`out_trade_no`).
    pub payment_no: &'a str,
    pub order_no: &'a str,
    pub amount: Money,
    pub nonce: &'a str,
    pub timestamp: DateTime<Utc>,
}

impl IntentRequest<'_> {
    /// Human-readable subject shown on the buyer's payment sheet.
    pub fn subject(&self) -> String {
        format!("订单支付-{}", self.order_no)
    }
}

/// Signed, provider-specific parameters relayed to the client SDK.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ProviderParams(BTreeMap<String, String>);

impl ProviderParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }
}

/// What a verified callback reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The buyer paid.
    Paid { trade_no: String, amount: Money },
    /// The provider closed the trade unpaid.
    Failed { reason: String },
    /// Intermediate notification; nothing to apply.
    Pending,
}

/// A verified callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackNotice {
    /// Our payment number, echoed back as `out_trade_no`.
    pub payment_no: String,
    pub outcome: CallbackOutcome,
}

// =============================================================================
// Gateway
// =============================================================================

/// A configured payment provider.
#[derive(Debug, Clone)]
pub enum PaymentGateway {
    Wechat(WechatPay),
    Alipay(Alipay),
}

impl PaymentGateway {
    pub fn method(&self) -> PaymentMethod {
        match self {
            PaymentGateway::Wechat(_) => PaymentMethod::Wechat,
            PaymentGateway::Alipay(_) => PaymentMethod::Alipay,
        }
    }

    /// Builds the signed parameters for one payment attempt.
    pub fn build_intent(&self, request: &IntentRequest<'_>) -> Result<ProviderParams, ProviderError> {
        if !request.amount.is_positive() {
            return Err(ProviderError::InvalidAmount(request.amount));
        }
        match self {
            PaymentGateway::Wechat(provider) => provider.build_intent(request),
            PaymentGateway::Alipay(provider) => provider.build_intent(request),
        }
    }

    /// Verifies a callback's signature and extracts its outcome.
    pub fn verify_callback(&self, fields: &CallbackFields) -> Result<CallbackNotice, ProviderError> {
        match self {
            PaymentGateway::Wechat(provider) => provider.verify_callback(fields),
            PaymentGateway::Alipay(provider) => provider.verify_callback(fields),
        }
    }

    /// The provider's literal callback acknowledgment.
    pub fn ack(&self, accepted: bool) -> &'static str {
        self.method().ack_literal(accepted)
    }
}

impl From<WechatPay> for PaymentGateway {
    fn from(provider: WechatPay) -> Self {
        PaymentGateway::Wechat(provider)
    }
}

impl From<Alipay> for PaymentGateway {
    fn from(provider: Alipay) -> Self {
        PaymentGateway::Alipay(provider)
    }
}

/// The set of configured gateways, at most one per method.
#[derive(Debug, Clone, Default)]
pub struct GatewayRegistry {
    gateways: HashMap<PaymentMethod, PaymentGateway>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the gateway for its method.
    pub fn register(mut self, gateway: impl Into<PaymentGateway>) -> Self {
        let gateway = gateway.into();
        self.gateways.insert(gateway.method(), gateway);
        self
    }

    pub fn get(&self, method: PaymentMethod) -> Option<&PaymentGateway> {
        self.gateways.get(&method)
    }

    pub fn methods(&self) -> impl Iterator<Item = PaymentMethod> + '_ {
        self.gateways.keys().copied()
    }
}

// =============================================================================
// Shared Helpers
// =============================================================================

/// Flattens a JSON callback body into string fields.
///
/// Strings are decoded, every other value keeps the exact text the provider
/// sent (`99.00` stays `99.00`) because that text is what was signed.
/// `null` is dropped.
pub fn parse_callback_fields(body: &[u8]) -> Result<CallbackFields, ProviderError> {
    let object: BTreeMap<String, Box<RawValue>> = serde_json::from_slice(body)
        .map_err(|e| ProviderError::MalformedPayload(e.to_string()))?;

    let mut fields = CallbackFields::new();
    for (key, raw) in object {
        let text = match raw.get() {
            "null" => continue,
            quoted if quoted.starts_with('"') => serde_json::from_str::<String>(quoted)
                .map_err(|e| ProviderError::MalformedPayload(e.to_string()))?,
            verbatim => verbatim.to_string(),
        };
        fields.insert(key, text);
    }
    Ok(fields)
}

/// Sorted `k=v&k=v` string over non-empty values, skipping `exclude`.
pub(crate) fn canonical_string(params: &BTreeMap<String, String>, exclude: &[&str]) -> String {
    params
        .iter()
        .filter(|(k, v)| !v.is_empty() && !exclude.contains(&k.as_str()))
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

/// Reads a required, non-empty field.
pub(crate) fn required<'a>(
    fields: &'a CallbackFields,
    key: &'static str,
) -> Result<&'a str, ProviderError> {
    fields
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or(ProviderError::MissingField(key))
}

// =============================================================================
// Unit Tests
// =============================================================================
