//! # WeChat Pay (API v2)
//!
//! Unified-order request parameters and payment-result notifications,
//! signed with `sign_type = HMAC-SHA256`.
//!
//! ## Signature
//! ```text
//! stringA   = canonical(params − sign)          "appid=wx..&body=..&mch_id=.."
//! signInput = stringA + "&key=" + api_key
//! sign      = UPPER(HEX(HMAC-SHA256(key = api_key, signInput)))
//! ```
//!
//! Notifications carry the same `sign` over all their other fields.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;
use subtle::ConstantTimeEq;

use super::{canonical_string, required, CallbackFields, CallbackNotice, CallbackOutcome};
use super::{IntentRequest, ProviderError, ProviderParams};
use crate::money::Money;
use crate::types::PaymentMethod;

type HmacSha256 = Hmac<Sha256>;

const SIGN_TYPE: &str = "HMAC-SHA256";
const TRADE_TYPE: &str = "JSAPI";
const SUCCESS: &str = "SUCCESS";

/// WeChat Pay merchant credentials and settings.
#[derive(Clone)]
pub struct WechatPay {
    app_id: String,
    mch_id: String,
    api_key: String,
    notify_url: String,
    spbill_create_ip: String,
}

impl WechatPay {
    pub fn new(
        app_id: impl Into<String>,
        mch_id: impl Into<String>,
        api_key: impl Into<String>,
        notify_url: impl Into<String>,
        spbill_create_ip: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let provider = WechatPay {
            app_id: app_id.into(),
            mch_id: mch_id.into(),
            api_key: api_key.into(),
            notify_url: notify_url.into(),
            spbill_create_ip: spbill_create_ip.into(),
        };

        for (name, value) in [
            ("app_id", &provider.app_id),
            ("mch_id", &provider.mch_id),
            ("api_key", &provider.api_key),
        ] {
            if value.trim().is_empty() {
                return Err(ProviderError::InvalidCredentials {
                    provider: PaymentMethod::Wechat,
                    reason: format!("{} is empty", name),
                });
            }
        }

        Ok(provider)
    }

    /// Unified-order parameters, `sign` included.
    pub(crate) fn build_intent(&self, request: &IntentRequest<'_>) -> Result<ProviderParams, ProviderError> {
        let mut params = BTreeMap::new();
        params.insert("appid".to_string(), self.app_id.clone());
        params.insert("mch_id".to_string(), self.mch_id.clone());
        params.insert("nonce_str".to_string(), request.nonce.to_string());
        params.insert("sign_type".to_string(), SIGN_TYPE.to_string());
        params.insert("body".to_string(), request.subject());
        params.insert("out_trade_no".to_string(), request.payment_no.to_string());
        params.insert("total_fee".to_string(), request.amount.cents().to_string());
        params.insert("spbill_create_ip".to_string(), self.spbill_create_ip.clone());
        params.insert("notify_url".to_string(), self.notify_url.clone());
        params.insert("trade_type".to_string(), TRADE_TYPE.to_string());

        let sign = self.sign(&params)?;
        params.insert("sign".to_string(), sign);
        Ok(ProviderParams(params))
    }

    /// Checks `sign`, then reads the payment result.
    pub(crate) fn verify_callback(&self, fields: &CallbackFields) -> Result<CallbackNotice, ProviderError> {
        let provided = required(fields, "sign")?;
        let expected = self.sign(fields)?;

        let matches: bool = expected
            .as_bytes()
            .ct_eq(provided.to_ascii_uppercase().as_bytes())
            .into();
        if !matches {
            return Err(ProviderError::BadSignature(PaymentMethod::Wechat));
        }

        if let Some(app_id) = fields.get("appid") {
            if app_id != &self.app_id {
                return Err(ProviderError::UnexpectedValue {
                    field: "appid",
                    value: app_id.clone(),
                });
            }
        }

        let payment_no = required(fields, "out_trade_no")?.to_string();
        let return_code = required(fields, "return_code")?;
        let result_code = fields.get("result_code").map(String::as_str).unwrap_or("");

        let outcome = if return_code == SUCCESS && result_code == SUCCESS {
            let trade_no = required(fields, "transaction_id")?.to_string();
            let total_fee = required(fields, "total_fee")?;
            let cents: i64 = total_fee
                .parse()
                .map_err(|_| ProviderError::UnexpectedValue {
                    field: "total_fee",
                    value: total_fee.to_string(),
                })?;
            CallbackOutcome::Paid {
                trade_no,
                amount: Money::from_cents(cents),
            }
        } else {
            let reason = fields
                .get("err_code_des")
                .or_else(|| fields.get("return_msg"))
                .cloned()
                .unwrap_or_else(|| format!("{}/{}", return_code, result_code));
            CallbackOutcome::Failed { reason }
        };

        Ok(CallbackNotice {
            payment_no,
            outcome,
        })
    }

    /// Computes the HMAC-SHA256 signature over every field except `sign`.
    pub fn sign(&self, params: &BTreeMap<String, String>) -> Result<String, ProviderError> {
        let input = format!("{}&key={}", canonical_string(params, &["sign"]), self.api_key);

        let mut mac = HmacSha256::new_from_slice(self.api_key.as_bytes()).map_err(|e| {
            ProviderError::SigningFailed {
                provider: PaymentMethod::Wechat,
                reason: e.to_string(),
            }
        })?;
        mac.update(input.as_bytes());

        Ok(hex::encode_upper(mac.finalize().into_bytes()))
    }
}

impl fmt::Debug for WechatPay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WechatPay")
            .field("app_id", &self.app_id)
            .field("mch_id", &self.mch_id)
            .field("api_key", &"<redacted>")
            .field("notify_url", &self.notify_url)
            .finish()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
