//! # Alipay (open platform, RSA2)
//!
//! App-payment order strings and asynchronous trade notifications.
//!
//! ## Signature
//! ```text
//! content = canonical(params − sign)                 request
//! content = canonical(params − sign − sign_type)     notification
//! sign    = BASE64(RSA-PKCS#1-v1.5(SHA-256(content)))
//! ```
//!
//! Requests are signed with the merchant private key; notifications are
//! verified with the Alipay public key.
//!
//! ## Trade Status
//! | trade_status     | Outcome  |
//! |------------------|----------|
//! | `TRADE_SUCCESS`  | Paid     |
//! | `TRADE_FINISHED` | Paid     |
//! | `TRADE_CLOSED`   | Failed   |
//! | `WAIT_BUYER_PAY` | Pending  |

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Duration;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::fmt;

use super::{canonical_string, required, CallbackFields, CallbackNotice, CallbackOutcome};
use super::{IntentRequest, ProviderError, ProviderParams};
use crate::money::Money;
use crate::types::PaymentMethod;

const METHOD: &str = "alipay.trade.app.pay";
const SIGN_TYPE: &str = "RSA2";
const PRODUCT_CODE: &str = "QUICK_MSECURITY_PAY";

/// Alipay application credentials.
#[derive(Clone)]
pub struct Alipay {
    app_id: String,
    notify_url: String,
    signing_key: SigningKey<Sha256>,
    verifying_key: VerifyingKey<Sha256>,
}

impl Alipay {
    /// Creates the provider from decoded keys.
    ///
    /// `public_key` is the Alipay platform key used to verify notifications,
    /// not the public half of `private_key`.
    pub fn new(
        app_id: impl Into<String>,
        private_key: RsaPrivateKey,
        public_key: RsaPublicKey,
        notify_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let app_id = app_id.into();
        if app_id.trim().is_empty() {
            return Err(invalid_credentials("app_id is empty"));
        }

        Ok(Alipay {
            app_id,
            notify_url: notify_url.into(),
            signing_key: SigningKey::<Sha256>::new(private_key),
            verifying_key: VerifyingKey::<Sha256>::new(public_key),
        })
    }

    /// Creates the provider from key text.
    ///
    /// The private key may be PKCS#8 or PKCS#1 PEM. The public key may be
    /// SPKI or PKCS#1 PEM, or the bare base64 body the Alipay console shows.
    pub fn from_pem(
        app_id: impl Into<String>,
        private_key_pem: &str,
        public_key_pem: &str,
        notify_url: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let private_key = decode_private_key(private_key_pem.trim())?;
        let public_key = decode_public_key(public_key_pem.trim())?;
        Self::new(app_id, private_key, public_key, notify_url)
    }

    /// App-payment parameters, `sign` included.
    pub(crate) fn build_intent(&self, request: &IntentRequest<'_>) -> Result<ProviderParams, ProviderError> {
        let biz_content = serde_json::json!({
            "out_trade_no": request.payment_no,
            "total_amount": request.amount.to_decimal_string(),
            "subject": request.subject(),
            "product_code": PRODUCT_CODE,
        });

        // Alipay expects Beijing time without an offset suffix.
        let timestamp = (request.timestamp + Duration::hours(8))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        let mut params = BTreeMap::new();
        params.insert("app_id".to_string(), self.app_id.clone());
        params.insert("method".to_string(), METHOD.to_string());
        params.insert("format".to_string(), "JSON".to_string());
        params.insert("charset".to_string(), "utf-8".to_string());
        params.insert("sign_type".to_string(), SIGN_TYPE.to_string());
        params.insert("timestamp".to_string(), timestamp);
        params.insert("version".to_string(), "1.0".to_string());
        params.insert("notify_url".to_string(), self.notify_url.clone());
        params.insert("biz_content".to_string(), biz_content.to_string());

        let sign = self.sign(&canonical_string(&params, &["sign"]))?;
        params.insert("sign".to_string(), sign);
        Ok(ProviderParams(params))
    }

    /// Checks the RSA2 signature, then reads the trade status.
    pub(crate) fn verify_callback(&self, fields: &CallbackFields) -> Result<CallbackNotice, ProviderError> {
        let sign = required(fields, "sign")?;

        if let Some(sign_type) = fields.get("sign_type") {
            if sign_type != SIGN_TYPE {
                return Err(ProviderError::UnexpectedValue {
                    field: "sign_type",
                    value: sign_type.clone(),
                });
            }
        }

        let content = canonical_string(fields, &["sign", "sign_type"]);
        if !self.verify(&content, sign) {
            return Err(ProviderError::BadSignature(PaymentMethod::Alipay));
        }

        if let Some(app_id) = fields.get("app_id") {
            if app_id != &self.app_id {
                return Err(ProviderError::UnexpectedValue {
                    field: "app_id",
                    value: app_id.clone(),
                });
            }
        }

        let payment_no = required(fields, "out_trade_no")?.to_string();
        let trade_status = required(fields, "trade_status")?;

        let outcome = match trade_status {
            "TRADE_SUCCESS" | "TRADE_FINISHED" => {
                let trade_no = required(fields, "trade_no")?.to_string();
                let total_amount = required(fields, "total_amount")?;
                let amount = Money::parse_decimal(total_amount).map_err(|_| {
                    ProviderError::UnexpectedValue {
                        field: "total_amount",
                        value: total_amount.to_string(),
                    }
                })?;
                CallbackOutcome::Paid { trade_no, amount }
            }
            "TRADE_CLOSED" => CallbackOutcome::Failed {
                reason: "trade closed".to_string(),
            },
            "WAIT_BUYER_PAY" => CallbackOutcome::Pending,
            other => {
                return Err(ProviderError::UnexpectedValue {
                    field: "trade_status",
                    value: other.to_string(),
                })
            }
        };

        Ok(CallbackNotice {
            payment_no,
            outcome,
        })
    }

    fn sign(&self, content: &str) -> Result<String, ProviderError> {
        let signature = self
            .signing_key
            .try_sign(content.as_bytes())
            .map_err(|e| ProviderError::SigningFailed {
                provider: PaymentMethod::Alipay,
                reason: e.to_string(),
            })?;
        Ok(STANDARD.encode(signature.to_bytes()))
    }

    fn verify(&self, content: &str, sign: &str) -> bool {
        let Ok(bytes) = STANDARD.decode(sign) else {
            return false;
        };
        let Ok(signature) = Signature::try_from(bytes.as_slice()) else {
            return false;
        };
        self.verifying_key
            .verify(content.as_bytes(), &signature)
            .is_ok()
    }
}

impl fmt::Debug for Alipay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alipay")
            .field("app_id", &self.app_id)
            .field("notify_url", &self.notify_url)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

// =============================================================================
// Key Decoding
// =============================================================================

fn decode_private_key(text: &str) -> Result<RsaPrivateKey, ProviderError> {
    if text.contains("-----BEGIN") {
        return RsaPrivateKey::from_pkcs8_pem(text)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(text))
            .map_err(|e| invalid_credentials(&format!("private key: {}", e)));
    }

    let der = decode_bare_base64(text, "private key")?;
    RsaPrivateKey::from_pkcs8_der(&der)
        .or_else(|_| RsaPrivateKey::from_pkcs1_der(&der))
        .map_err(|e| invalid_credentials(&format!("private key: {}", e)))
}

fn decode_public_key(text: &str) -> Result<RsaPublicKey, ProviderError> {
    if text.contains("-----BEGIN") {
        return RsaPublicKey::from_public_key_pem(text)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(text))
            .map_err(|e| invalid_credentials(&format!("public key: {}", e)));
    }

    let der = decode_bare_base64(text, "public key")?;
    RsaPublicKey::from_public_key_der(&der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(&der))
        .map_err(|e| invalid_credentials(&format!("public key: {}", e)))
}

fn decode_bare_base64(text: &str, what: &str) -> Result<Vec<u8>, ProviderError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| invalid_credentials(&format!("{}: {}", what, e)))
}

fn invalid_credentials(reason: &str) -> ProviderError {
    ProviderError::InvalidCredentials {
        provider: PaymentMethod::Alipay,
        reason: reason.to_string(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
