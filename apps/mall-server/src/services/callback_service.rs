//! # Callback Reconciler
//!
//! Applies provider payment notifications and answers with the literal the
//! provider expects. Providers redeliver until they see their success
//! literal, so every path here is safe to repeat.
//!
//! ## Decision Table
//! ```text
//! ┌───────────────────────────────────────────────┬──────────────────────────┐
//! │ Situation                                     │ Reply / effect           │
//! ├───────────────────────────────────────────────┼──────────────────────────┤
//! │ provider not configured                       │ failure                  │
//! │ body unparsable / signature bad               │ failure                  │
//! │ unknown payment number                        │ failure                  │
//! │ payment made with the other provider          │ failure                  │
//! │ payment already terminal                      │ success, no change       │
//! │ paid, payment already cancelled / failed      │ success, no change       │
//! │                                               │ (error! logged, refund)  │
//! │ paid, amount differs from payment             │ failure (error! logged)  │
//! │ paid                                          │ success, settle payment  │
//! │                                               │ and order together       │
//! │ paid, order no longer payable                 │ failure (error! logged)  │
//! │ closed / failed                               │ success, payment Failed  │
//! │ still waiting for the buyer                   │ success, no change       │
//! │ storage error                                 │ failure (provider retry) │
//! └───────────────────────────────────────────────┴──────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use mall_core::provider::parse_callback_fields;
use mall_core::{CallbackNotice, CallbackOutcome, GatewayRegistry, PaymentMethod, PaymentStatus};
use mall_db::{DbResult, PaymentStore, PaymentTransition};

use super::Stores;

/// Reply to a provider callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallbackAck {
    pub accepted: bool,
    /// Literal response body, e.g. `SUCCESS` or `failure`.
    pub body: &'static str,
}

impl CallbackAck {
    fn new(method: PaymentMethod, accepted: bool) -> Self {
        CallbackAck {
            accepted,
            body: method.ack_literal(accepted),
        }
    }
}

#[derive(Clone)]
pub struct CallbackReconciler {
    payments: Arc<dyn PaymentStore>,
    gateways: Arc<GatewayRegistry>,
}

impl CallbackReconciler {
    pub fn new(stores: &Stores, gateways: Arc<GatewayRegistry>) -> Self {
        CallbackReconciler {
            payments: stores.payments.clone(),
            gateways,
        }
    }

    /// Verifies and applies one raw callback body.
    pub async fn handle(&self, method: PaymentMethod, body: &[u8]) -> CallbackAck {
        let Some(gateway) = self.gateways.get(method) else {
            warn!(%method, "Callback for unconfigured provider");
            return CallbackAck::new(method, false);
        };

        let notice = match parse_callback_fields(body).and_then(|fields| gateway.verify_callback(&fields)) {
            Ok(notice) => notice,
            Err(e) => {
                warn!(%method, error = %e, "Callback rejected");
                return CallbackAck::new(method, false);
            }
        };

        match self.apply(method, &notice).await {
            Ok(accepted) => CallbackAck::new(method, accepted),
            Err(e) => {
                error!(%method, payment_no = %notice.payment_no, error = %e, "Callback processing failed");
                CallbackAck::new(method, false)
            }
        }
    }

    async fn apply(&self, method: PaymentMethod, notice: &CallbackNotice) -> DbResult<bool> {
        let payment_no = notice.payment_no.as_str();

        let Some(payment) = self.payments.get_payment(payment_no).await? else {
            warn!(%method, payment_no, "Callback for unknown payment");
            return Ok(false);
        };

        if payment.method != method {
            warn!(
                %method,
                payment_no,
                recorded = %payment.method,
                "Callback arrived on the wrong provider route"
            );
            return Ok(false);
        }

        if payment.status.is_terminal() {
            match &notice.outcome {
                CallbackOutcome::Paid { trade_no, amount } if payment.status != PaymentStatus::Success => {
                    error!(
                        payment_no,
                        status = %payment.status,
                        trade_no = %trade_no,
                        amount = %amount,
                        "Buyer paid a closed payment, manual refund required"
                    );
                }
                _ => {
                    debug!(payment_no, status = %payment.status, "Duplicate callback ignored");
                }
            }
            return Ok(true);
        }

        match &notice.outcome {
            CallbackOutcome::Paid { trade_no, amount } => {
                if *amount != payment.amount() {
                    error!(
                        payment_no,
                        expected = %payment.amount(),
                        reported = %amount,
                        "Callback amount mismatch, not applied"
                    );
                    return Ok(false);
                }

                match self.payments.settle_payment(payment_no, trade_no, Utc::now()).await? {
                    PaymentTransition::Applied => {
                        info!(payment_no, trade_no = %trade_no, amount = %amount, "Payment succeeded, order paid");
                        Ok(true)
                    }
                    PaymentTransition::AlreadyTerminal(status) => {
                        debug!(payment_no, %status, "Payment settled concurrently");
                        Ok(true)
                    }
                    PaymentTransition::OrderNotPayable(order_status) => {
                        error!(
                            payment_no,
                            trade_no = %trade_no,
                            %order_status,
                            "Buyer paid for an order that is no longer payable, manual refund required"
                        );
                        Ok(false)
                    }
                    PaymentTransition::NotFound => Ok(false),
                }
            }
            CallbackOutcome::Failed { reason } => {
                match self.payments.fail_payment(payment_no).await? {
                    PaymentTransition::Applied => {
                        info!(payment_no, reason = %reason, "Payment failed");
                    }
                    other => {
                        debug!(payment_no, outcome = ?other, "Failure notice not applied");
                    }
                }
                Ok(true)
            }
            CallbackOutcome::Pending => {
                debug!(payment_no, "Buyer has not paid yet");
                Ok(true)
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
