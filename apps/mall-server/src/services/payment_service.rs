//! # Payment Intents
//!
//! ## Create Payment Flow
//! ```text
//! (user, order, method)
//!      │
//!      ▼
//! order exists, owned by user?        ──► OrderNotFound / AccessDenied
//!      │
//!      ▼
//! order paid?                          ──► AlreadyPaid
//! order PendingPayment?                ──► OrderNotPending
//! open attempt exists?                 ──► PaymentInProgress
//! gateway configured for method?      ──► UnsupportedMethod
//!      │
//!      ▼
//! build + sign provider params         (before any row is written)
//!      │
//!      ▼
//! insert Pending payment               unique index race ──► PaymentInProgress
//!      │
//!      ▼
//! PaymentIntent { payment_no, method, amount, params }
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use mall_core::numbering;
use mall_core::{
    CoreError, GatewayRegistry, IntentRequest, NewPayment, Order, OrderStatus, Payment,
    PaymentMethod, PaymentStatus, ProviderParams,
};
use mall_db::{DbError, OrderStore, PaymentStore, PaymentTransition};

use super::Stores;
use crate::error::{ServiceError, ServiceResult};

/// `nonce_str` length for WeChat Pay.
const NONCE_LEN: usize = 32;

/// What the client relays to the provider SDK.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub payment_no: String,
    pub method: PaymentMethod,
    pub amount_cents: i64,
    /// Two-decimal amount, e.g. "99.00".
    pub amount: String,
    pub provider_params: ProviderParams,
}

#[derive(Clone)]
pub struct PaymentService {
    orders: Arc<dyn OrderStore>,
    payments: Arc<dyn PaymentStore>,
    gateways: Arc<GatewayRegistry>,
}

impl PaymentService {
    pub fn new(stores: &Stores, gateways: Arc<GatewayRegistry>) -> Self {
        PaymentService {
            orders: stores.orders.clone(),
            payments: stores.payments.clone(),
            gateways,
        }
    }

    /// Opens a payment attempt for the order's full pay amount.
    pub async fn create_payment(
        &self,
        user_id: i64,
        order_id: i64,
        method: PaymentMethod,
    ) -> ServiceResult<PaymentIntent> {
        let order = self.owned_order(user_id, order_id).await?;

        if order.is_paid() {
            return Err(CoreError::AlreadyPaid {
                order_no: order.order_no,
            }
            .into());
        }
        if order.status != OrderStatus::PendingPayment {
            return Err(CoreError::OrderNotPending {
                order_no: order.order_no,
                current: order.status,
            }
            .into());
        }
        if !order.pay_amount().is_positive() {
            return Err(CoreError::NothingToPay {
                order_no: order.order_no,
            }
            .into());
        }
        if let Some(active) = self.payments.active_payment(order.id).await? {
            return Err(conflict(&order, &active));
        }

        let gateway = self
            .gateways
            .get(method)
            .ok_or_else(|| CoreError::UnsupportedMethod(method.to_string()))?;

        let now = Utc::now();
        let (payment_no, nonce) = {
            let mut rng = rand::thread_rng();
            (
                numbering::payment_no(now, &mut rng),
                numbering::nonce(&mut rng, NONCE_LEN),
            )
        };
        let amount = order.pay_amount();

        let provider_params = gateway.build_intent(&IntentRequest {
            payment_no: &payment_no,
            order_no: &order.order_no,
            amount,
            nonce: &nonce,
            timestamp: now,
        })?;

        let new_payment = NewPayment {
            payment_no,
            order_id: order.id,
            method,
            amount,
        };
        let payment = match self.payments.insert_payment(&new_payment).await {
            Ok(payment) => payment,
            Err(e) if e.is_unique_violation_on("order_payments.order_id") => {
                // A concurrent request opened an attempt first.
                return match self.payments.active_payment(order.id).await? {
                    Some(active) => Err(conflict(&order, &active)),
                    None => Err(e.into()),
                };
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            order_no = %order.order_no,
            payment_no = %payment.payment_no,
            %method,
            amount = %amount,
            "Payment created"
        );

        Ok(PaymentIntent {
            payment_no: payment.payment_no,
            method,
            amount_cents: amount.cents(),
            amount: amount.to_decimal_string(),
            provider_params,
        })
    }

    /// Current state of a payment.
    pub async fn get_status(&self, payment_no: &str) -> ServiceResult<Payment> {
        Ok(self
            .payments
            .get_payment(payment_no)
            .await?
            .ok_or_else(|| CoreError::PaymentNotFound(payment_no.to_string()))?)
    }

    /// `Pending` → `Cancelled`. The order stays payable.
    pub async fn cancel_payment(&self, payment_no: &str) -> ServiceResult<Payment> {
        match self.payments.cancel_payment(payment_no).await? {
            PaymentTransition::Applied => {
                info!(payment_no, "Payment cancelled");
                self.get_status(payment_no).await
            }
            PaymentTransition::AlreadyTerminal(current) => {
                debug!(payment_no, %current, "Cancel rejected, payment is terminal");
                Err(CoreError::InvalidPaymentStatus {
                    payment_no: payment_no.to_string(),
                    current,
                    operation: "cancel",
                }
                .into())
            }
            PaymentTransition::NotFound => {
                Err(CoreError::PaymentNotFound(payment_no.to_string()).into())
            }
            PaymentTransition::OrderNotPayable(status) => Err(DbError::Internal(format!(
                "cancel of {} reported order status {}",
                payment_no, status
            ))
            .into()),
        }
    }

    /// Every attempt made for a user's order, oldest first.
    pub async fn list_payments(&self, user_id: i64, order_id: i64) -> ServiceResult<Vec<Payment>> {
        let order = self.owned_order(user_id, order_id).await?;
        Ok(self.payments.list_order_payments(order.id).await?)
    }

    async fn owned_order(&self, user_id: i64, order_id: i64) -> ServiceResult<Order> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(CoreError::OrderNotFound(order_id))?;
        if order.user_id != user_id {
            return Err(CoreError::AccessDenied {
                order_no: order.order_no,
            }
            .into());
        }
        Ok(order)
    }
}

fn conflict(order: &Order, active: &Payment) -> ServiceError {
    match active.status {
        PaymentStatus::Success => CoreError::AlreadyPaid {
            order_no: order.order_no.clone(),
        },
        _ => CoreError::PaymentInProgress {
            order_no: order.order_no.clone(),
            payment_no: active.payment_no.clone(),
        },
    }
    .into()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ApiError, ErrorCode};
    use crate::services::order_service::{CreateOrderRequest, OrderService};
    use mall_core::provider::WechatPay;
    use mall_core::validation::LineRequest;
    use mall_core::{Money, SaleStatus, ShippingInfo, UserStatus};
    use mall_db::MemoryStore;

    struct Fixture {
        orders: OrderService,
        payments: PaymentService,
        user_id: i64,
        order: Order,
    }

    fn wechat() -> WechatPay {
        WechatPay::new(
            "wx8888888888888888",
            "1900000109",
            "192006250b4c09247ec02edce69f6a2d",
            "https://mall.example.com/api/v1/payment/wechat/callback",
            "127.0.0.1",
        )
        .unwrap()
    }

    async fn fixture() -> Fixture {
        fixture_priced(9_900).await
    }

    async fn fixture_priced(price_cents: i64) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let user = store.add_user("alice", UserStatus::Active).await;
        let mug = store
            .add_product("Ceramic Mug", Money::from_cents(price_cents), 5, SaleStatus::OnSale)
            .await;

        let stores = Stores::memory(store);
        let orders = OrderService::new(&stores);
        let payments = PaymentService::new(&stores, Arc::new(GatewayRegistry::new().register(wechat())));

        let order = orders
            .create_order(
                user.id,
                CreateOrderRequest {
                    items: vec![LineRequest {
                        product_id: mug.id,
                        sku_id: None,
                        quantity: 1,
                    }],
                    shipping: ShippingInfo {
                        receiver_name: "Li Lei".to_string(),
                        receiver_phone: "13800138000".to_string(),
                        receiver_address: "1 Nanjing Rd, Shanghai".to_string(),
                    },
                    buyer_message: None,
                },
            )
            .await
            .unwrap();

        Fixture {
            orders,
            payments,
            user_id: user.id,
            order,
        }
    }

    #[tokio::test]
    async fn test_create_payment_returns_signed_params() {
        let f = fixture().await;
        let intent = f
            .payments
            .create_payment(f.user_id, f.order.id, PaymentMethod::Wechat)
            .await
            .unwrap();

        assert!(intent.payment_no.starts_with("PAY"));
        assert_eq!(intent.amount, "99.00");
        assert_eq!(intent.amount_cents, 9_900);
        assert_eq!(intent.provider_params.get("out_trade_no"), Some(intent.payment_no.as_str()));
        assert_eq!(intent.provider_params.get("total_fee"), Some("9900"));
        assert_eq!(intent.provider_params.get("nonce_str").map(str::len), Some(NONCE_LEN));
        assert!(intent.provider_params.get("sign").is_some());

        let payment = f.payments.get_status(&intent.payment_no).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.amount(), Money::from_cents(9_900));
    }

    #[tokio::test]
    async fn test_second_attempt_while_pending_is_rejected() {
        let f = fixture().await;
        let first = f
            .payments
            .create_payment(f.user_id, f.order.id, PaymentMethod::Wechat)
            .await
            .unwrap();

        let err = f
            .payments
            .create_payment(f.user_id, f.order.id, PaymentMethod::Wechat)
            .await
            .unwrap_err();
        match err {
            ServiceError::Core(CoreError::PaymentInProgress { payment_no, .. }) => {
                assert_eq!(payment_no, first.payment_no)
            }
            other => panic!("expected PaymentInProgress, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_then_reattempt() {
        let f = fixture().await;
        let first = f
            .payments
            .create_payment(f.user_id, f.order.id, PaymentMethod::Wechat)
            .await
            .unwrap();

        let cancelled = f.payments.cancel_payment(&first.payment_no).await.unwrap();
        assert_eq!(cancelled.status, PaymentStatus::Cancelled);

        let second = f
            .payments
            .create_payment(f.user_id, f.order.id, PaymentMethod::Wechat)
            .await
            .unwrap();
        assert_ne!(second.payment_no, first.payment_no);

        let attempts = f.payments.list_payments(f.user_id, f.order.id).await.unwrap();
        assert_eq!(attempts.len(), 2);

        let err = f.payments.cancel_payment(&first.payment_no).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::InvalidPaymentStatus {
                current: PaymentStatus::Cancelled,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_method_is_unsupported() {
        let f = fixture().await;
        let err = f
            .payments
            .create_payment(f.user_id, f.order.id, PaymentMethod::Alipay)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::UnsupportedMethod(ref m)) if m == "alipay"));
        assert!(f.payments.list_payments(f.user_id, f.order.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_order_is_not_payable() {
        let f = fixture().await;
        f.orders.cancel_order(f.user_id, f.order.id).await.unwrap();

        let err = f
            .payments
            .create_payment(f.user_id, f.order.id, PaymentMethod::Wechat)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Core(CoreError::OrderNotPending {
                current: OrderStatus::Cancelled,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_free_order_is_not_sent_to_a_provider() {
        let f = fixture_priced(0).await;
        assert_eq!(f.order.pay_amount(), Money::zero());

        let err = f
            .payments
            .create_payment(f.user_id, f.order.id, PaymentMethod::Wechat)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::NothingToPay { .. })));
        assert_eq!(ApiError::from(err).code, ErrorCode::InvalidState);
        assert!(f.payments.list_payments(f.user_id, f.order.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ownership_and_lookup_errors() {
        let f = fixture().await;

        let err = f
            .payments
            .create_payment(f.user_id + 100, f.order.id, PaymentMethod::Wechat)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::AccessDenied { .. })));

        let err = f
            .payments
            .create_payment(f.user_id, 9_999, PaymentMethod::Wechat)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::OrderNotFound(9_999))));

        let err = f.payments.get_status("PAY-missing").await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::PaymentNotFound(_))));

        let err = f.payments.cancel_payment("PAY-missing").await.unwrap_err();
        assert!(matches!(err, ServiceError::Core(CoreError::PaymentNotFound(_))));
    }
}
