use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    application::interfaces::gateway::PaymentGateway,
    domain::{
        entities::{
            payment_methods::InsertPaymentMethodEntity,
            payment_transactions::InsertPaymentTransactionEntity,
        },
        repositories::{
            payment_methods::PaymentMethodRepository,
            payment_transactions::PaymentTransactionRepository,
            subscriptions::SubscriptionRepository,
        },
        value_objects::{
            enums::{
                billing_cycles::BillingCycle, subscription_statuses::SubscriptionStatus,
                transaction_statuses::TransactionStatus, transaction_types::TransactionType,
            },
            payments::PaymentUrlRequest,
        },
    },
    infrastructure::gateway::{
        redirect_client::{
            PARAM_GATEWAY_TXN_NO, PARAM_RESPONSE_CODE, PARAM_TXN_REF,
        },
        response_codes::{RESPONSE_CODE_SUCCESS, describe_response_code},
    },
};

/// How long a redirect checkout stays payable.
const PAYMENT_URL_TTL_MINUTES: i64 = 15;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("subscription not found")]
    SubscriptionNotFound,
    #[error("subscription is not payable: {0}")]
    NotPayable(String),
    #[error("invalid gateway callback: {0}")]
    InvalidCallback(String),
    #[error("unknown transaction reference")]
    TransactionNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            PaymentError::SubscriptionNotFound => StatusCode::NOT_FOUND,
            PaymentError::NotPayable(_) => StatusCode::CONFLICT,
            PaymentError::InvalidCallback(_) => StatusCode::BAD_REQUEST,
            PaymentError::TransactionNotFound => StatusCode::NOT_FOUND,
            PaymentError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type PaymentResult<T> = std::result::Result<T, PaymentError>;

#[derive(Debug, Clone, Serialize)]
pub struct CallbackOutcome {
    pub txn_ref: String,
    pub success: bool,
    pub failure_reason: Option<String>,
}

pub struct PaymentUseCase {
    subscription_repo: Arc<dyn SubscriptionRepository>,
    transaction_repo: Arc<dyn PaymentTransactionRepository>,
    payment_method_repo: Arc<dyn PaymentMethodRepository>,
    gateway: Arc<dyn PaymentGateway>,
}

impl PaymentUseCase {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepository>,
        transaction_repo: Arc<dyn PaymentTransactionRepository>,
        payment_method_repo: Arc<dyn PaymentMethodRepository>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            subscription_repo,
            transaction_repo,
            payment_method_repo,
            gateway,
        }
    }

    /// Builds a signed redirect URL for a subscription awaiting its first
    /// payment, recording a pending ledger row under a fresh reference.
    pub async fn create_payment_url(
        &self,
        subscription_id: Uuid,
        client_ip: String,
        bank_code: Option<String>,
    ) -> PaymentResult<String> {
        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(PaymentError::Internal)?
            .ok_or(PaymentError::SubscriptionNotFound)?;

        if subscription.status_enum() != Some(SubscriptionStatus::PendingPayment) {
            let err = PaymentError::NotPayable(format!(
                "subscription status is {}",
                subscription.status
            ));
            warn!(
                %subscription_id,
                status = %subscription.status,
                "payments: checkout requested for non-payable subscription"
            );
            return Err(err);
        }

        let txn_ref = Uuid::new_v4().simple().to_string();
        let transaction_type = match subscription.billing_cycle_enum() {
            Some(BillingCycle::OneTime) => TransactionType::OneTime,
            _ => TransactionType::Subscription,
        };

        self.transaction_repo
            .create(InsertPaymentTransactionEntity {
                subscription_id: Some(subscription.id),
                user_id: subscription.user_id,
                amount: subscription.amount,
                currency: subscription.currency.clone(),
                method: "card".to_string(),
                transaction_type: transaction_type.to_string(),
                status: TransactionStatus::Pending.to_string(),
                txn_ref: txn_ref.clone(),
                gateway_txn_no: None,
                gateway_response: None,
                payment_date: None,
                failure_reason: None,
            })
            .await
            .map_err(PaymentError::Internal)?;

        let now = Utc::now();
        let url = self
            .gateway
            .build_payment_url(&PaymentUrlRequest {
                txn_ref: txn_ref.clone(),
                amount: subscription.amount,
                currency: subscription.currency.clone(),
                order_info: format!("{} membership payment", subscription.plan_type),
                order_type: "membership".to_string(),
                client_ip,
                created_at: now,
                bank_code,
                expires_at: Some(now + chrono::Duration::minutes(PAYMENT_URL_TTL_MINUTES)),
            })
            .map_err(|err| PaymentError::Internal(anyhow!(err)))?;

        info!(
            %subscription_id,
            txn_ref = %txn_ref,
            "payments: payment URL created"
        );

        Ok(url)
    }

    /// Handles the signed return callback. Verification comes first: an
    /// invalid signature is rejected before any state is touched.
    pub async fn handle_gateway_callback(
        &self,
        params: &HashMap<String, String>,
    ) -> PaymentResult<CallbackOutcome> {
        if !self.gateway.verify_callback(params) {
            warn!("payments: gateway callback failed signature verification");
            return Err(PaymentError::InvalidCallback(
                "signature verification failed".to_string(),
            ));
        }

        let txn_ref = params
            .get(PARAM_TXN_REF)
            .cloned()
            .ok_or_else(|| PaymentError::InvalidCallback("missing txnRef".to_string()))?;
        let response_code = params
            .get(PARAM_RESPONSE_CODE)
            .cloned()
            .ok_or_else(|| PaymentError::InvalidCallback("missing responseCode".to_string()))?;
        let gateway_txn_no = params.get(PARAM_GATEWAY_TXN_NO).cloned();

        let transaction = self
            .transaction_repo
            .find_by_txn_ref(&txn_ref)
            .await
            .map_err(PaymentError::Internal)?
            .ok_or(PaymentError::TransactionNotFound)?;

        // Gateways redeliver callbacks; a settled row is acknowledged as-is.
        if TransactionStatus::from_str(&transaction.status)
            .is_some_and(|status| status.is_settled())
        {
            info!(
                txn_ref = %txn_ref,
                status = %transaction.status,
                "payments: callback for settled transaction, nothing to do"
            );
            return Ok(CallbackOutcome {
                txn_ref,
                success: true,
                failure_reason: None,
            });
        }

        let raw_response = serde_json::to_value(params).ok();

        if response_code != RESPONSE_CODE_SUCCESS {
            let reason = describe_response_code(&response_code);
            warn!(
                txn_ref = %txn_ref,
                response_code = %response_code,
                reason,
                "payments: gateway reported payment failure"
            );
            self.transaction_repo
                .fail(&txn_ref, format!("{reason} ({response_code})"), raw_response)
                .await
                .map_err(PaymentError::Internal)?;
            return Ok(CallbackOutcome {
                txn_ref,
                success: false,
                failure_reason: Some(reason.to_string()),
            });
        }

        self.transaction_repo
            .complete(&txn_ref, gateway_txn_no, raw_response)
            .await
            .map_err(PaymentError::Internal)?;

        let Some(subscription_id) = transaction.subscription_id else {
            // one-off charge without a subscription attached
            return Ok(CallbackOutcome {
                txn_ref,
                success: true,
                failure_reason: None,
            });
        };

        if let Some(token) = params.get("token").filter(|token| !token.is_empty()) {
            self.payment_method_repo
                .save(InsertPaymentMethodEntity {
                    user_id: transaction.user_id,
                    subscription_id: Some(subscription_id),
                    gateway_token: token.clone(),
                    card_brand: params.get("cardBrand").cloned(),
                    card_last4: params.get("cardLast4").cloned(),
                    card_expiry: params.get("cardExpiry").cloned(),
                    is_active: true,
                    is_default: true,
                })
                .await
                .map_err(PaymentError::Internal)?;
            info!(
                user_id = %transaction.user_id,
                %subscription_id,
                "payments: stored gateway token as default payment method"
            );
        }

        self.activate_subscription(subscription_id).await?;

        info!(
            txn_ref = %txn_ref,
            %subscription_id,
            "payments: first payment completed, subscription activated"
        );

        Ok(CallbackOutcome {
            txn_ref,
            success: true,
            failure_reason: None,
        })
    }

    async fn activate_subscription(&self, subscription_id: Uuid) -> PaymentResult<()> {
        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(PaymentError::Internal)?
            .ok_or(PaymentError::SubscriptionNotFound)?;

        let now = Utc::now();
        let (period_end, next_billing_date) = match subscription.billing_cycle_enum() {
            Some(BillingCycle::OneTime) | None => {
                // one-time entitlements keep their configured duration
                let duration =
                    subscription.current_period_end - subscription.current_period_start;
                (now + duration, None)
            }
            Some(cycle) => {
                let period_end = cycle.advance_period_end(now).ok_or_else(|| {
                    PaymentError::Internal(anyhow!("billing cycle {cycle} has no period"))
                })?;
                let next_billing_date = subscription.auto_renewal.then_some(period_end);
                (period_end, next_billing_date)
            }
        };

        self.subscription_repo
            .mark_active(subscription_id, now, period_end, next_billing_date)
            .await
            .map_err(PaymentError::Internal)?;

        Ok(())
    }
}
