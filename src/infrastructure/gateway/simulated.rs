use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::{
    application::interfaces::gateway::{GatewayError, PaymentGateway},
    domain::{
        entities::payment_methods::PaymentMethodEntity,
        value_objects::payments::{ChargeOutcome, PaymentUrlRequest},
    },
};

/// Stand-in gateway for stages without real gateway credentials: charges
/// succeed 90% of the time so the retry and escalation paths stay
/// exercisable end to end. Never enabled in production wiring.
pub struct SimulatedGateway {
    success_rate: f64,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self { success_rate: 0.9 }
    }

    pub fn with_success_rate(success_rate: f64) -> Self {
        Self { success_rate }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    fn build_payment_url(&self, request: &PaymentUrlRequest) -> Result<String, GatewayError> {
        Ok(format!(
            "https://sandbox.invalid/checkout?txnRef={}&amount={}",
            request.txn_ref,
            request.amount * 100
        ))
    }

    fn verify_callback(&self, _params: &HashMap<String, String>) -> bool {
        true
    }

    async fn charge_stored_token(
        &self,
        payment_method: &PaymentMethodEntity,
        amount: i64,
        currency: &str,
    ) -> Result<ChargeOutcome> {
        let roll: f64 = rand::random();
        let outcome = if roll < self.success_rate {
            ChargeOutcome::succeeded(format!("SIM-{}", uuid::Uuid::new_v4().simple()))
        } else {
            ChargeOutcome::failed("simulated decline")
        };

        info!(
            payment_method_id = %payment_method.id,
            amount,
            currency,
            success = outcome.success,
            "gateway: simulated token charge"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn method() -> PaymentMethodEntity {
        PaymentMethodEntity {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            subscription_id: None,
            gateway_token: "tok_test".to_string(),
            card_brand: Some("visa".to_string()),
            card_last4: Some("4242".to_string()),
            card_expiry: Some("12/27".to_string()),
            is_active: true,
            is_default: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_always_succeeds_at_full_rate() {
        let gateway = SimulatedGateway::with_success_rate(1.0);
        let outcome = gateway.charge_stored_token(&method(), 100, "USD").await.unwrap();
        assert!(outcome.success);
        assert!(outcome.transaction_id.is_some());
    }

    #[tokio::test]
    async fn test_always_fails_at_zero_rate() {
        let gateway = SimulatedGateway::with_success_rate(0.0);
        let outcome = gateway.charge_stored_token(&method(), 100, "USD").await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("simulated decline"));
    }
}
