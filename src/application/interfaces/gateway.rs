use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    entities::payment_methods::PaymentMethodEntity,
    value_objects::payments::{ChargeOutcome, PaymentUrlRequest},
};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("missing gateway configuration: {0}")]
    MissingConfig(&'static str),
    #[error("payment amount out of range: {0}")]
    AmountOutOfRange(i64),
}

/// Contract for the hosted-redirect payment processor. URL signing and
/// callback verification share one keyed-hash canonicalization; the token
/// charge is the server-to-server leg used by renewals.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn build_payment_url(&self, request: &PaymentUrlRequest) -> Result<String, GatewayError>;

    /// True iff the recomputed digest over the non-hash parameters matches
    /// the received `secureHash`.
    fn verify_callback(&self, params: &HashMap<String, String>) -> bool;

    async fn charge_stored_token(
        &self,
        payment_method: &PaymentMethodEntity,
        amount: i64,
        currency: &str,
    ) -> Result<ChargeOutcome>;
}
