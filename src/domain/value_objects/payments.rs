use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything needed to assemble a signed redirect payment URL. The caller
/// supplies the creation timestamp so URL construction stays deterministic.
#[derive(Debug, Clone)]
pub struct PaymentUrlRequest {
    pub txn_ref: String,
    pub amount: i64,
    pub currency: String,
    pub order_info: String,
    pub order_type: String,
    pub client_ip: String,
    pub created_at: DateTime<Utc>,
    pub bank_code: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result contract for a server-to-server charge against a stored token.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChargeOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub error: Option<String>,
}

impl ChargeOutcome {
    pub fn succeeded(transaction_id: String) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            error: Some(error.into()),
        }
    }
}
