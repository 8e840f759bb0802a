use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payment_transactions::{
    InsertPaymentTransactionEntity, PaymentTransactionEntity,
};

/// A completed renewal ledger row whose subscription period was never
/// extended — the crash window between ledger write and period update.
#[derive(Debug, Clone)]
pub struct UnappliedRenewal {
    pub transaction_id: Uuid,
    pub subscription_id: Uuid,
}

#[automock]
#[async_trait]
pub trait PaymentTransactionRepository: Send + Sync {
    async fn create(&self, transaction: InsertPaymentTransactionEntity) -> Result<Uuid>;

    async fn find_by_txn_ref(&self, txn_ref: &str) -> Result<Option<PaymentTransactionEntity>>;

    /// Marks a pending row completed. Refuses to touch settled rows.
    async fn complete(
        &self,
        txn_ref: &str,
        gateway_txn_no: Option<String>,
        gateway_response: Option<serde_json::Value>,
    ) -> Result<()>;

    /// Marks a pending row failed with the mapped reason. Refuses to touch
    /// settled rows.
    async fn fail(
        &self,
        txn_ref: &str,
        failure_reason: String,
        gateway_response: Option<serde_json::Value>,
    ) -> Result<()>;

    async fn list_unapplied_renewals(&self) -> Result<Vec<UnappliedRenewal>>;
}
