use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payment_methods::{InsertPaymentMethodEntity, PaymentMethodEntity};

#[automock]
#[async_trait]
pub trait PaymentMethodRepository: Send + Sync {
    /// Saves a tokenized method. When the new row is default, the previous
    /// default for that user is unset inside the same database transaction
    /// so at most one default active method ever exists.
    async fn save(&self, payment_method: InsertPaymentMethodEntity) -> Result<Uuid>;

    async fn find_default_active(&self, user_id: Uuid) -> Result<Option<PaymentMethodEntity>>;

    async fn set_default(&self, user_id: Uuid, payment_method_id: Uuid) -> Result<()>;

    async fn deactivate(&self, payment_method_id: Uuid) -> Result<()>;
}
