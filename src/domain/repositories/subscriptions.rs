use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::subscriptions::{InsertSubscriptionEntity, SubscriptionEntity};

#[automock]
#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn create(&self, insert_subscription_entity: InsertSubscriptionEntity) -> Result<Uuid>;

    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>>;

    /// Renewal candidates: active, auto-renewing, not one-time, with a next
    /// billing date inside the look-ahead window.
    async fn list_due_for_renewal(&self, days_ahead: i64) -> Result<Vec<SubscriptionEntity>>;

    /// Extends the period by one billing cycle from the *current period end*,
    /// moves the next billing date, resets the retry bookkeeping, and writes
    /// the renewal audit row, all in one database transaction. Returns the
    /// updated subscription.
    async fn record_renewal(&self, subscription_id: Uuid) -> Result<SubscriptionEntity>;

    /// First successful charge: pending_payment -> active with a fresh period.
    async fn mark_active(
        &self,
        subscription_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        next_billing_date: Option<DateTime<Utc>>,
    ) -> Result<()>;

    async fn schedule_retry(
        &self,
        subscription_id: Uuid,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
        last_renewal_error: String,
    ) -> Result<()>;

    async fn suspend(&self, subscription_id: Uuid, reason: String) -> Result<()>;

    async fn disable_auto_renewal(&self, subscription_id: Uuid, reason: String) -> Result<()>;

    async fn cancel(&self, subscription_id: Uuid) -> Result<()>;

    /// Flips lapsed non-renewing subscriptions (period end + grace elapsed)
    /// to expired. Returns how many rows changed.
    async fn expire_lapsed(&self, now: DateTime<Utc>) -> Result<usize>;
}
