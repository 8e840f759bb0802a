use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use diesel::dsl::sql;
use diesel::sql_types::Bool;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::{
            subscription_renewals::InsertSubscriptionRenewalEntity,
            subscriptions::{InsertSubscriptionEntity, SubscriptionEntity},
        },
        repositories::subscriptions::SubscriptionRepository,
        value_objects::enums::{
            billing_cycles::BillingCycle, subscription_statuses::SubscriptionStatus,
        },
    },
    infrastructure::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{subscription_renewals, subscriptions},
    },
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn create(&self, insert_subscription_entity: InsertSubscriptionEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let subscription_id = insert_into(subscriptions::table)
            .values(&insert_subscription_entity)
            .returning(subscriptions::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(subscription_id)
    }

    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = subscriptions::table
            .find(subscription_id)
            .select(SubscriptionEntity::as_select())
            .first::<SubscriptionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn list_due_for_renewal(&self, days_ahead: i64) -> Result<Vec<SubscriptionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let window_end = Utc::now() + Duration::days(days_ahead);

        let results = subscriptions::table
            .filter(subscriptions::status.eq(SubscriptionStatus::Active.to_string()))
            .filter(subscriptions::auto_renewal.eq(true))
            .filter(subscriptions::billing_cycle.ne(BillingCycle::OneTime.to_string()))
            .filter(subscriptions::next_billing_date.is_not_null())
            .filter(subscriptions::next_billing_date.le(window_end))
            .select(SubscriptionEntity::as_select())
            .load::<SubscriptionEntity>(&mut conn)?;

        Ok(results)
    }

    async fn record_renewal(&self, subscription_id: Uuid) -> Result<SubscriptionEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = conn.transaction::<SubscriptionEntity, anyhow::Error, _>(|conn| {
            let subscription = subscriptions::table
                .find(subscription_id)
                .select(SubscriptionEntity::as_select())
                .for_update()
                .first::<SubscriptionEntity>(conn)?;

            let cycle = BillingCycle::from_str(&subscription.billing_cycle)
                .ok_or_else(|| anyhow!("unknown billing cycle: {}", subscription.billing_cycle))?;
            // Anchor on the stored period end so late renewals never drift.
            let previous_period_end = subscription.current_period_end;
            let new_period_end = cycle
                .advance_period_end(previous_period_end)
                .ok_or_else(|| anyhow!("billing cycle {} cannot be renewed", cycle))?;
            let now = Utc::now();

            let updated = update(subscriptions::table.find(subscription_id))
                .set((
                    subscriptions::current_period_start.eq(previous_period_end),
                    subscriptions::current_period_end.eq(new_period_end),
                    subscriptions::next_billing_date.eq(Some(new_period_end)),
                    subscriptions::retry_count.eq(0),
                    subscriptions::next_retry_at.eq(None::<DateTime<Utc>>),
                    subscriptions::last_renewal_error.eq(None::<String>),
                    subscriptions::updated_at.eq(now),
                ))
                .returning(SubscriptionEntity::as_returning())
                .get_result::<SubscriptionEntity>(conn)?;

            insert_into(subscription_renewals::table)
                .values(&InsertSubscriptionRenewalEntity {
                    subscription_id,
                    previous_period_end,
                    new_period_end,
                    renewed_at: now,
                })
                .execute(conn)?;

            Ok(updated)
        })?;

        Ok(updated)
    }

    async fn mark_active(
        &self,
        subscription_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        next_billing_date: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(subscriptions::table.find(subscription_id))
            .set((
                subscriptions::status.eq(SubscriptionStatus::Active.to_string()),
                subscriptions::current_period_start.eq(period_start),
                subscriptions::current_period_end.eq(period_end),
                subscriptions::next_billing_date.eq(next_billing_date),
                subscriptions::retry_count.eq(0),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn schedule_retry(
        &self,
        subscription_id: Uuid,
        retry_count: i32,
        next_retry_at: DateTime<Utc>,
        last_renewal_error: String,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(subscriptions::table.find(subscription_id))
            .set((
                subscriptions::retry_count.eq(retry_count),
                subscriptions::next_retry_at.eq(Some(next_retry_at)),
                subscriptions::last_renewal_error.eq(Some(last_renewal_error)),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn suspend(&self, subscription_id: Uuid, reason: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        update(subscriptions::table.find(subscription_id))
            .set((
                subscriptions::status.eq(SubscriptionStatus::Suspended.to_string()),
                subscriptions::auto_renewal.eq(false),
                subscriptions::last_renewal_error.eq(Some(reason)),
                subscriptions::suspended_at.eq(Some(now)),
                subscriptions::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn disable_auto_renewal(&self, subscription_id: Uuid, reason: String) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(subscriptions::table.find(subscription_id))
            .set((
                subscriptions::auto_renewal.eq(false),
                subscriptions::auto_renewal_disabled_reason.eq(Some(reason)),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn cancel(&self, subscription_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        update(subscriptions::table.find(subscription_id))
            .set((
                subscriptions::status.eq(SubscriptionStatus::Cancelled.to_string()),
                subscriptions::auto_renewal.eq(false),
                subscriptions::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn expire_lapsed(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(
            subscriptions::table
                .filter(subscriptions::status.eq(SubscriptionStatus::Active.to_string()))
                .filter(subscriptions::auto_renewal.eq(false))
                .filter(sql::<Bool>(
                    "current_period_end + make_interval(days => grace_period_days) < now()",
                )),
        )
        .set((
            subscriptions::status.eq(SubscriptionStatus::Expired.to_string()),
            subscriptions::updated_at.eq(now),
        ))
        .execute(&mut conn)?;

        Ok(affected)
    }
}
