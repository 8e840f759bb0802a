use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::subscription_renewals;

/// Audit row written alongside every period extension.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = subscription_renewals)]
pub struct SubscriptionRenewalEntity {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub previous_period_end: DateTime<Utc>,
    pub new_period_end: DateTime<Utc>,
    pub renewed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = subscription_renewals)]
pub struct InsertSubscriptionRenewalEntity {
    pub subscription_id: Uuid,
    pub previous_period_end: DateTime<Utc>,
    pub new_period_end: DateTime<Utc>,
    pub renewed_at: DateTime<Utc>,
}
