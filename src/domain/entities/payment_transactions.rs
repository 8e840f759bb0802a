use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infrastructure::postgres::schema::payment_transactions;

/// One row per charge attempt. Append-only: settled rows are never mutated;
/// a failed renewal retry inserts a fresh row.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = payment_transactions)]
pub struct PaymentTransactionEntity {
    pub id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub method: String,
    pub transaction_type: String,
    pub status: String,
    pub txn_ref: String,
    pub gateway_txn_no: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub payment_date: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = payment_transactions)]
pub struct InsertPaymentTransactionEntity {
    pub subscription_id: Option<Uuid>,
    pub user_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub method: String,
    pub transaction_type: String,
    pub status: String,
    pub txn_ref: String,
    pub gateway_txn_no: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub payment_date: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}
