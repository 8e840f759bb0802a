use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::payment_transactions::{
            InsertPaymentTransactionEntity, PaymentTransactionEntity,
        },
        repositories::payment_transactions::{PaymentTransactionRepository, UnappliedRenewal},
        value_objects::enums::{
            transaction_statuses::TransactionStatus, transaction_types::TransactionType,
        },
    },
    infrastructure::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{payment_transactions, subscriptions},
    },
};

pub struct PaymentTransactionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentTransactionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }

    fn settled_statuses() -> Vec<String> {
        vec![
            TransactionStatus::Completed.to_string(),
            TransactionStatus::Refunded.to_string(),
        ]
    }
}

#[async_trait]
impl PaymentTransactionRepository for PaymentTransactionPostgres {
    async fn create(&self, transaction: InsertPaymentTransactionEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let transaction_id = insert_into(payment_transactions::table)
            .values(&transaction)
            .returning(payment_transactions::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(transaction_id)
    }

    async fn find_by_txn_ref(&self, txn_ref: &str) -> Result<Option<PaymentTransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = payment_transactions::table
            .filter(payment_transactions::txn_ref.eq(txn_ref))
            .select(PaymentTransactionEntity::as_select())
            .first::<PaymentTransactionEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn complete(
        &self,
        txn_ref: &str,
        gateway_txn_no: Option<String>,
        gateway_response: Option<serde_json::Value>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Settled rows are immutable; the filter leaves them untouched.
        let affected = update(
            payment_transactions::table
                .filter(payment_transactions::txn_ref.eq(txn_ref))
                .filter(payment_transactions::status.ne_all(Self::settled_statuses())),
        )
        .set((
            payment_transactions::status.eq(TransactionStatus::Completed.to_string()),
            payment_transactions::gateway_txn_no.eq(gateway_txn_no),
            payment_transactions::gateway_response.eq(gateway_response),
            payment_transactions::payment_date.eq(Some(Utc::now())),
        ))
        .execute(&mut conn)?;

        if affected == 0 {
            bail!("transaction {} not found or already settled", txn_ref);
        }

        Ok(())
    }

    async fn fail(
        &self,
        txn_ref: &str,
        failure_reason: String,
        gateway_response: Option<serde_json::Value>,
    ) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = update(
            payment_transactions::table
                .filter(payment_transactions::txn_ref.eq(txn_ref))
                .filter(payment_transactions::status.ne_all(Self::settled_statuses())),
        )
        .set((
            payment_transactions::status.eq(TransactionStatus::Failed.to_string()),
            payment_transactions::failure_reason.eq(Some(failure_reason)),
            payment_transactions::gateway_response.eq(gateway_response),
        ))
        .execute(&mut conn)?;

        if affected == 0 {
            bail!("transaction {} not found or already settled", txn_ref);
        }

        Ok(())
    }

    async fn list_unapplied_renewals(&self) -> Result<Vec<UnappliedRenewal>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // A completed renewal charge whose subscription still bills on or
        // before the charge date means the period extension never landed.
        let rows = payment_transactions::table
            .inner_join(subscriptions::table)
            .filter(payment_transactions::status.eq(TransactionStatus::Completed.to_string()))
            .filter(
                payment_transactions::transaction_type.eq(TransactionType::Renewal.to_string()),
            )
            .filter(payment_transactions::payment_date.is_not_null())
            .filter(subscriptions::next_billing_date.is_not_null())
            .filter(subscriptions::next_billing_date.le(payment_transactions::payment_date))
            .select((payment_transactions::id, subscriptions::id))
            .load::<(Uuid, Uuid)>(&mut conn)?;

        Ok(rows
            .into_iter()
            .map(|(transaction_id, subscription_id)| UnappliedRenewal {
                transaction_id,
                subscription_id,
            })
            .collect())
    }
}
