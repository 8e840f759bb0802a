use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::payment_methods::{InsertPaymentMethodEntity, PaymentMethodEntity},
        repositories::payment_methods::PaymentMethodRepository,
    },
    infrastructure::postgres::{postgres_connection::PgPoolSquad, schema::payment_methods},
};

pub struct PaymentMethodPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentMethodPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentMethodRepository for PaymentMethodPostgres {
    async fn save(&self, payment_method: InsertPaymentMethodEntity) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let payment_method_id = conn.transaction::<Uuid, anyhow::Error, _>(|conn| {
            if payment_method.is_default {
                update(
                    payment_methods::table
                        .filter(payment_methods::user_id.eq(payment_method.user_id))
                        .filter(payment_methods::is_default.eq(true)),
                )
                .set(payment_methods::is_default.eq(false))
                .execute(conn)?;
            }

            let payment_method_id = insert_into(payment_methods::table)
                .values(&payment_method)
                .returning(payment_methods::id)
                .get_result::<Uuid>(conn)?;

            Ok(payment_method_id)
        })?;

        Ok(payment_method_id)
    }

    async fn find_default_active(&self, user_id: Uuid) -> Result<Option<PaymentMethodEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let result = payment_methods::table
            .filter(payment_methods::user_id.eq(user_id))
            .filter(payment_methods::is_default.eq(true))
            .filter(payment_methods::is_active.eq(true))
            .select(PaymentMethodEntity::as_select())
            .first::<PaymentMethodEntity>(&mut conn)
            .optional()?;

        Ok(result)
    }

    async fn set_default(&self, user_id: Uuid, payment_method_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        conn.transaction::<(), anyhow::Error, _>(|conn| {
            update(
                payment_methods::table
                    .filter(payment_methods::user_id.eq(user_id))
                    .filter(payment_methods::is_default.eq(true)),
            )
            .set(payment_methods::is_default.eq(false))
            .execute(conn)?;

            update(
                payment_methods::table
                    .find(payment_method_id)
                    .filter(payment_methods::user_id.eq(user_id)),
            )
            .set(payment_methods::is_default.eq(true))
            .execute(conn)?;

            Ok(())
        })?;

        Ok(())
    }

    async fn deactivate(&self, payment_method_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // An inactive method cannot stay the default.
        update(payment_methods::table.find(payment_method_id))
            .set((
                payment_methods::is_active.eq(false),
                payment_methods::is_default.eq(false),
            ))
            .execute(&mut conn)?;

        Ok(())
    }
}
