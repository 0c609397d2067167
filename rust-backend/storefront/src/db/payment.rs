use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Order, Page, Paginated, Payment, PaymentFilter, User};

#[derive(Clone)]
pub struct PaymentRepo {
    pool: PgPool,
}

impl PaymentRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, filter: &PaymentFilter) -> Result<Paginated<Payment>, sqlx::Error> {
        let page = Page::new(filter.page, filter.per_page);
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM payments WHERE ($1::payment_status IS NULL OR status = $1)",
        )
        .bind(filter.status)
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, Payment>(
            r#"
            SELECT * FROM payments
            WHERE ($1::payment_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.status)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Paginated::new(rows, page, total))
    }

    pub async fn find_for_user(&self, payment_number: &str, user_id: Uuid) -> Result<Payment, AppError> {
        sqlx::query_as::<_, Payment>(
            r#"
            SELECT pay.* FROM payments pay
            JOIN orders o ON o.id = pay.order_id
            WHERE pay.payment_number = $1 AND o.user_id = $2
            "#,
        )
        .bind(payment_number)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("payment"))
    }

    /// Stores the transfer proof URL, returning the previous one so its file can go.
    pub async fn attach_proof(&self, mut payment: Payment, url: String) -> Result<(Payment, Option<String>), AppError> {
        let previous = payment.proof_url.clone();
        payment.attach_proof(url)?;
        let payment = sqlx::query_as::<_, Payment>(
            "UPDATE payments SET proof_url = $2, updated_at = NOW() WHERE id = $1 AND status = 'pending' RETURNING *",
        )
        .bind(payment.id)
        .bind(&payment.proof_url)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::invalid_state("payment is no longer pending"))?;
        Ok((payment, previous))
    }

    /// Locks the parent order, then the payment, the same order `OrderRepo::cancel` takes them in.
    async fn lock(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Payment, AppError> {
        let order_id = sqlx::query_scalar::<_, Uuid>("SELECT order_id FROM payments WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(AppError::NotFound("payment"))?;
        sqlx::query("SELECT id FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(AppError::NotFound("payment"))
    }

    async fn save(tx: &mut Transaction<'_, Postgres>, payment: &Payment) -> Result<Payment, sqlx::Error> {
        sqlx::query_as::<_, Payment>(
            r#"
            UPDATE payments
            SET status = $2, notes = $3, paid_at = $4, verified_at = $5, verified_by = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(payment.id)
        .bind(payment.status)
        .bind(&payment.notes)
        .bind(payment.paid_at)
        .bind(payment.verified_at)
        .bind(payment.verified_by)
        .fetch_one(&mut **tx)
        .await
    }

    /// Mirrors the payment's status onto its order.
    async fn cascade(tx: &mut Transaction<'_, Postgres>, payment: &Payment) -> Result<Order, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            "UPDATE orders SET payment_status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(payment.order_id)
        .bind(payment.status.for_order())
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn verify(&self, id: Uuid, verifier: &User) -> Result<(Payment, Order), AppError> {
        let mut tx = self.pool.begin().await?;
        let mut payment = Self::lock(&mut tx, id).await?;
        payment.mark_paid(verifier, Utc::now())?;
        let payment = Self::save(&mut tx, &payment).await?;
        let order = Self::cascade(&mut tx, &payment).await?;
        tx.commit().await?;
        tracing::info!(payment_number = %payment.payment_number, verifier = %verifier.id, "payment verified");
        Ok((payment, order))
    }

    pub async fn reject(&self, id: Uuid, verifier: &User, notes: Option<String>) -> Result<(Payment, Order), AppError> {
        let mut tx = self.pool.begin().await?;
        let mut payment = Self::lock(&mut tx, id).await?;
        payment.mark_failed(verifier, notes, Utc::now())?;
        let payment = Self::save(&mut tx, &payment).await?;
        let order = Self::cascade(&mut tx, &payment).await?;
        tx.commit().await?;
        tracing::info!(payment_number = %payment.payment_number, verifier = %verifier.id, "payment rejected");
        Ok((payment, order))
    }

    /// Expires every pending payment whose deadline passed before `now`.
    ///
    /// Orders busy in another transaction are skipped and picked up by the next sweep.
    pub async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Payment>, AppError> {
        let mut tx = self.pool.begin().await?;
        let candidates = sqlx::query_as::<_, (Uuid, Uuid)>(
            r#"
            SELECT order_id, id FROM payments
            WHERE status = 'pending' AND expires_at < $1
            ORDER BY order_id, id
            "#,
        )
        .bind(now)
        .fetch_all(&mut *tx)
        .await?;

        let mut expired = Vec::with_capacity(candidates.len());
        for (order_id, payment_id) in candidates {
            let order_locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM orders WHERE id = $1 FOR UPDATE SKIP LOCKED")
                .bind(order_id)
                .fetch_optional(&mut *tx)
                .await?;
            if order_locked.is_none() {
                continue;
            }

            let payment = sqlx::query_as::<_, Payment>(
                "SELECT * FROM payments WHERE id = $1 AND status = 'pending' FOR UPDATE",
            )
            .bind(payment_id)
            .fetch_optional(&mut *tx)
            .await?;
            let Some(mut payment) = payment.filter(|p| p.is_overdue(now)) else {
                continue;
            };

            payment.mark_expired()?;
            let payment = Self::save(&mut tx, &payment).await?;
            Self::cascade(&mut tx, &payment).await?;
            expired.push(payment);
        }

        tx.commit().await?;
        Ok(expired)
    }
}
