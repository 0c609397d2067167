use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Page, Paginated, Subscriber, SubscriberFilter};

#[derive(Clone)]
pub struct SubscriberRepo {
    pool: PgPool,
}

impl SubscriberRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Subscribes `email`, re-activating a previously unsubscribed row.
    pub async fn subscribe(&self, email: &str) -> Result<Subscriber, sqlx::Error> {
        sqlx::query_as::<_, Subscriber>(
            r#"
            INSERT INTO subscribers (id, email)
            VALUES ($1, $2)
            ON CONFLICT (email) DO UPDATE
            SET is_active = TRUE,
                unsubscribed_at = NULL,
                subscribed_at = CASE WHEN subscribers.is_active THEN subscribers.subscribed_at ELSE NOW() END
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn unsubscribe(&self, email: &str) -> Result<Subscriber, AppError> {
        sqlx::query_as::<_, Subscriber>(
            r#"
            UPDATE subscribers
            SET is_active = FALSE, unsubscribed_at = COALESCE(unsubscribed_at, NOW())
            WHERE email = $1
            RETURNING *
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("subscriber"))
    }

    pub async fn list(&self, filter: &SubscriberFilter) -> Result<Paginated<Subscriber>, sqlx::Error> {
        let page = Page::new(filter.page, filter.per_page);
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM subscribers WHERE ($1::boolean IS NULL OR is_active = $1)",
        )
        .bind(filter.active)
        .fetch_one(&self.pool)
        .await?;
        let rows = sqlx::query_as::<_, Subscriber>(
            r#"
            SELECT * FROM subscribers
            WHERE ($1::boolean IS NULL OR is_active = $1)
            ORDER BY subscribed_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(filter.active)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Paginated::new(rows, page, total))
    }
}
