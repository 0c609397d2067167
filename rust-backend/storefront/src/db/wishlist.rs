use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Product;

#[derive(Clone)]
pub struct WishlistRepo {
    pool: PgPool,
}

impl WishlistRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn products(&self, user_id: Uuid) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT p.* FROM wishlists w
            JOIN products p ON p.id = w.product_id
            WHERE w.user_id = $1 AND p.deleted_at IS NULL
            ORDER BY w.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn add(&self, user_id: Uuid, product_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO wishlists (id, user_id, product_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, product_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(product_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns whether a row was removed.
    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM wishlists WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flips membership; returns whether the product is wishlisted afterwards.
    pub async fn toggle(&self, user_id: Uuid, product_id: Uuid) -> Result<bool, sqlx::Error> {
        if self.remove(user_id, product_id).await? {
            return Ok(false);
        }
        self.add(user_id, product_id).await?;
        Ok(true)
    }
}
