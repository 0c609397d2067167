use chrono::Utc;
use serde_json::json;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Order, Page, Paginated, Product, ProductReview, RatingSummary, ReviewFilter, ReviewState, ReviewWithAuthor,
    SubmitReviewRequest, User, REVIEW_SUBMITTED,
};
use crate::numbering::is_unique_violation;

const REVIEW_UNIQUE_KEY: &str = "product_reviews_user_id_product_id_order_id_key";

const WITH_AUTHOR: &str = r#"
    SELECT r.*, u.full_name AS author_name, p.name AS product_name
    FROM product_reviews r
    JOIN users u ON u.id = r.user_id
    JOIN products p ON p.id = r.product_id
"#;

#[derive(Clone)]
pub struct ReviewRepo {
    pool: PgPool,
}

impl ReviewRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn approved_for_product(&self, product_id: Uuid, limit: i64) -> Result<Vec<ReviewWithAuthor>, sqlx::Error> {
        let sql = format!(
            "{} WHERE r.product_id = $1 AND r.is_approved ORDER BY r.created_at DESC LIMIT $2",
            WITH_AUTHOR
        );
        sqlx::query_as::<_, ReviewWithAuthor>(&sql)
            .bind(product_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn list(&self, filter: &ReviewFilter) -> Result<Paginated<ReviewWithAuthor>, sqlx::Error> {
        let page = Page::new(filter.page, filter.per_page);
        let approved = filter.state.map(|s| s == ReviewState::Approved);

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM product_reviews r
            WHERE ($1::boolean IS NULL OR r.is_approved = $1)
              AND ($2::uuid IS NULL OR r.product_id = $2)
            "#,
        )
        .bind(approved)
        .bind(filter.product_id)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            r#"{}
            WHERE ($1::boolean IS NULL OR r.is_approved = $1)
              AND ($2::uuid IS NULL OR r.product_id = $2)
            ORDER BY r.created_at DESC
            LIMIT $3 OFFSET $4"#,
            WITH_AUTHOR
        );
        let rows = sqlx::query_as::<_, ReviewWithAuthor>(&sql)
            .bind(approved)
            .bind(filter.product_id)
            .bind(page.per_page)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(rows, page, total))
    }

    /// Finds the fulfilled order of `user` that the review is about.
    async fn purchase(
        tx: &mut Transaction<'_, Postgres>,
        user: &User,
        product: &Product,
        order_id: Option<Uuid>,
    ) -> Result<Order, AppError> {
        let not_purchased = || AppError::field("order_id", "you can only review products you have received");

        match order_id {
            Some(order_id) => {
                let order = sqlx::query_as::<_, Order>(
                    r#"
                    SELECT o.* FROM orders o
                    WHERE o.id = $1 AND o.user_id = $2
                      AND EXISTS (SELECT 1 FROM order_items oi WHERE oi.order_id = o.id AND oi.product_id = $3)
                    "#,
                )
                .bind(order_id)
                .bind(user.id)
                .bind(product.id)
                .fetch_optional(&mut **tx)
                .await?
                .ok_or_else(not_purchased)?;
                if !order.status.is_fulfilled() {
                    return Err(not_purchased());
                }
                Ok(order)
            }
            None => sqlx::query_as::<_, Order>(
                r#"
                SELECT o.* FROM orders o
                WHERE o.user_id = $1
                  AND o.status IN ('delivered', 'completed')
                  AND EXISTS (SELECT 1 FROM order_items oi WHERE oi.order_id = o.id AND oi.product_id = $2)
                  AND NOT EXISTS (
                      SELECT 1 FROM product_reviews r
                      WHERE r.order_id = o.id AND r.product_id = $2 AND r.user_id = $1
                  )
                ORDER BY o.created_at DESC
                LIMIT 1
                "#,
            )
            .bind(user.id)
            .bind(product.id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(not_purchased),
        }
    }

    /// Stores an unapproved review and notifies every active admin.
    pub async fn submit(
        &self,
        user: &User,
        product: &Product,
        req: &SubmitReviewRequest,
    ) -> Result<ProductReview, AppError> {
        let mut tx = self.pool.begin().await?;
        let order = Self::purchase(&mut tx, user, product, req.order_id).await?;

        let review = sqlx::query_as::<_, ProductReview>(
            r#"
            INSERT INTO product_reviews (id, user_id, product_id, order_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.id)
        .bind(product.id)
        .bind(order.id)
        .bind(req.rating)
        .bind(req.comment.as_deref().map(str::trim).filter(|c| !c.is_empty()))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, REVIEW_UNIQUE_KEY) {
                AppError::field("product_id", "you have already reviewed this product for that order")
            } else {
                e.into()
            }
        })?;

        let admins = sqlx::query_scalar::<_, Uuid>("SELECT id FROM users WHERE role = 'admin' AND is_active")
            .fetch_all(&mut *tx)
            .await?;
        let data = json!({
            "review_id": review.id,
            "product_id": product.id,
            "product_name": product.name,
            "order_number": order.order_number,
            "author": user.full_name,
            "rating": review.rating,
        });
        for admin_id in &admins {
            sqlx::query("INSERT INTO notifications (id, user_id, kind, data) VALUES ($1, $2, $3, $4)")
                .bind(Uuid::new_v4())
                .bind(admin_id)
                .bind(REVIEW_SUBMITTED)
                .bind(&data)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        tracing::info!(review_id = %review.id, product_id = %product.id, notified = admins.len(), "review submitted");
        Ok(review)
    }

    /// Recomputes rating aggregates from the approved reviews only.
    async fn recompute(tx: &mut Transaction<'_, Postgres>, product_id: Uuid) -> Result<RatingSummary, sqlx::Error> {
        let ratings = sqlx::query_scalar::<_, i16>(
            "SELECT rating FROM product_reviews WHERE product_id = $1 AND is_approved",
        )
        .bind(product_id)
        .fetch_all(&mut **tx)
        .await?;
        let summary = RatingSummary::from_ratings(&ratings);

        sqlx::query("UPDATE products SET average_rating = $2, review_count = $3, updated_at = NOW() WHERE id = $1")
            .bind(product_id)
            .bind(summary.average_rating)
            .bind(summary.review_count)
            .execute(&mut **tx)
            .await?;
        Ok(summary)
    }

    pub async fn approve(&self, id: Uuid) -> Result<ProductReview, AppError> {
        let mut tx = self.pool.begin().await?;
        let review = sqlx::query_as::<_, ProductReview>(
            r#"
            UPDATE product_reviews
            SET is_approved = TRUE, approved_at = COALESCE(approved_at, $2), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("review"))?;

        let summary = Self::recompute(&mut tx, review.product_id).await?;
        tx.commit().await?;
        tracing::info!(
            review_id = %review.id,
            average_rating = %summary.average_rating,
            review_count = summary.review_count,
            "review approved"
        );
        Ok(review)
    }

    /// Deletes the review and recomputes the product's aggregates.
    pub async fn reject(&self, id: Uuid) -> Result<ProductReview, AppError> {
        let mut tx = self.pool.begin().await?;
        let review = sqlx::query_as::<_, ProductReview>("DELETE FROM product_reviews WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("review"))?;

        Self::recompute(&mut tx, review.product_id).await?;
        tx.commit().await?;
        tracing::info!(review_id = %review.id, "review rejected");
        Ok(review)
    }
}
