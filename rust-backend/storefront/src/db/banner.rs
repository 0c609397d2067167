use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{BannerRequest, PromoBanner};

#[derive(Clone)]
pub struct BannerRepo {
    pool: PgPool,
}

impl BannerRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> Result<Vec<PromoBanner>, sqlx::Error> {
        sqlx::query_as::<_, PromoBanner>("SELECT * FROM promo_banners ORDER BY sort_order, created_at")
            .fetch_all(&self.pool)
            .await
    }

    pub async fn active(&self, now: DateTime<Utc>) -> Result<Vec<PromoBanner>, sqlx::Error> {
        let banners = sqlx::query_as::<_, PromoBanner>(
            r#"
            SELECT * FROM promo_banners
            WHERE is_active
              AND (starts_at IS NULL OR starts_at <= $1)
              AND (ends_at IS NULL OR ends_at >= $1)
            ORDER BY sort_order, created_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(banners.into_iter().filter(|b| b.is_active_at(now)).collect())
    }

    pub async fn find(&self, id: Uuid) -> Result<PromoBanner, AppError> {
        sqlx::query_as::<_, PromoBanner>("SELECT * FROM promo_banners WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("banner"))
    }

    pub async fn create(&self, req: &BannerRequest, image_url: &str) -> Result<PromoBanner, sqlx::Error> {
        sqlx::query_as::<_, PromoBanner>(
            r#"
            INSERT INTO promo_banners (id, title, subtitle, image_url, link_url, sort_order, is_active, starts_at, ends_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&req.title)
        .bind(&req.subtitle)
        .bind(image_url)
        .bind(&req.link_url)
        .bind(req.sort_order.unwrap_or(0))
        .bind(req.is_active.unwrap_or(true))
        .bind(req.starts_at)
        .bind(req.ends_at)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn update(&self, id: Uuid, req: &BannerRequest, image_url: Option<&str>) -> Result<PromoBanner, AppError> {
        sqlx::query_as::<_, PromoBanner>(
            r#"
            UPDATE promo_banners
            SET title = $2,
                subtitle = $3,
                image_url = COALESCE($4, image_url),
                link_url = $5,
                sort_order = COALESCE($6, sort_order),
                is_active = COALESCE($7, is_active),
                starts_at = $8,
                ends_at = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.title)
        .bind(&req.subtitle)
        .bind(image_url)
        .bind(&req.link_url)
        .bind(req.sort_order)
        .bind(req.is_active)
        .bind(req.starts_at)
        .bind(req.ends_at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("banner"))
    }

    pub async fn delete(&self, id: Uuid) -> Result<PromoBanner, AppError> {
        sqlx::query_as::<_, PromoBanner>("DELETE FROM promo_banners WHERE id = $1 RETURNING *")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("banner"))
    }
}
