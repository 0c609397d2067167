use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{build_tree, creates_cycle, Category, CategoryNode, CreateCategoryRequest, UpdateCategoryRequest};
use crate::slug;

#[derive(Clone)]
pub struct CategoryRepo {
    pool: PgPool,
}

impl CategoryRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn slug_taken(&self, slug: String, except: Option<Uuid>) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(except)
        .fetch_one(&self.pool)
        .await
    }

    async fn unique_slug(&self, name: &str, except: Option<Uuid>) -> Result<String, sqlx::Error> {
        slug::unique_slug(name, |candidate| self.slug_taken(candidate, except)).await
    }

    async fn parent_map(&self) -> Result<HashMap<Uuid, Option<Uuid>>, sqlx::Error> {
        let rows = sqlx::query_as::<_, (Uuid, Option<Uuid>)>("SELECT id, parent_id FROM categories")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().collect())
    }

    async fn ensure_parent(&self, parent_id: Uuid) -> Result<(), AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(parent_id)
        .fetch_one(&self.pool)
        .await?;
        if !exists {
            return Err(AppError::field("parent_id", "the selected parent category does not exist"));
        }
        Ok(())
    }

    pub async fn active_tree(&self) -> Result<Vec<CategoryNode>, sqlx::Error> {
        let categories = sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE is_active AND deleted_at IS NULL",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(build_tree(categories))
    }

    pub async fn featured(&self, limit: i64) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT * FROM categories
            WHERE is_featured AND is_active AND deleted_at IS NULL
            ORDER BY sort_order, name
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn find_active_by_slug(&self, slug: &str) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>(
            "SELECT * FROM categories WHERE slug = $1 AND is_active AND deleted_at IS NULL",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("category"))
    }

    pub async fn find(&self, id: Uuid) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("category"))
    }

    pub async fn find_optional(&self, id: Uuid) -> Result<Option<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>("SELECT * FROM categories WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn active_children(&self, parent_id: Uuid) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT * FROM categories
            WHERE parent_id = $1 AND is_active AND deleted_at IS NULL
            ORDER BY sort_order, name
            "#,
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn list_admin(&self, trashed: bool) -> Result<Vec<Category>, sqlx::Error> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT * FROM categories
            WHERE (CASE WHEN $1 THEN deleted_at IS NOT NULL ELSE deleted_at IS NULL END)
            ORDER BY sort_order, name
            "#,
        )
        .bind(trashed)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn create(&self, req: &CreateCategoryRequest, image_url: Option<String>) -> Result<Category, AppError> {
        if let Some(parent_id) = req.parent_id {
            self.ensure_parent(parent_id).await?;
        }
        let slug = self.unique_slug(&req.name, None).await?;

        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (id, parent_id, name, slug, description, image_url, sort_order, is_active, is_featured)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.parent_id)
        .bind(req.name.trim())
        .bind(&slug)
        .bind(&req.description)
        .bind(image_url.or_else(|| req.image_url.clone()))
        .bind(req.sort_order.unwrap_or(0))
        .bind(req.is_active.unwrap_or(true))
        .bind(req.is_featured.unwrap_or(false))
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    pub async fn update(
        &self,
        id: Uuid,
        req: &UpdateCategoryRequest,
        image_url: Option<String>,
    ) -> Result<Category, AppError> {
        let current = self.find(id).await?;
        if current.deleted_at.is_some() {
            return Err(AppError::NotFound("category"));
        }

        let parent_id = match req.parent_id {
            Some(Some(parent_id)) => {
                self.ensure_parent(parent_id).await?;
                if creates_cycle(id, parent_id, &self.parent_map().await?) {
                    return Err(AppError::field(
                        "parent_id",
                        "a category cannot be nested under itself or one of its descendants",
                    ));
                }
                Some(parent_id)
            }
            Some(None) => None,
            None => current.parent_id,
        };

        let slug = match req.name.as_deref().map(str::trim) {
            Some(name) if name != current.name => self.unique_slug(name, Some(id)).await?,
            _ => current.slug.clone(),
        };

        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET
                parent_id = $2,
                name = COALESCE($3, name),
                slug = $4,
                description = COALESCE($5, description),
                image_url = COALESCE($6, image_url),
                sort_order = COALESCE($7, sort_order),
                is_active = COALESCE($8, is_active),
                is_featured = COALESCE($9, is_featured),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(parent_id)
        .bind(req.name.as_deref().map(str::trim))
        .bind(&slug)
        .bind(req.description.as_ref())
        .bind(image_url.or_else(|| req.image_url.clone()))
        .bind(req.sort_order)
        .bind(req.is_active)
        .bind(req.is_featured)
        .fetch_one(&self.pool)
        .await?;

        Ok(category)
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("category"))
    }

    pub async fn restore(&self, id: Uuid) -> Result<Category, AppError> {
        sqlx::query_as::<_, Category>(
            "UPDATE categories SET deleted_at = NULL, updated_at = NOW() WHERE id = $1 AND deleted_at IS NOT NULL RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("trashed category"))
    }
}
