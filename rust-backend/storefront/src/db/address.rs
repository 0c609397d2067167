use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Address, AddressRequest};

#[derive(Clone)]
pub struct AddressRepo {
    pool: PgPool,
}

impl AddressRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<Address>, sqlx::Error> {
        sqlx::query_as::<_, Address>(
            "SELECT * FROM addresses WHERE user_id = $1 ORDER BY is_default DESC, created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn clear_default(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE addresses SET is_default = FALSE, updated_at = NOW() WHERE user_id = $1 AND is_default")
            .bind(user_id)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// The first address of a user is always the default.
    pub async fn create(&self, user_id: Uuid, req: &AddressRequest) -> Result<Address, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let has_any = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM addresses WHERE user_id = $1)")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;
        let is_default = req.is_default || !has_any;
        if is_default {
            Self::clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(
            r#"
            INSERT INTO addresses (id, user_id, label, recipient_name, phone, street, city, province, postal_code, district_id, is_default)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&req.label)
        .bind(&req.recipient_name)
        .bind(&req.phone)
        .bind(&req.street)
        .bind(&req.city)
        .bind(&req.province)
        .bind(&req.postal_code)
        .bind(&req.district_id)
        .bind(is_default)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(address)
    }

    pub async fn update(&self, user_id: Uuid, id: Uuid, req: &AddressRequest) -> Result<Address, AppError> {
        let mut tx = self.pool.begin().await?;
        if req.is_default {
            Self::clear_default(&mut tx, user_id).await?;
        }

        let address = sqlx::query_as::<_, Address>(
            r#"
            UPDATE addresses
            SET label = $3, recipient_name = $4, phone = $5, street = $6, city = $7, province = $8,
                postal_code = $9, district_id = $10, is_default = is_default OR $11, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&req.label)
        .bind(&req.recipient_name)
        .bind(&req.phone)
        .bind(&req.street)
        .bind(&req.city)
        .bind(&req.province)
        .bind(&req.postal_code)
        .bind(&req.district_id)
        .bind(req.is_default)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("address"))?;

        tx.commit().await?;
        Ok(address)
    }

    pub async fn set_default(&self, user_id: Uuid, id: Uuid) -> Result<Address, AppError> {
        let mut tx = self.pool.begin().await?;
        Self::clear_default(&mut tx, user_id).await?;
        let address = sqlx::query_as::<_, Address>(
            "UPDATE addresses SET is_default = TRUE, updated_at = NOW() WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("address"))?;
        tx.commit().await?;
        Ok(address)
    }

    /// Deleting the default address hands the flag to the oldest remaining one.
    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let removed = sqlx::query_as::<_, Address>("DELETE FROM addresses WHERE id = $1 AND user_id = $2 RETURNING *")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("address"))?;

        if removed.is_default {
            sqlx::query(
                r#"
                UPDATE addresses SET is_default = TRUE, updated_at = NOW()
                WHERE id = (SELECT id FROM addresses WHERE user_id = $1 ORDER BY created_at LIMIT 1)
                "#,
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
