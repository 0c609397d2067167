use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{SignUpRequest, User, UserRole};
use crate::numbering::is_unique_violation;

const EMAIL_KEY: &str = "users_email_key";

#[derive(Clone)]
pub struct UserRepo {
    pool: PgPool,
}

impl UserRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Registers a customer; `password_hash` is already argon2-encoded.
    pub async fn create_customer(&self, req: &SignUpRequest, password_hash: &str) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, password, full_name, phone, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.email.trim().to_lowercase())
        .bind(password_hash)
        .bind(req.full_name.trim())
        .bind(&req.phone)
        .bind(UserRole::Customer)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e, EMAIL_KEY) {
                AppError::field("email", "the email has already been taken")
            } else {
                e.into()
            }
        })
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn revoke_token(&self, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO revoked_tokens (token) VALUES ($1) ON CONFLICT (token) DO NOTHING")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn is_revoked(&self, token: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM revoked_tokens WHERE token = $1)")
            .bind(token)
            .fetch_one(&self.pool)
            .await
    }
}
