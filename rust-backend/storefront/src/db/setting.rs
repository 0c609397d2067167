use sqlx::PgPool;

use crate::models::{group_map, Setting, SettingGroup};

#[derive(Clone)]
pub struct SettingRepo {
    pool: PgPool,
}

impl SettingRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str, default: &str) -> Result<String, sqlx::Error> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.unwrap_or_else(|| default.to_string()))
    }

    pub async fn set(&self, key: &str, value: &str, group: &str) -> Result<Setting, sqlx::Error> {
        sqlx::query_as::<_, Setting>(
            r#"
            INSERT INTO settings (key, value, setting_group)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, setting_group = EXCLUDED.setting_group, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(group)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn group(&self, name: &str) -> Result<SettingGroup, sqlx::Error> {
        let settings = sqlx::query_as::<_, Setting>("SELECT * FROM settings WHERE setting_group = $1 ORDER BY key")
            .bind(name)
            .fetch_all(&self.pool)
            .await?;
        Ok(group_map(settings))
    }

    pub async fn set_many(&self, group: &str, values: &SettingGroup) -> Result<SettingGroup, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in values {
            sqlx::query(
                r#"
                INSERT INTO settings (key, value, setting_group)
                VALUES ($1, $2, $3)
                ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value, setting_group = EXCLUDED.setting_group, updated_at = NOW()
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(group)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        self.group(group).await
    }
}
