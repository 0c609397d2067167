use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{merge_items, Cart, CartItem, CartLine, CartOwner, CartView, MergeStep, Product};

#[derive(Clone)]
pub struct CartRepo {
    pool: PgPool,
}

impl CartRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, owner: &CartOwner) -> Result<Option<Cart>, sqlx::Error> {
        match owner {
            CartOwner::User(user_id) => {
                sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE user_id = $1")
                    .bind(user_id)
                    .fetch_optional(&self.pool)
                    .await
            }
            CartOwner::Session(session_id) => {
                sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE session_id = $1")
                    .bind(session_id)
                    .fetch_optional(&self.pool)
                    .await
            }
        }
    }

    async fn get_or_create(tx: &mut Transaction<'_, Postgres>, owner: &CartOwner) -> Result<Cart, sqlx::Error> {
        let (user_id, session_id) = match owner {
            CartOwner::User(id) => (Some(*id), None),
            CartOwner::Session(sid) => (None, Some(sid.as_str())),
        };
        let conflict = match owner {
            CartOwner::User(_) => "user_id",
            CartOwner::Session(_) => "session_id",
        };
        let sql = format!(
            r#"
            INSERT INTO carts (id, user_id, session_id)
            VALUES ($1, $2, $3)
            ON CONFLICT ({}) DO UPDATE SET updated_at = NOW()
            RETURNING *
            "#,
            conflict
        );
        sqlx::query_as::<_, Cart>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(session_id)
            .fetch_one(&mut **tx)
            .await
    }

    pub async fn lines(&self, cart_id: Uuid) -> Result<Vec<CartLine>, sqlx::Error> {
        sqlx::query_as::<_, CartLine>(
            r#"
            SELECT
                ci.*,
                p.name AS product_name,
                p.slug AS product_slug,
                p.sku AS product_sku,
                p.weight_grams,
                (SELECT pi.url FROM product_images pi
                 WHERE pi.product_id = p.id
                 ORDER BY pi.is_primary DESC, pi.sort_order
                 LIMIT 1) AS image_url
            FROM cart_items ci
            JOIN products p ON p.id = ci.product_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at
            "#,
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn view(&self, owner: &CartOwner) -> Result<CartView, sqlx::Error> {
        match self.find(owner).await? {
            Some(cart) => {
                let lines = self.lines(cart.id).await?;
                Ok(CartView::new(&cart, lines))
            }
            None => Ok(CartView::empty()),
        }
    }

    async fn lock_product(tx: &mut Transaction<'_, Postgres>, product_id: Uuid) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::NotFound("product"))
    }

    fn ensure_purchasable(product: &Product, quantity: i32) -> Result<(), AppError> {
        if product.can_purchase(quantity) {
            return Ok(());
        }
        Err(if product.is_active() {
            AppError::field(
                "quantity",
                format!("only {} of {} left in stock", product.stock_quantity, product.name),
            )
        } else {
            AppError::field("product_id", format!("{} is not available", product.name))
        })
    }

    /// Adds `quantity` of a product, folding into an existing line with the same options.
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        product_id: Uuid,
        quantity: i32,
        options: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<CartItem, AppError> {
        let mut tx = self.pool.begin().await?;
        let cart = Self::get_or_create(&mut tx, owner).await?;
        let product = Self::lock_product(&mut tx, product_id).await?;

        let existing = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE cart_id = $1 AND product_id = $2 AND options = $3 FOR UPDATE",
        )
        .bind(cart.id)
        .bind(product_id)
        .bind(&options)
        .fetch_optional(&mut *tx)
        .await?;

        let wanted = existing.as_ref().map_or(0, |item| item.quantity) + quantity;
        Self::ensure_purchasable(&product, wanted)?;
        let unit_price = product.final_price(now);

        let item = match existing {
            Some(item) => {
                sqlx::query_as::<_, CartItem>(
                    r#"
                    UPDATE cart_items
                    SET quantity = $2, unit_price = $3, updated_at = NOW()
                    WHERE id = $1
                    RETURNING *
                    "#,
                )
                .bind(item.id)
                .bind(wanted)
                .bind(unit_price)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, CartItem>(
                    r#"
                    INSERT INTO cart_items (id, cart_id, product_id, quantity, unit_price, options)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(cart.id)
                .bind(product_id)
                .bind(wanted)
                .bind(unit_price)
                .bind(&options)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;
        Ok(item)
    }

    async fn owned_item(
        tx: &mut Transaction<'_, Postgres>,
        owner: &CartOwner,
        item_id: Uuid,
    ) -> Result<CartItem, AppError> {
        let (user_id, session_id) = match owner {
            CartOwner::User(id) => (Some(*id), None),
            CartOwner::Session(sid) => (None, Some(sid.as_str())),
        };
        sqlx::query_as::<_, CartItem>(
            r#"
            SELECT ci.* FROM cart_items ci
            JOIN carts c ON c.id = ci.cart_id
            WHERE ci.id = $1
              AND (($2::uuid IS NOT NULL AND c.user_id = $2)
                OR ($3::text IS NOT NULL AND c.session_id = $3))
            FOR UPDATE OF ci
            "#,
        )
        .bind(item_id)
        .bind(user_id)
        .bind(session_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(AppError::NotFound("cart item"))
    }

    /// Sets a line's quantity; zero removes the line. Returns `None` when removed.
    pub async fn update_item(
        &self,
        owner: &CartOwner,
        item_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItem>, AppError> {
        let mut tx = self.pool.begin().await?;
        let item = Self::owned_item(&mut tx, owner, item_id).await?;

        if quantity == 0 {
            sqlx::query("DELETE FROM cart_items WHERE id = $1")
                .bind(item.id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            return Ok(None);
        }

        let product = Self::lock_product(&mut tx, item.product_id).await?;
        Self::ensure_purchasable(&product, quantity)?;

        let item = sqlx::query_as::<_, CartItem>(
            "UPDATE cart_items SET quantity = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(item.id)
        .bind(quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(item))
    }

    pub async fn remove_item(&self, owner: &CartOwner, item_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        let item = Self::owned_item(&mut tx, owner, item_id).await?;
        sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(item.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn clear(&self, owner: &CartOwner) -> Result<(), sqlx::Error> {
        if let Some(cart) = self.find(owner).await? {
            sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
                .bind(cart.id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    /// Folds the guest cart of `session_id` into the user's cart and drops the guest cart.
    ///
    /// A user without a cart simply takes over the guest cart.
    pub async fn merge_guest(&self, session_id: &str, user_id: Uuid) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let guest = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE session_id = $1 FOR UPDATE")
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(guest) = guest else {
            return Ok(());
        };

        let user_cart = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(user_cart) = user_cart else {
            sqlx::query("UPDATE carts SET user_id = $2, session_id = NULL, updated_at = NOW() WHERE id = $1")
                .bind(guest.id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            tracing::debug!(cart_id = %guest.id, %user_id, "guest cart adopted");
            return Ok(());
        };

        let mut target = Self::items(&mut tx, user_cart.id).await?;
        let guest_items = Self::items(&mut tx, guest.id).await?;
        let steps = merge_items(user_cart.id, &mut target, guest_items);

        for step in &steps {
            match step {
                MergeStep::Increment { item_id, by } => {
                    sqlx::query("UPDATE cart_items SET quantity = quantity + $2, updated_at = NOW() WHERE id = $1")
                        .bind(item_id)
                        .bind(by)
                        .execute(&mut *tx)
                        .await?;
                }
                MergeStep::Move { item_id } => {
                    sqlx::query("UPDATE cart_items SET cart_id = $2, updated_at = NOW() WHERE id = $1")
                        .bind(item_id)
                        .bind(user_cart.id)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(guest.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::debug!(cart_id = %user_cart.id, merged = steps.len(), "guest cart merged");
        Ok(())
    }

    async fn items(tx: &mut Transaction<'_, Postgres>, cart_id: Uuid) -> Result<Vec<CartItem>, sqlx::Error> {
        sqlx::query_as::<_, CartItem>("SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY created_at")
            .bind(cart_id)
            .fetch_all(&mut **tx)
            .await
    }
}
