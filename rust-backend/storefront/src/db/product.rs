use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use super::{like_pattern, PgQueryAs};
use crate::error::AppError;
use crate::models::{
    AdminProductFilter, CreateProductRequest, Page, Paginated, PricedProduct, Product, ProductFilter,
    patched, ProductImage, ProductStatus, SaleType, UpdateProductRequest,
};
use crate::slug;

/// Shop listing source. `effective_price` mirrors `Product::final_price` at `$6` so price
/// filters and sorts match what the listing shows.
const SHOP_WHERE: &str = r#"
    FROM (
        SELECT
            products.*,
            CASE
                WHEN sale_type <> 'regular'
                     AND discount_percentage > 0
                     AND (discount_starts_at IS NULL OR discount_starts_at <= $6)
                     AND (discount_ends_at IS NULL OR discount_ends_at >= $6)
                THEN LEAST(price, ROUND(price * (100 - LEAST(discount_percentage, 100)) / 100))
                ELSE price
            END AS effective_price
        FROM products
    ) p
    LEFT JOIN categories c ON c.id = p.category_id
    WHERE p.deleted_at IS NULL
      AND p.status = 'active'
      AND ($1::text IS NULL
           OR c.slug = $1
           OR c.parent_id IN (SELECT id FROM categories WHERE slug = $1 AND deleted_at IS NULL))
      AND ($2::text IS NULL OR p.name ILIKE $2 OR p.sku ILIKE $2 OR p.description ILIKE $2)
      AND ($3::numeric IS NULL OR p.effective_price >= $3)
      AND ($4::numeric IS NULL OR p.effective_price <= $4)
      AND ($5::boolean IS NOT TRUE OR (
            p.sale_type <> 'regular'
            AND p.discount_percentage > 0
            AND (p.discount_starts_at IS NULL OR p.discount_starts_at <= $6)
            AND (p.discount_ends_at IS NULL OR p.discount_ends_at >= $6)))
"#;

const ADMIN_WHERE: &str = r#"
    FROM products p
    WHERE (CASE WHEN $1 THEN p.deleted_at IS NOT NULL ELSE p.deleted_at IS NULL END)
      AND ($2::text IS NULL OR p.name ILIKE $2 OR p.sku ILIKE $2)
      AND ($3::product_status IS NULL OR p.status = $3)
      AND ($4::uuid IS NULL OR p.category_id = $4)
"#;

struct ShopArgs {
    category: Option<String>,
    search: Option<String>,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    on_sale: bool,
    now: DateTime<Utc>,
}

impl ShopArgs {
    fn new(filter: &ProductFilter, now: DateTime<Utc>) -> Self {
        Self {
            category: filter.category.clone().filter(|c| !c.is_empty()),
            search: like_pattern(filter.q.as_deref()),
            min_price: filter.min_price,
            max_price: filter.max_price,
            on_sale: filter.on_sale.unwrap_or(false),
            now,
        }
    }

    fn bind<'q, O>(&self, query: PgQueryAs<'q, O>) -> PgQueryAs<'q, O> {
        query
            .bind(self.category.clone())
            .bind(self.search.clone())
            .bind(self.min_price)
            .bind(self.max_price)
            .bind(self.on_sale)
            .bind(self.now)
    }
}

#[derive(Clone)]
pub struct ProductRepo {
    pool: PgPool,
}

impl ProductRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn slug_taken(&self, slug: String, except: Option<Uuid>) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM products WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(except)
        .fetch_one(&self.pool)
        .await
    }

    async fn unique_slug(&self, name: &str, except: Option<Uuid>) -> Result<String, sqlx::Error> {
        slug::unique_slug(name, |candidate| self.slug_taken(candidate, except)).await
    }

    async fn sku_taken(&self, sku: &str, except: Option<Uuid>) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM products WHERE sku = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(sku)
        .bind(except)
        .fetch_one(&self.pool)
        .await
    }

    async fn ensure_category(&self, category_id: Option<Uuid>) -> Result<(), AppError> {
        let Some(category_id) = category_id else {
            return Ok(());
        };
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM categories WHERE id = $1 AND deleted_at IS NULL)",
        )
        .bind(category_id)
        .fetch_one(&self.pool)
        .await?;
        if !exists {
            return Err(AppError::field("category_id", "the selected category does not exist"));
        }
        Ok(())
    }

    pub async fn list_shop(
        &self,
        filter: &ProductFilter,
        now: DateTime<Utc>,
    ) -> Result<Paginated<PricedProduct>, sqlx::Error> {
        let page = Page::new(filter.page, filter.per_page);
        let args = ShopArgs::new(filter, now);

        let count_sql = format!("SELECT COUNT(*) {}", SHOP_WHERE);
        let (total,) = args
            .bind(sqlx::query_as::<_, (i64,)>(&count_sql))
            .fetch_one(&self.pool)
            .await?;

        let list_sql = format!(
            "SELECT p.* {} ORDER BY {} LIMIT $7 OFFSET $8",
            SHOP_WHERE,
            filter.sort.order_by()
        );
        let rows = args
            .bind(sqlx::query_as::<_, Product>(&list_sql))
            .bind(page.per_page)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(rows, page, total).map(|p| p.priced(now)))
    }

    pub async fn find_shop_by_slug(&self, slug: &str) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE slug = $1 AND status = 'active' AND deleted_at IS NULL",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("product"))
    }

    /// Active, non-deleted product a shopper may put in a cart.
    pub async fn find_active(&self, id: Uuid) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = $1 AND status = 'active' AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("product"))
    }

    /// Any product, trashed ones included.
    pub async fn find(&self, id: Uuid) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("product"))
    }

    pub async fn related(&self, product: &Product, limit: i64) -> Result<Vec<Product>, sqlx::Error> {
        let Some(category_id) = product.category_id else {
            return Ok(Vec::new());
        };
        sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE category_id = $1 AND id <> $2
              AND status = 'active' AND deleted_at IS NULL
            ORDER BY is_featured DESC, created_at DESC
            LIMIT $3
            "#,
        )
        .bind(category_id)
        .bind(product.id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn featured(&self, limit: i64) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE is_featured AND status = 'active' AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn on_sale(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE status = 'active' AND deleted_at IS NULL
              AND sale_type <> 'regular'
              AND discount_percentage > 0
              AND (discount_starts_at IS NULL OR discount_starts_at <= $1)
              AND (discount_ends_at IS NULL OR discount_ends_at >= $1)
            ORDER BY discount_percentage DESC, created_at DESC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn newest(&self, limit: i64) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as::<_, Product>(
            r#"
            SELECT * FROM products
            WHERE status = 'active' AND deleted_at IS NULL
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn list_admin(&self, filter: &AdminProductFilter) -> Result<Paginated<Product>, sqlx::Error> {
        let page = Page::new(filter.page, filter.per_page);
        let search = like_pattern(filter.q.as_deref());

        let count_sql = format!("SELECT COUNT(*) {}", ADMIN_WHERE);
        let (total,) = sqlx::query_as::<_, (i64,)>(&count_sql)
            .bind(filter.trashed)
            .bind(search.clone())
            .bind(filter.status)
            .bind(filter.category_id)
            .fetch_one(&self.pool)
            .await?;

        let list_sql = format!(
            "SELECT p.* {} ORDER BY p.created_at DESC LIMIT $5 OFFSET $6",
            ADMIN_WHERE
        );
        let rows = sqlx::query_as::<_, Product>(&list_sql)
            .bind(filter.trashed)
            .bind(search)
            .bind(filter.status)
            .bind(filter.category_id)
            .bind(page.per_page)
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Paginated::new(rows, page, total))
    }

    pub async fn create(&self, req: &CreateProductRequest) -> Result<Product, AppError> {
        if self.sku_taken(&req.sku, None).await? {
            return Err(AppError::field("sku", "the sku has already been taken"));
        }
        self.ensure_category(req.category_id).await?;
        let slug = self.unique_slug(&req.name, None).await?;

        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (
                id, category_id, sku, name, slug, description, material, dimensions,
                weight_grams, price, discount_percentage, discount_starts_at, discount_ends_at,
                sale_type, stock_quantity, track_stock, allow_backorder, status, is_featured
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(req.category_id)
        .bind(req.sku.trim())
        .bind(req.name.trim())
        .bind(&slug)
        .bind(&req.description)
        .bind(&req.material)
        .bind(&req.dimensions)
        .bind(req.weight_grams.unwrap_or(0))
        .bind(req.price)
        .bind(req.discount_percentage.unwrap_or(Decimal::ZERO))
        .bind(req.discount_starts_at)
        .bind(req.discount_ends_at)
        .bind(req.sale_type.unwrap_or(SaleType::Regular))
        .bind(req.stock_quantity.unwrap_or(0))
        .bind(req.track_stock.unwrap_or(true))
        .bind(req.allow_backorder.unwrap_or(false))
        .bind(req.status.unwrap_or(ProductStatus::Draft))
        .bind(req.is_featured.unwrap_or(false))
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(product_id = %product.id, slug = %product.slug, "product created");
        Ok(product)
    }

    pub async fn update(&self, id: Uuid, req: &UpdateProductRequest) -> Result<Product, AppError> {
        let current = self.find(id).await?;
        if current.deleted_at.is_some() {
            return Err(AppError::NotFound("product"));
        }
        req.check_pricing(&current)?;

        if let Some(sku) = req.sku.as_deref() {
            if sku != current.sku && self.sku_taken(sku, Some(id)).await? {
                return Err(AppError::field("sku", "the sku has already been taken"));
            }
        }
        let category_id = patched(&req.category_id, &current.category_id);
        if req.category_id.is_some() {
            self.ensure_category(category_id).await?;
        }
        let (discount_starts_at, discount_ends_at) = req.discount_window(&current);

        let slug = match req.name.as_deref().map(str::trim) {
            Some(name) if name != current.name => Some(self.unique_slug(name, Some(id)).await?),
            _ => None,
        };

        let product = sqlx::query_as::<_, Product>(
            r#"
            UPDATE products
            SET
                category_id = $2,
                sku = COALESCE($3, sku),
                name = COALESCE($4, name),
                slug = COALESCE($5, slug),
                description = $6,
                material = $7,
                dimensions = $8,
                weight_grams = COALESCE($9, weight_grams),
                price = COALESCE($10, price),
                discount_percentage = COALESCE($11, discount_percentage),
                discount_starts_at = $12,
                discount_ends_at = $13,
                sale_type = COALESCE($14, sale_type),
                track_stock = COALESCE($15, track_stock),
                allow_backorder = COALESCE($16, allow_backorder),
                status = COALESCE($17, status),
                is_featured = COALESCE($18, is_featured),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(category_id)
        .bind(req.sku.as_deref().map(str::trim))
        .bind(req.name.as_deref().map(str::trim))
        .bind(slug)
        .bind(patched(&req.description, &current.description))
        .bind(patched(&req.material, &current.material))
        .bind(patched(&req.dimensions, &current.dimensions))
        .bind(req.weight_grams)
        .bind(req.price)
        .bind(req.discount_percentage)
        .bind(discount_starts_at)
        .bind(discount_ends_at)
        .bind(req.sale_type)
        .bind(req.track_stock)
        .bind(req.allow_backorder)
        .bind(req.status)
        .bind(req.is_featured)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            "UPDATE products SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("product"))
    }

    pub async fn restore(&self, id: Uuid) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            "UPDATE products SET deleted_at = NULL, updated_at = NOW() WHERE id = $1 AND deleted_at IS NOT NULL RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("trashed product"))
    }

    pub async fn set_status(&self, id: Uuid, status: ProductStatus) -> Result<Product, AppError> {
        sqlx::query_as::<_, Product>(
            "UPDATE products SET status = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AppError::NotFound("product"))
    }

    /// Applies a signed stock change through the add/reduce rules.
    pub async fn adjust_stock(&self, id: Uuid, change: i32) -> Result<Product, AppError> {
        let mut tx = self.pool.begin().await?;

        let mut product = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("product"))?;

        let applied = if change >= 0 {
            product.add_stock(change)
        } else {
            let quantity = change
                .checked_neg()
                .ok_or_else(|| AppError::field("change", "stock change is out of range"))?;
            product.reduce_stock(quantity)
        };
        if !applied {
            return Err(if !product.track_stock {
                AppError::invalid_state(format!("stock is not tracked for {}", product.name))
            } else if change >= 0 {
                AppError::field("change", "stock change is out of range")
            } else {
                AppError::field(
                    "change",
                    format!("only {} of {} in stock", product.stock_quantity, product.name),
                )
            });
        }

        let product = sqlx::query_as::<_, Product>(
            "UPDATE products SET stock_quantity = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(product.stock_quantity)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(product_id = %id, change, stock = product.stock_quantity, "stock adjusted");
        Ok(product)
    }

    pub async fn images(&self, product_id: Uuid) -> Result<Vec<ProductImage>, sqlx::Error> {
        sqlx::query_as::<_, ProductImage>(
            r#"
            SELECT * FROM product_images
            WHERE product_id = $1
            ORDER BY is_primary DESC, sort_order, created_at
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await
    }

    /// The first image of a product becomes primary regardless of `is_primary`.
    pub async fn add_image(
        &self,
        product_id: Uuid,
        url: &str,
        is_primary: bool,
    ) -> Result<ProductImage, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let (count, next_sort): (i64, i32) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(MAX(sort_order) + 1, 0) FROM product_images WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_one(&mut *tx)
        .await?;

        let primary = is_primary || count == 0;
        if primary {
            sqlx::query("UPDATE product_images SET is_primary = FALSE WHERE product_id = $1")
                .bind(product_id)
                .execute(&mut *tx)
                .await?;
        }

        let image = sqlx::query_as::<_, ProductImage>(
            r#"
            INSERT INTO product_images (id, product_id, url, sort_order, is_primary)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(url)
        .bind(next_sort)
        .bind(primary)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(image)
    }

    /// Deletes the image row and hands it back so the file can be removed too.
    pub async fn remove_image(&self, product_id: Uuid, image_id: Uuid) -> Result<ProductImage, AppError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query_as::<_, ProductImage>(
            "DELETE FROM product_images WHERE id = $1 AND product_id = $2 RETURNING *",
        )
        .bind(image_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("image"))?;

        if removed.is_primary {
            sqlx::query(
                r#"
                UPDATE product_images SET is_primary = TRUE
                WHERE id = (
                    SELECT id FROM product_images
                    WHERE product_id = $1
                    ORDER BY sort_order, created_at
                    LIMIT 1
                )
                "#,
            )
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(removed)
    }

    pub async fn set_primary_image(&self, product_id: Uuid, image_id: Uuid) -> Result<ProductImage, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE product_images SET is_primary = FALSE WHERE product_id = $1")
            .bind(product_id)
            .execute(&mut *tx)
            .await?;

        let image = sqlx::query_as::<_, ProductImage>(
            "UPDATE product_images SET is_primary = TRUE WHERE id = $1 AND product_id = $2 RETURNING *",
        )
        .bind(image_id)
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AppError::NotFound("image"))?;

        tx.commit().await?;
        Ok(image)
    }
}
