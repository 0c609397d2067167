use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{Acquire, PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

use super::like_pattern;
use crate::error::AppError;
use crate::models::{
    freeze_items, restock_quantities, Address, Cart, CartItem, CheckoutRequest, Order, OrderDetail, OrderFilter, OrderItem,
    OrderPaymentStatus, OrderStatus, Page, Paginated, Payment, PaymentStatus, Product, ShippingAddressInput,
    User,
};
use crate::numbering::{self, is_unique_violation, MAX_NUMBER_ATTEMPTS};

const ORDER_NUMBER_KEY: &str = "orders_order_number_key";
const PAYMENT_NUMBER_KEY: &str = "payments_payment_number_key";

/// Admin-driven lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAction {
    Confirm,
    Process,
    Ship { tracking_number: String },
    Deliver,
    Complete,
}

impl OrderAction {
    fn apply(self, order: &mut Order) -> Result<(), AppError> {
        let now = Utc::now();
        match self {
            OrderAction::Confirm => order.confirm(now),
            OrderAction::Process => order.start_processing(),
            OrderAction::Ship { tracking_number } => order.ship(tracking_number, now),
            OrderAction::Deliver => order.deliver(now),
            OrderAction::Complete => order.complete(now),
        }
    }
}

#[derive(Clone)]
pub struct OrderRepo {
    pool: PgPool,
}

impl OrderRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Turns the user's cart into an order with a pending payment, all in one transaction.
    pub async fn place_order(
        &self,
        user: &User,
        req: &CheckoutRequest,
        payment_expiry_hours: i64,
    ) -> Result<OrderDetail, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let address: ShippingAddressInput = match (req.address_id, &req.shipping_address) {
            (Some(address_id), _) => sqlx::query_as::<_, Address>(
                "SELECT * FROM addresses WHERE id = $1 AND user_id = $2",
            )
            .bind(address_id)
            .bind(user.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(AppError::NotFound("address"))?
            .into(),
            (None, Some(inline)) => inline.clone(),
            (None, None) => return Err(AppError::field("shipping_address", "a shipping address is required")),
        };

        let cart = sqlx::query_as::<_, Cart>("SELECT * FROM carts WHERE user_id = $1 FOR UPDATE")
            .bind(user.id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::field("cart", "your cart is empty"))?;

        let cart_items = sqlx::query_as::<_, CartItem>(
            "SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY created_at",
        )
        .bind(cart.id)
        .fetch_all(&mut *tx)
        .await?;

        // Rows are locked in id order so concurrent checkouts and cancels cannot deadlock.
        let mut product_ids: Vec<Uuid> = cart_items.iter().map(|item| item.product_id).collect();
        product_ids.sort();
        product_ids.dedup();
        let products: HashMap<Uuid, Product> = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE",
        )
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|product| (product.id, product))
        .collect();

        let mut lines: Vec<(CartItem, Product)> = Vec::with_capacity(cart_items.len());
        for item in cart_items {
            let product = products
                .get(&item.product_id)
                .cloned()
                .ok_or(AppError::NotFound("product"))?;
            lines.push((item, product));
        }

        let order_id = Uuid::new_v4();
        let (mut items, subtotal) = freeze_items(order_id, &lines, now)?;
        let goods_total = (subtotal - cart.discount_amount).max(Decimal::ZERO);

        let mut order = Order {
            id: order_id,
            order_number: numbering::order_number(now),
            user_id: user.id,
            status: OrderStatus::Pending,
            payment_status: OrderPaymentStatus::Pending,
            recipient_name: address.recipient_name,
            phone: address.phone,
            street: address.street,
            city: address.city,
            province: address.province,
            postal_code: address.postal_code,
            district_id: address.district_id,
            courier: req.courier.clone(),
            courier_service: req.courier_service.clone(),
            shipping_cost: req.shipping_cost,
            subtotal,
            discount_amount: cart.discount_amount.min(subtotal),
            total: goods_total + req.shipping_cost,
            notes: req.notes.clone(),
            tracking_number: None,
            cancel_reason: None,
            confirmed_at: None,
            shipped_at: None,
            delivered_at: None,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
        };
        Self::insert_order(&mut tx, &mut order).await?;

        for ((item, product), frozen) in lines.iter().zip(items.iter_mut()) {
            let reduced = sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity - $2, updated_at = NOW()
                WHERE id = $1 AND track_stock AND stock_quantity >= $2
                "#,
            )
            .bind(product.id)
            .bind(item.quantity)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if reduced == 0 && product.track_stock && !product.allow_backorder {
                return Err(AppError::field(
                    format!("items.{}", item.id).as_str(),
                    format!("{} sold out while you were checking out", product.name),
                ));
            }
            frozen.stock_reduced = reduced > 0;
        }

        for item in &items {
            sqlx::query(
                r#"
                INSERT INTO order_items (id, order_id, product_id, product_name, product_sku, unit_price, quantity, options, subtotal, stock_reduced, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(item.id)
            .bind(item.order_id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(&item.product_sku)
            .bind(item.unit_price)
            .bind(item.quantity)
            .bind(&item.options)
            .bind(item.subtotal)
            .bind(item.stock_reduced)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }

        let mut payment = Payment::for_order(&order, req.payment_method, payment_expiry_hours, now);
        Self::insert_payment(&mut tx, &mut payment).await?;

        sqlx::query("DELETE FROM carts WHERE id = $1")
            .bind(cart.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(
            order_number = %order.order_number,
            payment_number = %payment.payment_number,
            total = %order.total,
            "order placed"
        );

        Ok(OrderDetail {
            order,
            items,
            payments: vec![payment],
        })
    }

    async fn insert_order(tx: &mut Transaction<'_, Postgres>, order: &mut Order) -> Result<(), AppError> {
        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let mut savepoint = Acquire::begin(&mut **tx).await?;
            let result = sqlx::query(
                r#"
                INSERT INTO orders (
                    id, order_number, user_id, status, payment_status,
                    recipient_name, phone, street, city, province, postal_code, district_id,
                    courier, courier_service, shipping_cost, subtotal, discount_amount, total, notes,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $20)
                "#,
            )
            .bind(order.id)
            .bind(&order.order_number)
            .bind(order.user_id)
            .bind(order.status)
            .bind(order.payment_status)
            .bind(&order.recipient_name)
            .bind(&order.phone)
            .bind(&order.street)
            .bind(&order.city)
            .bind(&order.province)
            .bind(&order.postal_code)
            .bind(&order.district_id)
            .bind(&order.courier)
            .bind(&order.courier_service)
            .bind(order.shipping_cost)
            .bind(order.subtotal)
            .bind(order.discount_amount)
            .bind(order.total)
            .bind(&order.notes)
            .bind(order.created_at)
            .execute(&mut *savepoint)
            .await;

            match result {
                Ok(_) => {
                    savepoint.commit().await?;
                    return Ok(());
                }
                Err(e) if is_unique_violation(&e, ORDER_NUMBER_KEY) && attempt < MAX_NUMBER_ATTEMPTS => {
                    savepoint.rollback().await?;
                    tracing::warn!(order_number = %order.order_number, attempt, "order number collision, retrying");
                    order.order_number = numbering::order_number(Utc::now());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::Internal("could not allocate an order number".into()))
    }

    async fn insert_payment(tx: &mut Transaction<'_, Postgres>, payment: &mut Payment) -> Result<(), AppError> {
        for attempt in 1..=MAX_NUMBER_ATTEMPTS {
            let mut savepoint = Acquire::begin(&mut **tx).await?;
            let result = sqlx::query(
                r#"
                INSERT INTO payments (id, payment_number, order_id, method, amount, status, expires_at, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
                "#,
            )
            .bind(payment.id)
            .bind(&payment.payment_number)
            .bind(payment.order_id)
            .bind(payment.method)
            .bind(payment.amount)
            .bind(payment.status)
            .bind(payment.expires_at)
            .bind(payment.created_at)
            .execute(&mut *savepoint)
            .await;

            match result {
                Ok(_) => {
                    savepoint.commit().await?;
                    return Ok(());
                }
                Err(e) if is_unique_violation(&e, PAYMENT_NUMBER_KEY) && attempt < MAX_NUMBER_ATTEMPTS => {
                    savepoint.rollback().await?;
                    tracing::warn!(payment_number = %payment.payment_number, attempt, "payment number collision, retrying");
                    payment.payment_number = numbering::payment_number(Utc::now());
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::Internal("could not allocate a payment number".into()))
    }

    pub async fn list_for_user(&self, user_id: Uuid, page: Page) -> Result<Paginated<Order>, sqlx::Error> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, Order>(
            "SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(user_id)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        Ok(Paginated::new(rows, page, total))
    }

    pub async fn list(&self, filter: &OrderFilter) -> Result<Paginated<Order>, sqlx::Error> {
        let page = Page::new(filter.page, filter.per_page);
        let search = like_pattern(filter.q.as_deref());
        let where_sql = r#"
            FROM orders
            WHERE ($1::order_status IS NULL OR status = $1)
              AND ($2::order_payment_status IS NULL OR payment_status = $2)
              AND ($3::text IS NULL OR order_number ILIKE $3 OR recipient_name ILIKE $3 OR phone ILIKE $3)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) {}", where_sql))
            .bind(filter.status)
            .bind(filter.payment_status)
            .bind(search.clone())
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query_as::<_, Order>(&format!(
            "SELECT * {} ORDER BY created_at DESC LIMIT $4 OFFSET $5",
            where_sql
        ))
        .bind(filter.status)
        .bind(filter.payment_status)
        .bind(search)
        .bind(page.per_page)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok(Paginated::new(rows, page, total))
    }

    pub async fn find(&self, id: Uuid) -> Result<Order, AppError> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("order"))
    }

    pub async fn find_for_user(&self, user_id: Uuid, order_number: &str) -> Result<Order, AppError> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE order_number = $1 AND user_id = $2")
            .bind(order_number)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AppError::NotFound("order"))
    }

    pub async fn detail(&self, order: Order) -> Result<OrderDetail, sqlx::Error> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at, product_name",
        )
        .bind(order.id)
        .fetch_all(&self.pool)
        .await?;
        let payments = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at DESC",
        )
        .bind(order.id)
        .fetch_all(&self.pool)
        .await?;
        Ok(OrderDetail { order, items, payments })
    }

    async fn lock(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<Order, AppError> {
        sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or(AppError::NotFound("order"))
    }

    async fn save(tx: &mut Transaction<'_, Postgres>, order: &Order) -> Result<Order, sqlx::Error> {
        sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET
                status = $2,
                payment_status = $3,
                tracking_number = $4,
                cancel_reason = $5,
                confirmed_at = $6,
                shipped_at = $7,
                delivered_at = $8,
                completed_at = $9,
                cancelled_at = $10,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(order.status)
        .bind(order.payment_status)
        .bind(&order.tracking_number)
        .bind(&order.cancel_reason)
        .bind(order.confirmed_at)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .bind(order.completed_at)
        .bind(order.cancelled_at)
        .fetch_one(&mut **tx)
        .await
    }

    /// Cancels an order, puts back the stock checkout took and fails any pending payment.
    ///
    /// `owner` restricts the cancel to that customer's orders. Locks run order, products
    /// (id order), then payments, matching `PaymentRepo`.
    pub async fn cancel(&self, id: Uuid, owner: Option<Uuid>, reason: Option<String>) -> Result<Order, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut order = Self::lock(&mut tx, id).await?;
        if owner.is_some_and(|user_id| user_id != order.user_id) {
            return Err(AppError::NotFound("order"));
        }

        order.cancel(reason, Utc::now())?;

        let items = sqlx::query_as::<_, OrderItem>("SELECT * FROM order_items WHERE order_id = $1")
            .bind(order.id)
            .fetch_all(&mut *tx)
            .await?;
        for (product_id, quantity) in restock_quantities(&items) {
            sqlx::query(
                "UPDATE products SET stock_quantity = stock_quantity + $2, updated_at = NOW() WHERE id = $1 AND track_stock",
            )
            .bind(product_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        let failed = sqlx::query(
            r#"
            UPDATE payments
            SET status = $2, notes = COALESCE(notes, 'order cancelled'), updated_at = NOW()
            WHERE order_id = $1 AND status = $3
            "#,
        )
        .bind(order.id)
        .bind(PaymentStatus::Failed)
        .bind(PaymentStatus::Pending)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if failed > 0 {
            order.payment_status = PaymentStatus::Failed.for_order();
        }

        let order = Self::save(&mut tx, &order).await?;
        tx.commit().await?;
        tracing::info!(order_number = %order.order_number, "order cancelled");
        Ok(order)
    }

    pub async fn transition(&self, id: Uuid, action: OrderAction) -> Result<Order, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut order = Self::lock(&mut tx, id).await?;
        action.apply(&mut order)?;
        let order = Self::save(&mut tx, &order).await?;
        tx.commit().await?;
        tracing::info!(order_number = %order.order_number, status = order.status.as_str(), "order status changed");
        Ok(order)
    }
}
