use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use super::{CartItem, Payment, PaymentMethod, Product};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const CANCELLABLE: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Confirmed];

    pub fn is_cancellable(self) -> bool {
        Self::CANCELLABLE.contains(&self)
    }

    /// Orders a customer may review products from.
    pub fn is_fulfilled(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Completed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "order_payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderPaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Failed,
    Expired,
    Refunded,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub recipient_name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub province: String,
    pub postal_code: String,
    pub district_id: Option<String>,
    pub courier: String,
    pub courier_service: String,
    pub shipping_cost: Decimal,
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub notes: Option<String>,
    pub tracking_number: Option<String>,
    pub cancel_reason: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    fn transition(&mut self, from: &[OrderStatus], to: OrderStatus) -> Result<(), AppError> {
        if !from.contains(&self.status) {
            return Err(AppError::invalid_state(format!(
                "order {} cannot move from {} to {}",
                self.order_number,
                self.status.as_str(),
                to.as_str()
            )));
        }
        self.status = to;
        Ok(())
    }

    pub fn cancel(&mut self, reason: Option<String>, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.status.is_cancellable() {
            return Err(AppError::invalid_state(format!(
                "order {} can no longer be cancelled (status: {})",
                self.order_number,
                self.status.as_str()
            )));
        }
        self.status = OrderStatus::Cancelled;
        self.cancel_reason = reason;
        self.cancelled_at = Some(now);
        Ok(())
    }

    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(&[OrderStatus::Pending], OrderStatus::Confirmed)?;
        self.confirmed_at = Some(now);
        Ok(())
    }

    pub fn start_processing(&mut self) -> Result<(), AppError> {
        self.transition(&[OrderStatus::Confirmed], OrderStatus::Processing)
    }

    pub fn ship(&mut self, tracking_number: String, now: DateTime<Utc>) -> Result<(), AppError> {
        if tracking_number.trim().is_empty() {
            return Err(AppError::field("tracking_number", "tracking number is required"));
        }
        self.transition(&[OrderStatus::Processing], OrderStatus::Shipped)?;
        self.tracking_number = Some(tracking_number.trim().to_string());
        self.shipped_at = Some(now);
        Ok(())
    }

    pub fn deliver(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(&[OrderStatus::Shipped], OrderStatus::Delivered)?;
        self.delivered_at = Some(now);
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<(), AppError> {
        self.transition(&[OrderStatus::Delivered], OrderStatus::Completed)?;
        self.completed_at = Some(now);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub product_sku: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub options: serde_json::Value,
    pub subtotal: Decimal,
    /// Whether checkout took `quantity` out of stock. Backordered lines leave it false.
    #[serde(default, skip_serializing)]
    pub stock_reduced: bool,
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    /// Snapshot of a cart line at the product's current price.
    pub fn freeze(order_id: Uuid, item: &CartItem, product: &Product, now: DateTime<Utc>) -> Self {
        let unit_price = product.final_price(now);
        Self {
            id: Uuid::new_v4(),
            order_id,
            product_id: Some(product.id),
            product_name: product.name.clone(),
            product_sku: product.sku.clone(),
            unit_price,
            quantity: item.quantity,
            options: item.options.clone(),
            subtotal: unit_price * Decimal::from(item.quantity),
            stock_reduced: false,
            created_at: now,
        }
    }
}

/// Quantities to put back per product when an order is cancelled, keyed in id order.
///
/// Only lines whose stock was actually taken at checkout count.
pub fn restock_quantities(items: &[OrderItem]) -> BTreeMap<Uuid, i32> {
    let mut restock = BTreeMap::new();
    for item in items.iter().filter(|i| i.stock_reduced) {
        if let Some(product_id) = item.product_id {
            let qty: &mut i32 = restock.entry(product_id).or_insert(0);
            *qty = qty.saturating_add(item.quantity);
        }
    }
    restock
}

/// Freezes every cart line into an order item, refusing products that can no longer be bought.
pub fn freeze_items(
    order_id: Uuid,
    lines: &[(CartItem, Product)],
    now: DateTime<Utc>,
) -> Result<(Vec<OrderItem>, Decimal), AppError> {
    if lines.is_empty() {
        return Err(AppError::field("cart", "your cart is empty"));
    }

    let mut errors = crate::error::FieldErrors::new();
    let mut items = Vec::with_capacity(lines.len());
    for (item, product) in lines {
        if !product.can_purchase(item.quantity) {
            errors
                .entry(format!("items.{}", item.id))
                .or_default()
                .push(if product.is_active() {
                    format!("only {} of {} left in stock", product.stock_quantity, product.name)
                } else {
                    format!("{} is no longer available", product.name)
                });
            continue;
        }
        items.push(OrderItem::freeze(order_id, item, product, now));
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let subtotal: Decimal = items.iter().map(|i| i.subtotal).sum();
    Ok((items, subtotal))
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ShippingAddressInput {
    #[validate(length(min = 1, max = 120, message = "recipient name is required"))]
    pub recipient_name: String,
    #[validate(length(min = 6, max = 20, message = "phone number is invalid"))]
    pub phone: String,
    #[validate(length(min = 1, message = "street is required"))]
    pub street: String,
    #[validate(length(min = 1, message = "city is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "province is required"))]
    pub province: String,
    #[validate(length(min = 3, max = 10, message = "postal code is invalid"))]
    pub postal_code: String,
    pub district_id: Option<String>,
}

impl From<super::Address> for ShippingAddressInput {
    fn from(address: super::Address) -> Self {
        Self {
            recipient_name: address.recipient_name,
            phone: address.phone,
            street: address.street,
            city: address.city,
            province: address.province,
            postal_code: address.postal_code,
            district_id: address.district_id,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    pub address_id: Option<Uuid>,
    #[validate(nested)]
    pub shipping_address: Option<ShippingAddressInput>,
    #[validate(length(min = 1, message = "courier is required"))]
    pub courier: String,
    #[validate(length(min = 1, message = "courier service is required"))]
    pub courier_service: String,
    pub shipping_cost: Decimal,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 500, message = "notes are too long"))]
    pub notes: Option<String>,
}

impl CheckoutRequest {
    pub fn check(&self) -> Result<(), AppError> {
        if self.address_id.is_none() && self.shipping_address.is_none() {
            return Err(AppError::field("shipping_address", "a shipping address is required"));
        }
        if self.shipping_cost < Decimal::ZERO {
            return Err(AppError::field("shipping_cost", "shipping cost must not be negative"));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelOrderRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ShipOrderRequest {
    pub tracking_number: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<OrderPaymentStatus>,
    pub q: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OrderEvent {
    pub event_type: String,
    pub order_id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub payment_status: OrderPaymentStatus,
    pub total: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl OrderEvent {
    pub fn new(event_type: &str, order: &Order) -> Self {
        Self {
            event_type: event_type.to_string(),
            order_id: order.id,
            order_number: order.order_number.clone(),
            user_id: order.user_id,
            status: order.status,
            payment_status: order.payment_status,
            total: order.total,
            timestamp: Utc::now(),
        }
    }
}
