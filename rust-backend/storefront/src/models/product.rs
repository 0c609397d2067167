use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "product_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Draft,
    Active,
    Archived,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "sale_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SaleType {
    Regular,
    Discount,
    FlashSale,
    Clearance,
}

impl SaleType {
    /// Regular-priced products never show a discount, whatever their percentage says.
    pub fn permits_discount(self) -> bool {
        !matches!(self, SaleType::Regular)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub category_id: Option<Uuid>,
    pub sku: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub material: Option<String>,
    pub dimensions: Option<String>,
    pub weight_grams: i32,
    pub price: Decimal,
    pub discount_percentage: Decimal,
    pub discount_starts_at: Option<DateTime<Utc>>,
    pub discount_ends_at: Option<DateTime<Utc>>,
    pub sale_type: SaleType,
    pub stock_quantity: i32,
    pub track_stock: bool,
    pub allow_backorder: bool,
    pub status: ProductStatus,
    pub is_featured: bool,
    pub average_rating: Decimal,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn has_active_discount(&self, now: DateTime<Utc>) -> bool {
        self.discount_percentage > Decimal::ZERO
            && self.discount_starts_at.map_or(true, |start| start <= now)
            && self.discount_ends_at.map_or(true, |end| end >= now)
            && self.sale_type.permits_discount()
    }

    pub fn final_price(&self, now: DateTime<Utc>) -> Decimal {
        if !self.has_active_discount(now) {
            return self.price;
        }
        let pct = self.discount_percentage.min(Decimal::ONE_HUNDRED);
        let discounted = self.price * (Decimal::ONE_HUNDRED - pct) / Decimal::ONE_HUNDRED;
        discounted
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .min(self.price)
    }

    pub fn discount_amount(&self, now: DateTime<Utc>) -> Decimal {
        self.price - self.final_price(now)
    }

    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active && self.deleted_at.is_none()
    }

    pub fn is_in_stock(&self) -> bool {
        !self.track_stock || self.allow_backorder || self.stock_quantity > 0
    }

    pub fn can_purchase(&self, quantity: i32) -> bool {
        self.is_active()
            && (!self.track_stock || self.allow_backorder || self.stock_quantity >= quantity)
    }

    /// Decrements only when stock is tracked and enough is on hand.
    pub fn reduce_stock(&mut self, quantity: i32) -> bool {
        if !self.track_stock || self.stock_quantity < quantity {
            return false;
        }
        self.stock_quantity -= quantity;
        true
    }

    /// Increments only when stock is tracked and the new level fits an `i32`.
    pub fn add_stock(&mut self, quantity: i32) -> bool {
        if !self.track_stock {
            return false;
        }
        match self.stock_quantity.checked_add(quantity) {
            Some(stock) => {
                self.stock_quantity = stock;
                true
            }
            None => false,
        }
    }

    pub fn priced(self, now: DateTime<Utc>) -> PricedProduct {
        PricedProduct {
            final_price: self.final_price(now),
            has_active_discount: self.has_active_discount(now),
            in_stock: self.is_in_stock(),
            product: self,
        }
    }
}

/// Product as shown to shoppers, with the price they would pay right now.
#[derive(Debug, Clone, Serialize)]
pub struct PricedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub final_price: Decimal,
    pub has_active_discount: bool,
    pub in_stock: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub url: String,
    pub sort_order: i32,
    pub is_primary: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: PricedProduct,
    pub images: Vec<ProductImage>,
    pub category: Option<super::Category>,
    pub reviews: Vec<super::ReviewWithAuthor>,
    pub related: Vec<PricedProduct>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    pub category_id: Option<Uuid>,
    #[validate(length(min = 1, max = 64, message = "sku is required"))]
    pub sku: String,
    #[validate(length(min = 1, max = 200, message = "name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub material: Option<String>,
    pub dimensions: Option<String>,
    #[validate(range(min = 0, message = "weight must not be negative"))]
    pub weight_grams: Option<i32>,
    pub price: Decimal,
    pub discount_percentage: Option<Decimal>,
    pub discount_starts_at: Option<DateTime<Utc>>,
    pub discount_ends_at: Option<DateTime<Utc>>,
    pub sale_type: Option<SaleType>,
    #[validate(range(min = 0, message = "stock must not be negative"))]
    pub stock_quantity: Option<i32>,
    pub track_stock: Option<bool>,
    pub allow_backorder: Option<bool>,
    pub status: Option<ProductStatus>,
    pub is_featured: Option<bool>,
}

impl CreateProductRequest {
    pub fn check_pricing(&self) -> Result<(), AppError> {
        check_pricing(
            Some(self.price),
            self.discount_percentage,
            self.discount_starts_at,
            self.discount_ends_at,
        )
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateProductRequest {
    /// Nullable columns take `Some(None)` from an explicit `null` to clear them.
    #[serde(default, with = "super::double_option")]
    pub category_id: Option<Option<Uuid>>,
    #[validate(length(min = 1, max = 64, message = "sku must not be empty"))]
    pub sku: Option<String>,
    #[validate(length(min = 1, max = 200, message = "name must not be empty"))]
    pub name: Option<String>,
    #[serde(default, with = "super::double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, with = "super::double_option")]
    pub material: Option<Option<String>>,
    #[serde(default, with = "super::double_option")]
    pub dimensions: Option<Option<String>>,
    #[validate(range(min = 0, message = "weight must not be negative"))]
    pub weight_grams: Option<i32>,
    pub price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    #[serde(default, with = "super::double_option")]
    pub discount_starts_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, with = "super::double_option")]
    pub discount_ends_at: Option<Option<DateTime<Utc>>>,
    pub sale_type: Option<SaleType>,
    pub track_stock: Option<bool>,
    pub allow_backorder: Option<bool>,
    pub status: Option<ProductStatus>,
    pub is_featured: Option<bool>,
}

/// Applies a nullable patch field over the stored value.
pub fn patched<T: Clone>(update: &Option<Option<T>>, current: &Option<T>) -> Option<T> {
    match update {
        Some(value) => value.clone(),
        None => current.clone(),
    }
}

impl UpdateProductRequest {
    /// Discount window once this update is applied to `current`.
    pub fn discount_window(&self, current: &Product) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        (
            patched(&self.discount_starts_at, &current.discount_starts_at),
            patched(&self.discount_ends_at, &current.discount_ends_at),
        )
    }

    pub fn check_pricing(&self, current: &Product) -> Result<(), AppError> {
        let (starts_at, ends_at) = self.discount_window(current);
        check_pricing(self.price, self.discount_percentage, starts_at, ends_at)
    }
}

fn check_pricing(
    price: Option<Decimal>,
    pct: Option<Decimal>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    if let Some(price) = price {
        if price < Decimal::ZERO {
            return Err(AppError::field("price", "price must not be negative"));
        }
    }
    if let Some(pct) = pct {
        if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
            return Err(AppError::field(
                "discount_percentage",
                "discount percentage must be between 0 and 100",
            ));
        }
    }
    if let (Some(start), Some(end)) = (starts_at, ends_at) {
        if end < start {
            return Err(AppError::field(
                "discount_ends_at",
                "discount must end after it starts",
            ));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: ProductStatus,
}

#[derive(Debug, Deserialize)]
pub struct AdjustStockRequest {
    /// Positive adds stock, negative removes it.
    pub change: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddImageRequest {
    #[validate(length(min = 1, message = "file name is required"))]
    pub filename: String,
    #[validate(length(min = 1, message = "image content is required"))]
    pub content_base64: String,
    pub is_primary: Option<bool>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    Rating,
    Name,
}

impl ProductSort {
    pub fn order_by(self) -> &'static str {
        match self {
            ProductSort::Newest => "p.created_at DESC",
            ProductSort::PriceAsc => "p.effective_price ASC, p.created_at DESC",
            ProductSort::PriceDesc => "p.effective_price DESC, p.created_at DESC",
            ProductSort::Rating => "p.average_rating DESC, p.review_count DESC",
            ProductSort::Name => "p.name ASC",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub q: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub on_sale: Option<bool>,
    #[serde(default)]
    pub sort: ProductSort,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminProductFilter {
    pub q: Option<String>,
    pub status: Option<ProductStatus>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub trashed: bool,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ProductEvent {
    pub event_type: String,
    pub product_id: Uuid,
    pub slug: String,
    pub status: ProductStatus,
    pub stock_quantity: i32,
}

impl ProductEvent {
    pub fn new(event_type: &str, product: &Product) -> Self {
        Self {
            event_type: event_type.to_string(),
            product_id: product.id,
            slug: product.slug.clone(),
            status: product.status,
            stock_quantity: product.stock_quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::product;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    #[test]
    fn discount_applies_inside_window() {
        let now = Utc::now();
        let mut p = product(dec!(1500000), dec!(10), SaleType::FlashSale);
        p.discount_starts_at = Some(now - Duration::hours(1));
        p.discount_ends_at = Some(now + Duration::hours(1));

        assert!(p.has_active_discount(now));
        assert_eq!(p.final_price(now), dec!(1350000));
        assert_eq!(p.discount_amount(now), dec!(150000));
    }

    #[test]
    fn discount_ignored_outside_window() {
        let now = Utc::now();
        let mut p = product(dec!(1500000), dec!(10), SaleType::Discount);
        p.discount_starts_at = Some(now + Duration::hours(1));
        assert!(!p.has_active_discount(now));
        assert_eq!(p.final_price(now), dec!(1500000));

        p.discount_starts_at = None;
        p.discount_ends_at = Some(now - Duration::seconds(1));
        assert!(!p.has_active_discount(now));
        assert_eq!(p.final_price(now), p.price);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let now = Utc::now();
        let mut p = product(dec!(200), dec!(25), SaleType::Clearance);
        p.discount_starts_at = Some(now);
        p.discount_ends_at = Some(now);
        assert!(p.has_active_discount(now));
        assert_eq!(p.final_price(now), dec!(150));
    }

    #[test]
    fn regular_sale_type_never_discounts() {
        let now = Utc::now();
        let p = product(dec!(999), dec!(50), SaleType::Regular);
        assert!(!p.has_active_discount(now));
        assert_eq!(p.final_price(now), dec!(999));
    }

    #[test]
    fn final_price_rounds_half_away_from_zero() {
        let now = Utc::now();
        // 105 * 0.9 = 94.5
        let p = product(dec!(105), dec!(10), SaleType::Discount);
        assert_eq!(p.final_price(now), dec!(95));
    }

    #[test]
    fn final_price_never_exceeds_price() {
        let now = Utc::now();
        for (price, pct) in [
            (dec!(0.60), dec!(1)),
            (dec!(0.40), dec!(10)),
            (dec!(10), dec!(100)),
            (dec!(123456.78), dec!(33.33)),
            (dec!(1), dec!(0.5)),
        ] {
            for sale_type in [SaleType::Regular, SaleType::Discount, SaleType::FlashSale] {
                let p = product(price, pct, sale_type);
                assert!(p.final_price(now) <= p.price, "{} at {}%", price, pct);
                if !p.has_active_discount(now) {
                    assert_eq!(p.final_price(now), p.price);
                }
            }
        }
    }

    #[test]
    fn zero_percentage_is_not_a_discount() {
        let p = product(dec!(100), dec!(0), SaleType::FlashSale);
        assert!(!p.has_active_discount(Utc::now()));
    }

    #[test]
    fn reduce_stock_requires_tracking_and_sufficient_quantity() {
        let mut p = product(dec!(100), dec!(0), SaleType::Regular);
        assert!(p.reduce_stock(3));
        assert_eq!(p.stock_quantity, 2);
        assert!(!p.reduce_stock(3));
        assert_eq!(p.stock_quantity, 2);

        p.track_stock = false;
        assert!(!p.reduce_stock(1));
        assert_eq!(p.stock_quantity, 2);
    }

    #[test]
    fn add_stock_requires_tracking() {
        let mut p = product(dec!(100), dec!(0), SaleType::Regular);
        assert!(p.add_stock(4));
        assert_eq!(p.stock_quantity, 9);

        p.track_stock = false;
        assert!(!p.add_stock(4));
        assert_eq!(p.stock_quantity, 9);
    }

    #[test]
    fn update_null_clears_discount_window_and_absent_keeps_it() {
        let now = Utc::now();
        let mut current = product(dec!(1000), dec!(10), SaleType::Discount);
        current.discount_starts_at = Some(now - Duration::days(1));
        current.discount_ends_at = Some(now + Duration::days(1));
        current.description = Some("solid oak".into());

        let req: UpdateProductRequest = serde_json::from_value(serde_json::json!({
            "discount_ends_at": null,
            "description": null,
        }))
        .unwrap();
        assert_eq!(req.discount_ends_at, Some(None));
        assert_eq!(req.discount_starts_at, None);
        assert_eq!(req.category_id, None);

        let (starts_at, ends_at) = req.discount_window(&current);
        assert_eq!(starts_at, current.discount_starts_at);
        assert_eq!(ends_at, None);
        assert_eq!(patched(&req.description, &current.description), None);
        assert_eq!(patched(&req.material, &current.material), current.material);

        current.discount_ends_at = ends_at;
        assert!(current.has_active_discount(now + Duration::days(30)));
    }

    #[test]
    fn update_window_is_checked_against_stored_start() {
        let now = Utc::now();
        let mut current = product(dec!(1000), dec!(10), SaleType::Discount);
        current.discount_starts_at = Some(now);

        let req: UpdateProductRequest = serde_json::from_value(serde_json::json!({
            "discount_ends_at": (now - Duration::days(1)).to_rfc3339(),
        }))
        .unwrap();
        assert!(matches!(req.check_pricing(&current), Err(AppError::Validation(_))));
    }

    #[test]
    fn add_stock_refuses_to_overflow() {
        let mut p = product(dec!(100), dec!(0), SaleType::Regular);
        assert!(!p.add_stock(i32::MAX));
        assert_eq!(p.stock_quantity, 5);
        assert!(p.add_stock(i32::MAX - 5));
        assert_eq!(p.stock_quantity, i32::MAX);
    }

    #[test]
    fn backorder_allows_purchase_beyond_stock() {
        let mut p = product(dec!(100), dec!(0), SaleType::Regular);
        assert!(!p.can_purchase(6));
        p.allow_backorder = true;
        assert!(p.can_purchase(6));
        p.status = ProductStatus::Draft;
        assert!(!p.can_purchase(1));
    }

    #[test]
    fn pricing_checks_reject_bad_input() {
        assert!(check_pricing(Some(dec!(-1)), None, None, None).is_err());
        assert!(check_pricing(None, Some(dec!(101)), None, None).is_err());
        let now = Utc::now();
        assert!(check_pricing(None, None, Some(now), Some(now - Duration::days(1))).is_err());
        assert!(check_pricing(Some(dec!(10)), Some(dec!(15)), Some(now), None).is_ok());
    }

    #[test]
    fn priced_product_serializes_flat() {
        let now = Utc::now();
        let p = product(dec!(100), dec!(20), SaleType::Discount);
        let json = serde_json::to_value(p.priced(now)).unwrap();
        assert_eq!(json["slug"], "oak-table");
        assert_eq!(json["has_active_discount"], true);
        assert_eq!(json["final_price"], "80");
    }
}
