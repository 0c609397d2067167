use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

/// Who a cart belongs to: a signed-in user or an anonymous browser session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOwner {
    User(Uuid),
    Session(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub session_id: Option<String>,
    pub discount_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub options: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// Cart item joined with the product fields the cart page shows.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartLine {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: CartItem,
    pub product_name: String,
    pub product_slug: String,
    pub product_sku: String,
    pub weight_grams: i32,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub item_count: i32,
}

impl CartTotals {
    pub fn compute<'a, I>(items: I, discount_amount: Decimal) -> Self
    where
        I: IntoIterator<Item = &'a CartItem>,
    {
        let (subtotal, item_count) = items
            .into_iter()
            .fold((Decimal::ZERO, 0), |(sum, count), item| {
                (sum + item.subtotal(), count + item.quantity)
            });
        Self {
            subtotal,
            discount_amount,
            total: (subtotal - discount_amount).max(Decimal::ZERO),
            item_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: Option<Uuid>,
    pub items: Vec<CartLine>,
    #[serde(flatten)]
    pub totals: CartTotals,
    pub total_weight_grams: i64,
}

impl CartView {
    pub fn empty() -> Self {
        Self {
            id: None,
            items: Vec::new(),
            totals: CartTotals::compute(std::iter::empty::<&CartItem>(), Decimal::ZERO),
            total_weight_grams: 0,
        }
    }

    pub fn new(cart: &Cart, items: Vec<CartLine>) -> Self {
        let totals = CartTotals::compute(items.iter().map(|l| &l.item), cart.discount_amount);
        let total_weight_grams = items
            .iter()
            .map(|l| i64::from(l.weight_grams) * i64::from(l.item.quantity))
            .sum();
        Self {
            id: Some(cart.id),
            items,
            totals,
            total_weight_grams,
        }
    }
}

/// One database write needed to fold a guest cart into a user's cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeStep {
    /// Add `by` to an item already in the target cart.
    Increment { item_id: Uuid, by: i32 },
    /// Re-home a guest item into the target cart.
    Move { item_id: Uuid },
}

/// Folds `guest` items into `target`, matching on product.
///
/// Quantities of items for a product already in `target` are summed; other items
/// move over unchanged. `target` is updated in place and the returned steps replay
/// the same changes against storage.
pub fn merge_items(
    target_cart_id: Uuid,
    target: &mut Vec<CartItem>,
    guest: Vec<CartItem>,
) -> Vec<MergeStep> {
    let mut by_product: HashMap<Uuid, usize> = HashMap::new();
    for (idx, item) in target.iter().enumerate() {
        by_product.entry(item.product_id).or_insert(idx);
    }

    let mut steps = Vec::with_capacity(guest.len());
    for mut item in guest {
        match by_product.get(&item.product_id) {
            Some(&idx) => {
                target[idx].quantity += item.quantity;
                steps.push(MergeStep::Increment {
                    item_id: target[idx].id,
                    by: item.quantity,
                });
            }
            None => {
                item.cart_id = target_cart_id;
                steps.push(MergeStep::Move { item_id: item.id });
                by_product.insert(item.product_id, target.len());
                target.push(item);
            }
        }
    }
    steps
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddCartItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 99, message = "quantity must be between 1 and 99"))]
    pub quantity: i32,
    pub options: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCartItemRequest {
    #[validate(range(min = 0, max = 99, message = "quantity must be between 0 and 99"))]
    pub quantity: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::cart_item;
    use rust_decimal_macros::dec;

    fn quantities(items: &[CartItem]) -> HashMap<Uuid, i32> {
        items.iter().map(|i| (i.product_id, i.quantity)).collect()
    }

    #[test]
    fn totals_subtract_discount() {
        let cart = Uuid::new_v4();
        let items = vec![
            cart_item(cart, Uuid::new_v4(), 2, dec!(250000)),
            cart_item(cart, Uuid::new_v4(), 1, dec!(100000)),
        ];
        let totals = CartTotals::compute(&items, dec!(50000));
        assert_eq!(totals.subtotal, dec!(600000));
        assert_eq!(totals.total, dec!(550000));
        assert_eq!(totals.item_count, 3);
    }

    #[test]
    fn total_is_floored_at_zero() {
        let cart = Uuid::new_v4();
        let items = vec![cart_item(cart, Uuid::new_v4(), 1, dec!(10))];
        let totals = CartTotals::compute(&items, dec!(25));
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn total_matches_formula_for_many_shapes() {
        let cart = Uuid::new_v4();
        for discount in [dec!(0), dec!(5), dec!(99.99), dec!(1000000)] {
            for n in 0..4 {
                let items: Vec<_> = (0..n)
                    .map(|i| cart_item(cart, Uuid::new_v4(), i + 1, dec!(12.50)))
                    .collect();
                let totals = CartTotals::compute(&items, discount);
                assert_eq!(totals.total, (totals.subtotal - discount).max(Decimal::ZERO));
            }
        }
    }

    #[test]
    fn empty_cart_view_has_zero_totals() {
        let view = CartView::empty();
        assert_eq!(view.totals.total, Decimal::ZERO);
        assert_eq!(view.totals.item_count, 0);
    }

    #[test]
    fn merge_sums_matching_products_and_moves_the_rest() {
        let user_cart = Uuid::new_v4();
        let guest_cart = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let mut target = vec![
            cart_item(user_cart, a, 1, dec!(100)),
            cart_item(user_cart, b, 1, dec!(200)),
        ];
        let guest = vec![cart_item(guest_cart, a, 2, dec!(100))];

        let steps = merge_items(user_cart, &mut target, guest);

        let q = quantities(&target);
        assert_eq!(q[&a], 3);
        assert_eq!(q[&b], 1);
        assert_eq!(target.len(), 2);
        assert_eq!(steps, vec![MergeStep::Increment { item_id: target[0].id, by: 2 }]);
    }

    #[test]
    fn merge_moves_new_products_into_target_cart() {
        let user_cart = Uuid::new_v4();
        let guest_cart = Uuid::new_v4();
        let a = Uuid::new_v4();
        let c = Uuid::new_v4();

        let mut target = vec![cart_item(user_cart, a, 1, dec!(100))];
        let moved = cart_item(guest_cart, c, 4, dec!(50));
        let moved_id = moved.id;

        let steps = merge_items(user_cart, &mut target, vec![moved]);

        assert_eq!(steps, vec![MergeStep::Move { item_id: moved_id }]);
        assert_eq!(target.len(), 2);
        assert_eq!(target[1].cart_id, user_cart);
        assert_eq!(quantities(&target)[&c], 4);
    }

    #[test]
    fn duplicate_guest_products_collapse_onto_the_moved_item() {
        let user_cart = Uuid::new_v4();
        let guest_cart = Uuid::new_v4();
        let a = Uuid::new_v4();
        let c = Uuid::new_v4();

        let mut target = vec![cart_item(user_cart, a, 1, dec!(100))];
        let first = cart_item(guest_cart, c, 1, dec!(50));
        let first_id = first.id;
        let second = cart_item(guest_cart, c, 2, dec!(50));

        let steps = merge_items(user_cart, &mut target, vec![first, second]);

        assert_eq!(
            steps,
            vec![
                MergeStep::Move { item_id: first_id },
                MergeStep::Increment { item_id: first_id, by: 2 },
            ]
        );
        assert_eq!(quantities(&target)[&c], 3);
    }
}
