//! Repository tests against a throwaway database per test (`DATABASE_URL` must point at Postgres).

use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use serde_json::json;
use sqlx::PgPool;

use storefront::db::{CartRepo, OrderAction, OrderRepo, PaymentRepo, ProductRepo, ReviewRepo, UserRepo};
use storefront::error::AppError;
use storefront::models::{
    CartOwner, CheckoutRequest, CreateProductRequest, OrderDetail, OrderPaymentStatus, OrderStatus, PaymentStatus,
    Product, ProductFilter, ProductSort, SignUpRequest, SubmitReviewRequest, UpdateProductRequest, User,
};

const GUEST_SESSION: &str = "guest-session-000000000001";

async fn customer(pool: &PgPool, email: &str) -> User {
    let req: SignUpRequest = serde_json::from_value(json!({
        "email": email,
        "password": "correct-horse",
        "full_name": "Ani Wijaya",
    }))
    .unwrap();
    UserRepo::new(pool.clone()).create_customer(&req, "argon2-hash").await.unwrap()
}

async fn admin(pool: &PgPool) -> User {
    let user = customer(pool, "admin@example.com").await;
    sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
        .bind(user.id)
        .execute(pool)
        .await
        .unwrap();
    UserRepo::new(pool.clone()).find(user.id).await.unwrap().unwrap()
}

async fn product(pool: &PgPool, sku: &str, fields: serde_json::Value) -> Product {
    let mut body = json!({
        "sku": sku,
        "name": format!("Chair {}", sku),
        "price": "1000",
        "stock_quantity": 10,
        "status": "active",
    });
    if let (Some(base), Some(extra)) = (body.as_object_mut(), fields.as_object()) {
        base.extend(extra.clone());
    }
    let req: CreateProductRequest = serde_json::from_value(body).unwrap();
    ProductRepo::new(pool.clone()).create(&req).await.unwrap()
}

async fn stock_of(pool: &PgPool, product: &Product) -> i32 {
    ProductRepo::new(pool.clone()).find(product.id).await.unwrap().stock_quantity
}

fn checkout() -> CheckoutRequest {
    serde_json::from_value(json!({
        "shipping_address": {
            "recipient_name": "Ani Wijaya",
            "phone": "081234567890",
            "street": "Jl. Kenanga 5",
            "city": "Bandung",
            "province": "Jawa Barat",
            "postal_code": "40115",
        },
        "courier": "jne",
        "courier_service": "REG",
        "shipping_cost": "20000",
        "payment_method": "bank_transfer",
    }))
    .unwrap()
}

async fn order_of(pool: &PgPool, user: &User, lines: &[(&Product, i32)]) -> OrderDetail {
    let carts = CartRepo::new(pool.clone());
    for (product, quantity) in lines {
        carts
            .add_item(&CartOwner::User(user.id), product.id, *quantity, json!({}), Utc::now())
            .await
            .unwrap();
    }
    OrderRepo::new(pool.clone()).place_order(user, &checkout(), 24).await.unwrap()
}

async fn delivered_order(pool: &PgPool, user: &User, product: &Product) -> OrderDetail {
    let detail = order_of(pool, user, &[(product, 1)]).await;
    let orders = OrderRepo::new(pool.clone());
    for action in [
        OrderAction::Confirm,
        OrderAction::Process,
        OrderAction::Ship { tracking_number: "JNE0001".into() },
        OrderAction::Deliver,
    ] {
        orders.transition(detail.order.id, action).await.unwrap();
    }
    detail
}

#[sqlx::test(migrations = "./migrations")]
async fn guest_cart_merges_into_user_cart(pool: PgPool) {
    let user = customer(&pool, "ani@example.com").await;
    let a = product(&pool, "A", json!({})).await;
    let b = product(&pool, "B", json!({})).await;
    let carts = CartRepo::new(pool.clone());
    let owner = CartOwner::User(user.id);
    let guest = CartOwner::Session(GUEST_SESSION.to_string());
    let now = Utc::now();

    carts.add_item(&owner, a.id, 1, json!({}), now).await.unwrap();
    carts.add_item(&owner, b.id, 1, json!({}), now).await.unwrap();
    carts.add_item(&guest, a.id, 2, json!({}), now).await.unwrap();

    carts.merge_guest(GUEST_SESSION, user.id).await.unwrap();

    let view = carts.view(&owner).await.unwrap();
    let quantity = |id| view.items.iter().find(|l| l.item.product_id == id).map(|l| l.item.quantity);
    assert_eq!(view.items.len(), 2);
    assert_eq!(quantity(a.id), Some(3));
    assert_eq!(quantity(b.id), Some(1));
    assert_eq!(view.totals.item_count, 4);
    assert!(carts.find(&guest).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn guest_cart_is_adopted_when_user_has_none(pool: PgPool) {
    let user = customer(&pool, "ani@example.com").await;
    let a = product(&pool, "A", json!({})).await;
    let carts = CartRepo::new(pool.clone());
    let guest = CartOwner::Session(GUEST_SESSION.to_string());

    carts.add_item(&guest, a.id, 2, json!({}), Utc::now()).await.unwrap();
    carts.merge_guest(GUEST_SESSION, user.id).await.unwrap();

    let view = carts.view(&CartOwner::User(user.id)).await.unwrap();
    assert_eq!(view.totals.item_count, 2);
    assert!(carts.find(&guest).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn rating_counts_approved_reviews_only(pool: PgPool) {
    let first = customer(&pool, "first@example.com").await;
    let second = customer(&pool, "second@example.com").await;
    let sofa = product(&pool, "SOFA", json!({})).await;
    delivered_order(&pool, &first, &sofa).await;
    delivered_order(&pool, &second, &sofa).await;

    let reviews = ReviewRepo::new(pool.clone());
    let products = ProductRepo::new(pool.clone());
    let review = |rating| SubmitReviewRequest { order_id: None, rating, comment: None };

    let five = reviews.submit(&first, &sofa, &review(5)).await.unwrap();
    let two = reviews.submit(&second, &sofa, &review(2)).await.unwrap();
    assert!(!five.is_approved && !two.is_approved);

    reviews.approve(five.id).await.unwrap();
    let p = products.find(sofa.id).await.unwrap();
    assert_eq!((p.average_rating, p.review_count), (dec!(5), 1));

    reviews.reject(five.id).await.unwrap();
    let p = products.find(sofa.id).await.unwrap();
    assert_eq!((p.average_rating, p.review_count), (dec!(0), 0));

    reviews.approve(two.id).await.unwrap();
    let p = products.find(sofa.id).await.unwrap();
    assert_eq!((p.average_rating, p.review_count), (dec!(2), 1));
}

#[sqlx::test(migrations = "./migrations")]
async fn review_needs_a_fulfilled_purchase(pool: PgPool) {
    let user = customer(&pool, "ani@example.com").await;
    let sofa = product(&pool, "SOFA", json!({})).await;
    order_of(&pool, &user, &[(&sofa, 1)]).await;

    let err = ReviewRepo::new(pool.clone())
        .submit(&user, &sofa, &SubmitReviewRequest { order_id: None, rating: 4, comment: None })
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(fields) if fields.contains_key("order_id")));
}

#[sqlx::test(migrations = "./migrations")]
async fn slugs_stay_unique_across_soft_deleted_products(pool: PgPool) {
    let products = ProductRepo::new(pool.clone());
    let first = product(&pool, "OAK-1", json!({ "name": "Oak Table" })).await;
    assert_eq!(first.slug, "oak-table");

    products.soft_delete(first.id).await.unwrap();
    let second = product(&pool, "OAK-2", json!({ "name": "Oak Table" })).await;
    assert_eq!(second.slug, "oak-table-1");

    let restored = products.restore(first.id).await.unwrap();
    assert_eq!(restored.slug, "oak-table");

    let rename: UpdateProductRequest = serde_json::from_value(json!({ "name": "Oak Table " })).unwrap();
    let unchanged = products.update(second.id, &rename).await.unwrap();
    assert_eq!(unchanged.slug, "oak-table-1");
}

#[sqlx::test(migrations = "./migrations")]
async fn checkout_takes_stock_and_cancel_returns_only_what_was_taken(pool: PgPool) {
    let user = customer(&pool, "ani@example.com").await;
    let tracked = product(&pool, "TRACKED", json!({ "stock_quantity": 10 })).await;
    let backordered = product(&pool, "BACKORDER", json!({ "stock_quantity": 3, "allow_backorder": true })).await;

    let detail = order_of(&pool, &user, &[(&tracked, 2), (&backordered, 5)]).await;
    assert_eq!(stock_of(&pool, &tracked).await, 8);
    assert_eq!(stock_of(&pool, &backordered).await, 3);
    assert!(CartRepo::new(pool.clone()).find(&CartOwner::User(user.id)).await.unwrap().is_none());

    let order = OrderRepo::new(pool.clone())
        .cancel(detail.order.id, Some(user.id), Some("ordered twice".into()))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
    assert_eq!(order.payment_status, OrderPaymentStatus::Failed);
    assert_eq!(stock_of(&pool, &tracked).await, 10);
    assert_eq!(stock_of(&pool, &backordered).await, 3);
}

#[sqlx::test(migrations = "./migrations")]
async fn checkout_rolls_back_when_stock_is_gone(pool: PgPool) {
    let user = customer(&pool, "ani@example.com").await;
    let lamp = product(&pool, "LAMP", json!({ "stock_quantity": 2 })).await;
    let carts = CartRepo::new(pool.clone());
    let products = ProductRepo::new(pool.clone());

    carts
        .add_item(&CartOwner::User(user.id), lamp.id, 2, json!({}), Utc::now())
        .await
        .unwrap();
    products.adjust_stock(lamp.id, -1).await.unwrap();

    let err = OrderRepo::new(pool.clone()).place_order(&user, &checkout(), 24).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(stock_of(&pool, &lamp).await, 1);
    let view = carts.view(&CartOwner::User(user.id)).await.unwrap();
    assert_eq!(view.totals.item_count, 2);
    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders").fetch_one(&pool).await.unwrap();
    assert_eq!(orders, 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn overdue_payments_expire_and_cascade(pool: PgPool) {
    let user = customer(&pool, "ani@example.com").await;
    let verifier = admin(&pool).await;
    let desk = product(&pool, "DESK", json!({})).await;
    let detail = order_of(&pool, &user, &[(&desk, 1)]).await;
    let payments = PaymentRepo::new(pool.clone());

    assert!(payments.expire_overdue(Utc::now()).await.unwrap().is_empty());

    let expired = payments.expire_overdue(Utc::now() + Duration::hours(25)).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].status, PaymentStatus::Expired);

    let order = OrderRepo::new(pool.clone()).find(detail.order.id).await.unwrap();
    assert_eq!(order.payment_status, OrderPaymentStatus::Expired);

    let err = payments.verify(expired[0].id, &verifier).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
}

#[sqlx::test(migrations = "./migrations")]
async fn verify_marks_order_paid(pool: PgPool) {
    let user = customer(&pool, "ani@example.com").await;
    let verifier = admin(&pool).await;
    let desk = product(&pool, "DESK", json!({})).await;
    let detail = order_of(&pool, &user, &[(&desk, 1)]).await;

    let (payment, order) = PaymentRepo::new(pool.clone())
        .verify(detail.payments[0].id, &verifier)
        .await
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Paid);
    assert_eq!(payment.verified_by, Some(verifier.id));
    assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
}

#[sqlx::test(migrations = "./migrations")]
async fn stock_adjustment_rejects_overflow(pool: PgPool) {
    let chair = product(&pool, "CHAIR", json!({ "stock_quantity": 5 })).await;
    let err = ProductRepo::new(pool.clone())
        .adjust_stock(chair.id, i32::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(fields) if fields.contains_key("change")));
    assert_eq!(stock_of(&pool, &chair).await, 5);
}

#[sqlx::test(migrations = "./migrations")]
async fn update_can_clear_nullable_fields(pool: PgPool) {
    let now = Utc::now();
    let sale = product(
        &pool,
        "SALE",
        json!({
            "description": "walnut veneer",
            "sale_type": "discount",
            "discount_percentage": "20",
            "discount_starts_at": (now - Duration::days(2)).to_rfc3339(),
            "discount_ends_at": (now - Duration::days(1)).to_rfc3339(),
        }),
    )
    .await;
    assert!(!sale.has_active_discount(now));

    let req: UpdateProductRequest =
        serde_json::from_value(json!({ "discount_ends_at": null, "description": null })).unwrap();
    let updated = ProductRepo::new(pool.clone()).update(sale.id, &req).await.unwrap();

    assert_eq!(updated.discount_ends_at, None);
    assert_eq!(updated.description, None);
    assert_eq!(updated.discount_starts_at, sale.discount_starts_at);
    assert!(updated.has_active_discount(now));
}

#[sqlx::test(migrations = "./migrations")]
async fn price_filters_use_the_discounted_price(pool: PgPool) {
    let discounted = product(
        &pool,
        "HALF",
        json!({ "price": "1000", "sale_type": "discount", "discount_percentage": "50" }),
    )
    .await;
    let full = product(&pool, "FULL", json!({ "price": "700" })).await;

    let filter = ProductFilter {
        max_price: Some(dec!(600)),
        ..Default::default()
    };
    let page = ProductRepo::new(pool.clone()).list_shop(&filter, Utc::now()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.data[0].product.id, discounted.id);
    assert_eq!(page.data[0].final_price, dec!(500));

    let filter = ProductFilter {
        sort: ProductSort::PriceAsc,
        ..Default::default()
    };
    let page = ProductRepo::new(pool.clone()).list_shop(&filter, Utc::now()).await.unwrap();
    let ids: Vec<_> = page.data.iter().map(|p| p.product.id).collect();
    assert_eq!(ids, vec![discounted.id, full.id]);
}
