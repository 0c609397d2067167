//! Ready-made rows for unit tests.

use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::{
    CartItem, Order, OrderPaymentStatus, OrderStatus, Product, ProductStatus, SaleType, User, UserRole,
};

pub fn product(price: Decimal, discount_percentage: Decimal, sale_type: SaleType) -> Product {
    let now = Utc::now();
    Product {
        id: Uuid::new_v4(),
        category_id: None,
        sku: "SKU-1".into(),
        name: "Oak Table".into(),
        slug: "oak-table".into(),
        description: None,
        material: Some("oak".into()),
        dimensions: Some("180x90x75 cm".into()),
        weight_grams: 12000,
        price,
        discount_percentage,
        discount_starts_at: None,
        discount_ends_at: None,
        sale_type,
        stock_quantity: 5,
        track_stock: true,
        allow_backorder: false,
        status: ProductStatus::Active,
        is_featured: false,
        average_rating: Decimal::ZERO,
        review_count: 0,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    }
}

pub fn cart_item(cart_id: Uuid, product_id: Uuid, quantity: i32, unit_price: Decimal) -> CartItem {
    let now = Utc::now();
    CartItem {
        id: Uuid::new_v4(),
        cart_id,
        product_id,
        quantity,
        unit_price,
        options: serde_json::json!({}),
        created_at: now,
        updated_at: now,
    }
}

pub fn order(status: OrderStatus) -> Order {
    let now = Utc::now();
    Order {
        id: Uuid::new_v4(),
        order_number: "ORD-20261019-A1B2C3".into(),
        user_id: Uuid::new_v4(),
        status,
        payment_status: OrderPaymentStatus::Pending,
        recipient_name: "Sari".into(),
        phone: "08123456789".into(),
        street: "Jl. Kenanga 5".into(),
        city: "Bandung".into(),
        province: "Jawa Barat".into(),
        postal_code: "40111".into(),
        district_id: Some("23".into()),
        courier: "jne".into(),
        courier_service: "REG".into(),
        shipping_cost: Decimal::from(25000),
        subtotal: Decimal::from(1500000),
        discount_amount: Decimal::ZERO,
        total: Decimal::from(1525000),
        notes: None,
        tracking_number: None,
        cancel_reason: None,
        confirmed_at: None,
        shipped_at: None,
        delivered_at: None,
        completed_at: None,
        cancelled_at: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn user(role: UserRole) -> User {
    let now = Utc::now();
    User {
        id: Uuid::new_v4(),
        email: "staff@example.com".into(),
        password: "$argon2i$v=19$m=4096,t=3,p=1$c2FsdHNhbHQ$hash".into(),
        full_name: "Dewi".into(),
        phone: None,
        role,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
