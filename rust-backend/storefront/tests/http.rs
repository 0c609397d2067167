use actix_web::http::StatusCode;
use actix_web::{test, App};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;

use storefront::auth::create_jwt;
use storefront::config::Config;
use storefront::models::{User, UserRole};
use storefront::redis_pub::RedisPublisher;
use storefront::AppState;

const SECRET: &str = "test-secret";

fn state() -> AppState {
    let env: HashMap<&str, &str> = [
        ("DATABASE_URL", "postgres://storefront@127.0.0.1:1/unreachable"),
        ("JWT_SECRET", SECRET),
        ("STORAGE_ROOT", "/tmp/storefront-http-tests"),
    ]
    .into_iter()
    .collect();
    let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
    // Never connected: every request below is answered before touching the database.
    let pool = PgPoolOptions::new().connect_lazy(&config.database_url).unwrap();
    AppState::new(pool, config, RedisPublisher::new_noop()).unwrap()
}

macro_rules! app {
    () => {{
        let state = state();
        test::init_service(App::new().configure(move |cfg| storefront::configure(cfg, &state))).await
    }};
}

fn customer() -> User {
    let now = chrono::Utc::now();
    User {
        id: uuid::Uuid::new_v4(),
        email: "ani@example.com".into(),
        password: String::new(),
        full_name: "Ani".into(),
        phone: None,
        role: UserRole::Customer,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

#[actix_web::test]
async fn health_reports_ok() {
    let app = app!();
    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn protected_routes_require_a_token() {
    let app = app!();
    for (method, uri) in [
        ("GET", "/auth/me"),
        ("POST", "/auth/logout"),
        ("POST", "/shop/checkout"),
        ("GET", "/shop/orders"),
        ("GET", "/shop/wishlist"),
        ("GET", "/shop/addresses"),
        ("GET", "/admin/orders"),
        ("GET", "/admin/settings/payment"),
    ] {
        let req = match method {
            "GET" => test::TestRequest::get(),
            _ => test::TestRequest::post(),
        }
        .uri(uri)
        .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "no token provided");
    }
}

#[actix_web::test]
async fn tampered_tokens_are_rejected_even_on_guest_routes() {
    let app = app!();
    let token = create_jwt(&customer(), "another-secret", 1).unwrap();
    for uri in ["/shop/cart", "/admin/products", "/auth/me"] {
        let req = test::TestRequest::get()
            .uri(uri)
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[actix_web::test]
async fn registration_validates_before_saving() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/auth/register")
        .set_json(json!({ "email": "not-an-email", "password": "short", "full_name": "Ani" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["email"][0], "email must be a valid address");
    assert_eq!(body["errors"]["password"][0], "password must be at least 8 characters");
}

#[actix_web::test]
async fn malformed_json_is_a_validation_error() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/auth/login")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{\"email\":")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["body"].is_array());
}

#[actix_web::test]
async fn newsletter_rejects_invalid_email() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/shop/newsletter/subscribe")
        .set_json(json!({ "email": "nope" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn cart_quantity_is_validated_for_guests() {
    let app = app!();
    let req = test::TestRequest::post()
        .uri("/shop/cart/items")
        .set_json(json!({ "product_id": uuid::Uuid::new_v4(), "quantity": 0 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["errors"]["quantity"][0], "quantity must be between 1 and 99");
}

#[actix_web::test]
async fn unknown_routes_are_not_found() {
    let app = app!();
    let resp = test::call_service(&app, test::TestRequest::get().uri("/shop/nowhere").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
