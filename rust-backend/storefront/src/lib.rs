pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod numbering;
pub mod redis_pub;
pub mod session;
pub mod shipping;
pub mod slug;
pub mod storage;
pub mod worker;

use actix_web::web;
use sqlx::PgPool;

use crate::config::Config;
use crate::db::{
    AddressRepo, BannerRepo, CartRepo, CategoryRepo, NotificationRepo, OrderRepo, PaymentRepo, ProductRepo,
    ReviewRepo, SettingRepo, SubscriberRepo, UserRepo, WishlistRepo,
};
use crate::error::AppError;
use crate::handlers::{admin, auth as auth_handlers, health, shop};
use crate::middleware::AuthMiddleware;
use crate::redis_pub::RedisPublisher;
use crate::shipping::ShippingClient;
use crate::storage::Storage;

/// Base64 images up to 5 MiB plus the surrounding JSON.
const JSON_LIMIT: usize = 8 * 1024 * 1024;

/// Everything the HTTP layer shares across workers.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub redis_pub: RedisPublisher,
    pub storage: Storage,
    pub shipping: ShippingClient,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config, redis_pub: RedisPublisher) -> Result<Self, AppError> {
        let storage = Storage::new(&config.storage_root, &config.storage_public_url);
        let shipping = ShippingClient::new(config.shipping.clone())?;
        Ok(Self { pool, config, redis_pub, storage, shipping })
    }
}

/// Registers shared data, extractor config and every route.
pub fn configure(cfg: &mut web::ServiceConfig, state: &AppState) {
    let pool = &state.pool;
    let users = UserRepo::new(pool.clone());
    let secret = state.config.jwt_secret.as_str();

    cfg.app_data(web::Data::new(state.config.clone()))
        .app_data(web::Data::new(state.redis_pub.clone()))
        .app_data(web::Data::new(state.storage.clone()))
        .app_data(web::Data::new(state.shipping.clone()))
        .app_data(web::Data::new(users.clone()))
        .app_data(web::Data::new(AddressRepo::new(pool.clone())))
        .app_data(web::Data::new(BannerRepo::new(pool.clone())))
        .app_data(web::Data::new(CartRepo::new(pool.clone())))
        .app_data(web::Data::new(CategoryRepo::new(pool.clone())))
        .app_data(web::Data::new(NotificationRepo::new(pool.clone())))
        .app_data(web::Data::new(OrderRepo::new(pool.clone())))
        .app_data(web::Data::new(PaymentRepo::new(pool.clone())))
        .app_data(web::Data::new(ProductRepo::new(pool.clone())))
        .app_data(web::Data::new(ReviewRepo::new(pool.clone())))
        .app_data(web::Data::new(SettingRepo::new(pool.clone())))
        .app_data(web::Data::new(SubscriberRepo::new(pool.clone())))
        .app_data(web::Data::new(WishlistRepo::new(pool.clone())))
        .app_data(
            web::JsonConfig::default()
                .limit(JSON_LIMIT)
                .error_handler(|err, _| AppError::field("body", err.to_string()).into()),
        )
        .app_data(
            web::QueryConfig::default().error_handler(|err, _| AppError::field("query", err.to_string()).into()),
        )
        .app_data(
            web::PathConfig::default().error_handler(|_, _| AppError::NotFound("resource").into()),
        );

    cfg.route("/health", web::get().to(health::health));

    let optional = || AuthMiddleware::optional(users.clone(), secret);
    let required = || AuthMiddleware::required(users.clone(), secret);

    cfg.service(
        web::scope("/auth")
            .route("/register", web::post().to(auth_handlers::register))
            .route("/login", web::post().to(auth_handlers::login))
            .service(web::resource("/logout").wrap(required()).route(web::post().to(auth_handlers::logout)))
            .service(web::resource("/me").wrap(required()).route(web::get().to(auth_handlers::me))),
    );

    cfg.service(
        web::scope("/shop")
            .route("/home", web::get().to(shop::home::home))
            .route("/products", web::get().to(shop::catalog::list_products))
            .route("/products/{slug}", web::get().to(shop::catalog::show_product))
            .service(
                web::resource("/products/{slug}/reviews")
                    .wrap(required())
                    .route(web::post().to(shop::reviews::submit)),
            )
            .route("/categories", web::get().to(shop::catalog::list_categories))
            .route("/categories/{slug}", web::get().to(shop::catalog::show_category))
            .service(
                web::resource("/cart")
                    .wrap(optional())
                    .route(web::get().to(shop::cart::show))
                    .route(web::delete().to(shop::cart::clear)),
            )
            .service(
                web::resource("/cart/items")
                    .wrap(optional())
                    .route(web::post().to(shop::cart::add_item)),
            )
            .service(
                web::resource("/cart/items/{id}")
                    .wrap(optional())
                    .route(web::put().to(shop::cart::update_item))
                    .route(web::delete().to(shop::cart::remove_item)),
            )
            .service(
                web::resource("/shipping/rates")
                    .wrap(optional())
                    .route(web::post().to(shop::cart::shipping_rates)),
            )
            .service(
                web::resource("/checkout")
                    .wrap(required())
                    .route(web::post().to(shop::checkout::place_order)),
            )
            .service(web::resource("/orders").wrap(required()).route(web::get().to(shop::orders::list)))
            .service(
                web::resource("/orders/{order_number}")
                    .wrap(required())
                    .route(web::get().to(shop::orders::show)),
            )
            .service(
                web::resource("/orders/{order_number}/cancel")
                    .wrap(required())
                    .route(web::post().to(shop::orders::cancel)),
            )
            .service(
                web::resource("/payments/{payment_number}/proof")
                    .wrap(required())
                    .route(web::post().to(shop::orders::upload_proof)),
            )
            .service(web::resource("/wishlist").wrap(required()).route(web::get().to(shop::wishlist::list)))
            .service(
                web::resource("/wishlist/{product_id}")
                    .wrap(required())
                    .route(web::delete().to(shop::wishlist::remove)),
            )
            .service(
                web::resource("/wishlist/{product_id}/toggle")
                    .wrap(required())
                    .route(web::post().to(shop::wishlist::toggle)),
            )
            .service(
                web::resource("/addresses")
                    .wrap(required())
                    .route(web::get().to(shop::addresses::list))
                    .route(web::post().to(shop::addresses::create)),
            )
            .service(
                web::resource("/addresses/{id}")
                    .wrap(required())
                    .route(web::put().to(shop::addresses::update))
                    .route(web::delete().to(shop::addresses::delete)),
            )
            .service(
                web::resource("/addresses/{id}/default")
                    .wrap(required())
                    .route(web::post().to(shop::addresses::set_default)),
            )
            .route("/newsletter/subscribe", web::post().to(shop::newsletter::subscribe))
            .route("/newsletter/unsubscribe", web::post().to(shop::newsletter::unsubscribe)),
    );

    cfg.service(
        web::scope("/admin")
            .wrap(AuthMiddleware::admin(users.clone(), secret))
            .route("/products", web::get().to(admin::products::list))
            .route("/products", web::post().to(admin::products::create))
            .route("/products/{id}", web::get().to(admin::products::show))
            .route("/products/{id}", web::put().to(admin::products::update))
            .route("/products/{id}", web::delete().to(admin::products::delete))
            .route("/products/{id}/restore", web::post().to(admin::products::restore))
            .route("/products/{id}/status", web::post().to(admin::products::change_status))
            .route("/products/{id}/stock", web::post().to(admin::products::adjust_stock))
            .route("/products/{id}/images", web::post().to(admin::products::add_image))
            .route("/products/{id}/images/{image_id}", web::delete().to(admin::products::remove_image))
            .route(
                "/products/{id}/images/{image_id}/primary",
                web::post().to(admin::products::set_primary_image),
            )
            .route("/categories", web::get().to(admin::categories::list))
            .route("/categories", web::post().to(admin::categories::create))
            .route("/categories/{id}", web::put().to(admin::categories::update))
            .route("/categories/{id}", web::delete().to(admin::categories::delete))
            .route("/categories/{id}/restore", web::post().to(admin::categories::restore))
            .route("/orders", web::get().to(admin::orders::list))
            .route("/orders/{id}", web::get().to(admin::orders::show))
            .route("/orders/{id}/confirm", web::post().to(admin::orders::confirm))
            .route("/orders/{id}/process", web::post().to(admin::orders::process))
            .route("/orders/{id}/ship", web::post().to(admin::orders::ship))
            .route("/orders/{id}/deliver", web::post().to(admin::orders::deliver))
            .route("/orders/{id}/complete", web::post().to(admin::orders::complete))
            .route("/orders/{id}/cancel", web::post().to(admin::orders::cancel))
            .route("/payments", web::get().to(admin::payments::list))
            .route("/payments/{id}/verify", web::post().to(admin::payments::verify))
            .route("/payments/{id}/reject", web::post().to(admin::payments::reject))
            .route("/reviews", web::get().to(admin::reviews::list))
            .route("/reviews/{id}/approve", web::post().to(admin::reviews::approve))
            .route("/reviews/{id}", web::delete().to(admin::reviews::reject))
            .route("/banners", web::get().to(admin::banners::list))
            .route("/banners", web::post().to(admin::banners::create))
            .route("/banners/{id}", web::put().to(admin::banners::update))
            .route("/banners/{id}", web::delete().to(admin::banners::delete))
            .route("/settings/{group}", web::get().to(admin::settings::show))
            .route("/settings/{group}", web::put().to(admin::settings::update))
            .route("/subscribers", web::get().to(admin::subscribers::list))
            .route("/notifications", web::get().to(admin::notifications::list))
            .route("/notifications/{id}/read", web::post().to(admin::notifications::mark_read)),
    );
}
