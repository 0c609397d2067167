use actix_web::middleware::Logger;
use actix_web::{App, HttpServer};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use storefront::config::Config;
use storefront::db::{self, PaymentRepo};
use storefront::redis_pub::RedisPublisher;
use storefront::worker::payment_expiration_worker::start_payment_expiration_worker;
use storefront::AppState;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")))
        .init();

    let config = Config::from_env()?;

    let pool = db::get_db_pool(&config.database_url, config.db_max_connections).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis_pub = match config.redis_url.as_deref() {
        Some(url) => RedisPublisher::new(url).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "invalid REDIS_URL, continuing without event publishing");
            RedisPublisher::new_noop()
        }),
        None => {
            tracing::warn!("no REDIS_URL configured, using no-op publisher");
            RedisPublisher::new_noop()
        }
    };

    start_payment_expiration_worker(
        PaymentRepo::new(pool.clone()),
        redis_pub.clone(),
        Duration::from_secs(config.payment_sweep_interval_secs.max(1)),
    );

    let bind_addr = config.bind_addr();
    let state = AppState::new(pool, config, redis_pub)?;

    tracing::info!(%bind_addr, "storefront service starting");

    HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .wrap(Logger::default())
            .configure(move |cfg| storefront::configure(cfg, &state))
    })
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
