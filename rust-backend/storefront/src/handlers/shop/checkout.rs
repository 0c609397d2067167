use actix_web::{web, HttpResponse};

use crate::config::Config;
use crate::db::OrderRepo;
use crate::error::AppError;
use crate::events;
use crate::handlers::validated;
use crate::middleware::AuthUser;
use crate::models::{CheckoutRequest, OrderEvent};
use crate::redis_pub::RedisPublisher;

pub async fn place_order(
    orders: web::Data<OrderRepo>,
    redis_pub: web::Data<RedisPublisher>,
    config: web::Data<Config>,
    auth: AuthUser,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    body.check()?;

    let detail = orders
        .place_order(&auth.user, &body, config.payment_expiry_hours)
        .await?;

    tracing::info!(
        order_number = %detail.order.order_number,
        user_id = %auth.user.id,
        total = %detail.order.total,
        "order placed"
    );
    redis_pub.emit(events::ORDER_CREATED, &OrderEvent::new(events::ORDER_CREATED, &detail.order));
    Ok(HttpResponse::Created().json(detail))
}
