use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::db::{OrderAction, OrderRepo};
use crate::error::AppError;
use crate::events;
use crate::models::{CancelOrderRequest, OrderEvent, OrderFilter, ShipOrderRequest};
use crate::redis_pub::RedisPublisher;

pub async fn list(orders: web::Data<OrderRepo>, filter: web::Query<OrderFilter>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(orders.list(&filter).await?))
}

pub async fn show(orders: web::Data<OrderRepo>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    let order = orders.find(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(orders.detail(order).await?))
}

async fn apply(
    orders: &OrderRepo,
    redis_pub: &RedisPublisher,
    id: Uuid,
    action: OrderAction,
) -> Result<HttpResponse, AppError> {
    let order = orders.transition(id, action).await?;
    redis_pub.emit(events::ORDER_STATUS_CHANGED, &OrderEvent::new(events::ORDER_STATUS_CHANGED, &order));
    Ok(HttpResponse::Ok().json(order))
}

pub async fn confirm(
    orders: web::Data<OrderRepo>,
    redis_pub: web::Data<RedisPublisher>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    apply(&orders, &redis_pub, path.into_inner(), OrderAction::Confirm).await
}

pub async fn process(
    orders: web::Data<OrderRepo>,
    redis_pub: web::Data<RedisPublisher>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    apply(&orders, &redis_pub, path.into_inner(), OrderAction::Process).await
}

pub async fn ship(
    orders: web::Data<OrderRepo>,
    redis_pub: web::Data<RedisPublisher>,
    path: web::Path<Uuid>,
    body: web::Json<ShipOrderRequest>,
) -> Result<HttpResponse, AppError> {
    let tracking_number = body.into_inner().tracking_number;
    apply(&orders, &redis_pub, path.into_inner(), OrderAction::Ship { tracking_number }).await
}

pub async fn deliver(
    orders: web::Data<OrderRepo>,
    redis_pub: web::Data<RedisPublisher>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    apply(&orders, &redis_pub, path.into_inner(), OrderAction::Deliver).await
}

pub async fn complete(
    orders: web::Data<OrderRepo>,
    redis_pub: web::Data<RedisPublisher>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    apply(&orders, &redis_pub, path.into_inner(), OrderAction::Complete).await
}

pub async fn cancel(
    orders: web::Data<OrderRepo>,
    redis_pub: web::Data<RedisPublisher>,
    path: web::Path<Uuid>,
    body: Option<web::Json<CancelOrderRequest>>,
) -> Result<HttpResponse, AppError> {
    let reason = body.and_then(|b| b.into_inner().reason);
    let order = orders.cancel(path.into_inner(), None, reason).await?;
    redis_pub.emit(events::ORDER_CANCELLED, &OrderEvent::new(events::ORDER_CANCELLED, &order));
    Ok(HttpResponse::Ok().json(order))
}
