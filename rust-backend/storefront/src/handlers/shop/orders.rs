use actix_web::{web, HttpResponse};

use crate::db::{OrderRepo, PaymentRepo};
use crate::error::AppError;
use crate::events;
use crate::handlers::validated;
use crate::middleware::AuthUser;
use crate::models::{CancelOrderRequest, OrderEvent, PageQuery, UploadProofRequest};
use crate::redis_pub::RedisPublisher;
use crate::storage::{Folder, Storage};

pub async fn list(
    orders: web::Data<OrderRepo>,
    auth: AuthUser,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, AppError> {
    let page = orders.list_for_user(auth.user.id, query.page()).await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn show(
    orders: web::Data<OrderRepo>,
    auth: AuthUser,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let order = orders.find_for_user(auth.user.id, &path).await?;
    Ok(HttpResponse::Ok().json(orders.detail(order).await?))
}

pub async fn cancel(
    orders: web::Data<OrderRepo>,
    redis_pub: web::Data<RedisPublisher>,
    auth: AuthUser,
    path: web::Path<String>,
    body: Option<web::Json<CancelOrderRequest>>,
) -> Result<HttpResponse, AppError> {
    let order = orders.find_for_user(auth.user.id, &path).await?;
    let reason = body.and_then(|b| b.into_inner().reason);

    let order = orders.cancel(order.id, Some(auth.user.id), reason).await?;
    redis_pub.emit(events::ORDER_CANCELLED, &OrderEvent::new(events::ORDER_CANCELLED, &order));
    Ok(HttpResponse::Ok().json(order))
}

pub async fn upload_proof(
    payments: web::Data<PaymentRepo>,
    storage: web::Data<Storage>,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<UploadProofRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let payment = payments.find_for_user(&path, auth.user.id).await?;

    let url = storage
        .save_base64(Folder::PaymentProofs, &body.filename, &body.content_base64)
        .await?;
    let (payment, previous) = match payments.attach_proof(payment, url.clone()).await {
        Ok(result) => result,
        Err(e) => {
            storage.discard(&url).await;
            return Err(e);
        }
    };
    if let Some(previous) = previous {
        storage.discard(&previous).await;
    }

    tracing::info!(payment_number = %payment.payment_number, "payment proof uploaded");
    Ok(HttpResponse::Ok().json(payment))
}
