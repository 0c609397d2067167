use actix_web::{web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::db::PaymentRepo;
use crate::error::AppError;
use crate::events;
use crate::middleware::AuthUser;
use crate::models::{PaymentEvent, PaymentFilter, RejectPaymentRequest};
use crate::redis_pub::RedisPublisher;

pub async fn list(payments: web::Data<PaymentRepo>, filter: web::Query<PaymentFilter>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(payments.list(&filter).await?))
}

pub async fn verify(
    payments: web::Data<PaymentRepo>,
    redis_pub: web::Data<RedisPublisher>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let (payment, order) = payments.verify(path.into_inner(), &auth.user).await?;
    redis_pub.emit(events::PAYMENT_PAID, &PaymentEvent::new(events::PAYMENT_PAID, &payment));
    Ok(HttpResponse::Ok().json(json!({ "payment": payment, "order": order })))
}

pub async fn reject(
    payments: web::Data<PaymentRepo>,
    redis_pub: web::Data<RedisPublisher>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: Option<web::Json<RejectPaymentRequest>>,
) -> Result<HttpResponse, AppError> {
    let notes = body.and_then(|b| b.into_inner().notes);
    let (payment, order) = payments.reject(path.into_inner(), &auth.user, notes).await?;
    redis_pub.emit(events::PAYMENT_FAILED, &PaymentEvent::new(events::PAYMENT_FAILED, &payment));
    Ok(HttpResponse::Ok().json(json!({ "payment": payment, "order": order })))
}
