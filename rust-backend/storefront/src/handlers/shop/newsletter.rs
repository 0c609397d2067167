use actix_web::{web, HttpResponse};

use crate::db::SubscriberRepo;
use crate::error::AppError;
use crate::handlers::validated;
use crate::models::SubscribeRequest;

pub async fn subscribe(
    subscribers: web::Data<SubscriberRepo>,
    body: web::Json<SubscribeRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let subscriber = subscribers.subscribe(&body.normalized_email()).await?;
    Ok(HttpResponse::Ok().json(subscriber))
}

pub async fn unsubscribe(
    subscribers: web::Data<SubscriberRepo>,
    body: web::Json<SubscribeRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let subscriber = subscribers.unsubscribe(&body.normalized_email()).await?;
    Ok(HttpResponse::Ok().json(subscriber))
}
