use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::db::ReviewRepo;
use crate::error::AppError;
use crate::events;
use crate::models::{ReviewEvent, ReviewFilter};
use crate::redis_pub::RedisPublisher;

pub async fn list(reviews: web::Data<ReviewRepo>, filter: web::Query<ReviewFilter>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(reviews.list(&filter).await?))
}

pub async fn approve(
    reviews: web::Data<ReviewRepo>,
    redis_pub: web::Data<RedisPublisher>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let review = reviews.approve(path.into_inner()).await?;
    redis_pub.emit(events::REVIEW_APPROVED, &ReviewEvent::new(events::REVIEW_APPROVED, &review));
    Ok(HttpResponse::Ok().json(review))
}

pub async fn reject(reviews: web::Data<ReviewRepo>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    reviews.reject(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
