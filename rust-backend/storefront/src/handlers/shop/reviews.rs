use actix_web::{web, HttpResponse};

use crate::db::{ProductRepo, ReviewRepo};
use crate::error::AppError;
use crate::events;
use crate::handlers::validated;
use crate::middleware::AuthUser;
use crate::models::{ReviewEvent, SubmitReviewRequest};
use crate::redis_pub::RedisPublisher;

pub async fn submit(
    products: web::Data<ProductRepo>,
    reviews: web::Data<ReviewRepo>,
    redis_pub: web::Data<RedisPublisher>,
    auth: AuthUser,
    path: web::Path<String>,
    body: web::Json<SubmitReviewRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let product = products.find_shop_by_slug(&path).await?;

    let review = reviews.submit(&auth.user, &product, &body).await?;
    redis_pub.emit(events::REVIEW_SUBMITTED, &ReviewEvent::new(events::REVIEW_SUBMITTED, &review));
    Ok(HttpResponse::Created().json(review))
}
