use actix_web::{web, HttpResponse};

use crate::db::SubscriberRepo;
use crate::error::AppError;
use crate::models::SubscriberFilter;

pub async fn list(
    subscribers: web::Data<SubscriberRepo>,
    filter: web::Query<SubscriberFilter>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(subscribers.list(&filter).await?))
}
