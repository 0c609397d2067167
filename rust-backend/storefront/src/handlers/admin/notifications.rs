use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::db::NotificationRepo;
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::NotificationFilter;

pub async fn list(
    notifications: web::Data<NotificationRepo>,
    auth: AuthUser,
    filter: web::Query<NotificationFilter>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(notifications.list(auth.user.id, &filter).await?))
}

pub async fn mark_read(
    notifications: web::Data<NotificationRepo>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(notifications.mark_read(auth.user.id, path.into_inner()).await?))
}
