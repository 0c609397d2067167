use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::db::AddressRepo;
use crate::error::AppError;
use crate::handlers::validated;
use crate::middleware::AuthUser;
use crate::models::AddressRequest;

pub async fn list(addresses: web::Data<AddressRepo>, auth: AuthUser) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(addresses.list(auth.user.id).await?))
}

pub async fn create(
    addresses: web::Data<AddressRepo>,
    auth: AuthUser,
    body: web::Json<AddressRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let address = addresses.create(auth.user.id, &body).await?;
    Ok(HttpResponse::Created().json(address))
}

pub async fn update(
    addresses: web::Data<AddressRepo>,
    auth: AuthUser,
    path: web::Path<Uuid>,
    body: web::Json<AddressRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let address = addresses.update(auth.user.id, path.into_inner(), &body).await?;
    Ok(HttpResponse::Ok().json(address))
}

pub async fn delete(
    addresses: web::Data<AddressRepo>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    addresses.delete(auth.user.id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn set_default(
    addresses: web::Data<AddressRepo>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let address = addresses.set_default(auth.user.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(address))
}
