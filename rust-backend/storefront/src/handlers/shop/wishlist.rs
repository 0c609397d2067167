use actix_web::{web, HttpResponse};
use chrono::Utc;
use uuid::Uuid;

use crate::db::{ProductRepo, WishlistRepo};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{PricedProduct, WishlistToggle};

pub async fn list(wishlist: web::Data<WishlistRepo>, auth: AuthUser) -> Result<HttpResponse, AppError> {
    let now = Utc::now();
    let products: Vec<PricedProduct> = wishlist
        .products(auth.user.id)
        .await?
        .into_iter()
        .map(|p| p.priced(now))
        .collect();
    Ok(HttpResponse::Ok().json(products))
}

pub async fn toggle(
    wishlist: web::Data<WishlistRepo>,
    products: web::Data<ProductRepo>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let product_id = path.into_inner();
    products.find_active(product_id).await?;

    let wishlisted = wishlist.toggle(auth.user.id, product_id).await?;
    Ok(HttpResponse::Ok().json(WishlistToggle { product_id, wishlisted }))
}

pub async fn remove(
    wishlist: web::Data<WishlistRepo>,
    auth: AuthUser,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    wishlist.remove(auth.user.id, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
