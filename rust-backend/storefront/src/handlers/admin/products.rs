use actix_web::{web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::db::ProductRepo;
use crate::error::AppError;
use crate::events;
use crate::handlers::validated;
use crate::models::{
    AddImageRequest, AdjustStockRequest, AdminProductFilter, ChangeStatusRequest, CreateProductRequest, Product,
    ProductEvent, UpdateProductRequest,
};
use crate::redis_pub::RedisPublisher;
use crate::storage::{Folder, Storage};

fn announce(redis_pub: &RedisPublisher, product: &Product) {
    redis_pub.emit(events::PRODUCT_UPDATED, &ProductEvent::new(events::PRODUCT_UPDATED, product));
}

pub async fn list(
    products: web::Data<ProductRepo>,
    filter: web::Query<AdminProductFilter>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(products.list_admin(&filter).await?))
}

pub async fn show(products: web::Data<ProductRepo>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    let product = products.find(path.into_inner()).await?;
    let images = products.images(product.id).await?;
    Ok(HttpResponse::Ok().json(json!({ "product": product, "images": images })))
}

pub async fn create(
    products: web::Data<ProductRepo>,
    redis_pub: web::Data<RedisPublisher>,
    body: web::Json<CreateProductRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    body.check_pricing()?;

    let product = products.create(&body).await?;
    announce(&redis_pub, &product);
    Ok(HttpResponse::Created().json(product))
}

pub async fn update(
    products: web::Data<ProductRepo>,
    redis_pub: web::Data<RedisPublisher>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateProductRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let product = products.update(path.into_inner(), &body).await?;
    announce(&redis_pub, &product);
    Ok(HttpResponse::Ok().json(product))
}

pub async fn delete(
    products: web::Data<ProductRepo>,
    redis_pub: web::Data<RedisPublisher>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let product = products.soft_delete(path.into_inner()).await?;
    announce(&redis_pub, &product);
    Ok(HttpResponse::NoContent().finish())
}

pub async fn restore(
    products: web::Data<ProductRepo>,
    redis_pub: web::Data<RedisPublisher>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let product = products.restore(path.into_inner()).await?;
    announce(&redis_pub, &product);
    Ok(HttpResponse::Ok().json(product))
}

pub async fn change_status(
    products: web::Data<ProductRepo>,
    redis_pub: web::Data<RedisPublisher>,
    path: web::Path<Uuid>,
    body: web::Json<ChangeStatusRequest>,
) -> Result<HttpResponse, AppError> {
    let product = products.set_status(path.into_inner(), body.status).await?;
    announce(&redis_pub, &product);
    Ok(HttpResponse::Ok().json(product))
}

pub async fn adjust_stock(
    products: web::Data<ProductRepo>,
    redis_pub: web::Data<RedisPublisher>,
    path: web::Path<Uuid>,
    body: web::Json<AdjustStockRequest>,
) -> Result<HttpResponse, AppError> {
    let product = products.adjust_stock(path.into_inner(), body.change).await?;
    announce(&redis_pub, &product);
    Ok(HttpResponse::Ok().json(product))
}

pub async fn add_image(
    products: web::Data<ProductRepo>,
    storage: web::Data<Storage>,
    path: web::Path<Uuid>,
    body: web::Json<AddImageRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let product = products.find(path.into_inner()).await?;
    if product.deleted_at.is_some() {
        return Err(AppError::NotFound("product"));
    }

    let url = storage
        .save_base64(Folder::Products, &body.filename, &body.content_base64)
        .await?;
    match products.add_image(product.id, &url, body.is_primary.unwrap_or(false)).await {
        Ok(image) => Ok(HttpResponse::Created().json(image)),
        Err(e) => {
            storage.discard(&url).await;
            Err(e.into())
        }
    }
}

pub async fn remove_image(
    products: web::Data<ProductRepo>,
    storage: web::Data<Storage>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (product_id, image_id) = path.into_inner();
    let image = products.remove_image(product_id, image_id).await?;
    storage.discard(&image.url).await;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn set_primary_image(
    products: web::Data<ProductRepo>,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (product_id, image_id) = path.into_inner();
    let image = products.set_primary_image(product_id, image_id).await?;
    Ok(HttpResponse::Ok().json(image))
}
