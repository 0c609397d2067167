use actix_web::{web, HttpResponse};
use chrono::Utc;

use crate::db::{CategoryRepo, ProductRepo, ReviewRepo};
use crate::error::AppError;
use crate::models::{CategoryWithProducts, ProductDetail, ProductFilter};

const RELATED_LIMIT: i64 = 4;
const REVIEW_LIMIT: i64 = 20;

pub async fn list_products(
    products: web::Data<ProductRepo>,
    filter: web::Query<ProductFilter>,
) -> Result<HttpResponse, AppError> {
    let page = products.list_shop(&filter, Utc::now()).await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn show_product(
    products: web::Data<ProductRepo>,
    categories: web::Data<CategoryRepo>,
    reviews: web::Data<ReviewRepo>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let now = Utc::now();
    let product = products.find_shop_by_slug(&path).await?;

    let images = products.images(product.id).await?;
    let category = match product.category_id {
        Some(id) => categories.find_optional(id).await?,
        None => None,
    };
    let reviews = reviews.approved_for_product(product.id, REVIEW_LIMIT).await?;
    let related = products
        .related(&product, RELATED_LIMIT)
        .await?
        .into_iter()
        .map(|p| p.priced(now))
        .collect();

    Ok(HttpResponse::Ok().json(ProductDetail {
        product: product.priced(now),
        images,
        category,
        reviews,
        related,
    }))
}

pub async fn list_categories(categories: web::Data<CategoryRepo>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(categories.active_tree().await?))
}

pub async fn show_category(
    categories: web::Data<CategoryRepo>,
    products: web::Data<ProductRepo>,
    path: web::Path<String>,
    filter: web::Query<ProductFilter>,
) -> Result<HttpResponse, AppError> {
    let category = categories.find_active_by_slug(&path).await?;
    let children = categories.active_children(category.id).await?;

    let mut filter = filter.into_inner();
    filter.category = Some(category.slug.clone());
    let products = products.list_shop(&filter, Utc::now()).await?;

    Ok(HttpResponse::Ok().json(CategoryWithProducts { category, children, products }))
}
