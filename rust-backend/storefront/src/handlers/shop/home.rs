use actix_web::{web, HttpResponse};
use chrono::Utc;

use crate::db::{BannerRepo, CategoryRepo, ProductRepo, SettingRepo};
use crate::error::AppError;
use crate::models::{HomePage, PricedProduct, Product, GENERAL_GROUP};

const SECTION_SIZE: i64 = 8;

pub async fn home(
    banners: web::Data<BannerRepo>,
    categories: web::Data<CategoryRepo>,
    products: web::Data<ProductRepo>,
    settings: web::Data<SettingRepo>,
) -> Result<HttpResponse, AppError> {
    let now = Utc::now();
    let priced = |list: Vec<Product>| -> Vec<PricedProduct> { list.into_iter().map(|p| p.priced(now)).collect() };

    let page = HomePage {
        banners: banners.active(now).await?,
        featured_categories: categories.featured(SECTION_SIZE).await?,
        featured_products: priced(products.featured(SECTION_SIZE).await?),
        sale_products: priced(products.on_sale(now, SECTION_SIZE).await?),
        new_arrivals: priced(products.newest(SECTION_SIZE).await?),
        settings: settings.group(GENERAL_GROUP).await?,
    };
    Ok(HttpResponse::Ok().json(page))
}
