use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::db::BannerRepo;
use crate::error::AppError;
use crate::handlers::validated;
use crate::models::BannerRequest;
use crate::storage::{Folder, Storage};

pub async fn list(banners: web::Data<BannerRepo>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(banners.list().await?))
}

async fn upload(storage: &Storage, body: &BannerRequest) -> Result<Option<String>, AppError> {
    match &body.image {
        Some(image) => Ok(Some(storage.save(Folder::Banners, image).await?)),
        None => Ok(None),
    }
}

pub async fn create(
    banners: web::Data<BannerRepo>,
    storage: web::Data<Storage>,
    body: web::Json<BannerRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    body.check_window()?;

    let uploaded = upload(&storage, &body).await?;
    let image_url = uploaded
        .clone()
        .or_else(|| body.image_url.clone().filter(|u| !u.trim().is_empty()))
        .ok_or_else(|| AppError::field("image", "a banner image is required"))?;

    match banners.create(&body, &image_url).await {
        Ok(banner) => Ok(HttpResponse::Created().json(banner)),
        Err(e) => {
            if let Some(url) = uploaded {
                storage.discard(&url).await;
            }
            Err(e.into())
        }
    }
}

pub async fn update(
    banners: web::Data<BannerRepo>,
    storage: web::Data<Storage>,
    path: web::Path<Uuid>,
    body: web::Json<BannerRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    body.check_window()?;
    let current = banners.find(path.into_inner()).await?;

    let uploaded = upload(&storage, &body).await?;
    let image_url = uploaded.clone().or_else(|| body.image_url.clone().filter(|u| !u.trim().is_empty()));

    match banners.update(current.id, &body, image_url.as_deref()).await {
        Ok(banner) => {
            if banner.image_url != current.image_url {
                storage.discard(&current.image_url).await;
            }
            Ok(HttpResponse::Ok().json(banner))
        }
        Err(e) => {
            if let Some(url) = uploaded {
                storage.discard(&url).await;
            }
            Err(e)
        }
    }
}

pub async fn delete(
    banners: web::Data<BannerRepo>,
    storage: web::Data<Storage>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let banner = banners.delete(path.into_inner()).await?;
    storage.discard(&banner.image_url).await;
    Ok(HttpResponse::NoContent().finish())
}
