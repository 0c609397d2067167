use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::db::CategoryRepo;
use crate::error::AppError;
use crate::handlers::validated;
use crate::models::{CreateCategoryRequest, UpdateCategoryRequest};
use crate::storage::{Folder, Storage};

#[derive(Debug, Default, Deserialize)]
pub struct CategoryListQuery {
    #[serde(default)]
    pub trashed: bool,
}

pub async fn list(
    categories: web::Data<CategoryRepo>,
    query: web::Query<CategoryListQuery>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(categories.list_admin(query.trashed).await?))
}

pub async fn create(
    categories: web::Data<CategoryRepo>,
    storage: web::Data<Storage>,
    body: web::Json<CreateCategoryRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let image_url = match &body.image {
        Some(upload) => Some(storage.save(Folder::Categories, upload).await?),
        None => None,
    };

    match categories.create(&body, image_url.clone()).await {
        Ok(category) => Ok(HttpResponse::Created().json(category)),
        Err(e) => {
            if let Some(url) = image_url {
                storage.discard(&url).await;
            }
            Err(e)
        }
    }
}

pub async fn update(
    categories: web::Data<CategoryRepo>,
    storage: web::Data<Storage>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCategoryRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let id = path.into_inner();
    let previous = categories.find(id).await?.image_url;

    let image_url = match &body.image {
        Some(upload) => Some(storage.save(Folder::Categories, upload).await?),
        None => None,
    };

    match categories.update(id, &body, image_url.clone()).await {
        Ok(category) => {
            if let Some(previous) = previous.filter(|p| category.image_url.as_ref() != Some(p)) {
                storage.discard(&previous).await;
            }
            Ok(HttpResponse::Ok().json(category))
        }
        Err(e) => {
            if let Some(url) = image_url {
                storage.discard(&url).await;
            }
            Err(e)
        }
    }
}

pub async fn delete(categories: web::Data<CategoryRepo>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    categories.soft_delete(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn restore(categories: web::Data<CategoryRepo>, path: web::Path<Uuid>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(categories.restore(path.into_inner()).await?))
}
