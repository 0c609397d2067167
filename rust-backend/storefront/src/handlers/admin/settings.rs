use actix_web::{web, HttpResponse};

use crate::db::SettingRepo;
use crate::error::AppError;
use crate::models::{SettingGroup, GENERAL_GROUP, PAYMENT_GROUP, SHIPPING_GROUP};

const GROUPS: [&str; 3] = [GENERAL_GROUP, PAYMENT_GROUP, SHIPPING_GROUP];

fn known_group(name: &str) -> Result<&'static str, AppError> {
    GROUPS
        .iter()
        .find(|g| **g == name)
        .copied()
        .ok_or(AppError::NotFound("settings group"))
}

pub async fn show(settings: web::Data<SettingRepo>, path: web::Path<String>) -> Result<HttpResponse, AppError> {
    let group = known_group(&path)?;
    Ok(HttpResponse::Ok().json(settings.group(group).await?))
}

pub async fn update(
    settings: web::Data<SettingRepo>,
    path: web::Path<String>,
    body: web::Json<SettingGroup>,
) -> Result<HttpResponse, AppError> {
    let group = known_group(&path)?;
    if let Some(key) = body.keys().find(|k| k.trim().is_empty()) {
        return Err(AppError::field(key, "setting keys must not be empty"));
    }

    let updated = settings.set_many(group, &body).await?;
    tracing::info!(group, keys = body.len(), "settings updated");
    Ok(HttpResponse::Ok().json(updated))
}
