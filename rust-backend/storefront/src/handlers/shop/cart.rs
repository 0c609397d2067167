use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::db::CartRepo;
use crate::error::AppError;
use crate::handlers::validated;
use crate::middleware::MaybeUser;
use crate::models::{AddCartItemRequest, CartOwner, UpdateCartItemRequest};
use crate::session;
use crate::shipping::{parcel_weight, RateRequest, ShippingClient};

async fn cart_response(
    carts: &CartRepo,
    owner: &CartOwner,
    issued: Option<String>,
    created: bool,
) -> Result<HttpResponse, AppError> {
    let view = carts.view(owner).await?;
    let resp = if created {
        HttpResponse::Created().json(view)
    } else {
        HttpResponse::Ok().json(view)
    };
    Ok(session::attach(resp, issued))
}

pub async fn show(carts: web::Data<CartRepo>, user: MaybeUser, req: HttpRequest) -> Result<HttpResponse, AppError> {
    let (owner, issued) = session::cart_owner(user.0.as_ref(), &req);
    cart_response(&carts, &owner, issued, false).await
}

pub async fn add_item(
    carts: web::Data<CartRepo>,
    user: MaybeUser,
    req: HttpRequest,
    body: web::Json<AddCartItemRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let (owner, issued) = session::cart_owner(user.0.as_ref(), &req);
    let options = Value::Object(body.options.unwrap_or_default());

    carts
        .add_item(&owner, body.product_id, body.quantity, options, Utc::now())
        .await?;
    cart_response(&carts, &owner, issued, true).await
}

pub async fn update_item(
    carts: web::Data<CartRepo>,
    user: MaybeUser,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<UpdateCartItemRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let (owner, issued) = session::cart_owner(user.0.as_ref(), &req);
    carts.update_item(&owner, path.into_inner(), body.quantity).await?;
    cart_response(&carts, &owner, issued, false).await
}

pub async fn remove_item(
    carts: web::Data<CartRepo>,
    user: MaybeUser,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let (owner, issued) = session::cart_owner(user.0.as_ref(), &req);
    carts.remove_item(&owner, path.into_inner()).await?;
    cart_response(&carts, &owner, issued, false).await
}

pub async fn clear(carts: web::Data<CartRepo>, user: MaybeUser, req: HttpRequest) -> Result<HttpResponse, AppError> {
    let (owner, issued) = session::cart_owner(user.0.as_ref(), &req);
    carts.clear(&owner).await?;
    cart_response(&carts, &owner, issued, false).await
}

pub async fn shipping_rates(
    carts: web::Data<CartRepo>,
    shipping: web::Data<ShippingClient>,
    user: MaybeUser,
    req: HttpRequest,
    body: web::Json<RateRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let (owner, issued) = session::cart_owner(user.0.as_ref(), &req);
    let lines = match carts.find(&owner).await? {
        Some(cart) => carts.lines(cart.id).await?,
        None => Vec::new(),
    };

    let weight = parcel_weight(&lines);
    let rates = shipping.rates(&body.destination_district_id, weight).await?;
    Ok(session::attach(HttpResponse::Ok().json(rates), issued))
}
