use actix_web::{web, HttpRequest, HttpResponse};
use serde_json::json;

use super::validated;
use crate::auth::{create_jwt, hash_password, verify_password};
use crate::config::Config;
use crate::db::{CartRepo, UserRepo};
use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{AuthResponse, SignInRequest, SignUpRequest, User};
use crate::session;

async fn adopt_guest_cart(carts: &CartRepo, req: &HttpRequest, user: &User) {
    let Some(session_id) = session::session_id(req) else {
        return;
    };
    if let Err(e) = carts.merge_guest(&session_id, user.id).await {
        tracing::error!(user_id = %user.id, error = %e, "guest cart merge failed");
    }
}

pub async fn register(
    users: web::Data<UserRepo>,
    carts: web::Data<CartRepo>,
    config: web::Data<Config>,
    req: HttpRequest,
    body: web::Json<SignUpRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let hash = hash_password(&body.password)?;
    let user = users.create_customer(&body, &hash).await?;
    adopt_guest_cart(&carts, &req, &user).await;

    let token = create_jwt(&user, &config.jwt_secret, config.jwt_ttl_hours)?;
    tracing::info!(user_id = %user.id, "customer registered");
    Ok(HttpResponse::Created().json(AuthResponse { token, user }))
}

pub async fn login(
    users: web::Data<UserRepo>,
    carts: web::Data<CartRepo>,
    config: web::Data<Config>,
    req: HttpRequest,
    body: web::Json<SignInRequest>,
) -> Result<HttpResponse, AppError> {
    let body = validated(body.into_inner())?;
    let user = users
        .find_by_email(&body.email)
        .await?
        .filter(|u| verify_password(&u.password, &body.password))
        .ok_or_else(|| AppError::field("email", "these credentials do not match our records"))?;
    if !user.is_active {
        return Err(AppError::Forbidden("this account has been disabled"));
    }

    adopt_guest_cart(&carts, &req, &user).await;
    let token = create_jwt(&user, &config.jwt_secret, config.jwt_ttl_hours)?;
    Ok(HttpResponse::Ok().json(AuthResponse { token, user }))
}

pub async fn logout(users: web::Data<UserRepo>, auth: AuthUser) -> Result<HttpResponse, AppError> {
    users.revoke_token(&auth.token).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "signed out" })))
}

pub async fn me(auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(auth.user)
}
