use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, ResponseError};
use futures::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

use crate::auth::verify_jwt;
use crate::db::UserRepo;
use crate::error::AppError;
use crate::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// A valid token is mandatory.
    Required,
    /// Guests pass through; a presented token must still be valid.
    Optional,
    /// A valid token of an active admin is mandatory.
    Admin,
}

/// The signed-in user together with the token it authenticated with.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

#[derive(Clone)]
pub struct AuthMiddleware {
    users: UserRepo,
    jwt_secret: Rc<str>,
    mode: Mode,
}

impl AuthMiddleware {
    fn with_mode(users: UserRepo, jwt_secret: &str, mode: Mode) -> Self {
        Self { users, jwt_secret: Rc::from(jwt_secret), mode }
    }

    pub fn required(users: UserRepo, jwt_secret: &str) -> Self {
        Self::with_mode(users, jwt_secret, Mode::Required)
    }

    pub fn optional(users: UserRepo, jwt_secret: &str) -> Self {
        Self::with_mode(users, jwt_secret, Mode::Optional)
    }

    pub fn admin(users: UserRepo, jwt_secret: &str) -> Self {
        Self::with_mode(users, jwt_secret, Mode::Admin)
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthMiddlewareService {
            service: Rc::new(service),
            users: self.users.clone(),
            jwt_secret: self.jwt_secret.clone(),
            mode: self.mode,
        }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    users: UserRepo,
    jwt_secret: Rc<str>,
    mode: Mode,
}

fn bearer_token(req: &ServiceRequest) -> Option<String> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

async fn authenticate(users: &UserRepo, secret: &str, token: String, mode: Mode) -> Result<AuthUser, AppError> {
    let claims = verify_jwt(&token, secret)?;

    if users.is_revoked(&token).await? {
        return Err(AppError::Unauthorized("token revoked"));
    }

    let user = users
        .find(claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or(AppError::Unauthorized("user not found"))?;

    if mode == Mode::Admin && !user.is_admin() {
        return Err(AppError::Forbidden("admin access required"));
    }

    Ok(AuthUser { user, token })
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let svc = self.service.clone();
        let users = self.users.clone();
        let secret = self.jwt_secret.clone();
        let mode = self.mode;

        Box::pin(async move {
            let outcome = match (bearer_token(&req), mode) {
                (None, Mode::Optional) => Ok(None),
                (None, _) => Err(AppError::Unauthorized("no token provided")),
                (Some(token), _) => authenticate(&users, &secret, token, mode).await.map(Some),
            };

            match outcome {
                Ok(auth) => {
                    if let Some(auth) = auth {
                        req.extensions_mut().insert(auth);
                    }
                    let res = svc.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                Err(err) => {
                    tracing::debug!(path = %req.path(), error = %err, "request rejected");
                    let resp = err.error_response();
                    Ok(req.into_response(resp).map_into_right_body())
                }
            }
        })
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or(AppError::Unauthorized("authentication required")),
        )
    }
}

/// The signed-in user on routes that also serve guests.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl FromRequest for MaybeUser {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(MaybeUser(req.extensions().get::<AuthUser>().map(|a| a.user.clone()))))
    }
}
