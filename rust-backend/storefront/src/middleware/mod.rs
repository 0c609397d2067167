pub mod authmiddleware;

pub use authmiddleware::{AuthMiddleware, AuthUser, MaybeUser};
