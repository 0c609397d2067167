pub mod admin;
pub mod auth;
pub mod health;
pub mod shop;

use crate::error::AppError;
use validator::Validate;

/// Runs the `validator` rules of a request body.
pub(crate) fn validated<T: Validate>(body: T) -> Result<T, AppError> {
    body.validate()?;
    Ok(body)
}
