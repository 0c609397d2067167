use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct WishlistToggle {
    pub product_id: Uuid,
    pub wishlisted: bool,
}
