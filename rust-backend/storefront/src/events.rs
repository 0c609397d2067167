//! Redis channel names for published domain events.

pub const ORDER_CREATED: &str = "order.created";
pub const ORDER_CANCELLED: &str = "order.cancelled";
pub const ORDER_STATUS_CHANGED: &str = "order.status_changed";
pub const PAYMENT_PAID: &str = "payment.paid";
pub const PAYMENT_FAILED: &str = "payment.failed";
pub const PAYMENT_EXPIRED: &str = "payment.expired";
pub const REVIEW_SUBMITTED: &str = "review.submitted";
pub const REVIEW_APPROVED: &str = "review.approved";
pub const PRODUCT_UPDATED: &str = "product.updated";
