pub mod banners;
pub mod categories;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod settings;
pub mod subscribers;
