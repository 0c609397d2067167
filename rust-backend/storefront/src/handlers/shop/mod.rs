pub mod addresses;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod home;
pub mod newsletter;
pub mod orders;
pub mod reviews;
pub mod wishlist;
