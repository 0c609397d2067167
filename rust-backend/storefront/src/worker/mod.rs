pub mod payment_expiration_worker;
