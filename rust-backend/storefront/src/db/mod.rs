mod address;
mod banner;
mod cart;
mod category;
mod notification;
mod order;
mod payment;
mod product;
mod review;
mod setting;
mod subscriber;
mod user;
mod wishlist;

pub use address::AddressRepo;
pub use banner::BannerRepo;
pub use cart::CartRepo;
pub use category::CategoryRepo;
pub use notification::NotificationRepo;
pub use order::{OrderAction, OrderRepo};
pub use payment::PaymentRepo;
pub use product::ProductRepo;
pub use review::ReviewRepo;
pub use setting::SettingRepo;
pub use subscriber::SubscriberRepo;
pub use user::UserRepo;
pub use wishlist::WishlistRepo;

use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::{PgPool, Postgres};

type PgQueryAs<'q, O> = sqlx::query::QueryAs<'q, Postgres, O, PgArguments>;

pub async fn get_db_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// `%term%` for ILIKE, or `None` when the term is blank.
fn like_pattern(term: Option<&str>) -> Option<String> {
    term.map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("%{}%", t.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")))
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(Some(" sofa ")).as_deref(), Some("%sofa%"));
        assert_eq!(like_pattern(Some("50%")).as_deref(), Some("%50\\%%"));
        assert_eq!(like_pattern(Some("   ")), None);
        assert_eq!(like_pattern(None), None);
    }
}
