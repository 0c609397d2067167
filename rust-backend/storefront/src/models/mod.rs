mod address;
mod cart;
mod category;
mod notification;
mod order;
mod payment;
mod product;
mod promo_banner;
mod review;
mod setting;
mod subscriber;
mod upload;
mod user;
mod wishlist;

#[cfg(test)]
pub mod fixtures;

pub use address::*;
pub use cart::*;
pub use category::*;
pub use notification::*;
pub use order::*;
pub use payment::*;
pub use product::*;
pub use promo_banner::*;
pub use review::*;
pub use setting::*;
pub use subscriber::*;
pub use upload::*;
pub use user::*;
pub use wishlist::*;

use serde::{Deserialize, Serialize};

/// Tells an absent field (`None`) from an explicit `null` (`Some(None)`) in patch requests.
pub(crate) mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer).map(Some)
    }
}

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 48;

/// Normalised page/per_page pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub per_page: i64,
}

impl Page {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    /// Saturates for absurd page numbers; such a page is simply empty.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// `?page=&per_page=` query string.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.per_page)
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub last_page: i64,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, page: Page, total: i64) -> Self {
        let last_page = ((total + page.per_page - 1) / page.per_page).max(1);
        Self {
            data,
            page: page.page,
            per_page: page.per_page,
            total,
            last_page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_is_clamped() {
        assert_eq!(Page::new(None, None), Page { page: 1, per_page: DEFAULT_PER_PAGE });
        assert_eq!(Page::new(Some(0), Some(500)), Page { page: 1, per_page: MAX_PER_PAGE });
        assert_eq!(Page::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn huge_page_offset_saturates() {
        let page = Page::new(Some(i64::MAX), Some(20));
        assert_eq!(page.offset(), i64::MAX);
        assert_eq!(PageQuery { page: Some(i64::MAX), per_page: None }.page().offset(), i64::MAX);
    }

    #[test]
    fn last_page_rounds_up() {
        let page = Page::new(Some(1), Some(10));
        assert_eq!(Paginated::new(Vec::<u8>::new(), page, 0).last_page, 1);
        assert_eq!(Paginated::new(Vec::<u8>::new(), page, 21).last_page, 3);
    }
}
