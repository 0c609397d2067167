use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{Category, ImageUpload, PricedProduct, SettingGroup};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PromoBanner {
    pub id: Uuid,
    pub title: String,
    pub subtitle: Option<String>,
    pub image_url: String,
    pub link_url: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PromoBanner {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.starts_at.map_or(true, |start| start <= now)
            && self.ends_at.map_or(true, |end| end >= now)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BannerRequest {
    #[validate(length(min = 1, max = 160, message = "title is required"))]
    pub title: String,
    pub subtitle: Option<String>,
    /// Existing image URL; ignored when an upload is attached.
    pub image_url: Option<String>,
    #[validate(nested)]
    pub image: Option<ImageUpload>,
    pub link_url: Option<String>,
    pub sort_order: Option<i32>,
    pub is_active: Option<bool>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

impl BannerRequest {
    pub fn check_window(&self) -> Result<(), AppError> {
        if let (Some(start), Some(end)) = (self.starts_at, self.ends_at) {
            if end < start {
                return Err(AppError::field("ends_at", "banner must end after it starts"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct HomePage {
    pub banners: Vec<PromoBanner>,
    pub featured_categories: Vec<Category>,
    pub featured_products: Vec<PricedProduct>,
    pub sale_products: Vec<PricedProduct>,
    pub new_arrivals: Vec<PricedProduct>,
    pub settings: SettingGroup,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn banner(starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>) -> PromoBanner {
        let now = Utc::now();
        PromoBanner {
            id: Uuid::new_v4(),
            title: "Sofa week".into(),
            subtitle: None,
            image_url: "/storage/banners/sofa.jpg".into(),
            link_url: None,
            sort_order: 0,
            is_active: true,
            starts_at,
            ends_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn open_window_is_always_active() {
        assert!(banner(None, None).is_active_at(Utc::now()));
    }

    #[test]
    fn active_exactly_inside_window() {
        let now = Utc::now();
        let b = banner(Some(now - Duration::days(1)), Some(now + Duration::days(1)));
        assert!(b.is_active_at(now));
        assert!(b.is_active_at(now - Duration::days(1)));
        assert!(b.is_active_at(now + Duration::days(1)));
        assert!(!b.is_active_at(now - Duration::days(2)));
        assert!(!b.is_active_at(now + Duration::days(2)));
    }

    #[test]
    fn disabled_banner_is_never_active() {
        let mut b = banner(None, None);
        b.is_active = false;
        assert!(!b.is_active_at(Utc::now()));
    }

    #[test]
    fn window_must_be_ordered() {
        let now = Utc::now();
        let req = BannerRequest {
            title: "Clearance".into(),
            subtitle: None,
            image_url: None,
            image: None,
            link_url: None,
            sort_order: None,
            is_active: None,
            starts_at: Some(now),
            ends_at: Some(now - Duration::hours(1)),
        };
        assert!(req.check_window().is_err());
    }
}
