use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductReview {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub order_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub is_approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReviewWithAuthor {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub review: ProductReview,
    pub author_name: String,
    pub product_name: String,
}

/// Rating aggregates stored on the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatingSummary {
    pub average_rating: Decimal,
    pub review_count: i32,
}

impl RatingSummary {
    /// Mean of `ratings` rounded to two places; zero when there are none.
    pub fn from_ratings(ratings: &[i16]) -> Self {
        if ratings.is_empty() {
            return Self {
                average_rating: Decimal::ZERO,
                review_count: 0,
            };
        }
        let total: i64 = ratings.iter().map(|r| i64::from(*r)).sum();
        let average = Decimal::from(total) / Decimal::from(ratings.len());
        Self {
            average_rating: average.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
            review_count: ratings.len() as i32,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitReviewRequest {
    /// Purchase the review belongs to. Defaults to the latest fulfilled order
    /// containing the product that has not been reviewed yet.
    pub order_id: Option<Uuid>,
    #[validate(range(min = 1, max = 5, message = "rating must be between 1 and 5"))]
    pub rating: i16,
    #[validate(length(max = 2000, message = "comment is too long"))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Pending,
    Approved,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewFilter {
    pub state: Option<ReviewState>,
    pub product_id: Option<Uuid>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReviewEvent {
    pub event_type: String,
    pub review_id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub timestamp: DateTime<Utc>,
}

impl ReviewEvent {
    pub fn new(event_type: &str, review: &ProductReview) -> Self {
        Self {
            event_type: event_type.to_string(),
            review_id: review.id,
            product_id: review.product_id,
            user_id: review.user_id,
            rating: review.rating,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn no_ratings_means_zero() {
        let summary = RatingSummary::from_ratings(&[]);
        assert_eq!(summary.average_rating, Decimal::ZERO);
        assert_eq!(summary.review_count, 0);
    }

    #[test]
    fn mean_is_rounded_to_two_places() {
        let summary = RatingSummary::from_ratings(&[5, 4, 4]);
        assert_eq!(summary.average_rating, dec!(4.33));
        assert_eq!(summary.review_count, 3);

        let summary = RatingSummary::from_ratings(&[5, 4, 4, 4, 4, 4]);
        assert_eq!(summary.average_rating, dec!(4.17));
    }

    #[test]
    fn rating_bounds_are_validated() {
        for (rating, ok) in [(0, false), (1, true), (5, true), (6, false)] {
            let req = SubmitReviewRequest { order_id: None, rating, comment: None };
            assert_eq!(req.validate().is_ok(), ok, "rating {}", rating);
        }
    }
}
