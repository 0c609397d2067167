use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use validator::Validate;

use crate::config::ShippingConfig;
use crate::error::AppError;
use crate::models::CartLine;

/// Couriers price at least one kilogram.
pub const MIN_WEIGHT_GRAMS: i32 = 1000;

#[derive(Debug, Deserialize, Validate)]
pub struct RateRequest {
    #[validate(length(min = 1, message = "destination district is required"))]
    pub destination_district_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingRate {
    pub courier: String,
    pub service: String,
    pub description: String,
    pub cost: Decimal,
    pub etd: String,
}

#[derive(Debug, Deserialize)]
struct RateResponse {
    #[serde(default)]
    data: Vec<RemoteRate>,
}

#[derive(Debug, Deserialize)]
struct RemoteRate {
    code: String,
    service: String,
    #[serde(default)]
    description: String,
    cost: Decimal,
    #[serde(default)]
    etd: String,
}

impl From<RemoteRate> for ShippingRate {
    fn from(rate: RemoteRate) -> Self {
        Self {
            courier: rate.code,
            service: rate.service,
            description: rate.description,
            cost: rate.cost,
            etd: rate.etd,
        }
    }
}

/// Total parcel weight for the cart, never below [`MIN_WEIGHT_GRAMS`].
pub fn parcel_weight(lines: &[CartLine]) -> i32 {
    let total: i64 = lines
        .iter()
        .map(|l| i64::from(l.weight_grams.max(0)) * i64::from(l.item.quantity))
        .sum();
    total.clamp(i64::from(MIN_WEIGHT_GRAMS), i64::from(i32::MAX)) as i32
}

#[derive(Clone)]
pub struct ShippingClient {
    http: Client,
    config: ShippingConfig,
}

impl ShippingClient {
    pub fn new(config: ShippingConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| AppError::Internal(format!("http client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub async fn rates(&self, destination_district_id: &str, weight_grams: i32) -> Result<Vec<ShippingRate>, AppError> {
        if self.config.api_key.is_empty() || self.config.origin_district_id.is_empty() {
            return Err(AppError::Shipping("shipping rates are not configured".into()));
        }

        let url = format!("{}/calculate/domestic-cost", self.config.base_url.trim_end_matches('/'));
        let weight = weight_grams.max(MIN_WEIGHT_GRAMS).to_string();
        let couriers = self.config.couriers.join(":");
        let form = [
            ("origin", self.config.origin_district_id.as_str()),
            ("destination", destination_district_id),
            ("weight", weight.as_str()),
            ("courier", couriers.as_str()),
            ("price", "lowest"),
        ];

        let resp = self
            .http
            .post(&url)
            .header("key", &self.config.api_key)
            .form(&form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "shipping api rejected rate request");
            return Err(AppError::Shipping(format!("rate api answered {}", status)));
        }

        let body: RateResponse = resp.json().await?;
        Ok(body.data.into_iter().map(ShippingRate::from).collect())
    }
}
