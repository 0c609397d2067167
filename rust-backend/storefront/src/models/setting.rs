use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;

pub const GENERAL_GROUP: &str = "general";
pub const PAYMENT_GROUP: &str = "payment";
pub const SHIPPING_GROUP: &str = "shipping";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub setting_group: String,
    pub updated_at: DateTime<Utc>,
}

/// Settings of one group keyed by name.
pub type SettingGroup = BTreeMap<String, String>;

pub fn group_map(settings: Vec<Setting>) -> SettingGroup {
    settings.into_iter().map(|s| (s.key, s.value)).collect()
}
