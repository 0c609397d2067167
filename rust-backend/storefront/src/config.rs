use std::env;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct ShippingConfig {
    pub base_url: String,
    pub api_key: String,
    pub origin_district_id: String,
    pub couriers: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub db_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub storage_root: String,
    pub storage_public_url: String,
    pub payment_expiry_hours: i64,
    pub payment_sweep_interval_secs: u64,
    pub shipping: ShippingConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let or_default = |key: &'static str, default: &str| {
            lookup(key).unwrap_or_else(|| default.to_string())
        };

        let couriers = or_default("SHIPPING_COURIERS", "jne:sicepat:jnt")
            .split(':')
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: lookup("REDIS_URL").filter(|v| !v.trim().is_empty()),
            host: or_default("HOST", "0.0.0.0"),
            port: parse_or(&lookup, "SERVICE_PORT", 3005)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 10)?,
            jwt_secret: required("JWT_SECRET")?,
            jwt_ttl_hours: parse_or(&lookup, "JWT_TTL_HOURS", 24)?,
            storage_root: or_default("STORAGE_ROOT", "./storage"),
            storage_public_url: or_default("STORAGE_PUBLIC_URL", "/storage"),
            payment_expiry_hours: parse_or(&lookup, "PAYMENT_EXPIRY_HOURS", 24)?,
            payment_sweep_interval_secs: parse_or(&lookup, "PAYMENT_SWEEP_INTERVAL_SECS", 300)?,
            shipping: ShippingConfig {
                base_url: or_default("SHIPPING_API_BASE_URL", "https://rajaongkir.komerce.id/api/v1"),
                api_key: or_default("SHIPPING_API_KEY", ""),
                origin_district_id: or_default("SHIPPING_ORIGIN_DISTRICT_ID", ""),
                couriers,
            },
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_keys_are_absent() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 3005);
        assert_eq!(config.redis_url, None);
        assert_eq!(config.payment_expiry_hours, 24);
        assert_eq!(config.shipping.couriers, vec!["jne", "sicepat", "jnt"]);
        assert_eq!(config.bind_addr(), "0.0.0.0:3005");
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "secret")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn unparsable_port_is_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("JWT_SECRET", "secret"),
            ("SERVICE_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "SERVICE_PORT", .. }));
    }

    #[test]
    fn courier_list_is_normalised() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/shop"),
            ("JWT_SECRET", "secret"),
            ("SHIPPING_COURIERS", " JNE:pos::TIKI "),
        ]))
        .unwrap();
        assert_eq!(config.shipping.couriers, vec!["jne", "pos", "tiki"]);
    }
}
