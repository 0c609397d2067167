use chrono::{DateTime, Utc};
use uuid::Uuid;

pub const ORDER_PREFIX: &str = "ORD";
pub const PAYMENT_PREFIX: &str = "PAY";

/// Insert attempts before a number collision is reported as an error.
pub const MAX_NUMBER_ATTEMPTS: usize = 3;

pub fn order_number(now: DateTime<Utc>) -> String {
    document_number(ORDER_PREFIX, now)
}

pub fn payment_number(now: DateTime<Utc>) -> String {
    document_number(PAYMENT_PREFIX, now)
}

fn document_number(prefix: &str, now: DateTime<Utc>) -> String {
    let id = Uuid::new_v4().simple().to_string();
    let suffix = id[id.len() - 6..].to_ascii_uppercase();
    format!("{}-{}-{}", prefix, now.format("%Y%m%d"), suffix)
}

/// True when the error is a unique-constraint violation on `constraint`.
pub fn is_unique_violation(err: &sqlx::Error, constraint: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(constraint)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn order_number_has_prefix_date_and_suffix() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 10, 0, 0).unwrap();
        let number = order_number(now);
        let parts: Vec<&str> = number.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "ORD");
        assert_eq!(parts[1], "20260307");
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }

    #[test]
    fn payment_number_uses_its_own_prefix() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap();
        assert!(payment_number(now).starts_with("PAY-20261231-"));
    }

    #[test]
    fn consecutive_numbers_differ() {
        let now = Utc::now();
        assert_ne!(order_number(now), order_number(now));
    }

    #[test]
    fn non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound, "orders_order_number_key"));
    }
}
