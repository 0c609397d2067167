use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use super::{Order, OrderPaymentStatus, User, UserRole};
use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    BankTransfer,
    CashOnDelivery,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Expired,
}

impl PaymentStatus {
    /// Payment status the parent order mirrors.
    pub fn for_order(self) -> OrderPaymentStatus {
        match self {
            PaymentStatus::Pending => OrderPaymentStatus::Pending,
            PaymentStatus::Paid => OrderPaymentStatus::Paid,
            PaymentStatus::Failed => OrderPaymentStatus::Failed,
            PaymentStatus::Expired => OrderPaymentStatus::Expired,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub payment_number: String,
    pub order_id: Uuid,
    pub method: PaymentMethod,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub proof_url: Option<String>,
    pub notes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Pending payment covering the whole order. Bank transfers expire, cash on delivery does not.
    pub fn for_order(order: &Order, method: PaymentMethod, expiry_hours: i64, now: DateTime<Utc>) -> Self {
        let expires_at = match method {
            PaymentMethod::BankTransfer => Some(now + Duration::hours(expiry_hours)),
            PaymentMethod::CashOnDelivery => None,
        };
        Self {
            id: Uuid::new_v4(),
            payment_number: crate::numbering::payment_number(now),
            order_id: order.id,
            method,
            amount: order.total,
            status: PaymentStatus::Pending,
            proof_url: None,
            notes: None,
            expires_at,
            paid_at: None,
            verified_at: None,
            verified_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn ensure_pending(&self, action: &str) -> Result<(), AppError> {
        if self.status != PaymentStatus::Pending {
            return Err(AppError::invalid_state(format!(
                "payment {} is already {} and cannot be {}",
                self.payment_number,
                self.status.as_str(),
                action
            )));
        }
        Ok(())
    }

    fn ensure_verifier(verifier: &User) -> Result<(), AppError> {
        if verifier.role != UserRole::Admin || !verifier.is_active {
            return Err(AppError::Forbidden("only administrators can verify payments"));
        }
        Ok(())
    }

    pub fn mark_paid(&mut self, verifier: &User, now: DateTime<Utc>) -> Result<(), AppError> {
        Self::ensure_verifier(verifier)?;
        self.ensure_pending("marked paid")?;
        self.status = PaymentStatus::Paid;
        self.paid_at = Some(now);
        self.verified_at = Some(now);
        self.verified_by = Some(verifier.id);
        Ok(())
    }

    pub fn mark_failed(&mut self, verifier: &User, notes: Option<String>, now: DateTime<Utc>) -> Result<(), AppError> {
        Self::ensure_verifier(verifier)?;
        self.ensure_pending("rejected")?;
        self.status = PaymentStatus::Failed;
        self.verified_at = Some(now);
        self.verified_by = Some(verifier.id);
        if notes.is_some() {
            self.notes = notes;
        }
        Ok(())
    }

    pub fn mark_expired(&mut self) -> Result<(), AppError> {
        self.ensure_pending("expired")?;
        self.status = PaymentStatus::Expired;
        Ok(())
    }

    pub fn attach_proof(&mut self, url: String) -> Result<(), AppError> {
        self.ensure_pending("updated")?;
        if self.method != PaymentMethod::BankTransfer {
            return Err(AppError::invalid_state("transfer proof only applies to bank transfers"));
        }
        self.proof_url = Some(url);
        Ok(())
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pending && self.expires_at.map_or(false, |at| at < now)
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UploadProofRequest {
    #[validate(length(min = 1, message = "file name is required"))]
    pub filename: String,
    #[validate(length(min = 1, message = "proof image is required"))]
    pub content_base64: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectPaymentRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PaymentEvent {
    pub event_type: String,
    pub payment_id: Uuid,
    pub payment_number: String,
    pub order_id: Uuid,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub verified_by: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn new(event_type: &str, payment: &Payment) -> Self {
        Self {
            event_type: event_type.to_string(),
            payment_id: payment.id,
            payment_number: payment.payment_number.clone(),
            order_id: payment.order_id,
            status: payment.status,
            amount: payment.amount,
            verified_by: payment.verified_by,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{order, user};
    use crate::models::OrderStatus;

    fn pending(method: PaymentMethod) -> Payment {
        Payment::for_order(&order(OrderStatus::Pending), method, 24, Utc::now())
    }

    #[test]
    fn bank_transfer_expires_but_cod_does_not() {
        let now = Utc::now();
        let o = order(OrderStatus::Pending);
        let transfer = Payment::for_order(&o, PaymentMethod::BankTransfer, 24, now);
        let cod = Payment::for_order(&o, PaymentMethod::CashOnDelivery, 24, now);

        assert_eq!(transfer.expires_at, Some(now + Duration::hours(24)));
        assert_eq!(cod.expires_at, None);
        assert_eq!(transfer.amount, o.total);
        assert!(transfer.payment_number.starts_with("PAY-"));
    }

    #[test]
    fn mark_paid_stamps_verifier_and_times() {
        let admin = user(UserRole::Admin);
        let now = Utc::now();
        let mut p = pending(PaymentMethod::BankTransfer);

        p.mark_paid(&admin, now).unwrap();

        assert_eq!(p.status, PaymentStatus::Paid);
        assert_eq!(p.paid_at, Some(now));
        assert_eq!(p.verified_at, Some(now));
        assert_eq!(p.verified_by, Some(admin.id));
        assert_eq!(p.status.for_order(), OrderPaymentStatus::Paid);
    }

    #[test]
    fn customers_cannot_verify() {
        let customer = user(UserRole::Customer);
        let mut p = pending(PaymentMethod::BankTransfer);
        assert!(matches!(p.mark_paid(&customer, Utc::now()), Err(AppError::Forbidden(_))));
        assert_eq!(p.status, PaymentStatus::Pending);
        assert_eq!(p.verified_by, None);
    }

    #[test]
    fn only_pending_payments_transition() {
        let admin = user(UserRole::Admin);
        let now = Utc::now();

        let mut paid = pending(PaymentMethod::BankTransfer);
        paid.mark_paid(&admin, now).unwrap();
        assert!(matches!(paid.mark_failed(&admin, None, now), Err(AppError::InvalidState(_))));
        assert!(matches!(paid.mark_expired(), Err(AppError::InvalidState(_))));
        assert!(matches!(paid.mark_paid(&admin, now), Err(AppError::InvalidState(_))));

        let mut expired = pending(PaymentMethod::BankTransfer);
        expired.mark_expired().unwrap();
        assert_eq!(expired.status.for_order(), OrderPaymentStatus::Expired);
        assert!(expired.mark_paid(&admin, now).is_err());
    }

    #[test]
    fn rejection_keeps_notes() {
        let admin = user(UserRole::Admin);
        let mut p = pending(PaymentMethod::BankTransfer);
        p.mark_failed(&admin, Some("amount mismatch".into()), Utc::now()).unwrap();
        assert_eq!(p.status, PaymentStatus::Failed);
        assert_eq!(p.notes.as_deref(), Some("amount mismatch"));
        assert_eq!(p.status.for_order(), OrderPaymentStatus::Failed);
    }

    #[test]
    fn overdue_only_when_pending_and_past_expiry() {
        let mut p = pending(PaymentMethod::BankTransfer);
        let later = Utc::now() + Duration::hours(25);
        assert!(!p.is_overdue(Utc::now()));
        assert!(p.is_overdue(later));
        p.mark_expired().unwrap();
        assert!(!p.is_overdue(later));
        assert!(!pending(PaymentMethod::CashOnDelivery).is_overdue(later));
    }

    #[test]
    fn proof_only_for_pending_transfers() {
        let mut cod = pending(PaymentMethod::CashOnDelivery);
        assert!(cod.attach_proof("/storage/payment-proofs/a.jpg".into()).is_err());

        let mut transfer = pending(PaymentMethod::BankTransfer);
        transfer.attach_proof("/storage/payment-proofs/a.jpg".into()).unwrap();
        assert!(transfer.proof_url.is_some());
    }
}
