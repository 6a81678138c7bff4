use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aquabill_core::{CustomerId, DomainError, DomainResult, InvoiceId, PaymentId, TenantId, UserId};

/// How a payment was collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    MobileMoney,
    Card,
}

/// A collected payment.
///
/// Immutable once created: corrections are modeled as new entries
/// (receipts are appended separately, never amendments). Counted against
/// the tenant's monthly transaction ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    /// Invoice the payment settles, if any; unlinked payments are
    /// account credits.
    pub invoice_id: Option<InvoiceId>,
    pub amount_cents: i64,
    pub method: PaymentMethod,
    /// Field collector who took the payment, when applicable.
    pub collector_id: Option<UserId>,
    pub recorded_at: DateTime<Utc>,
}

impl Payment {
    pub fn record(
        id: PaymentId,
        tenant_id: TenantId,
        customer_id: CustomerId,
        invoice_id: Option<InvoiceId>,
        amount_cents: i64,
        method: PaymentMethod,
        collector_id: Option<UserId>,
        recorded_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if amount_cents <= 0 {
            return Err(DomainError::validation("payment amount must be positive"));
        }

        Ok(Self {
            id,
            tenant_id,
            customer_id,
            invoice_id,
            amount_cents,
            method,
            collector_id,
            recorded_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_payment() {
        let p = Payment::record(
            PaymentId::new(),
            TenantId::new(),
            CustomerId::new(),
            Some(InvoiceId::new()),
            2_500,
            PaymentMethod::MobileMoney,
            Some(UserId::new()),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(p.amount_cents, 2_500);
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let err = Payment::record(
            PaymentId::new(),
            TenantId::new(),
            CustomerId::new(),
            None,
            0,
            PaymentMethod::Cash,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
