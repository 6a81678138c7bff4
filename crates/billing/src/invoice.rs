use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aquabill_core::{CustomerId, DomainError, DomainResult, InvoiceId, TenantId};

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

/// A bill against one customer's metered consumption.
///
/// # Invariants
/// - `status == Paid` if and only if `balance_cents <= 0`.
/// - `status == Partial` if and only if `0 < balance_cents < amount_cents`.
/// - `balance_cents` only moves through [`Invoice::reconcile_payment`];
///   it may go negative on overpayment and is preserved, never clamped
///   (refund handling is elsewhere, but the overpaid amount must not be
///   silently lost).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub tenant_id: TenantId,
    pub customer_id: CustomerId,
    /// Billed amount in smallest currency unit (cents).
    pub amount_cents: i64,
    /// Outstanding balance in cents; signed.
    pub balance_cents: i64,
    pub status: InvoiceStatus,
    pub due_date: DateTime<Utc>,
    pub issued_at: DateTime<Utc>,
}

impl Invoice {
    pub fn issue(
        id: InvoiceId,
        tenant_id: TenantId,
        customer_id: CustomerId,
        amount_cents: i64,
        due_date: DateTime<Utc>,
        issued_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if amount_cents <= 0 {
            return Err(DomainError::validation("invoice amount must be positive"));
        }

        Ok(Self {
            id,
            tenant_id,
            customer_id,
            amount_cents,
            balance_cents: amount_cents,
            status: InvoiceStatus::Pending,
            due_date,
            issued_at,
        })
    }

    /// Ledger reconciliation: apply one payment against the balance.
    ///
    /// `new_balance = balance - amount`; status becomes `Paid` when the
    /// balance reaches or passes zero, `Partial` otherwise. This is the
    /// only mutation path for balance and status, so they cannot diverge.
    pub fn reconcile_payment(&mut self, amount_cents: i64) -> DomainResult<()> {
        if amount_cents <= 0 {
            return Err(DomainError::validation("payment amount must be positive"));
        }

        self.balance_cents -= amount_cents;
        self.status = if self.balance_cents <= 0 {
            InvoiceStatus::Paid
        } else {
            InvoiceStatus::Partial
        };
        Ok(())
    }

    /// Whether the invoice is past due and still carries a balance.
    pub fn is_past_due(&self, now: DateTime<Utc>) -> bool {
        self.balance_cents > 0 && now > self.due_date
    }

    /// Display-level refresh: a past-due unpaid invoice reads as `Overdue`.
    ///
    /// Reconciliation ignores the `Overdue` marker and applies the strict
    /// Paid/Partial rule, so a payment on an overdue invoice transitions it
    /// like any other.
    pub fn refresh_overdue(&mut self, now: DateTime<Utc>) {
        if self.is_past_due(now) && self.status != InvoiceStatus::Paid {
            self.status = InvoiceStatus::Overdue;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn invoice(amount: i64) -> Invoice {
        Invoice::issue(
            InvoiceId::new(),
            TenantId::new(),
            CustomerId::new(),
            amount,
            Utc::now() + Duration::days(14),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn issue_starts_pending_with_full_balance() {
        let inv = invoice(10_000);
        assert_eq!(inv.status, InvoiceStatus::Pending);
        assert_eq!(inv.balance_cents, 10_000);
    }

    #[test]
    fn zero_amount_invoice_is_rejected() {
        assert!(
            Invoice::issue(
                InvoiceId::new(),
                TenantId::new(),
                CustomerId::new(),
                0,
                Utc::now(),
                Utc::now(),
            )
            .is_err()
        );
    }

    #[test]
    fn partial_then_full_then_overpayment() {
        // amount = 100, balance = 100
        let mut inv = invoice(100);

        inv.reconcile_payment(40).unwrap();
        assert_eq!(inv.balance_cents, 60);
        assert_eq!(inv.status, InvoiceStatus::Partial);

        inv.reconcile_payment(60).unwrap();
        assert_eq!(inv.balance_cents, 0);
        assert_eq!(inv.status, InvoiceStatus::Paid);

        // Overpayment against a paid invoice: preserved, not clamped.
        inv.reconcile_payment(10).unwrap();
        assert_eq!(inv.balance_cents, -10);
        assert_eq!(inv.status, InvoiceStatus::Paid);
    }

    #[test]
    fn non_positive_payment_is_rejected() {
        let mut inv = invoice(100);
        assert!(inv.reconcile_payment(0).is_err());
        assert!(inv.reconcile_payment(-5).is_err());
        assert_eq!(inv.balance_cents, 100);
    }

    #[test]
    fn past_due_invoice_reads_overdue_until_paid() {
        let mut inv = invoice(100);
        let later = inv.due_date + Duration::days(1);

        inv.refresh_overdue(later);
        assert_eq!(inv.status, InvoiceStatus::Overdue);

        inv.reconcile_payment(30).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Partial);
        inv.refresh_overdue(later);
        assert_eq!(inv.status, InvoiceStatus::Overdue);

        inv.reconcile_payment(70).unwrap();
        assert_eq!(inv.status, InvoiceStatus::Paid);
        inv.refresh_overdue(later);
        assert_eq!(inv.status, InvoiceStatus::Paid);
    }

    proptest! {
        /// Property: for any payment sequence, balance and status never
        /// diverge — Paid iff balance <= 0, Partial iff 0 < balance < amount.
        #[test]
        fn balance_and_status_never_diverge(
            amount in 1i64..1_000_000,
            payments in proptest::collection::vec(1i64..50_000, 0..20),
        ) {
            let mut inv = invoice(amount);
            for p in payments {
                inv.reconcile_payment(p).unwrap();
                match inv.status {
                    InvoiceStatus::Paid => prop_assert!(inv.balance_cents <= 0),
                    InvoiceStatus::Partial => prop_assert!(
                        inv.balance_cents > 0 && inv.balance_cents < inv.amount_cents
                    ),
                    InvoiceStatus::Pending | InvoiceStatus::Overdue => {
                        // Reconciliation always lands on Paid or Partial.
                        prop_assert!(false, "unexpected status after payment");
                    }
                }
            }
        }

        /// Property: the balance decreases by exactly the paid total.
        #[test]
        fn balance_tracks_paid_total(
            amount in 1i64..1_000_000,
            payments in proptest::collection::vec(1i64..50_000, 0..20),
        ) {
            let mut inv = invoice(amount);
            let mut paid = 0i64;
            for p in &payments {
                inv.reconcile_payment(*p).unwrap();
                paid += p;
            }
            prop_assert_eq!(inv.balance_cents, amount - paid);
        }
    }
}
