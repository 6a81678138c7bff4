//! Quota admission policy (pure decision logic).
//!
//! The store-backed guard in `aquabill-infra` supplies the current count;
//! the decision itself has no IO and is deterministic.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A resource kind counted against a tenant ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountedResource {
    Staff,
    CustomerOrMeter,
    Transaction,
}

impl CountedResource {
    pub fn as_str(self) -> &'static str {
        match self {
            CountedResource::Staff => "staff",
            CountedResource::CustomerOrMeter => "customers",
            CountedResource::Transaction => "transactions",
        }
    }
}

impl core::fmt::Display for CountedResource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota denial. A routine business condition, surfaced with an actionable
/// message (which limit, which ceiling) — not a security-sensitive error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{resource} limit reached: plan allows at most {ceiling}")]
pub struct QuotaExceeded {
    pub resource: CountedResource,
    pub ceiling: u32,
}

/// Decide whether `proposed_delta` more rows of `resource` fit under
/// `ceiling`, given the current count. `None` ceiling means unlimited.
pub fn admit(
    resource: CountedResource,
    current_count: u64,
    proposed_delta: u64,
    ceiling: Option<u32>,
) -> Result<(), QuotaExceeded> {
    let Some(ceiling) = ceiling else {
        return Ok(());
    };
    if current_count.saturating_add(proposed_delta) > u64::from(ceiling) {
        return Err(QuotaExceeded { resource, ceiling });
    }
    Ok(())
}

/// First instant of the current calendar month, UTC.
///
/// The transaction counter is scoped to this window; it resets implicitly
/// at each month boundary. Calendar month, not a rolling 30-day window.
pub fn transaction_window_start(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn unlimited_always_admits() {
        assert!(admit(CountedResource::Staff, u64::MAX, 1, None).is_ok());
    }

    #[test]
    fn full_ceiling_denies_next_creation() {
        // maxCustomers = 2 with 2 existing rows: the 3rd is denied.
        let err = admit(CountedResource::CustomerOrMeter, 2, 1, Some(2)).unwrap_err();
        assert_eq!(err.ceiling, 2);
        assert_eq!(err.resource, CountedResource::CustomerOrMeter);
    }

    #[test]
    fn below_ceiling_admits() {
        assert!(admit(CountedResource::CustomerOrMeter, 1, 1, Some(2)).is_ok());
    }

    #[test]
    fn zero_ceiling_denies_everything() {
        assert!(admit(CountedResource::Transaction, 0, 1, Some(0)).is_err());
    }

    #[test]
    fn window_starts_on_the_first_at_midnight_utc() {
        let now = Utc.with_ymd_and_hms(2025, 6, 17, 15, 42, 3).unwrap();
        let start = transaction_window_start(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn window_is_identity_on_month_start() {
        let now = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(transaction_window_start(now), now);
    }

    proptest! {
        /// Property: admission is monotone in the current count — if a
        /// creation is denied at count n, it is denied at every count above n.
        #[test]
        fn denial_is_monotone_in_count(count in 0u64..10_000, ceiling in 0u32..5_000) {
            let at = admit(CountedResource::Staff, count, 1, Some(ceiling));
            let above = admit(CountedResource::Staff, count + 1, 1, Some(ceiling));
            if at.is_err() {
                prop_assert!(above.is_err());
            }
        }

        /// Property: an admitted creation never lands above the ceiling.
        #[test]
        fn admitted_creations_fit_under_the_ceiling(
            count in 0u64..10_000,
            delta in 1u64..10,
            ceiling in 0u32..5_000,
        ) {
            if admit(CountedResource::Transaction, count, delta, Some(ceiling)).is_ok() {
                prop_assert!(count + delta <= u64::from(ceiling));
            }
        }
    }
}
