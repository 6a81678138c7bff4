use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aquabill_core::{CustomerId, DomainError, DomainResult, TenantId};

/// Customer status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Active,
    Disconnected,
}

/// A customer with one metered water connection.
///
/// Tenant-owned; counted against the tenant's customer ceiling before
/// creation. The meter is modeled inline: one connection, one serial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub tenant_id: TenantId,
    pub full_name: String,
    pub meter_serial: String,
    pub service_address: String,
    pub phone: Option<String>,
    pub status: CustomerStatus,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(
        id: CustomerId,
        tenant_id: TenantId,
        full_name: impl Into<String>,
        meter_serial: impl Into<String>,
        service_address: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let full_name = full_name.into();
        let meter_serial = meter_serial.into();
        let service_address = service_address.into();

        if full_name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        if meter_serial.trim().is_empty() {
            return Err(DomainError::validation("meter serial cannot be empty"));
        }
        if service_address.trim().is_empty() {
            return Err(DomainError::validation("service address cannot be empty"));
        }

        Ok(Self {
            id,
            tenant_id,
            full_name: full_name.trim().to_string(),
            meter_serial: meter_serial.trim().to_string(),
            service_address: service_address.trim().to_string(),
            phone: None,
            status: CustomerStatus::Active,
            created_at,
        })
    }

    /// Whether this connection can be billed.
    pub fn can_transact(&self) -> bool {
        self.status == CustomerStatus::Active
    }
}
