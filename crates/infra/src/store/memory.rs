//! In-memory store for dev and tests.
//!
//! One `Mutex` over all tables: `record_payment` stays atomic by doing the
//! payment insert and the invoice update inside a single lock section,
//! mirroring the Postgres transaction.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use aquabill_auth::{Capability, Role, User};
use aquabill_billing::{Invoice, Payment};
use aquabill_core::{CustomerId, InvoiceId, PaymentId, RoleId, TenantId, UserId};
use aquabill_metering::Customer;
use aquabill_tenancy::{PlanLimits, SubscriptionPlan, Tenant};

use super::{
    AuthorizationBundle, BillingStore, CustomerStore, DirectoryStore, StoreError, TenantStore,
};

#[derive(Debug, Default)]
struct Inner {
    tenants: HashMap<TenantId, Tenant>,
    plan_limits: HashMap<SubscriptionPlan, PlanLimits>,
    users: HashMap<UserId, User>,
    roles: HashMap<RoleId, Role>,
    direct_grants: HashMap<UserId, HashSet<Capability>>,
    customers: HashMap<CustomerId, Customer>,
    invoices: HashMap<InvoiceId, Invoice>,
    payments: HashMap<PaymentId, Payment>,
}

/// In-memory implementation of every store trait.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DirectoryStore for InMemoryStore {
    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::Conflict(format!(
                "email '{}' is already registered",
                user.email
            )));
        }
        inner.users.insert(user.id, user);
        Ok(())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn list_users(&self, tenant_id: TenantId) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self
            .lock()?
            .users
            .values()
            .filter(|u| u.tenant_id == Some(tenant_id))
            .cloned()
            .collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn count_users(&self, tenant_id: TenantId) -> Result<u64, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .filter(|u| u.tenant_id == Some(tenant_id))
            .count() as u64)
    }

    async fn update_user(&self, user: User) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        inner.users.insert(user.id, user);
        Ok(())
    }

    async fn delete_user(&self, tenant_id: TenantId, id: UserId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let owned = inner
            .users
            .get(&id)
            .is_some_and(|u| u.tenant_id == Some(tenant_id));
        if !owned {
            return Err(StoreError::NotFound);
        }
        inner.users.remove(&id);
        inner.direct_grants.remove(&id);
        Ok(())
    }

    async fn insert_role(&self, role: Role) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner
            .roles
            .values()
            .any(|r| r.tenant_id == role.tenant_id && r.name == role.name)
        {
            return Err(StoreError::Conflict(format!(
                "role '{}' already exists",
                role.name
            )));
        }
        inner.roles.insert(role.id, role);
        Ok(())
    }

    async fn role_by_id(
        &self,
        tenant_id: TenantId,
        id: RoleId,
    ) -> Result<Option<Role>, StoreError> {
        Ok(self
            .lock()?
            .roles
            .get(&id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_roles(&self, tenant_id: TenantId) -> Result<Vec<Role>, StoreError> {
        let mut roles: Vec<Role> = self
            .lock()?
            .roles
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn update_role(&self, role: Role) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let known = inner
            .roles
            .get(&role.id)
            .is_some_and(|r| r.tenant_id == role.tenant_id);
        if !known {
            return Err(StoreError::NotFound);
        }
        inner.roles.insert(role.id, role);
        Ok(())
    }

    async fn delete_role(&self, tenant_id: TenantId, id: RoleId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        match inner.roles.get(&id) {
            Some(r) if r.tenant_id == tenant_id => {}
            _ => return Err(StoreError::NotFound),
        }
        let assigned = inner
            .users
            .values()
            .filter(|u| u.role_id == Some(id))
            .count();
        if assigned > 0 {
            return Err(StoreError::ReferentialConflict(format!(
                "role is still assigned to {assigned} user(s)"
            )));
        }
        inner.roles.remove(&id);
        Ok(())
    }

    async fn grant_direct(
        &self,
        user_id: UserId,
        capability: Capability,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        inner
            .direct_grants
            .entry(user_id)
            .or_default()
            .insert(capability);
        Ok(())
    }

    async fn revoke_direct(
        &self,
        user_id: UserId,
        capability: &Capability,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if let Some(grants) = inner.direct_grants.get_mut(&user_id) {
            grants.remove(capability);
        }
        Ok(())
    }

    async fn load_authorization_bundle(
        &self,
        user_id: UserId,
    ) -> Result<Option<AuthorizationBundle>, StoreError> {
        let inner = self.lock()?;
        let Some(user) = inner.users.get(&user_id).cloned() else {
            return Ok(None);
        };
        // Role grants only count when the role belongs to the user's tenant.
        let role = user
            .role_id
            .and_then(|rid| inner.roles.get(&rid))
            .filter(|r| Some(r.tenant_id) == user.tenant_id)
            .cloned();
        let direct_grants = inner.direct_grants.get(&user_id).cloned().unwrap_or_default();
        Ok(Some(AuthorizationBundle {
            user,
            role,
            direct_grants,
        }))
    }
}

#[async_trait]
impl TenantStore for InMemoryStore {
    async fn insert_tenant(&self, tenant: Tenant) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.tenants.values().any(|t| t.slug == tenant.slug) {
            return Err(StoreError::Conflict(format!(
                "slug '{}' is already taken",
                tenant.slug
            )));
        }
        inner.tenants.insert(tenant.id, tenant);
        Ok(())
    }

    async fn tenant_by_id(&self, id: TenantId) -> Result<Option<Tenant>, StoreError> {
        Ok(self.lock()?.tenants.get(&id).cloned())
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        let mut tenants: Vec<Tenant> = self.lock()?.tenants.values().cloned().collect();
        tenants.sort_by_key(|t| t.created_at);
        Ok(tenants)
    }

    async fn update_tenant(&self, tenant: Tenant) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.tenants.contains_key(&tenant.id) {
            return Err(StoreError::NotFound);
        }
        inner.tenants.insert(tenant.id, tenant);
        Ok(())
    }

    async fn delete_tenant(&self, id: TenantId) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.tenants.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        let users = inner
            .users
            .values()
            .filter(|u| u.tenant_id == Some(id))
            .count();
        let customers = inner
            .customers
            .values()
            .filter(|c| c.tenant_id == id)
            .count();
        let payments = inner
            .payments
            .values()
            .filter(|p| p.tenant_id == id)
            .count();
        if users + customers + payments > 0 {
            return Err(StoreError::ReferentialConflict(format!(
                "tenant still owns {users} user(s), {customers} customer(s), {payments} payment(s)"
            )));
        }
        inner.tenants.remove(&id);
        Ok(())
    }

    async fn plan_limits(&self, plan: SubscriptionPlan) -> Result<PlanLimits, StoreError> {
        Ok(self
            .lock()?
            .plan_limits
            .get(&plan)
            .copied()
            .unwrap_or_else(|| PlanLimits::defaults_for(plan)))
    }

    async fn upsert_plan_limits(&self, limits: PlanLimits) -> Result<(), StoreError> {
        self.lock()?.plan_limits.insert(limits.plan, limits);
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn insert_customer(&self, customer: Customer) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner
            .customers
            .values()
            .any(|c| c.tenant_id == customer.tenant_id && c.meter_serial == customer.meter_serial)
        {
            return Err(StoreError::Conflict(format!(
                "meter '{}' is already registered",
                customer.meter_serial
            )));
        }
        inner.customers.insert(customer.id, customer);
        Ok(())
    }

    async fn customer_by_id(
        &self,
        tenant_id: TenantId,
        id: CustomerId,
    ) -> Result<Option<Customer>, StoreError> {
        Ok(self
            .lock()?
            .customers
            .get(&id)
            .filter(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_customers(&self, tenant_id: TenantId) -> Result<Vec<Customer>, StoreError> {
        let mut customers: Vec<Customer> = self
            .lock()?
            .customers
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .cloned()
            .collect();
        customers.sort_by_key(|c| c.created_at);
        Ok(customers)
    }

    async fn update_customer(&self, customer: Customer) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let known = inner
            .customers
            .get(&customer.id)
            .is_some_and(|c| c.tenant_id == customer.tenant_id);
        if !known {
            return Err(StoreError::NotFound);
        }
        inner.customers.insert(customer.id, customer);
        Ok(())
    }

    async fn count_customers(&self, tenant_id: TenantId) -> Result<u64, StoreError> {
        Ok(self
            .lock()?
            .customers
            .values()
            .filter(|c| c.tenant_id == tenant_id)
            .count() as u64)
    }
}

#[async_trait]
impl BillingStore for InMemoryStore {
    async fn insert_invoice(&self, invoice: Invoice) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.invoices.insert(invoice.id, invoice);
        Ok(())
    }

    async fn invoice_by_id(
        &self,
        tenant_id: TenantId,
        id: InvoiceId,
    ) -> Result<Option<Invoice>, StoreError> {
        Ok(self
            .lock()?
            .invoices
            .get(&id)
            .filter(|i| i.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_invoices(&self, tenant_id: TenantId) -> Result<Vec<Invoice>, StoreError> {
        let mut invoices: Vec<Invoice> = self
            .lock()?
            .invoices
            .values()
            .filter(|i| i.tenant_id == tenant_id)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| i.issued_at);
        Ok(invoices)
    }

    async fn list_payments(&self, tenant_id: TenantId) -> Result<Vec<Payment>, StoreError> {
        let mut payments: Vec<Payment> = self
            .lock()?
            .payments
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.recorded_at);
        Ok(payments)
    }

    async fn count_payments_since(
        &self,
        tenant_id: TenantId,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        Ok(self
            .lock()?
            .payments
            .values()
            .filter(|p| p.tenant_id == tenant_id && p.recorded_at >= since)
            .count() as u64)
    }

    async fn record_payment(&self, payment: Payment) -> Result<Option<Invoice>, StoreError> {
        let mut inner = self.lock()?;

        let updated = match payment.invoice_id {
            Some(invoice_id) => {
                let Some(invoice) = inner
                    .invoices
                    .get(&invoice_id)
                    .filter(|i| i.tenant_id == payment.tenant_id)
                else {
                    return Err(StoreError::NotFound);
                };
                let mut invoice = invoice.clone();
                invoice.reconcile_payment(payment.amount_cents)?;
                inner.invoices.insert(invoice.id, invoice.clone());
                Some(invoice)
            }
            None => None,
        };

        inner.payments.insert(payment.id, payment);
        Ok(updated)
    }
}
