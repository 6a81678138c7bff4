//! Postgres-backed store implementation.
//!
//! Every query includes `tenant_id` in the WHERE clause where the data is
//! tenant-owned. Unique constraints back the email/slug/meter uniqueness
//! rules; `23505` maps to [`StoreError::Conflict`]. The payment path runs
//! the payment insert and the invoice update in one transaction.

use std::collections::HashSet;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::instrument;

use aquabill_auth::{Capability, Role, RoleType, User};
use aquabill_billing::{Invoice, InvoiceStatus, Payment, PaymentMethod};
use aquabill_core::{CustomerId, InvoiceId, PaymentId, RoleId, TenantId, UserId};
use aquabill_metering::{Customer, CustomerStatus};
use aquabill_tenancy::{CeilingOverride, PlanLimits, SubscriptionPlan, Tenant, TenantStatus};

use super::{
    AuthorizationBundle, BillingStore, CustomerStore, DirectoryStore, StoreError, TenantStore,
};

/// Postgres-backed store.
///
/// Uses the SQLx connection pool, which is thread-safe; individual
/// statements are atomic, and multi-statement sequences that must be
/// atomic run inside explicit transactions.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("23505") {
            return StoreError::Conflict(format!("{operation}: row already exists"));
        }
        if db.code().as_deref() == Some("23503") {
            return StoreError::ReferentialConflict(format!(
                "{operation}: dependent rows still exist"
            ));
        }
    }
    StoreError::Backend(format!("{operation}: {e}"))
}

fn parse_field<T: FromStr>(column: &str, raw: &str) -> Result<T, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Backend(format!("unreadable {column}: '{raw}'")))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Backend(format!("column '{column}': {e}")))
}

fn get_json<T: serde::de::DeserializeOwned>(row: &PgRow, column: &str) -> Result<T, StoreError> {
    let value: serde_json::Value = get(row, column)?;
    serde_json::from_value(value)
        .map_err(|e| StoreError::Backend(format!("column '{column}': {e}")))
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role_type: String = get(row, "role_type")?;
    Ok(User {
        id: UserId::from_uuid(get(row, "id")?),
        tenant_id: get::<Option<uuid::Uuid>>(row, "tenant_id")?.map(TenantId::from_uuid),
        email: get(row, "email")?,
        username: get(row, "username")?,
        password_hash: get(row, "password_hash")?,
        role_type: parse_field::<RoleType>("role_type", &role_type)?,
        role_id: get::<Option<uuid::Uuid>>(row, "role_id")?.map(RoleId::from_uuid),
        is_active: get(row, "is_active")?,
        created_at: get(row, "created_at")?,
    })
}

fn role_from_row(row: &PgRow) -> Result<Role, StoreError> {
    let grants: Vec<String> = get_json(row, "grants")?;
    Ok(Role {
        id: RoleId::from_uuid(get(row, "id")?),
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        name: get(row, "name")?,
        description: get(row, "description")?,
        grants: grants.into_iter().map(Capability::new).collect(),
    })
}

fn tenant_from_row(row: &PgRow) -> Result<Tenant, StoreError> {
    let status: String = get(row, "status")?;
    let plan: String = get(row, "plan")?;
    Ok(Tenant {
        id: TenantId::from_uuid(get(row, "id")?),
        slug: get(row, "slug")?,
        display_name: get(row, "display_name")?,
        status: parse_status(&status)?,
        plan: parse_plan(&plan)?,
        max_staff: get_json(row, "max_staff")?,
        max_customers: get_json(row, "max_customers")?,
        max_transactions: get_json(row, "max_transactions")?,
        created_at: get(row, "created_at")?,
    })
}

fn customer_from_row(row: &PgRow) -> Result<Customer, StoreError> {
    let status: String = get(row, "status")?;
    Ok(Customer {
        id: CustomerId::from_uuid(get(row, "id")?),
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        full_name: get(row, "full_name")?,
        meter_serial: get(row, "meter_serial")?,
        service_address: get(row, "service_address")?,
        phone: get(row, "phone")?,
        status: match status.as_str() {
            "active" => CustomerStatus::Active,
            "disconnected" => CustomerStatus::Disconnected,
            other => {
                return Err(StoreError::Backend(format!(
                    "unreadable customer status: '{other}'"
                )));
            }
        },
        created_at: get(row, "created_at")?,
    })
}

fn invoice_from_row(row: &PgRow) -> Result<Invoice, StoreError> {
    let status: String = get(row, "status")?;
    Ok(Invoice {
        id: InvoiceId::from_uuid(get(row, "id")?),
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        customer_id: CustomerId::from_uuid(get(row, "customer_id")?),
        amount_cents: get(row, "amount_cents")?,
        balance_cents: get(row, "balance_cents")?,
        status: parse_invoice_status(&status)?,
        due_date: get(row, "due_date")?,
        issued_at: get(row, "issued_at")?,
    })
}

fn payment_from_row(row: &PgRow) -> Result<Payment, StoreError> {
    let method: String = get(row, "method")?;
    Ok(Payment {
        id: PaymentId::from_uuid(get(row, "id")?),
        tenant_id: TenantId::from_uuid(get(row, "tenant_id")?),
        customer_id: CustomerId::from_uuid(get(row, "customer_id")?),
        invoice_id: get::<Option<uuid::Uuid>>(row, "invoice_id")?.map(InvoiceId::from_uuid),
        amount_cents: get(row, "amount_cents")?,
        method: parse_method(&method)?,
        collector_id: get::<Option<uuid::Uuid>>(row, "collector_id")?.map(UserId::from_uuid),
        recorded_at: get(row, "recorded_at")?,
    })
}

fn parse_status(s: &str) -> Result<TenantStatus, StoreError> {
    match s {
        "active" => Ok(TenantStatus::Active),
        "suspended" => Ok(TenantStatus::Suspended),
        "pending" => Ok(TenantStatus::Pending),
        other => Err(StoreError::Backend(format!(
            "unreadable tenant status: '{other}'"
        ))),
    }
}

fn parse_plan(s: &str) -> Result<SubscriptionPlan, StoreError> {
    match s {
        "basic" => Ok(SubscriptionPlan::Basic),
        "standard" => Ok(SubscriptionPlan::Standard),
        "premium" => Ok(SubscriptionPlan::Premium),
        "enterprise" => Ok(SubscriptionPlan::Enterprise),
        other => Err(StoreError::Backend(format!("unreadable plan: '{other}'"))),
    }
}

fn parse_invoice_status(s: &str) -> Result<InvoiceStatus, StoreError> {
    match s {
        "pending" => Ok(InvoiceStatus::Pending),
        "partial" => Ok(InvoiceStatus::Partial),
        "paid" => Ok(InvoiceStatus::Paid),
        "overdue" => Ok(InvoiceStatus::Overdue),
        other => Err(StoreError::Backend(format!(
            "unreadable invoice status: '{other}'"
        ))),
    }
}

fn parse_method(s: &str) -> Result<PaymentMethod, StoreError> {
    match s {
        "cash" => Ok(PaymentMethod::Cash),
        "bank_transfer" => Ok(PaymentMethod::BankTransfer),
        "mobile_money" => Ok(PaymentMethod::MobileMoney),
        "card" => Ok(PaymentMethod::Card),
        other => Err(StoreError::Backend(format!(
            "unreadable payment method: '{other}'"
        ))),
    }
}

fn invoice_status_str(status: InvoiceStatus) -> &'static str {
    match status {
        InvoiceStatus::Pending => "pending",
        InvoiceStatus::Partial => "partial",
        InvoiceStatus::Paid => "paid",
        InvoiceStatus::Overdue => "overdue",
    }
}

fn method_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Cash => "cash",
        PaymentMethod::BankTransfer => "bank_transfer",
        PaymentMethod::MobileMoney => "mobile_money",
        PaymentMethod::Card => "card",
    }
}

fn customer_status_str(status: CustomerStatus) -> &'static str {
    match status {
        CustomerStatus::Active => "active",
        CustomerStatus::Disconnected => "disconnected",
    }
}

fn ceiling_json(value: CeilingOverride) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Backend(e.to_string()))
}

fn grants_json(grants: &HashSet<Capability>) -> Result<serde_json::Value, StoreError> {
    let codes: Vec<&str> = grants.iter().map(|c| c.as_str()).collect();
    serde_json::to_value(codes).map_err(|e| StoreError::Backend(e.to_string()))
}

#[async_trait]
impl DirectoryStore for PostgresStore {
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn insert_user(&self, user: User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, tenant_id, email, username, password_hash,
                role_type, role_id, is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(user.tenant_id.map(|t| *t.as_uuid()))
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role_type.as_str())
        .bind(user.role_id.map(|r| *r.as_uuid()))
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    async fn user_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_id", e))?
            .map(|row| user_from_row(&row))
            .transpose()
    }

    async fn user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        sqlx::query("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("user_by_email", e))?
            .map(|row| user_from_row(&row))
            .transpose()
    }

    async fn list_users(&self, tenant_id: TenantId) -> Result<Vec<User>, StoreError> {
        sqlx::query("SELECT * FROM users WHERE tenant_id = $1 ORDER BY created_at ASC")
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?
            .iter()
            .map(user_from_row)
            .collect()
    }

    async fn count_users(&self, tenant_id: TenantId) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE tenant_id = $1")
            .bind(tenant_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_users", e))?;
        let n: i64 = get(&row, "n")?;
        Ok(n as u64)
    }

    async fn update_user(&self, user: User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, username = $3, password_hash = $4,
                role_type = $5, role_id = $6, is_active = $7
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role_type.as_str())
        .bind(user.role_id.map(|r| *r.as_uuid()))
        .bind(user.is_active)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, tenant_id: TenantId, id: UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1 AND tenant_id = $2")
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_role(&self, role: Role) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO roles (id, tenant_id, name, description, grants)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(role.tenant_id.as_uuid())
        .bind(&role.name)
        .bind(&role.description)
        .bind(grants_json(&role.grants)?)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_role", e))?;
        Ok(())
    }

    async fn role_by_id(
        &self,
        tenant_id: TenantId,
        id: RoleId,
    ) -> Result<Option<Role>, StoreError> {
        sqlx::query("SELECT * FROM roles WHERE id = $1 AND tenant_id = $2")
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("role_by_id", e))?
            .map(|row| role_from_row(&row))
            .transpose()
    }

    async fn list_roles(&self, tenant_id: TenantId) -> Result<Vec<Role>, StoreError> {
        sqlx::query("SELECT * FROM roles WHERE tenant_id = $1 ORDER BY name ASC")
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_roles", e))?
            .iter()
            .map(role_from_row)
            .collect()
    }

    async fn update_role(&self, role: Role) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE roles
            SET name = $3, description = $4, grants = $5
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(role.id.as_uuid())
        .bind(role.tenant_id.as_uuid())
        .bind(&role.name)
        .bind(&role.description)
        .bind(grants_json(&role.grants)?)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_role", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %tenant_id, role_id = %id))]
    async fn delete_role(&self, tenant_id: TenantId, id: RoleId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;

        let row = sqlx::query("SELECT COUNT(*) AS n FROM users WHERE role_id = $1")
            .bind(id.as_uuid())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;
        let assigned: i64 = get(&row, "n")?;
        if assigned > 0 {
            return Err(StoreError::ReferentialConflict(format!(
                "role is still assigned to {assigned} user(s)"
            )));
        }

        let result = sqlx::query("DELETE FROM roles WHERE id = $1 AND tenant_id = $2")
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("delete_role", e))
    }

    async fn grant_direct(
        &self,
        user_id: UserId,
        capability: Capability,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO user_permissions (user_id, capability)
            VALUES ($1, $2)
            ON CONFLICT (user_id, capability) DO NOTHING
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(capability.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("grant_direct", e))?;
        Ok(())
    }

    async fn revoke_direct(
        &self,
        user_id: UserId,
        capability: &Capability,
    ) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM user_permissions WHERE user_id = $1 AND capability = $2")
            .bind(user_id.as_uuid())
            .bind(capability.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("revoke_direct", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn load_authorization_bundle(
        &self,
        user_id: UserId,
    ) -> Result<Option<AuthorizationBundle>, StoreError> {
        let Some(user_row) = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_authorization_bundle", e))?
        else {
            return Ok(None);
        };
        let user = user_from_row(&user_row)?;

        let role = match (user.role_id, user.tenant_id) {
            (Some(role_id), Some(tenant_id)) => {
                sqlx::query("SELECT * FROM roles WHERE id = $1 AND tenant_id = $2")
                    .bind(role_id.as_uuid())
                    .bind(tenant_id.as_uuid())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(|e| map_sqlx_error("load_authorization_bundle", e))?
                    .map(|row| role_from_row(&row))
                    .transpose()?
            }
            _ => None,
        };

        let direct_grants = sqlx::query("SELECT capability FROM user_permissions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("load_authorization_bundle", e))?
            .iter()
            .map(|row| get::<String>(row, "capability").map(Capability::new))
            .collect::<Result<HashSet<_>, _>>()?;

        Ok(Some(AuthorizationBundle {
            user,
            role,
            direct_grants,
        }))
    }
}

#[async_trait]
impl TenantStore for PostgresStore {
    async fn insert_tenant(&self, tenant: Tenant) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tenants (
                id, slug, display_name, status, plan,
                max_staff, max_customers, max_transactions, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(tenant.id.as_uuid())
        .bind(&tenant.slug)
        .bind(&tenant.display_name)
        .bind(tenant.status.to_string())
        .bind(tenant.plan.as_str())
        .bind(ceiling_json(tenant.max_staff)?)
        .bind(ceiling_json(tenant.max_customers)?)
        .bind(ceiling_json(tenant.max_transactions)?)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_tenant", e))?;
        Ok(())
    }

    async fn tenant_by_id(&self, id: TenantId) -> Result<Option<Tenant>, StoreError> {
        sqlx::query("SELECT * FROM tenants WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("tenant_by_id", e))?
            .map(|row| tenant_from_row(&row))
            .transpose()
    }

    async fn list_tenants(&self) -> Result<Vec<Tenant>, StoreError> {
        sqlx::query("SELECT * FROM tenants ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_tenants", e))?
            .iter()
            .map(tenant_from_row)
            .collect()
    }

    async fn update_tenant(&self, tenant: Tenant) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE tenants
            SET slug = $2, display_name = $3, status = $4, plan = $5,
                max_staff = $6, max_customers = $7, max_transactions = $8
            WHERE id = $1
            "#,
        )
        .bind(tenant.id.as_uuid())
        .bind(&tenant.slug)
        .bind(&tenant.display_name)
        .bind(tenant.status.to_string())
        .bind(tenant.plan.as_str())
        .bind(ceiling_json(tenant.max_staff)?)
        .bind(ceiling_json(tenant.max_customers)?)
        .bind(ceiling_json(tenant.max_transactions)?)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_tenant", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(tenant_id = %id))]
    async fn delete_tenant(&self, id: TenantId) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("delete_tenant", e))?;

        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users WHERE tenant_id = $1) AS users,
                (SELECT COUNT(*) FROM customers WHERE tenant_id = $1) AS customers,
                (SELECT COUNT(*) FROM payments WHERE tenant_id = $1) AS payments
            "#,
        )
        .bind(id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("delete_tenant", e))?;

        let users: i64 = get(&row, "users")?;
        let customers: i64 = get(&row, "customers")?;
        let payments: i64 = get(&row, "payments")?;
        if users + customers + payments > 0 {
            return Err(StoreError::ReferentialConflict(format!(
                "tenant still owns {users} user(s), {customers} customer(s), {payments} payment(s)"
            )));
        }

        let result = sqlx::query("DELETE FROM tenants WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("delete_tenant", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("delete_tenant", e))
    }

    async fn plan_limits(&self, plan: SubscriptionPlan) -> Result<PlanLimits, StoreError> {
        let row = sqlx::query(
            "SELECT max_staff, max_customers, max_transactions FROM plan_limits WHERE plan = $1",
        )
        .bind(plan.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("plan_limits", e))?;

        match row {
            Some(row) => Ok(PlanLimits {
                plan,
                max_staff: get::<Option<i64>>(&row, "max_staff")?.map(|n| n as u32),
                max_customers: get::<Option<i64>>(&row, "max_customers")?.map(|n| n as u32),
                max_transactions: get::<Option<i64>>(&row, "max_transactions")?.map(|n| n as u32),
            }),
            None => Ok(PlanLimits::defaults_for(plan)),
        }
    }

    async fn upsert_plan_limits(&self, limits: PlanLimits) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO plan_limits (plan, max_staff, max_customers, max_transactions)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (plan)
            DO UPDATE SET
                max_staff = EXCLUDED.max_staff,
                max_customers = EXCLUDED.max_customers,
                max_transactions = EXCLUDED.max_transactions
            "#,
        )
        .bind(limits.plan.as_str())
        .bind(limits.max_staff.map(i64::from))
        .bind(limits.max_customers.map(i64::from))
        .bind(limits.max_transactions.map(i64::from))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_plan_limits", e))?;
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for PostgresStore {
    async fn insert_customer(&self, customer: Customer) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO customers (
                id, tenant_id, full_name, meter_serial,
                service_address, phone, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(customer.tenant_id.as_uuid())
        .bind(&customer.full_name)
        .bind(&customer.meter_serial)
        .bind(&customer.service_address)
        .bind(&customer.phone)
        .bind(customer_status_str(customer.status))
        .bind(customer.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_customer", e))?;
        Ok(())
    }

    async fn customer_by_id(
        &self,
        tenant_id: TenantId,
        id: CustomerId,
    ) -> Result<Option<Customer>, StoreError> {
        sqlx::query("SELECT * FROM customers WHERE id = $1 AND tenant_id = $2")
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("customer_by_id", e))?
            .map(|row| customer_from_row(&row))
            .transpose()
    }

    async fn list_customers(&self, tenant_id: TenantId) -> Result<Vec<Customer>, StoreError> {
        sqlx::query("SELECT * FROM customers WHERE tenant_id = $1 ORDER BY created_at ASC")
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_customers", e))?
            .iter()
            .map(customer_from_row)
            .collect()
    }

    async fn update_customer(&self, customer: Customer) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE customers
            SET full_name = $3, meter_serial = $4, service_address = $5,
                phone = $6, status = $7
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(customer.id.as_uuid())
        .bind(customer.tenant_id.as_uuid())
        .bind(&customer.full_name)
        .bind(&customer.meter_serial)
        .bind(&customer.service_address)
        .bind(&customer.phone)
        .bind(customer_status_str(customer.status))
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_customer", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn count_customers(&self, tenant_id: TenantId) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM customers WHERE tenant_id = $1")
            .bind(tenant_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("count_customers", e))?;
        let n: i64 = get(&row, "n")?;
        Ok(n as u64)
    }
}

#[async_trait]
impl BillingStore for PostgresStore {
    async fn insert_invoice(&self, invoice: Invoice) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, tenant_id, customer_id, amount_cents,
                balance_cents, status, due_date, issued_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(invoice.id.as_uuid())
        .bind(invoice.tenant_id.as_uuid())
        .bind(invoice.customer_id.as_uuid())
        .bind(invoice.amount_cents)
        .bind(invoice.balance_cents)
        .bind(invoice_status_str(invoice.status))
        .bind(invoice.due_date)
        .bind(invoice.issued_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e))?;
        Ok(())
    }

    async fn invoice_by_id(
        &self,
        tenant_id: TenantId,
        id: InvoiceId,
    ) -> Result<Option<Invoice>, StoreError> {
        sqlx::query("SELECT * FROM invoices WHERE id = $1 AND tenant_id = $2")
            .bind(id.as_uuid())
            .bind(tenant_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("invoice_by_id", e))?
            .map(|row| invoice_from_row(&row))
            .transpose()
    }

    async fn list_invoices(&self, tenant_id: TenantId) -> Result<Vec<Invoice>, StoreError> {
        sqlx::query("SELECT * FROM invoices WHERE tenant_id = $1 ORDER BY issued_at ASC")
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_invoices", e))?
            .iter()
            .map(invoice_from_row)
            .collect()
    }

    async fn list_payments(&self, tenant_id: TenantId) -> Result<Vec<Payment>, StoreError> {
        sqlx::query("SELECT * FROM payments WHERE tenant_id = $1 ORDER BY recorded_at ASC")
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_payments", e))?
            .iter()
            .map(payment_from_row)
            .collect()
    }

    async fn count_payments_since(
        &self,
        tenant_id: TenantId,
        since: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM payments WHERE tenant_id = $1 AND recorded_at >= $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_payments_since", e))?;
        let n: i64 = get(&row, "n")?;
        Ok(n as u64)
    }

    #[instrument(skip(self, payment), fields(payment_id = %payment.id, tenant_id = %payment.tenant_id))]
    async fn record_payment(&self, payment: Payment) -> Result<Option<Invoice>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("record_payment", e))?;

        let updated = match payment.invoice_id {
            Some(invoice_id) => {
                let row = sqlx::query(
                    "SELECT * FROM invoices WHERE id = $1 AND tenant_id = $2 FOR UPDATE",
                )
                .bind(invoice_id.as_uuid())
                .bind(payment.tenant_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("record_payment", e))?
                .ok_or(StoreError::NotFound)?;

                let mut invoice = invoice_from_row(&row)?;
                invoice.reconcile_payment(payment.amount_cents)?;

                sqlx::query(
                    "UPDATE invoices SET balance_cents = $2, status = $3 WHERE id = $1",
                )
                .bind(invoice.id.as_uuid())
                .bind(invoice.balance_cents)
                .bind(invoice_status_str(invoice.status))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("record_payment", e))?;

                Some(invoice)
            }
            None => None,
        };

        sqlx::query(
            r#"
            INSERT INTO payments (
                id, tenant_id, customer_id, invoice_id,
                amount_cents, method, collector_id, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.tenant_id.as_uuid())
        .bind(payment.customer_id.as_uuid())
        .bind(payment.invoice_id.map(|i| *i.as_uuid()))
        .bind(payment.amount_cents)
        .bind(method_str(payment.method))
        .bind(payment.collector_id.map(|u| *u.as_uuid()))
        .bind(payment.recorded_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("record_payment", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("record_payment", e))?;

        Ok(updated)
    }
}
