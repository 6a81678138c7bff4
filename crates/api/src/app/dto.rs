//! Request/response DTOs and JSON mapping helpers.

use serde::Deserialize;
use serde_json::json;

use aquabill_auth::{Role, User};
use aquabill_billing::{Invoice, Payment, PaymentMethod};
use aquabill_metering::{Customer, CustomerStatus};
use aquabill_tenancy::{CeilingOverride, Tenant};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTenantRequest {
    pub slug: String,
    pub display_name: String,
    pub plan: String,
    #[serde(default)]
    pub max_staff: CeilingOverride,
    #[serde(default)]
    pub max_customers: CeilingOverride,
    #[serde(default)]
    pub max_transactions: CeilingOverride,
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub username: Option<String>,
    pub password: String,
    pub role_type: String,
    pub role_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub grants: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleGrantsRequest {
    pub grants: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct GrantPermissionRequest {
    pub capability: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub full_name: String,
    pub meter_serial: String,
    pub service_address: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCustomerRequest {
    pub full_name: Option<String>,
    pub service_address: Option<String>,
    pub phone: Option<String>,
    pub disconnected: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct IssueInvoiceRequest {
    pub customer_id: String,
    pub amount_cents: i64,
    /// RFC3339.
    pub due_date: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub customer_id: String,
    pub invoice_id: Option<String>,
    pub amount_cents: i64,
    pub method: String,
}

pub fn tenant_to_json(t: &Tenant) -> serde_json::Value {
    json!({
        "id": t.id.to_string(),
        "slug": t.slug,
        "display_name": t.display_name,
        "status": t.status.to_string(),
        "plan": t.plan.as_str(),
        "max_staff": t.max_staff,
        "max_customers": t.max_customers,
        "max_transactions": t.max_transactions,
        "created_at": t.created_at.to_rfc3339(),
    })
}

pub fn user_to_json(u: &User) -> serde_json::Value {
    json!({
        "id": u.id.to_string(),
        "tenant_id": u.tenant_id.map(|t| t.to_string()),
        "email": u.email,
        "username": u.username,
        "role_type": u.role_type.as_str(),
        "role_id": u.role_id.map(|r| r.to_string()),
        "is_active": u.is_active,
        "created_at": u.created_at.to_rfc3339(),
    })
}

pub fn role_to_json(r: &Role) -> serde_json::Value {
    let mut grants: Vec<&str> = r.grants.iter().map(|c| c.as_str()).collect();
    grants.sort_unstable();
    json!({
        "id": r.id.to_string(),
        "tenant_id": r.tenant_id.to_string(),
        "name": r.name,
        "description": r.description,
        "grants": grants,
    })
}

pub fn customer_to_json(c: &Customer) -> serde_json::Value {
    json!({
        "id": c.id.to_string(),
        "tenant_id": c.tenant_id.to_string(),
        "full_name": c.full_name,
        "meter_serial": c.meter_serial,
        "service_address": c.service_address,
        "phone": c.phone,
        "status": match c.status {
            CustomerStatus::Active => "active",
            CustomerStatus::Disconnected => "disconnected",
        },
        "created_at": c.created_at.to_rfc3339(),
    })
}

pub fn invoice_to_json(i: &Invoice) -> serde_json::Value {
    json!({
        "id": i.id.to_string(),
        "tenant_id": i.tenant_id.to_string(),
        "customer_id": i.customer_id.to_string(),
        "amount_cents": i.amount_cents,
        "balance_cents": i.balance_cents,
        "status": i.status,
        "due_date": i.due_date.to_rfc3339(),
        "issued_at": i.issued_at.to_rfc3339(),
    })
}

pub fn payment_to_json(p: &Payment) -> serde_json::Value {
    json!({
        "id": p.id.to_string(),
        "tenant_id": p.tenant_id.to_string(),
        "customer_id": p.customer_id.to_string(),
        "invoice_id": p.invoice_id.map(|i| i.to_string()),
        "amount_cents": p.amount_cents,
        "method": match p.method {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::MobileMoney => "mobile_money",
            PaymentMethod::Card => "card",
        },
        "collector_id": p.collector_id.map(|u| u.to_string()),
        "recorded_at": p.recorded_at.to_rfc3339(),
    })
}
