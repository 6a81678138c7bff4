//! `aquabill-billing` — invoices, payments, and ledger reconciliation.

pub mod invoice;
pub mod payment;

pub use invoice::{Invoice, InvoiceStatus};
pub use payment::{Payment, PaymentMethod};
