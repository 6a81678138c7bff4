//! `aquabill-metering` — customers and their metered connections.

pub mod customer;

pub use customer::{Customer, CustomerStatus};
