//! Built-in agent variants.
//!
//! Only the customer service agent changes ticket state today. The
//! back-office agents acknowledge their tickets in the event log and leave
//! them untouched.

mod back_office;
mod customer_service;

pub use back_office::{AccountingAgent, InvoicingAgent, KqlHuntingAgent, SalesAgent};
pub use customer_service::{ACKNOWLEDGEMENT, CustomerServiceAgent, RESOLUTION};
