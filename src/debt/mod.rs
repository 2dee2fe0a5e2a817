//! Debt domain module
//!
//! Contains the debt models, the ledger engine, and the status transitions.

mod model;
mod service;

pub use model::{
    calculate_interest, CreateDebtRequest, Debt, DebtResponse, DebtStatus, ListDebtsQuery,
    UpdateDebtRequest,
};
pub use service::{DebtLimits, DebtService};
