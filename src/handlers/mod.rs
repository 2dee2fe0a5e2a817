//! API handlers for the Tally backend

mod debt;
mod payment;
mod profile;

pub use debt::*;
pub use payment::*;
pub use profile::*;
