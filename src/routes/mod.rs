//! Route definitions for the Tally API

mod debt;
mod payment;
mod profile;

pub use debt::debt_routes;
pub use payment::payment_routes;
pub use profile::profile_routes;
