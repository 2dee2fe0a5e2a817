//! Identity linking domain module

mod service;

pub use service::{linking_sweep, LinkingService};
