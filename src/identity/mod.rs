//! Identity domain module
//!
//! Contains the identity models, canonical phone handling, and the profile
//! reconciliation service.

mod model;
mod service;

pub mod phone;

pub use model::{Identity, ProfileInput, PublicIdentity};
pub use service::ProfileService;
