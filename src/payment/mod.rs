//! Payment domain module
//!
//! Contains the payment models and the payment applier.

mod model;
mod service;

pub use model::{
    GatewayCallback, InitiatePaymentRequest, Payment, PaymentStatus, RecordPaymentRequest,
    MANUAL_GATEWAY,
};
pub use service::PaymentService;
