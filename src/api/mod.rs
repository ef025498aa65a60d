//! HTTP gateway surface

mod errors;
pub mod handlers;

pub use errors::GatewayError;
