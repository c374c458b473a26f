//! Clients for the third-party platforms this service orchestrates.
//!
//! Each client owns its request/response types and maps every transport or
//! non-2xx failure to a [`ServiceError::Integration`](crate::errors::ServiceError)
//! tagged with the upstream's name. None of them retry; callers decide what a
//! failure means for the request in flight.

pub mod calendly;
pub mod commerce;
pub mod forms;
pub mod mailing;
pub mod notchpay;
