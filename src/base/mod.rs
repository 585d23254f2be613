//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): transport error codes mirroring `net_error_list.h`
//! - [`RequestError`](neterror::RequestError): what a failure callback receives
//! - [`WorkState`](loadstate::WorkState): lifecycle of a queued request

pub mod context;
pub mod loadstate;
pub mod neterror;
