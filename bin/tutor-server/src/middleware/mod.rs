//! HTTP middleware stack.

pub mod cors;
pub mod rate_limit;
pub mod trace;
