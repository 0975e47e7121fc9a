//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Audit logger, on every route
//! 2. Auth validator, protected routes only
//! 3. Anti-forgery check, protected routes only

pub mod audit;
pub mod auth;
pub mod csrf;
