//! API endpoint handlers, one module per resource.
//!
//! Handlers parse and shape HTTP; the work happens in the services held by
//! `CoreState`, run on the blocking pool.

pub mod auth;
pub mod health;
pub mod lab_sets;
pub mod observations;
pub mod patients;
