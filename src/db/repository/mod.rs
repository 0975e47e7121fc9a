//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`; callers obtain the
//! connection through `Database::with_conn`.

mod lab_set;
mod patient;

pub use lab_set::*;
pub use patient::*;
