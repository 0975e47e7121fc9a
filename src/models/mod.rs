pub mod enums;
pub mod lab_set;
pub mod pagination;
pub mod patient;

pub use lab_set::*;
pub use pagination::*;
pub use patient::*;
