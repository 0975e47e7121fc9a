//! External clinical registry (FHIR R4) client.

pub mod client;
pub mod range;
pub mod types;

pub use client::*;
pub use range::{normalize_reference_range, parse_reference_range};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Cannot reach clinical registry at {0}")]
    Connection(String),

    #[error("Registry returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Unexpected registry response: {0}")]
    ResponseParsing(String),

    #[error("Invalid resource id: {0:?}")]
    InvalidId(String),
}
