//! Lab-report processing: text extraction, language-model structuring and
//! interpretation, and the lab-set orchestrator that ties them to the
//! registry and the local index.

pub mod extraction;
pub mod interpretation;
pub mod lab_sets;
