pub mod client;
pub mod parser;
pub mod prompt;

pub use client::*;
pub use prompt::{age_descriptor, AgeDescriptor, ObservationSummary};

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use crate::models::enums::Gender;
use crate::models::ExtractedTest;

const EXTRACTION_MAX_TOKENS: u32 = 4096;
const EXTRACTION_TEMPERATURE: f32 = 0.2;
const INTERPRETATION_MAX_TOKENS: u32 = 2048;
const INTERPRETATION_TEMPERATURE: f32 = 0.3;

#[derive(Error, Debug)]
pub enum InterpretationError {
    #[error("Cannot reach language model at {0}")]
    Connection(String),

    #[error("Language model returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed completion response: {0}")]
    ResponseParsing(String),

    #[error("Model output is not valid lab-result JSON: {0}")]
    UpstreamParse(String),

    #[error("Language model returned an empty reply")]
    EmptyResponse,
}

/// Chat-completion backend.
pub trait LlmClient: Send + Sync {
    fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, InterpretationError>;
}

/// Structuring of OCR text and plain-language interpretation of lab sets.
pub struct Interpreter {
    llm: Arc<dyn LlmClient>,
}

impl Interpreter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// OCR text in, normalized lab values out.
    pub fn extract_structured_results(
        &self,
        raw_text: &str,
    ) -> Result<Vec<ExtractedTest>, InterpretationError> {
        let prompt = prompt::extraction_prompt(raw_text);
        let reply = self
            .llm
            .complete(&prompt, EXTRACTION_MAX_TOKENS, EXTRACTION_TEMPERATURE)?;
        let tests = parser::parse_extracted_tests(&reply)?;
        tracing::info!(tests = tests.len(), "Structured lab results extracted");
        Ok(tests)
    }

    /// Interpretation text for a whole set. `on` is the date the patient's
    /// age is computed at (the test date).
    pub fn try_interpret_full_set(
        &self,
        observations: &[ObservationSummary],
        birth_date: NaiveDate,
        gender: Gender,
        on: NaiveDate,
    ) -> Result<String, InterpretationError> {
        let age = age_descriptor(birth_date, on);
        let prompt = prompt::interpretation_prompt(observations, gender, &age);
        let reply = self
            .llm
            .complete(&prompt, INTERPRETATION_MAX_TOKENS, INTERPRETATION_TEMPERATURE)?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(InterpretationError::EmptyResponse);
        }
        Ok(reply.to_string())
    }

    /// Like `try_interpret_full_set`, but upstream failures come back as an
    /// inline message instead of an error. For callers that render the text
    /// directly; the lab-set service uses the fallible variant so a failed
    /// call is never stored as an interpretation.
    pub fn interpret_full_set(
        &self,
        observations: &[ObservationSummary],
        birth_date: NaiveDate,
        gender: Gender,
        on: NaiveDate,
    ) -> String {
        self.try_interpret_full_set(observations, birth_date, gender, on)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Interpretation failed");
                format!("Interpretation unavailable: {e}")
            })
    }
}
