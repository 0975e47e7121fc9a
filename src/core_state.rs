//! Application state shared by every request.
//!
//! Built once at startup from `Config`; services hold their collaborators
//! behind trait objects so tests can swap in mocks through `CoreParts`.

use std::sync::Arc;

use thiserror::Error;

use crate::auth::{AuthService, PasswordHasher, TokenSigner};
use crate::config::{Config, SESSION_TOKEN_TTL_SECS};
use crate::db::{Database, DatabaseError};
use crate::mail::{LogMailer, MailError, Mailer, MailgunMailer};
use crate::patients::PatientService;
use crate::pipeline::extraction::{
    ExtractionError, HttpOcrClient, OcrEngine, PdfPageRenderer, PdfiumRenderer, TextExtractor,
};
use crate::pipeline::interpretation::{
    ChatCompletionClient, InterpretationError, Interpreter, LlmClient,
};
use crate::pipeline::lab_sets::LabSetService;
use crate::registry::{ClinicalRegistry, FhirClient, RegistryError};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Document store: {0}")]
    Database(#[from] DatabaseError),

    #[error("Clinical registry client: {0}")]
    Registry(#[from] RegistryError),

    #[error("Text extraction: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Language model client: {0}")]
    Interpretation(#[from] InterpretationError),

    #[error("Mail client: {0}")]
    Mail(#[from] MailError),
}

/// Collaborators the services are built from.
pub struct CoreParts {
    pub db: Arc<Database>,
    pub registry: Arc<dyn ClinicalRegistry>,
    pub ocr: Arc<dyn OcrEngine>,
    pub renderer: Arc<dyn PdfPageRenderer>,
    pub llm: Arc<dyn LlmClient>,
    pub mailer: Arc<dyn Mailer>,
    pub hasher: PasswordHasher,
    pub signer: TokenSigner,
    pub frontend_url: String,
}

pub struct CoreState {
    pub db: Arc<Database>,
    pub registry: Arc<dyn ClinicalRegistry>,
    pub auth: AuthService,
    pub patients: PatientService,
    pub lab_sets: LabSetService,
}

impl CoreState {
    /// Open the store and construct the production HTTP clients.
    ///
    /// Must run outside the async runtime: the blocking `reqwest` clients
    /// own a runtime of their own.
    pub fn from_config(config: &Config) -> Result<Self, StartupError> {
        let db = Arc::new(Database::open(&config.database_path)?);
        tracing::info!(path = %config.database_path.display(), "Document store opened");

        let timeout = config.http_timeout_secs;
        let registry = Arc::new(FhirClient::new(&config.fhir_server_url, timeout)?);
        let ocr = Arc::new(HttpOcrClient::new(
            &config.ocr_api_url,
            config.ocr_api_key.clone(),
            timeout,
        )?);
        let renderer = Arc::new(PdfiumRenderer::new()?);
        let llm = Arc::new(ChatCompletionClient::new(
            &config.llm_api_url,
            config.llm_api_key.clone(),
            &config.llm_model,
            timeout,
        )?);

        let mailer: Arc<dyn Mailer> = match &config.mail {
            Some(mail) => {
                tracing::info!(domain = %mail.domain, "Mailgun delivery enabled");
                Arc::new(MailgunMailer::new(mail, timeout)?)
            }
            None => {
                tracing::warn!("No mail provider configured, reset emails will only be logged");
                Arc::new(LogMailer)
            }
        };

        Ok(Self::from_parts(CoreParts {
            db,
            registry,
            ocr,
            renderer,
            llm,
            mailer,
            hasher: PasswordHasher::new(config.password_hash_iterations),
            signer: TokenSigner::new(&config.jwt_secret, SESSION_TOKEN_TTL_SECS),
            frontend_url: config.frontend_url.clone(),
        }))
    }

    pub fn from_parts(parts: CoreParts) -> Self {
        let extractor = Arc::new(TextExtractor::new(parts.ocr, parts.renderer));
        let interpreter = Arc::new(Interpreter::new(parts.llm));

        Self {
            auth: AuthService::new(
                parts.db.clone(),
                parts.hasher,
                parts.signer,
                parts.mailer,
                &parts.frontend_url,
            ),
            patients: PatientService::new(parts.db.clone(), parts.registry.clone(), parts.hasher),
            lab_sets: LabSetService::new(
                parts.db.clone(),
                parts.registry.clone(),
                extractor,
                interpreter,
            ),
            db: parts.db,
            registry: parts.registry,
        }
    }
}
