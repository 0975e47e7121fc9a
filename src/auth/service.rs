use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::csrf::generate_csrf_token;
use super::password::{validate_password_strength, verify_password, PasswordHasher};
use super::reset::{generate_reset_token, reset_link, reset_token_expiry};
use super::token::{Claims, TokenSigner};
use super::{normalize_email, require_admin, AuthError};
use crate::config::RESET_TOKEN_TTL_HOURS;
use crate::db::{self, Database};
use crate::mail::{reset_email_html, Mailer, RESET_EMAIL_SUBJECT};
use crate::models::enums::Role;

/// Response to forgot-password, identical whether or not the account exists.
pub const FORGOT_PASSWORD_MESSAGE: &str =
    "If an account exists with this email, you will receive password reset instructions.";

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub fhir_id: String,
    pub role: Role,
    pub csrf_token: String,
}

pub struct AuthService {
    db: Arc<Database>,
    hasher: PasswordHasher,
    signer: TokenSigner,
    mailer: Arc<dyn Mailer>,
    frontend_url: String,
}

impl AuthService {
    pub fn new(
        db: Arc<Database>,
        hasher: PasswordHasher,
        signer: TokenSigner,
        mailer: Arc<dyn Mailer>,
        frontend_url: &str,
    ) -> Self {
        Self {
            db,
            hasher,
            signer,
            mailer,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn hasher(&self) -> PasswordHasher {
        self.hasher
    }

    /// Unknown email and wrong password fail identically.
    pub fn login(&self, email: &str, password: &str) -> Result<LoginResponse, AuthError> {
        let email = email.trim().to_lowercase();
        let patient = self
            .db
            .with_conn(|conn| db::get_patient_by_email(conn, &email))?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &patient.password_hash) {
            tracing::info!(fhir_id = %patient.fhir_id, "Login rejected: bad password");
            return Err(AuthError::InvalidCredentials);
        }

        let role = patient.role();
        let token = self.signer.issue(&patient.email, role)?;
        tracing::info!(fhir_id = %patient.fhir_id, role = role.as_str(), "Login succeeded");

        Ok(LoginResponse {
            token,
            token_type: "Bearer",
            fhir_id: patient.fhir_id,
            role,
            csrf_token: generate_csrf_token(),
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        self.signer.verify(token)
    }

    pub fn check_email(&self, email: &str) -> Result<bool, AuthError> {
        let email = email.trim().to_lowercase();
        Ok(self.db.with_conn(|conn| db::email_exists(conn, &email))?)
    }

    /// Issue a reset token and email the link when the account exists.
    ///
    /// Always answers with `FORGOT_PASSWORD_MESSAGE`; delivery failures are
    /// logged only.
    pub fn forgot_password(&self, email: &str) -> Result<&'static str, AuthError> {
        let email = email.trim().to_lowercase();
        let Some(patient) = self
            .db
            .with_conn(|conn| db::get_patient_by_email(conn, &email))?
        else {
            tracing::info!("Password reset requested for unknown email");
            return Ok(FORGOT_PASSWORD_MESSAGE);
        };

        let token = generate_reset_token();
        let expires = reset_token_expiry(Utc::now());
        self.db
            .with_conn(|conn| db::set_reset_token(conn, &patient.email, &token, expires))?;

        let link = reset_link(&self.frontend_url, &token);
        let html = reset_email_html(&patient.first_name, &link, RESET_TOKEN_TTL_HOURS);
        match self.mailer.send(&patient.email, RESET_EMAIL_SUBJECT, &html) {
            Ok(()) => tracing::info!(fhir_id = %patient.fhir_id, "Password reset email sent"),
            Err(e) => {
                tracing::error!(fhir_id = %patient.fhir_id, error = %e, "Password reset email failed")
            }
        }

        Ok(FORGOT_PASSWORD_MESSAGE)
    }

    pub fn reset_password(&self, token: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password_strength(new_password)?;
        if token.trim().is_empty() {
            return Err(AuthError::InvalidOrExpired);
        }

        let hash = self.hasher.hash_password(new_password);
        let consumed = self
            .db
            .with_conn(|conn| db::consume_reset_token(conn, token.trim(), &hash, Utc::now()))?;
        if !consumed {
            return Err(AuthError::InvalidOrExpired);
        }

        tracing::info!("Password reset completed");
        Ok(())
    }

    /// Promote another account to admin. Caller must be an admin.
    pub fn assign_admin(&self, caller: &Claims, email: &str) -> Result<(), AuthError> {
        require_admin(caller)?;
        let email = normalize_email(email)?;
        let updated = self
            .db
            .with_conn(|conn| db::set_admin_flag(conn, &email, true))?;
        if !updated {
            return Err(AuthError::AccountNotFound(email));
        }
        tracing::info!(by = %caller.sub, "Admin role assigned");
        Ok(())
    }
}
