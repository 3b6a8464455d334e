//! Configuration validation
//!
//! Semantic checks on a deserialized `GameConfig`. Validation collects
//! ALL issues (doesn't stop at the first) so a user can fix a file in
//! one pass.

use std::collections::HashSet;

use crate::config::schema::{GameConfig, TaskTemplate};
use crate::error::{Severity, ValidationIssue};

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &GameConfig) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_session(config);
        self.validate_cipher(config);
        self.validate_meeting(config);
        self.validate_tasks(config);
        self.validate_persistence(config);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Sections
    // ========================================================================

    fn validate_session(&mut self, config: &GameConfig) {
        if config.session.saboteur_count == 0 {
            self.add_error("session.saboteur_count", "At least one saboteur is required");
        }
        if config.session.survival_threshold < config.session.saboteur_count {
            self.add_warning(
                "session.survival_threshold",
                "Survival threshold below the saboteur count can never trigger",
            );
        }
    }

    fn validate_cipher(&mut self, config: &GameConfig) {
        let cipher = &config.cipher;
        if cipher.secrets.is_empty() {
            self.add_error("cipher.secrets", "At least one secret is required");
        }
        for (i, secret) in cipher.secrets.iter().enumerate() {
            if !secret.chars().any(char::is_alphanumeric) {
                self.add_error(
                    &format!("cipher.secrets[{i}]"),
                    "Secret must contain at least one letter or digit",
                );
            }
            if secret.contains(cipher.placeholder) {
                self.add_error(
                    &format!("cipher.secrets[{i}]"),
                    "Secret must not contain the placeholder character",
                );
            }
        }
        if cipher.placeholder.is_alphanumeric() {
            self.add_warning(
                "cipher.placeholder",
                "An alphanumeric placeholder is hard to tell apart from revealed text",
            );
        }
        if cipher.reveal_step == 0 || cipher.reveal_step > 100 {
            self.add_error("cipher.reveal_step", "Must be between 1 and 100");
        }
        if cipher.conceal_step > 100 {
            self.add_error("cipher.conceal_step", "Must be at most 100");
        }
    }

    fn validate_meeting(&mut self, config: &GameConfig) {
        let meeting = &config.meeting;
        if meeting.task_threshold == 0 {
            self.add_error("meeting.task_threshold", "Must be at least 1");
        }
        if meeting.duration.is_zero() {
            self.add_error("meeting.duration", "Meeting duration must be non-zero");
        }
        if meeting.max_message_len == 0 {
            self.add_error("meeting.max_message_len", "Must be at least 1");
        }
    }

    fn validate_tasks(&mut self, config: &GameConfig) {
        let tasks = &config.tasks;
        if tasks.majority.is_empty() {
            self.add_error("tasks.majority", "Majority catalog cannot be empty");
        }
        if tasks.saboteur.is_empty() {
            self.add_warning(
                "tasks.saboteur",
                "Without saboteur tasks the cipher can never be decrypted",
            );
        }
        if let Some(threshold) = tasks.proximity_threshold {
            if !threshold.is_finite() || threshold <= 0.0 {
                self.add_error("tasks.proximity_threshold", "Must be a positive distance");
            }
        }
        self.validate_catalog("tasks.majority", &tasks.majority);
        self.validate_catalog("tasks.saboteur", &tasks.saboteur);
    }

    fn validate_catalog(&mut self, path: &str, catalog: &[TaskTemplate]) {
        let mut seen = HashSet::new();
        for (i, template) in catalog.iter().enumerate() {
            let entry = format!("{path}[{i}]");
            if template.key.is_empty() {
                self.add_error(&format!("{entry}.key"), "Task key cannot be empty");
            } else if template.key.contains('/') {
                self.add_error(&format!("{entry}.key"), "Task key cannot contain '/'");
            }
            if !seen.insert(template.key.as_str()) {
                self.add_error(
                    &format!("{entry}.key"),
                    &format!("Duplicate task key '{}'", template.key),
                );
            }
            if !template.location.x.is_finite() || !template.location.y.is_finite() {
                self.add_error(&format!("{entry}.location"), "Coordinates must be finite");
            }
            if template.points == 0 {
                self.add_warning(&format!("{entry}.points"), "Task awards no points");
            }
        }
    }

    fn validate_persistence(&mut self, config: &GameConfig) {
        let persistence = &config.persistence;
        if persistence.max_attempts == 0 {
            self.add_error("persistence.max_attempts", "Must be at least 1");
        }
        if persistence.initial_backoff > persistence.max_backoff {
            self.add_warning(
                "persistence.initial_backoff",
                "Initial backoff exceeds max_backoff and will be capped",
            );
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn add_error(&mut self, path: &str, message: &str) {
        self.errors.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: &str, message: &str) {
        self.warnings.push(ValidationIssue {
            path: path.to_string(),
            message: message.to_string(),
            severity: Severity::Warning,
        });
    }
}
