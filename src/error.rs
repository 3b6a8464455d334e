//! Error types for `cipherhunt`
//!
//! Caller-visible game errors, collaborator failures, configuration
//! errors, and the top-level error that maps onto CLI exit codes.

use std::path::PathBuf;
use thiserror::Error;

use crate::game::model::{Phase, SessionId};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `cipherhunt` CLI operations.
///
/// These codes follow Unix conventions.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Session engine error (rejected action, faulted session)
    pub const ENGINE_ERROR: i32 = 5;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;

    /// Interrupted by SIGINT (Ctrl+C)
    pub const INTERRUPTED: i32 = 130;

    /// Terminated by SIGTERM
    pub const TERMINATED: i32 = 143;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `cipherhunt` operations.
///
/// Aggregates the domain errors and maps each onto an exit code.
#[derive(Debug, Error)]
pub enum CipherHuntError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session engine error
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CipherHuntError {
    /// Returns the appropriate exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Json(_) | Self::Yaml(_) => ExitCode::CONFIG_ERROR,
            Self::Engine(_) => ExitCode::ENGINE_ERROR,
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
        }
    }
}

// ============================================================================
// Game Errors
// ============================================================================

/// Caller-visible rejection of a game action.
///
/// None of these are retried by the engine; the transport layer turns
/// them into a player-facing response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Session, task, player or meeting does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Action attempted outside the phase it requires
    #[error("{action} is not allowed during {phase}")]
    InvalidPhase {
        /// Name of the rejected action
        action: &'static str,
        /// Phase the session was in
        phase: Phase,
    },

    /// Duplicate task completion, vote, or meeting message
    #[error("already acted: {0}")]
    AlreadyActed(String),

    /// Role or ownership mismatch
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed or out-of-range input
    #[error("validation failed: {0}")]
    Validation(String),
}

impl GameError {
    /// Stable machine-readable code for this error kind.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidPhase { .. } => "invalid_phase",
            Self::AlreadyActed(_) => "already_acted",
            Self::Unauthorized(_) => "unauthorized",
            Self::Validation(_) => "validation_error",
        }
    }
}

// ============================================================================
// Collaborator Errors
// ============================================================================

/// Durable store failures reported by a `PersistenceGateway`.
#[derive(Debug, Clone, Error)]
pub enum PersistenceError {
    /// Store unreachable or timed out
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Write rejected by the store
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Roster collaborator failures.
#[derive(Debug, Clone, Error)]
pub enum RosterError {
    /// Roster id unknown to the provider
    #[error("roster not found: {0}")]
    NotFound(String),

    /// Provider could not be reached
    #[error("roster provider unavailable: {0}")]
    Unavailable(String),
}

/// Identity resolution failures.
#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    /// Token did not map to any player
    #[error("unknown or expired token")]
    InvalidToken,
}

// ============================================================================
// Engine Errors
// ============================================================================

/// Errors returned by the session engine façade.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The action was rejected by the game rules
    #[error(transparent)]
    Game(#[from] GameError),

    /// A critical durable write kept failing after retries
    #[error("durable write failed for session {session_id}: {source}")]
    Persistence {
        /// Session whose mirror could not be written
        session_id: SessionId,
        /// Last error from the store
        #[source]
        source: PersistenceError,
    },

    /// The session was frozen after an earlier durability failure
    #[error("session {0} is faulted and no longer accepts actions")]
    SessionFaulted(SessionId),

    /// Roster provider failure
    #[error(transparent)]
    Roster(#[from] RosterError),

    /// Identity resolution failure
    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl EngineError {
    /// Returns the game error if this is a rule rejection.
    #[must_use]
    pub const fn as_game(&self) -> Option<&GameError> {
        match self {
            Self::Game(err) => Some(err),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}: {message}")]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}")]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the problematic field (e.g., "tasks.majority[2].key")
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {} at {}", prefix, self.message, self.path)
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Informational; the configuration still loads
    Warning,
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `cipherhunt` operations.
pub type Result<T> = std::result::Result<T, CipherHuntError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::SUCCESS, 0);
        assert_eq!(ExitCode::ERROR, 1);
        assert_eq!(ExitCode::CONFIG_ERROR, 2);
        assert_eq!(ExitCode::IO_ERROR, 3);
        assert_eq!(ExitCode::ENGINE_ERROR, 5);
        assert_eq!(ExitCode::USAGE_ERROR, 64);
        assert_eq!(ExitCode::INTERRUPTED, 130);
        assert_eq!(ExitCode::TERMINATED, 143);
    }

    #[test]
    fn test_engine_error_exit_code() {
        let err: CipherHuntError =
            EngineError::from(GameError::NotFound("session s-1".to_string())).into();
        assert_eq!(err.exit_code(), ExitCode::ENGINE_ERROR);
    }

    #[test]
    fn test_config_error_exit_code() {
        let err: CipherHuntError = ConfigError::MissingFile {
            path: PathBuf::from("/test"),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_io_error_exit_code() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let err: CipherHuntError = io_err.into();
        assert_eq!(err.exit_code(), ExitCode::IO_ERROR);
    }

    #[test]
    fn test_usage_error_exit_code() {
        let err = CipherHuntError::Usage("--players must be at least 2".to_string());
        assert_eq!(err.exit_code(), ExitCode::USAGE_ERROR);
    }

    #[test]
    fn test_game_error_codes() {
        assert_eq!(GameError::NotFound(String::new()).code(), "not_found");
        assert_eq!(
            GameError::InvalidPhase {
                action: "cast_vote",
                phase: Phase::Tasks,
            }
            .code(),
            "invalid_phase"
        );
        assert_eq!(GameError::AlreadyActed(String::new()).code(), "already_acted");
        assert_eq!(GameError::Unauthorized(String::new()).code(), "unauthorized");
        assert_eq!(GameError::Validation(String::new()).code(), "validation_error");
    }

    #[test]
    fn test_invalid_phase_display() {
        let err = GameError::InvalidPhase {
            action: "cast_vote",
            phase: Phase::Meeting,
        };
        assert_eq!(err.to_string(), "cast_vote is not allowed during MEETING");
    }

    #[test]
    fn test_as_game() {
        let err = EngineError::from(GameError::AlreadyActed("vote".to_string()));
        assert_eq!(err.as_game().map(GameError::code), Some("already_acted"));

        let err = EngineError::SessionFaulted(SessionId::new("s-1"));
        assert!(err.as_game().is_none());
    }

    #[test]
    fn test_validation_issue_display() {
        let issue = ValidationIssue {
            path: "meeting.task_threshold".to_string(),
            message: "must be at least 1".to_string(),
            severity: Severity::Error,
        };
        assert_eq!(
            issue.to_string(),
            "error: must be at least 1 at meeting.task_threshold"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::ParseError {
            path: PathBuf::from("game.yaml"),
            line: Some(42),
            message: "unexpected token".to_string(),
        };
        assert!(err.to_string().contains("game.yaml"));
        assert!(err.to_string().contains("unexpected token"));
    }
}
