use rusqlite;
use std::env;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Environment variable error: {0}")]
    EnvVarError(#[from] env::VarError),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {entity_type} '{entity_id}'")]
    NotFound {
        entity_type: &'static str,
        entity_id: String,
    },

    #[error("Invalid {entity_type} transition from {from} to {to}. Allowed: {allowed}")]
    InvalidStateTransition {
        entity_type: &'static str,
        from: String,
        to: String,
        allowed: String,
    },
    #[error("Cannot create phase: phase '{active_phase_id}' is already ACTIVE")]
    ActivePhaseExists { active_phase_id: String },
    #[error("Cannot create task: decision '{decision_id}' is {status}, not LOCKED")]
    DecisionNotLocked { decision_id: String, status: String },
    #[error("Phase '{phase_id}' is {status}, not ACTIVE")]
    PhaseNotActive {
        rule: &'static str,
        phase_id: String,
        status: String,
    },

    #[error("Decision '{decision_id}' is LOCKED and cannot be modified")]
    LockedDecisionImmutable { decision_id: String },
    #[error("Phase '{phase_id}' is {status} and cannot be modified")]
    ClosedPhaseImmutable { phase_id: String, status: String },
    #[error(
        "Hash verification failed for {entity_type} '{entity_id}': expected {expected}, actual {actual}"
    )]
    HashVerification {
        entity_type: &'static str,
        entity_id: String,
        expected: String,
        actual: String,
    },

    #[error("Confirmation mismatch: expected '{expected}'")]
    ConfirmationMismatch { expected: &'static str },
    #[error("Confirmation token has already been used")]
    TokenAlreadyUsed,
    #[error("Confirmation token is not valid for {action} on '{entity_id}'")]
    TokenInvalid { action: String, entity_id: String },
    #[error("Confirmation token expired at {expired_at}")]
    TokenExpired { expired_at: i64 },
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

impl WorkflowError {
    /// Stable code consumed by the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::ValidationError(_) => "E1001",
            WorkflowError::NotFound { .. } => "E1002",
            WorkflowError::InvalidStateTransition { .. } => "E3001",
            WorkflowError::ActivePhaseExists { .. } => "E3002",
            WorkflowError::DecisionNotLocked { .. } => "E3003",
            WorkflowError::PhaseNotActive { .. } => "E3004",
            WorkflowError::LockedDecisionImmutable { .. } => "E4001",
            WorkflowError::ClosedPhaseImmutable { .. } => "E4002",
            WorkflowError::HashVerification { .. } => "E4003",
            WorkflowError::ConfirmationMismatch { .. } => "E5001",
            WorkflowError::TokenAlreadyUsed => "E5002",
            WorkflowError::TokenInvalid { .. } => "E5003",
            WorkflowError::TokenExpired { .. } => "E5004",
            WorkflowError::RusqliteError(_) => "E9001",
            WorkflowError::IoError(_) | WorkflowError::EnvVarError(_) => "E9002",
        }
    }

    /// Enforcement rule violated by this error, if it is an invariant or transition failure.
    pub fn rule(&self) -> Option<&'static str> {
        match self {
            WorkflowError::ActivePhaseExists { .. } => Some("ENF-01"),
            WorkflowError::LockedDecisionImmutable { .. } => Some("ENF-02"),
            WorkflowError::DecisionNotLocked { .. } => Some("ENF-03"),
            WorkflowError::PhaseNotActive { rule, .. } => Some(*rule),
            WorkflowError::ClosedPhaseImmutable { .. } => Some("ENF-06"),
            WorkflowError::InvalidStateTransition { .. } => Some("STATE_MACHINE"),
            _ => None,
        }
    }

    /// Data corruption or tampering. Never retried.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, WorkflowError::HashVerification { .. })
    }

    pub fn not_found(entity_type: &'static str, entity_id: impl Into<String>) -> Self {
        WorkflowError::NotFound {
            entity_type,
            entity_id: entity_id.into(),
        }
    }
}
