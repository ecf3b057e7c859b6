//! Error types for mnemon operations.
//!
//! Classification verdicts (FAIL/REJECT/HOLD) are data, not errors; this
//! module only covers faults of the engine itself: configuration, storage,
//! partial durability, and integrity failures.

use thiserror::Error;

/// Result type alias for mnemon operations.
pub type MnemonResult<T> = Result<T, MnemonError>;

/// Main error type for all mnemon operations.
#[derive(Error, Debug)]
pub enum MnemonError {
    /// Input validation failed outside the classifier (bad arguments to an
    /// operation, not a per-item verdict).
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Configuration is present but malformed. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Ledger store operation failed.
    #[error("Ledger store error: {message}")]
    Ledger {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Wave store operation failed.
    #[error("Wave store error: {message}")]
    Wave {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Report store operation failed.
    #[error("Report store error: {message}")]
    Report {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The ledger row is durable but the wave write or ref attach did not
    /// complete; `wpm_ref` is null and a repair task has been enqueued.
    #[error("Partial durability for {memorise_id}: {message}")]
    PartialDurability {
        memorise_id: String,
        tsm_ref: String,
        message: String,
    },

    /// Cross-store reference or checksum mismatch. Never retried.
    #[error("Consistency error for {memorise_id}: {message}")]
    Consistency {
        memorise_id: String,
        message: String,
    },

    /// A durable write for this data vector was already performed.
    #[error("Duplicate promotion for data vector {data_vector_id}")]
    DuplicatePromotion { data_vector_id: String },

    /// Record not found.
    #[error("Record not found: {memorise_id}")]
    NotFound { memorise_id: String },

    /// Audit trail write failed. Surfaced via logging, never propagated to
    /// the operation that triggered the audit event.
    #[error("Audit error: {message}")]
    Audit { message: String },

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MnemonError {
    /// Create a ledger store error.
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger {
            message: message.into(),
            source: None,
        }
    }

    /// Create a ledger store error with a source.
    pub fn ledger_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Ledger {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a wave store error.
    pub fn wave(message: impl Into<String>) -> Self {
        Self::Wave {
            message: message.into(),
            source: None,
        }
    }

    /// Create a report store error.
    pub fn report(message: impl Into<String>) -> Self {
        Self::Report {
            message: message.into(),
            source: None,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Whether a retry could plausibly succeed. Consistency and duplicate
    /// failures are permanent; storage and I/O faults are treated as
    /// transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Ledger { .. } | Self::Wave { .. } | Self::Report { .. } | Self::Io(_)
        )
    }

    /// Process exit code for this failure class. `0` is success and is never
    /// produced here.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => 2,
            Self::Configuration(_) => 3,
            Self::Ledger { .. } | Self::Wave { .. } | Self::Report { .. } => 4,
            Self::PartialDurability { .. } => 5,
            Self::Consistency { .. } => 6,
            Self::DuplicatePromotion { .. } => 7,
            Self::NotFound { .. } => 8,
            Self::Audit { .. } | Self::Io(_) | Self::Serialization(_) => 9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(MnemonError::ledger("db locked").is_transient());
        assert!(MnemonError::wave("disk full").is_transient());
        assert!(!MnemonError::Consistency {
            memorise_id: "m1".into(),
            message: "checksum mismatch".into(),
        }
        .is_transient());
        assert!(!MnemonError::Configuration("bad json".into()).is_transient());
    }

    #[test]
    fn exit_codes_are_distinct_per_class() {
        let errors = vec![
            MnemonError::validation("x"),
            MnemonError::Configuration("x".into()),
            MnemonError::ledger("x"),
            MnemonError::PartialDurability {
                memorise_id: "m".into(),
                tsm_ref: "t".into(),
                message: "x".into(),
            },
            MnemonError::Consistency {
                memorise_id: "m".into(),
                message: "x".into(),
            },
            MnemonError::DuplicatePromotion {
                data_vector_id: "d".into(),
            },
        ];
        let codes: std::collections::HashSet<i32> =
            errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(codes.len(), errors.len());
    }
}
