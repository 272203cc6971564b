use conscript_core_types::{RequestId, TraceId};
use thiserror::Error;

use crate::model::RecordId;

/// Result type alias using DraftError
pub type Result<T> = std::result::Result<T, DraftError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that callers can match on without
/// depending on message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Lifecycle
    AlreadyDraft,
    NotADraft,
    NotConfigured,
    ParentNotFound,
    NotFound,
    NotPersisted,

    // Guard
    /// Write to an original rejected because drafts of it exist
    GuardViolation,

    // Hooks
    HookFailed,

    // Configuration
    InvalidConfig,

    // Storage
    Persistence,
    Transaction,
    Serialization,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::AlreadyDraft => "ERR_ALREADY_DRAFT",
            ExErrorKind::NotADraft => "ERR_NOT_A_DRAFT",
            ExErrorKind::NotConfigured => "ERR_NOT_CONFIGURED",
            ExErrorKind::ParentNotFound => "ERR_PARENT_NOT_FOUND",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::NotPersisted => "ERR_NOT_PERSISTED",
            ExErrorKind::GuardViolation => "ERR_GUARD_VIOLATION",
            ExErrorKind::HookFailed => "ERR_HOOK_FAILED",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Transaction => "ERR_TRANSACTION",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Carries classification fields for programmatic handling and optional
/// correlation context for debugging.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    record_type: Option<String>,
    record_id: Option<RecordId>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            record_type: None,
            record_id: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add record type context
    pub fn with_record_type(mut self, record_type: impl Into<String>) -> Self {
        self.record_type = Some(record_type.into());
        self
    }

    /// Add record id context
    pub fn with_record_id(mut self, id: RecordId) -> Self {
        self.record_id = Some(id);
        self
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = Some(request_id);
        self
    }

    pub fn with_trace_id(mut self, trace_id: TraceId) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn record_type(&self) -> Option<&str> {
        self.record_type.as_deref()
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(record_type) = &self.record_type {
            write!(f, " (record_type: {})", record_type)?;
        }
        if let Some(record_id) = self.record_id {
            write!(f, " (record_id: {})", record_id)?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, " (request_id: {})", request_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Error taxonomy for draft lifecycle operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DraftError {
    // ===== Lifecycle Errors =====
    /// create_draft called on a record that is already a draft
    #[error("Record {record_type} {record_id:?} is already a draft")]
    AlreadyDraft {
        record_type: String,
        record_id: Option<RecordId>,
    },

    /// publish called on a published record
    #[error("Record {record_type} {record_id:?} is not a draft")]
    NotADraft {
        record_type: String,
        record_id: Option<RecordId>,
    },

    /// Lifecycle operation on a type that was never configured
    #[error("Record type not configured for drafts: {record_type}")]
    NotConfigured { record_type: String },

    /// Draft references a parent that no longer exists
    #[error("Draft parent {record_type} {parent_id} not found")]
    ParentNotFound {
        record_type: String,
        parent_id: RecordId,
    },

    /// Record not found in store
    #[error("Record not found: {record_type} {record_id}")]
    RecordNotFound {
        record_type: String,
        record_id: RecordId,
    },

    /// Operation needs a persisted record but the record has no id
    #[error("Record {record_type} has not been persisted")]
    NotPersisted { record_type: String },

    // ===== Storage Errors =====
    /// Underlying storage failure
    #[error("Persistence error in {op}: {message}")]
    Persistence { op: String, message: String },

    /// Transaction primitives used out of order
    #[error("Transaction error: {message}")]
    Transaction { message: String },

    // ===== Hook Errors =====
    /// A lifecycle hook refused to continue
    #[error("Hook {hook} failed: {message}")]
    Hook { hook: String, message: String },

    // ===== Configuration Errors =====
    #[error("Invalid draft configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DraftError {
    /// Build a persistence error for the given store operation
    pub fn persistence(op: impl Into<String>, message: impl Into<String>) -> Self {
        DraftError::Persistence {
            op: op.into(),
            message: message.into(),
        }
    }

    /// Get the canonical kind without building a full ExError
    pub fn kind(&self) -> ExErrorKind {
        match self {
            DraftError::AlreadyDraft { .. } => ExErrorKind::AlreadyDraft,
            DraftError::NotADraft { .. } => ExErrorKind::NotADraft,
            DraftError::NotConfigured { .. } => ExErrorKind::NotConfigured,
            DraftError::ParentNotFound { .. } => ExErrorKind::ParentNotFound,
            DraftError::RecordNotFound { .. } => ExErrorKind::NotFound,
            DraftError::NotPersisted { .. } => ExErrorKind::NotPersisted,
            DraftError::Persistence { .. } => ExErrorKind::Persistence,
            DraftError::Transaction { .. } => ExErrorKind::Transaction,
            DraftError::Hook { .. } => ExErrorKind::HookFailed,
            DraftError::InvalidConfig { .. } => ExErrorKind::InvalidConfig,
            DraftError::Serialization { .. } => ExErrorKind::Serialization,
            DraftError::Internal { .. } => ExErrorKind::Internal,
        }
    }
}

/// Conversion from DraftError to ExError
///
/// Used by the logging macros and by callers that surface stable codes.
impl From<DraftError> for ExError {
    fn from(err: DraftError) -> Self {
        let kind = err.kind();
        let message = err.to_string();
        let ex = ExError::new(kind).with_message(message);
        match err {
            DraftError::AlreadyDraft {
                record_type,
                record_id,
            }
            | DraftError::NotADraft {
                record_type,
                record_id,
            } => {
                let ex = ex.with_record_type(record_type);
                match record_id {
                    Some(id) => ex.with_record_id(id),
                    None => ex,
                }
            }

            DraftError::NotConfigured { record_type } | DraftError::NotPersisted { record_type } => {
                ex.with_record_type(record_type)
            }

            DraftError::ParentNotFound {
                record_type,
                parent_id,
            } => ex
                .with_op("load_parent")
                .with_record_type(record_type)
                .with_record_id(parent_id),

            DraftError::RecordNotFound {
                record_type,
                record_id,
            } => ex.with_record_type(record_type).with_record_id(record_id),

            DraftError::Persistence { op, .. } => ex.with_op(op),

            DraftError::Hook { hook, .. } => ex.with_op(hook),

            DraftError::Transaction { .. }
            | DraftError::InvalidConfig { .. }
            | DraftError::Serialization { .. }
            | DraftError::Internal { .. } => ex,
        }
    }
}

/// Conversion from serde_json::Error to DraftError
impl From<serde_json::Error> for DraftError {
    fn from(err: serde_json::Error) -> Self {
        DraftError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_error_kind_codes() {
        let cases = [
            (ExErrorKind::AlreadyDraft, "ERR_ALREADY_DRAFT"),
            (ExErrorKind::NotADraft, "ERR_NOT_A_DRAFT"),
            (ExErrorKind::NotConfigured, "ERR_NOT_CONFIGURED"),
            (ExErrorKind::GuardViolation, "ERR_GUARD_VIOLATION"),
            (ExErrorKind::Persistence, "ERR_PERSISTENCE"),
        ];
        for (kind, expected_code) in cases {
            assert_eq!(kind.code(), expected_code, "Wrong code for {:?}", kind);
        }
    }

    #[test]
    fn test_every_kind_but_guard_comes_from_a_draft_error() {
        let s = || "x".to_string();
        let errors = [
            DraftError::AlreadyDraft { record_type: s(), record_id: None },
            DraftError::NotADraft { record_type: s(), record_id: None },
            DraftError::NotConfigured { record_type: s() },
            DraftError::ParentNotFound { record_type: s(), parent_id: 1 },
            DraftError::RecordNotFound { record_type: s(), record_id: 1 },
            DraftError::NotPersisted { record_type: s() },
            DraftError::Persistence { op: s(), message: s() },
            DraftError::Transaction { message: s() },
            DraftError::Hook { hook: s(), message: s() },
            DraftError::InvalidConfig { reason: s() },
            DraftError::Serialization { message: s() },
            DraftError::Internal { message: s() },
        ];
        let mut codes: Vec<&str> = errors.iter().map(|e| e.kind().code()).collect();
        codes.push(ExErrorKind::GuardViolation.code());
        let total = codes.len();
        codes.sort_unstable();
        codes.dedup();

        assert_eq!(codes.len(), total);
    }

    #[test]
    fn test_already_draft_converts_with_context() {
        let err = DraftError::AlreadyDraft {
            record_type: "widget".to_string(),
            record_id: Some(7),
        };
        let ex: ExError = err.into();

        assert_eq!(ex.kind(), ExErrorKind::AlreadyDraft);
        assert_eq!(ex.record_type(), Some("widget"));
        assert_eq!(ex.record_id(), Some(7));
    }

    #[test]
    fn test_persistence_keeps_op() {
        let ex: ExError = DraftError::persistence("sqlite", "disk I/O error").into();
        assert_eq!(ex.code(), "ERR_PERSISTENCE");
        assert_eq!(ex.op(), Some("sqlite"));
        assert!(ex.message().contains("disk I/O error"));
    }

    #[test]
    fn test_display_includes_code_and_request_id() {
        let ex = ExError::new(ExErrorKind::NotConfigured)
            .with_message("gadget")
            .with_request_id(RequestId::from_string("req-1".to_string()));
        let rendered = ex.to_string();

        assert!(rendered.starts_with("[ERR_NOT_CONFIGURED]"));
        assert!(rendered.contains("req-1"));
    }

    #[test]
    fn test_source_chain() {
        let inner = ExError::new(ExErrorKind::Persistence).with_message("locked");
        let outer = ExError::new(ExErrorKind::HookFailed).with_source(inner);

        assert_eq!(
            outer.source_error().map(|e| e.kind()),
            Some(ExErrorKind::Persistence)
        );
        assert!(std::error::Error::source(&outer).is_some());
    }
}
