use thiserror::Error;
use wlc_money::MoneyError;

use crate::approval::ApprovalError;
use crate::ids::{AccountId, ApprovalWorkflowId, IdempotencyKeyError, TransactionId};

/// The full error taxonomy, one category at a time. Categories never
/// overlap: a given failure belongs to exactly one variant group.
#[derive(Debug, Error)]
pub enum WlcError {
    // ── Validation: malformed input, never reaches the store ──────────────
    #[error("invalid amount: {0}")]
    InvalidAmount(#[from] MoneyError),
    #[error("invalid idempotency key: {0}")]
    InvalidIdempotencyKey(#[from] IdempotencyKeyError),
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    // ── Policy denial: terminal rejection from the policy evaluator ──────
    #[error("denied: {code}: {message}")]
    PolicyDenied { code: String, message: String },

    // ── Conflict: idempotency-store contention ────────────────────────────
    #[error("duplicate submission of idempotency key")]
    Duplicate,
    #[error("another worker is processing this idempotency key")]
    InProgress,

    // ── Business invariant ─────────────────────────────────────────────────
    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: String, have: String },
    #[error("account {0} is frozen")]
    AccountFrozen(AccountId),
    #[error("account {0} not found")]
    AccountNotFound(AccountId),
    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),
    #[error("approval workflow {0} not found")]
    WorkflowNotFound(ApprovalWorkflowId),
    #[error("approval workflow {0} has already reached a terminal state")]
    WorkflowAlreadyCompleted(ApprovalWorkflowId),
    #[error("approval workflow transition rejected: {0}")]
    ApprovalRejected(#[from] ApprovalError),
    #[error("approver does not hold a role sufficient for this workflow kind")]
    ApproverNotQualified,
    #[error("hold {0} not found or already resolved")]
    HoldNotFound(TransactionId),

    // ── Transient: safe to retry with the same idempotency key ───────────
    #[error("lock acquisition timed out for account {0}")]
    LockTimeout(AccountId),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("request deadline elapsed before the pipeline committed")]
    DeadlineExceeded,

    // ── Fatal integrity: ledger and account balance have diverged ────────
    #[error("ledger integrity violation on account {0}: {1}")]
    IntegrityViolation(AccountId, String),

    // ── Serialization / storage plumbing ──────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl WlcError {
    /// Whether a caller may safely retry the same idempotency key after
    /// seeing this error. Only the transient category qualifies.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WlcError::LockTimeout(_) | WlcError::StoreUnavailable(_) | WlcError::DeadlineExceeded
        )
    }
}
