use mynt_core::plan::UnknownPlan;
use mynt_core::UserId;

/// Failure taxonomy for every public ledger operation.
///
/// `InsufficientFunds` is an expected business condition, not a failure:
/// callers surface it as a top-up/upgrade prompt and it is never logged at
/// error level. `Conflict` is transient; the whole operation may be retried.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("no wallet for user {0:?}")]
    NotFound(UserId),

    #[error(transparent)]
    UnknownPlan(#[from] UnknownPlan),

    #[error("insufficient funds: balance {balance_cents}, requested {requested_cents}")]
    InsufficientFunds {
        balance_cents: i64,
        requested_cents: i64,
    },

    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    #[error("wallet for user {0:?} kept changing concurrently; retry the operation")]
    Conflict(UserId),

    #[error("ledger store unavailable: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("ledger store unavailable: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt ledger record: {0}")]
    Corrupt(String),
}

impl LedgerError {
    /// Whether retrying the whole operation can succeed without any caller
    /// action (distinct from `InsufficientFunds`, which needs more credits).
    pub fn is_transient(&self) -> bool {
        matches!(self, LedgerError::Conflict(_))
    }
}
