use crate::plan::Plan;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Transaction ID format: `txn_<ulid>`
pub type TxnId = String;

/// Opaque user identifier supplied by the authentication collaborator.
pub type UserId = String;

/// Well-known transaction reasons.
pub mod reason {
    pub const PERIOD_RESET: &str = "period_reset";
    pub const SPEND: &str = "spend";
    pub const MANUAL_ADJUSTMENT: &str = "manual_adjustment";
}

/// Direction of a balance mutation. The stored amount is always a
/// non-negative magnitude; the kind carries the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnKind {
    Credit,
    Debit,
}

impl TxnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxnKind::Credit => "credit",
            TxnKind::Debit => "debit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(TxnKind::Credit),
            "debit" => Some(TxnKind::Debit),
            _ => None,
        }
    }
}

/// One wallet per user. Balance and period bounds are mutated only through
/// the ledger store; the plan field only through `set_plan`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub user_id: UserId,
    pub balance_cents: i64,
    pub plan: Plan,
    #[serde(with = "time::serde::rfc3339")]
    pub last_reset_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub next_reset_at: OffsetDateTime,
}

impl Wallet {
    /// Whether the current billing period has elapsed at `now`.
    pub fn reset_due(&self, now: OffsetDateTime) -> bool {
        now >= self.next_reset_at
    }
}

/// One row per balance mutation, append-only. `balance_after` snapshots the
/// wallet balance immediately after the mutation so history renders without
/// replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub txn_id: TxnId,
    pub user_id: UserId,
    pub kind: TxnKind,
    pub amount_cents: i64,
    pub balance_after: i64,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Transaction {
    /// The mutation as a signed delta: debits negative, credits positive.
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            TxnKind::Credit => self.amount_cents,
            TxnKind::Debit => -self.amount_cents,
        }
    }
}
