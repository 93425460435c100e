//! Read-only projections for presentation and reporting collaborators.

use crate::error::LedgerError;
use crate::store::LedgerStore;
use mynt_core::plan::{Plan, PlanConfig};
use mynt_core::{reason, UserId};
use rusqlite::params;
use serde::Serialize;
use time::OffsetDateTime;

/// Snapshot of a wallet against the current billing period.
#[derive(Debug, Clone, Serialize)]
pub struct WalletStatus {
    pub user_id: UserId,
    pub plan: Plan,
    pub balance_cents: i64,
    pub allocation: &'static PlanConfig,
    pub spent_this_period_cents: i64,
    pub percent_used: u8,
    pub days_remaining: i64,
}

impl LedgerStore {
    /// Wallet status for display. Creates the wallet on first use and runs
    /// the period check first, so the projection always reflects the
    /// current period.
    pub fn status(&self, user_id: &str) -> Result<WalletStatus, LedgerError> {
        self.status_at(user_id, OffsetDateTime::now_utc())
    }

    /// Like [`status`](Self::status) with an explicit clock.
    pub fn status_at(
        &self,
        user_id: &str,
        now: OffsetDateTime,
    ) -> Result<WalletStatus, LedgerError> {
        self.get_or_create_at(user_id, now)?;
        let wallet = self.maybe_reset_at(user_id, now)?;
        let cfg = wallet.plan.config();
        let allocation = cfg.total_credits();
        let spent = self.spent_this_period(user_id)?;
        let percent_used = if allocation > 0 {
            ((spent * 100) / allocation).clamp(0, 100) as u8
        } else {
            0
        };
        let days_remaining = (wallet.next_reset_at - now).whole_days().max(0);
        Ok(WalletStatus {
            user_id: wallet.user_id,
            plan: wallet.plan,
            balance_cents: wallet.balance_cents,
            allocation: cfg,
            spent_this_period_cents: spent,
            percent_used,
            days_remaining,
        })
    }

    /// Actual spend since the period began: the sum of `spend` debits
    /// appended after the latest `period_reset` row. Forfeited remainders
    /// and mid-period plan switches never inflate this figure.
    pub fn spent_this_period(&self, user_id: &str) -> Result<i64, LedgerError> {
        let spent = self.conn.query_row(
            "SELECT COALESCE(SUM(amount_cents), 0) FROM transactions
             WHERE user_id = ?1 AND kind = 'debit' AND reason = ?2
               AND rowid > COALESCE((SELECT MAX(rowid) FROM transactions
                                     WHERE user_id = ?1 AND reason = ?3), 0)",
            params![user_id, reason::SPEND, reason::PERIOD_RESET],
            |row| row.get(0),
        )?;
        Ok(spent)
    }
}
