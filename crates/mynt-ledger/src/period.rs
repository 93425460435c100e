//! Billing-period evaluation and reset.
//!
//! There is no background scheduler: every balance-affecting or
//! balance-reading operation calls [`LedgerStore::maybe_reset`] first, so a
//! wallet is always evaluated against the current period's allocation.

use crate::error::LedgerError;
use crate::store::{
    backoff, insert_transaction_row, row_to_wallet, to_rfc3339, LedgerStore, MAX_WRITE_ATTEMPTS,
};
use mynt_core::{reason, Wallet};
use rusqlite::params;
use time::OffsetDateTime;
use tracing::{debug, info};

impl LedgerStore {
    /// Reset the wallet if its period has elapsed, exactly once per period.
    /// Returns the wallet as of the current period either way.
    pub fn maybe_reset(&self, user_id: &str) -> Result<Wallet, LedgerError> {
        self.maybe_reset_at(user_id, OffsetDateTime::now_utc())
    }

    /// Like [`maybe_reset`](Self::maybe_reset) with an explicit clock.
    ///
    /// The reset is one conditional write: the new balance (exactly the
    /// plan's total allocation, any remainder forfeited) and the new period
    /// bounds are applied only while `next_reset_at` still holds the value
    /// just read. A racing caller loses the predicate, re-reads, observes
    /// the advanced boundary, and no-ops. The balance is part of the
    /// predicate too so the recorded delta always matches the log.
    pub fn maybe_reset_at(
        &self,
        user_id: &str,
        now: OffsetDateTime,
    ) -> Result<Wallet, LedgerError> {
        for attempt in 0..MAX_WRITE_ATTEMPTS {
            let row = self
                .wallet_row(user_id)?
                .ok_or_else(|| LedgerError::NotFound(user_id.to_string()))?;
            let observed_next = row.next_reset_at.clone();
            let wallet = row_to_wallet(row)?;
            if !wallet.reset_due(now) {
                return Ok(wallet);
            }

            let cfg = wallet.plan.config();
            let total = cfg.total_credits();
            let delta = total - wallet.balance_cents;
            let next = now + time::Duration::days(cfg.period_days);

            let tx = self.conn.unchecked_transaction()?;
            let changed = tx.execute(
                "UPDATE wallets
                 SET balance_cents = ?1, last_reset_at = ?2, next_reset_at = ?3
                 WHERE user_id = ?4 AND next_reset_at = ?5 AND balance_cents = ?6",
                params![
                    total,
                    to_rfc3339(now),
                    to_rfc3339(next),
                    user_id,
                    observed_next,
                    wallet.balance_cents,
                ],
            )?;
            if changed == 0 {
                drop(tx);
                debug!(user_id, attempt, "reset write lost, re-reading");
                backoff(attempt);
                continue;
            }
            insert_transaction_row(
                &tx,
                user_id,
                delta,
                total,
                reason::PERIOD_RESET,
                None,
                &to_rfc3339(now),
            )?;
            tx.commit()?;
            info!(
                user_id,
                plan = wallet.plan.as_str(),
                granted = total,
                forfeited = wallet.balance_cents,
                "billing period reset"
            );
            return self.wallet(user_id);
        }
        Err(LedgerError::Conflict(user_id.to_string()))
    }
}
