//! The hot path: authorize and debit a metered action.
//!
//! Callers reserve credits here *before* performing costly work. A
//! rejection means the action must not proceed; there is no partial
//! fulfillment and no retroactive debit.

use crate::error::LedgerError;
use crate::store::{Applied, LedgerStore};
use mynt_core::reason;
use time::OffsetDateTime;
use tracing::debug;

impl LedgerStore {
    /// Atomically check and debit `amount_cents` for `action_type`.
    ///
    /// Runs [`maybe_reset`](Self::maybe_reset) first so the spend is always
    /// evaluated against the current period's allocation. Returns
    /// `InsufficientFunds` without appending anything if the balance cannot
    /// cover the debit.
    pub fn try_spend(
        &self,
        user_id: &str,
        amount_cents: i64,
        action_type: &str,
    ) -> Result<Applied, LedgerError> {
        self.try_spend_at(user_id, amount_cents, action_type, OffsetDateTime::now_utc())
    }

    /// Like [`try_spend`](Self::try_spend) with an explicit clock.
    pub fn try_spend_at(
        &self,
        user_id: &str,
        amount_cents: i64,
        action_type: &str,
        now: OffsetDateTime,
    ) -> Result<Applied, LedgerError> {
        if amount_cents <= 0 {
            return Err(LedgerError::InvalidAmount(amount_cents));
        }
        self.maybe_reset_at(user_id, now)?;
        let applied =
            self.apply_transaction(user_id, -amount_cents, reason::SPEND, Some(action_type))?;
        debug!(
            user_id,
            amount_cents,
            action_type,
            new_balance = applied.new_balance,
            "spend authorized"
        );
        Ok(applied)
    }
}
