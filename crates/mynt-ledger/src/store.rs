//! SQLite-backed storage for wallets and their transaction log.
//!
//! One `wallets` row per user and an append-only `transactions` table, in a
//! single `wallet.db` file using WAL mode. Every balance mutation goes
//! through [`LedgerStore::apply_transaction`]: a conditional write plus the
//! log append, committed as one SQLite transaction.

use crate::error::LedgerError;
use mynt_core::plan::Plan;
use mynt_core::{Transaction, TxnId, TxnKind, Wallet};
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::debug;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS wallets (
    user_id TEXT PRIMARY KEY,
    balance_cents INTEGER NOT NULL DEFAULT 0 CHECK (balance_cents >= 0),
    plan TEXT NOT NULL,
    last_reset_at TEXT NOT NULL,
    next_reset_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transactions (
    rowid INTEGER PRIMARY KEY,
    txn_id TEXT UNIQUE NOT NULL,
    user_id TEXT NOT NULL REFERENCES wallets(user_id),
    kind TEXT NOT NULL CHECK (kind IN ('credit', 'debit')),
    amount_cents INTEGER NOT NULL CHECK (amount_cents >= 0),
    balance_after INTEGER NOT NULL CHECK (balance_after >= 0),
    reason TEXT NOT NULL,
    action_type TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_txns_user_created
    ON transactions(user_id, created_at DESC);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

/// Conditional-write retry budget. Conflicts are retried here with backoff;
/// exhaustion surfaces [`LedgerError::Conflict`].
pub(crate) const MAX_WRITE_ATTEMPTS: u32 = 8;

/// Default number of history rows returned when the caller gives no limit.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;
/// Hard cap on history rows per read, regardless of the caller's limit.
pub const MAX_HISTORY_LIMIT: usize = 100;

/// Result of an accepted balance mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub txn_id: TxnId,
    pub new_balance: i64,
}

/// SQLite-backed wallet store. Open one per request handler; WAL mode plus
/// the conditional-write discipline make concurrent connections safe.
pub struct LedgerStore {
    pub(crate) conn: Connection,
}

impl LedgerStore {
    /// Open an existing wallet.db.
    pub fn open(db_path: &Path) -> Result<Self, LedgerError> {
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.apply_pragmas()?;
        Ok(store)
    }

    /// Open or create wallet.db with full schema.
    pub fn open_or_create(db_path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.apply_pragmas()?;
        store.apply_schema()?;
        Ok(store)
    }

    fn apply_pragmas(&self) -> Result<(), LedgerError> {
        // busy_timeout first so concurrent first-opens wait instead of
        // failing while another connection switches the journal mode
        self.conn.execute_batch(
            "PRAGMA busy_timeout = 5000;
             PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }

    fn apply_schema(&self) -> Result<(), LedgerError> {
        // Idempotent via IF NOT EXISTS
        self.conn.execute_batch(SCHEMA_SQL)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('version', '1')",
            [],
        )?;
        Ok(())
    }

    // ── Wallets ─────────────────────────────────────────────────────

    /// Return the user's wallet, creating a zero-balance free-plan wallet
    /// with a full billing period ahead if none exists. Concurrent first
    /// accessors converge on the same row via the `user_id` primary key.
    pub fn get_or_create(&self, user_id: &str) -> Result<Wallet, LedgerError> {
        self.get_or_create_at(user_id, OffsetDateTime::now_utc())
    }

    pub fn get_or_create_at(
        &self,
        user_id: &str,
        now: OffsetDateTime,
    ) -> Result<Wallet, LedgerError> {
        let plan = Plan::Free;
        let next = now + time::Duration::days(plan.config().period_days);
        self.conn.execute(
            "INSERT INTO wallets (user_id, balance_cents, plan, last_reset_at, next_reset_at)
             VALUES (?1, 0, ?2, ?3, ?4)
             ON CONFLICT(user_id) DO NOTHING",
            params![user_id, plan.as_str(), to_rfc3339(now), to_rfc3339(next)],
        )?;
        self.wallet(user_id)
    }

    /// Read a wallet. `NotFound` if the user has no row.
    pub fn wallet(&self, user_id: &str) -> Result<Wallet, LedgerError> {
        match self.wallet_row(user_id)? {
            Some(row) => row_to_wallet(row),
            None => Err(LedgerError::NotFound(user_id.to_string())),
        }
    }

    /// Raw wallet row with timestamps still in stored form. Conditional
    /// writes compare against these stored strings, not re-formatted ones.
    pub(crate) fn wallet_row(&self, user_id: &str) -> Result<Option<WalletRow>, LedgerError> {
        let row = self
            .conn
            .query_row(
                "SELECT user_id, balance_cents, plan, last_reset_at, next_reset_at
                 FROM wallets WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(WalletRow {
                        user_id: row.get(0)?,
                        balance_cents: row.get(1)?,
                        plan: row.get(2)?,
                        last_reset_at: row.get(3)?,
                        next_reset_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Update the wallet's plan only. The id is validated against the
    /// catalog first. Balance and period bounds are left untouched and no
    /// transaction row is appended; the new allocation takes effect at the
    /// next period boundary.
    pub fn set_plan(&self, user_id: &str, plan_id: &str) -> Result<Wallet, LedgerError> {
        let plan: Plan = plan_id.parse()?;
        let changed = self.conn.execute(
            "UPDATE wallets SET plan = ?1 WHERE user_id = ?2",
            params![plan.as_str(), user_id],
        )?;
        if changed == 0 {
            return Err(LedgerError::NotFound(user_id.to_string()));
        }
        tracing::info!(user_id, plan = plan.as_str(), "plan changed");
        self.wallet(user_id)
    }

    // ── Balance mutation ────────────────────────────────────────────

    /// The sole primitive for balance change: read the balance, compute
    /// `new = balance + delta`, reject a negative result, then commit the
    /// conditional wallet update and the log append as one SQLite
    /// transaction. A concurrent mutation defeats the `WHERE balance_cents`
    /// predicate and the whole read-compute-write is retried.
    pub fn apply_transaction(
        &self,
        user_id: &str,
        delta_cents: i64,
        reason: &str,
        action_type: Option<&str>,
    ) -> Result<Applied, LedgerError> {
        for attempt in 0..MAX_WRITE_ATTEMPTS {
            let row = self
                .wallet_row(user_id)?
                .ok_or_else(|| LedgerError::NotFound(user_id.to_string()))?;
            let new_balance = row.balance_cents + delta_cents;
            if new_balance < 0 {
                return Err(LedgerError::InsufficientFunds {
                    balance_cents: row.balance_cents,
                    requested_cents: -delta_cents,
                });
            }

            let tx = self.conn.unchecked_transaction()?;
            let changed = tx.execute(
                "UPDATE wallets SET balance_cents = ?1
                 WHERE user_id = ?2 AND balance_cents = ?3",
                params![new_balance, user_id, row.balance_cents],
            )?;
            if changed == 0 {
                drop(tx);
                debug!(user_id, attempt, "conditional write lost, retrying");
                backoff(attempt);
                continue;
            }
            let txn_id = insert_transaction_row(
                &tx,
                user_id,
                delta_cents,
                new_balance,
                reason,
                action_type,
                &to_rfc3339(OffsetDateTime::now_utc()),
            )?;
            tx.commit()?;
            return Ok(Applied {
                txn_id,
                new_balance,
            });
        }
        Err(LedgerError::Conflict(user_id.to_string()))
    }

    // ── History ─────────────────────────────────────────────────────

    /// Transactions for a user, most recent first. `None` means the default
    /// limit; any limit is clamped to the hard cap.
    pub fn history(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);
        let mut stmt = self.conn.prepare(
            "SELECT txn_id, user_id, kind, amount_cents, balance_after,
                    reason, action_type, created_at
             FROM transactions WHERE user_id = ?1
             ORDER BY rowid DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(TxnRow {
                    txn_id: row.get(0)?,
                    user_id: row.get(1)?,
                    kind: row.get(2)?,
                    amount_cents: row.get(3)?,
                    balance_after: row.get(4)?,
                    reason: row.get(5)?,
                    action_type: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(row_to_transaction).collect()
    }
}

impl Drop for LedgerStore {
    fn drop(&mut self) {
        // Merge WAL back into the main DB so the store is a single file
        // when idle.
        let _ = self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
    }
}

// ── Internal helpers ────────────────────────────────────────────────

/// Append one log row. `delta_cents` carries the sign; the stored row is a
/// non-negative magnitude plus kind. Runs inside the caller's transaction.
pub(crate) fn insert_transaction_row(
    conn: &Connection,
    user_id: &str,
    delta_cents: i64,
    balance_after: i64,
    reason: &str,
    action_type: Option<&str>,
    created_at: &str,
) -> Result<TxnId, LedgerError> {
    let (kind, amount_cents) = if delta_cents < 0 {
        (TxnKind::Debit, -delta_cents)
    } else {
        (TxnKind::Credit, delta_cents)
    };
    let txn_id = new_txn_id();
    conn.execute(
        "INSERT INTO transactions
            (txn_id, user_id, kind, amount_cents, balance_after,
             reason, action_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            txn_id,
            user_id,
            kind.as_str(),
            amount_cents,
            balance_after,
            reason,
            action_type,
            created_at,
        ],
    )?;
    Ok(txn_id)
}

pub(crate) fn new_txn_id() -> TxnId {
    format!("txn_{}", ulid::Ulid::new().to_string().to_lowercase())
}

pub(crate) fn to_rfc3339(t: OffsetDateTime) -> String {
    t.format(&Rfc3339)
        .expect("RFC3339 formatting should not fail")
}

pub(crate) fn parse_rfc3339(s: &str) -> Result<OffsetDateTime, LedgerError> {
    OffsetDateTime::parse(s, &Rfc3339)
        .map_err(|e| LedgerError::Corrupt(format!("bad timestamp {s:?}: {e}")))
}

/// Linear backoff with jitter between conditional-write attempts.
pub(crate) fn backoff(attempt: u32) {
    let jitter = rand::thread_rng().gen_range(0..5);
    std::thread::sleep(std::time::Duration::from_millis(
        5 * u64::from(attempt + 1) + jitter,
    ));
}

/// Wallet row as stored, timestamps unparsed.
pub(crate) struct WalletRow {
    pub user_id: String,
    pub balance_cents: i64,
    pub plan: String,
    pub last_reset_at: String,
    pub next_reset_at: String,
}

pub(crate) fn row_to_wallet(row: WalletRow) -> Result<Wallet, LedgerError> {
    let plan: Plan = row
        .plan
        .parse()
        .map_err(|_| LedgerError::Corrupt(format!("bad plan id {:?} on wallet", row.plan)))?;
    Ok(Wallet {
        user_id: row.user_id,
        balance_cents: row.balance_cents,
        plan,
        last_reset_at: parse_rfc3339(&row.last_reset_at)?,
        next_reset_at: parse_rfc3339(&row.next_reset_at)?,
    })
}

struct TxnRow {
    txn_id: String,
    user_id: String,
    kind: String,
    amount_cents: i64,
    balance_after: i64,
    reason: String,
    action_type: Option<String>,
    created_at: String,
}

fn row_to_transaction(row: TxnRow) -> Result<Transaction, LedgerError> {
    let kind = TxnKind::parse(&row.kind)
        .ok_or_else(|| LedgerError::Corrupt(format!("bad transaction kind {:?}", row.kind)))?;
    Ok(Transaction {
        txn_id: row.txn_id,
        user_id: row.user_id,
        kind,
        amount_cents: row.amount_cents,
        balance_after: row.balance_after,
        reason: row.reason,
        action_type: row.action_type,
        created_at: parse_rfc3339(&row.created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{db_path, tmp_store};
    use mynt_core::reason;

    #[test]
    fn schema_creation() {
        let (dir, store) = tmp_store("schema");
        let tables: Vec<String> = store
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert!(tables.contains(&"wallets".to_string()));
        assert!(tables.contains(&"transactions".to_string()));
        assert!(tables.contains(&"schema_meta".to_string()));
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn idempotent_schema_apply() {
        let (dir, store) = tmp_store("idem");
        store.get_or_create("u1").unwrap();
        drop(store);

        let store2 = LedgerStore::open_or_create(&db_path(&dir)).unwrap();
        assert_eq!(store2.wallet("u1").unwrap().balance_cents, 0);
        drop(store2);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn get_or_create_starts_zero_balance_free_plan() {
        let (dir, store) = tmp_store("create");
        let wallet = store.get_or_create("u1").unwrap();
        assert_eq!(wallet.user_id, "u1");
        assert_eq!(wallet.balance_cents, 0);
        assert_eq!(wallet.plan, Plan::Free);
        // Full period ahead
        assert_eq!(
            wallet.next_reset_at - wallet.last_reset_at,
            time::Duration::days(Plan::Free.config().period_days)
        );
        assert!(wallet.next_reset_at > wallet.last_reset_at);
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn get_or_create_returns_existing_wallet() {
        let (dir, store) = tmp_store("existing");
        store.get_or_create("u1").unwrap();
        store
            .apply_transaction("u1", 700, reason::MANUAL_ADJUSTMENT, None)
            .unwrap();
        let again = store.get_or_create("u1").unwrap();
        assert_eq!(again.balance_cents, 700);
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn concurrent_get_or_create_converges_on_one_row() {
        let (dir, store) = tmp_store("create_race");
        drop(store);
        let path = db_path(&dir);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store = LedgerStore::open_or_create(&path).unwrap();
                    store.get_or_create("u1").unwrap()
                })
            })
            .collect();
        for h in handles {
            let wallet = h.join().unwrap();
            assert_eq!(wallet.balance_cents, 0);
        }

        let store = LedgerStore::open(&path).unwrap();
        let count: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM wallets WHERE user_id = 'u1'", [], |r| {
                r.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn wallet_not_found() {
        let (dir, store) = tmp_store("missing");
        assert!(matches!(
            store.wallet("ghost"),
            Err(LedgerError::NotFound(u)) if u == "ghost"
        ));
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn apply_transaction_read_after_write() {
        let (dir, store) = tmp_store("raw");
        store.get_or_create("u1").unwrap();
        let applied = store
            .apply_transaction("u1", 2500, reason::MANUAL_ADJUSTMENT, None)
            .unwrap();
        assert_eq!(applied.new_balance, 2500);

        let history = store.history("u1", Some(1)).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].txn_id, applied.txn_id);
        assert_eq!(history[0].balance_after, store.wallet("u1").unwrap().balance_cents);
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn overdraw_rejected_without_a_row() {
        let (dir, store) = tmp_store("overdraw");
        store.get_or_create("u1").unwrap();
        store
            .apply_transaction("u1", 500, reason::MANUAL_ADJUSTMENT, None)
            .unwrap();

        let err = store
            .apply_transaction("u1", -600, reason::SPEND, Some("analysis"))
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientFunds {
                balance_cents: 500,
                requested_cents: 600
            }
        ));
        assert_eq!(store.wallet("u1").unwrap().balance_cents, 500);
        assert_eq!(store.history("u1", None).unwrap().len(), 1);
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn log_is_magnitude_plus_kind() {
        let (dir, store) = tmp_store("kinds");
        store.get_or_create("u1").unwrap();
        store
            .apply_transaction("u1", 1000, reason::MANUAL_ADJUSTMENT, None)
            .unwrap();
        store
            .apply_transaction("u1", -300, reason::SPEND, Some("analysis"))
            .unwrap();

        let history = store.history("u1", None).unwrap();
        assert_eq!(history.len(), 2);
        // newest first
        assert_eq!(history[0].kind, TxnKind::Debit);
        assert_eq!(history[0].amount_cents, 300);
        assert_eq!(history[0].signed_amount(), -300);
        assert_eq!(history[0].action_type.as_deref(), Some("analysis"));
        assert_eq!(history[1].kind, TxnKind::Credit);
        assert_eq!(history[1].amount_cents, 1000);
        assert_eq!(history[1].action_type, None);
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn balance_always_equals_latest_balance_after() {
        let (dir, store) = tmp_store("chain");
        store.get_or_create("u1").unwrap();
        let deltas = [1000, -250, -250, 400, -900];
        for delta in deltas {
            let why = if delta < 0 {
                reason::SPEND
            } else {
                reason::MANUAL_ADJUSTMENT
            };
            store.apply_transaction("u1", delta, why, None).unwrap();
            let wallet = store.wallet("u1").unwrap();
            let latest = store.history("u1", Some(1)).unwrap();
            assert_eq!(wallet.balance_cents, latest[0].balance_after);
        }
        // Chain reconstructs: each balance_after = previous + signed amount
        let history = store.history("u1", None).unwrap();
        for pair in history.windows(2) {
            assert_eq!(
                pair[0].balance_after,
                pair[1].balance_after + pair[0].signed_amount()
            );
        }
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn history_default_and_hard_cap() {
        let (dir, store) = tmp_store("limits");
        store.get_or_create("u1").unwrap();
        for _ in 0..120 {
            store
                .apply_transaction("u1", 1, reason::MANUAL_ADJUSTMENT, None)
                .unwrap();
        }
        assert_eq!(store.history("u1", None).unwrap().len(), 20);
        assert_eq!(store.history("u1", Some(50)).unwrap().len(), 50);
        assert_eq!(store.history("u1", Some(500)).unwrap().len(), 100);
        // newest first: the most recent row has the highest balance_after
        let history = store.history("u1", Some(2)).unwrap();
        assert_eq!(history[0].balance_after, 120);
        assert_eq!(history[1].balance_after, 119);
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn set_plan_changes_plan_only() {
        let (dir, store) = tmp_store("setplan");
        let before = store.get_or_create("u1").unwrap();
        store
            .apply_transaction("u1", 300, reason::MANUAL_ADJUSTMENT, None)
            .unwrap();

        let after = store.set_plan("u1", "pro").unwrap();
        assert_eq!(after.plan, Plan::Pro);
        assert_eq!(after.balance_cents, 300);
        assert_eq!(after.last_reset_at, before.last_reset_at);
        assert_eq!(after.next_reset_at, before.next_reset_at);
        // No transaction row for a plan change
        assert_eq!(store.history("u1", None).unwrap().len(), 1);
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn set_plan_unknown_user() {
        let (dir, store) = tmp_store("setplan_missing");
        assert!(matches!(
            store.set_plan("ghost", "starter"),
            Err(LedgerError::NotFound(_))
        ));
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn set_plan_rejects_unknown_plan_id() {
        let (dir, store) = tmp_store("setplan_badid");
        store.get_or_create("u1").unwrap();
        assert!(matches!(
            store.set_plan("u1", "enterprise"),
            Err(LedgerError::UnknownPlan(_))
        ));
        assert_eq!(store.wallet("u1").unwrap().plan, Plan::Free);
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn txn_ids_are_unique_and_prefixed() {
        let (dir, store) = tmp_store("ids");
        store.get_or_create("u1").unwrap();
        let a = store
            .apply_transaction("u1", 10, reason::MANUAL_ADJUSTMENT, None)
            .unwrap();
        let b = store
            .apply_transaction("u1", 10, reason::MANUAL_ADJUSTMENT, None)
            .unwrap();
        assert!(a.txn_id.starts_with("txn_"));
        assert_ne!(a.txn_id, b.txn_id);
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
