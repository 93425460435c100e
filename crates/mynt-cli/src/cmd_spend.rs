use mynt_core::money::format_credits;
use mynt_ledger::{LedgerError, LedgerStore};
use std::path::Path;

pub fn execute(db_path: &Path, user: &str, amount_cents: i64, action: &str) -> anyhow::Result<()> {
    let store = LedgerStore::open_or_create(db_path)?;
    store.get_or_create(user)?;

    match store.try_spend(user, amount_cents, action) {
        Ok(applied) => {
            println!(
                "Spent {} on {action}. Balance: {}",
                format_credits(amount_cents),
                format_credits(applied.new_balance)
            );
            Ok(())
        }
        Err(LedgerError::InsufficientFunds {
            balance_cents,
            requested_cents,
        }) => {
            println!(
                "Insufficient credits: balance {}, needed {}. Top up or upgrade your plan.",
                format_credits(balance_cents),
                format_credits(requested_cents)
            );
            std::process::exit(2);
        }
        Err(e) if e.is_transient() => {
            anyhow::bail!("the wallet is busy, try again: {e}");
        }
        Err(e) => Err(e.into()),
    }
}
