use mynt_core::money::format_credits;
use mynt_ledger::LedgerStore;
use std::path::Path;
use time::format_description::well_known::Rfc3339;

pub fn execute(db_path: &Path, user: &str) -> anyhow::Result<()> {
    let store = LedgerStore::open_or_create(db_path)?;
    let before = store.get_or_create(user)?;
    let after = store.maybe_reset(user)?;

    if after.next_reset_at != before.next_reset_at {
        println!(
            "Period reset for {user}: granted {}, next reset {}",
            format_credits(after.balance_cents),
            after.next_reset_at.format(&Rfc3339)?
        );
    } else {
        println!(
            "No reset due for {user}; next reset {}",
            after.next_reset_at.format(&Rfc3339)?
        );
    }
    Ok(())
}
