use mynt_core::money::format_credits;
use mynt_core::reason;
use mynt_ledger::LedgerStore;
use std::path::Path;

pub fn execute(db_path: &Path, user: &str, amount_cents: i64) -> anyhow::Result<()> {
    if amount_cents <= 0 {
        anyhow::bail!("grant amount must be positive, got {amount_cents}");
    }
    let store = LedgerStore::open_or_create(db_path)?;
    store.get_or_create(user)?;
    let applied =
        store.apply_transaction(user, amount_cents, reason::MANUAL_ADJUSTMENT, None)?;
    println!(
        "Granted {} to {user}. Balance: {}",
        format_credits(amount_cents),
        format_credits(applied.new_balance)
    );
    Ok(())
}
