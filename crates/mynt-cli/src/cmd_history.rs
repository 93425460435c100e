use mynt_core::money::format_credits;
use mynt_core::Transaction;
use mynt_ledger::LedgerStore;
use std::path::Path;
use time::format_description::well_known::Rfc3339;

pub fn execute(db_path: &Path, user: &str, limit: usize, json: bool) -> anyhow::Result<()> {
    let store = LedgerStore::open_or_create(db_path)?;
    store.get_or_create(user)?;
    let history = store.history(user, Some(limit))?;

    if history.is_empty() {
        println!("No transactions for {user}.");
        return Ok(());
    }

    if json {
        for txn in &history {
            println!("{}", serde_json::to_string(txn)?);
        }
    } else {
        for txn in &history {
            print_txn_line(txn)?;
        }
        println!("\n({} transactions shown)", history.len());
    }
    Ok(())
}

fn print_txn_line(txn: &Transaction) -> anyhow::Result<()> {
    let ts = txn.created_at.format(&Rfc3339)?;
    let amount = txn.signed_amount();
    let sign = if amount >= 0 { "+" } else { "" };
    let action = txn
        .action_type
        .as_deref()
        .map(|a| format!(" [{a}]"))
        .unwrap_or_default();
    println!(
        "{ts}  {}  {sign}{}  {}{action}  balance {}",
        txn.txn_id,
        format_credits(amount),
        txn.reason,
        format_credits(txn.balance_after)
    );
    Ok(())
}
