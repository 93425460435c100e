use mynt_ledger::LedgerStore;
use std::path::Path;

pub fn execute(db_path: &Path) -> anyhow::Result<()> {
    let _store = LedgerStore::open_or_create(db_path)?;
    println!("Initialized wallet store at {}", db_path.display());
    Ok(())
}
