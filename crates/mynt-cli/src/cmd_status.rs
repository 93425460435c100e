use mynt_core::money::format_credits;
use mynt_ledger::LedgerStore;
use std::path::Path;

pub fn execute(db_path: &Path, user: &str, json: bool) -> anyhow::Result<()> {
    let store = LedgerStore::open_or_create(db_path)?;
    let status = store.status(user)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("User {} ({})", status.user_id, status.plan);
    println!(
        "Balance: {} of {}",
        format_credits(status.balance_cents),
        format_credits(status.allocation.total_credits())
    );
    println!(
        "Spent this period: {} ({}%)",
        format_credits(status.spent_this_period_cents),
        status.percent_used
    );
    println!(
        "Per post: {} reactions, {} comments",
        status.allocation.reactions_per_post, status.allocation.comments_per_post
    );
    println!("Resets in {} days", status.days_remaining);
    Ok(())
}
