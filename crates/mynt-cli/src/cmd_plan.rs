use mynt_core::money::format_credits;
use mynt_core::plan::Plan;
use mynt_ledger::LedgerStore;
use std::path::Path;

pub fn list() -> anyhow::Result<()> {
    for plan in Plan::ALL {
        let cfg = plan.config();
        println!(
            "{:<8} {} per {} days ({} base + {} bonus), {} reactions/post, {} comments/post",
            cfg.name,
            format_credits(cfg.total_credits()),
            cfg.period_days,
            format_credits(cfg.base_credits),
            format_credits(cfg.bonus_credits),
            cfg.reactions_per_post,
            cfg.comments_per_post
        );
    }
    Ok(())
}

pub fn set(db_path: &Path, user: &str, plan_id: &str) -> anyhow::Result<()> {
    let store = LedgerStore::open_or_create(db_path)?;
    store.get_or_create(user)?;
    let wallet = store.set_plan(user, plan_id)?;
    println!(
        "Plan for {user} is now {}; {} applies at the next period boundary",
        wallet.plan,
        format_credits(wallet.plan.config().total_credits())
    );
    Ok(())
}
