mod cmd_grant;
mod cmd_history;
mod cmd_init;
mod cmd_plan;
mod cmd_reset;
mod cmd_spend;
mod cmd_status;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mynt", version, about = "Credit wallet ledger for metered actions")]
struct Cli {
    /// Path to the wallet database
    #[arg(long, global = true, default_value = "mynt.db")]
    db: PathBuf,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the wallet database
    Init,
    /// Show a user's wallet status for the current period
    Status {
        /// User identifier
        user: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List a user's transactions, most recent first
    History {
        /// User identifier
        user: String,
        /// Maximum rows (capped at 100)
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },
    /// Debit credits for a metered action
    Spend {
        /// User identifier
        user: String,
        /// Amount in cents
        amount_cents: i64,
        /// Metered action identifier (e.g. "analysis")
        #[arg(long)]
        action: String,
    },
    /// Credit a manual adjustment
    Grant {
        /// User identifier
        user: String,
        /// Amount in cents
        amount_cents: i64,
    },
    /// Run the billing-period check for a user
    Reset {
        /// User identifier
        user: String,
    },
    /// Inspect or change plans
    Plan {
        #[command(subcommand)]
        cmd: PlanCommand,
    },
}

#[derive(Subcommand)]
enum PlanCommand {
    /// Print the plan catalog
    List,
    /// Change a user's plan; the new allocation applies at the next period boundary
    Set {
        /// User identifier
        user: String,
        /// Plan id: free, starter, or pro
        plan: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Init => cmd_init::execute(&cli.db),
        Command::Status { user, json } => cmd_status::execute(&cli.db, &user, json),
        Command::History { user, limit, json } => {
            cmd_history::execute(&cli.db, &user, limit, json)
        }
        Command::Spend {
            user,
            amount_cents,
            action,
        } => cmd_spend::execute(&cli.db, &user, amount_cents, &action),
        Command::Grant { user, amount_cents } => {
            cmd_grant::execute(&cli.db, &user, amount_cents)
        }
        Command::Reset { user } => cmd_reset::execute(&cli.db, &user),
        Command::Plan { cmd } => match cmd {
            PlanCommand::List => cmd_plan::list(),
            PlanCommand::Set { user, plan } => cmd_plan::set(&cli.db, &user, &plan),
        },
    }
}
