use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Billing plan identifier stored on a wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Starter,
    Pro,
}

/// Immutable allocation record for one plan. `total_credits` is granted at
/// each period reset; unspent balance from the prior period is forfeited,
/// never accumulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanConfig {
    pub name: &'static str,
    pub base_credits: i64,
    pub bonus_credits: i64,
    pub reactions_per_post: u32,
    pub comments_per_post: u32,
    /// Billing cadence in days.
    pub period_days: i64,
}

impl PlanConfig {
    pub fn total_credits(&self) -> i64 {
        self.base_credits + self.bonus_credits
    }

    /// Catalog lookup by plan id. Unknown ids are a configuration defect
    /// surfaced to the caller, never silently defaulted.
    pub fn lookup(id: &str) -> Result<&'static PlanConfig, UnknownPlan> {
        Ok(id.parse::<Plan>()?.config())
    }
}

const FREE: PlanConfig = PlanConfig {
    name: "free",
    base_credits: 500,
    bonus_credits: 0,
    reactions_per_post: 3,
    comments_per_post: 1,
    period_days: 30,
};

const STARTER: PlanConfig = PlanConfig {
    name: "starter",
    base_credits: 2500,
    bonus_credits: 500,
    reactions_per_post: 10,
    comments_per_post: 5,
    period_days: 30,
};

const PRO: PlanConfig = PlanConfig {
    name: "pro",
    base_credits: 10000,
    bonus_credits: 2500,
    reactions_per_post: 50,
    comments_per_post: 20,
    period_days: 30,
};

impl Plan {
    pub const ALL: [Plan; 3] = [Plan::Free, Plan::Starter, Plan::Pro];

    pub fn config(&self) -> &'static PlanConfig {
        match self {
            Plan::Free => &FREE,
            Plan::Starter => &STARTER,
            Plan::Pro => &PRO,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.config().name
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Catalog miss. Callers must validate plan ids before storing them on a
/// wallet, so this is a caller/configuration defect at the point it occurs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plan id: {0:?}")]
pub struct UnknownPlan(pub String);

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Plan::Free),
            "starter" => Ok(Plan::Starter),
            "pro" => Ok(Plan::Pro),
            other => Err(UnknownPlan(other.to_string())),
        }
    }
}
