mod allocation;
mod engine;
mod error;
mod market;
mod report;
mod solver;
mod types;

pub use allocation::{allocate, base_allocation};
pub use engine::{
    ASSUMED_INFLATION, CAPITAL_GAINS_EXEMPTION, CAPITAL_GAINS_RATE, capital_gains_tax,
    future_value, inflation_adjusted_target, principal_added, run_goal_ledger,
};
pub use error::PlanError;
pub use market::{MarketQuotes, MarketSnapshot, inr_per_gram, is_bullish_from_closes};
pub use report::build_plan_report;
pub use solver::{ContributionSolve, required_contribution, solve_required_contribution};
pub use types::{
    AllocationTable, AssetWeight, DEFAULT_CHILD_TARGET_AGE, Goal, GoalResult, LedgerState,
    LifeEvent, PlanInputs, PlanReport, PlanSummary, RateSpec, RiskProfile, Sentiment,
    TacticalShift,
};
