use super::allocation::allocate;
use super::engine::run_goal_ledger;
use super::error::PlanError;
use super::types::{
    GoalResult, PlanInputs, PlanReport, PlanSummary, RateSpec, Sentiment, TacticalShift,
};

/// Runs one full report: goal ledger, then the tactical allocation.
pub fn build_plan_report(inputs: &PlanInputs) -> Result<PlanReport, PlanError> {
    validate_plan_inputs(inputs)?;
    let rate = RateSpec::new(inputs.cagr)?;

    log::debug!(
        "planning {} goals for '{}' at {:.2}% CAGR",
        inputs.goals.len(),
        inputs.client_name,
        rate.annual() * 100.0
    );

    let goals = run_goal_ledger(
        &inputs.goals,
        rate,
        inputs.lumpsum,
        inputs.starting_sip,
        inputs.step_up_fraction,
    )?;
    let is_bullish = inputs.market.is_bullish;
    let allocation = allocate(inputs.risk_profile, is_bullish);
    let summary = summarize(&goals);

    Ok(PlanReport {
        client_name: inputs.client_name.trim().to_string(),
        risk_profile: inputs.risk_profile,
        sentiment: if is_bullish {
            Sentiment::Bullish
        } else {
            Sentiment::Bearish
        },
        tactical_shift: if is_bullish {
            TacticalShift::Offensive
        } else {
            TacticalShift::Defensive
        },
        cagr: rate.annual(),
        step_up_fraction: inputs.step_up_fraction,
        market: inputs.market,
        goals,
        allocation,
        summary,
    })
}

fn summarize(goals: &[GoalResult]) -> PlanSummary {
    PlanSummary {
        goals_total: goals.len(),
        goals_achieved: goals.iter().filter(|g| g.achieved).count(),
        total_shortfall: goals.iter().map(|g| g.shortfall).sum(),
        closing_corpus: goals.last().map(|g| g.surplus).unwrap_or(0.0),
    }
}

fn validate_plan_inputs(inputs: &PlanInputs) -> Result<(), PlanError> {
    if inputs.client_name.trim().is_empty() {
        return Err(PlanError::InvalidInput(
            "client name must not be empty".to_string(),
        ));
    }
    if inputs.goals.is_empty() {
        return Err(PlanError::InvalidInput(
            "at least one goal is required".to_string(),
        ));
    }
    for (name, value) in [
        ("lumpsum", inputs.lumpsum),
        ("starting SIP", inputs.starting_sip),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(PlanError::InvalidInput(format!(
                "{name} must be >= 0, got {value}"
            )));
        }
    }
    if !(0.0..1.0).contains(&inputs.step_up_fraction) {
        return Err(PlanError::InvalidInput(format!(
            "step-up must be in [0, 1), got {}",
            inputs.step_up_fraction
        )));
    }
    for goal in &inputs.goals {
        if !goal.amount.is_finite() || goal.amount <= 0.0 {
            return Err(PlanError::InvalidInput(format!(
                "goal '{}' must have an amount > 0",
                goal.name
            )));
        }
        if !goal.years.is_finite() || goal.years < 0.0 {
            return Err(PlanError::InvalidInput(format!(
                "goal '{}' must have years >= 0",
                goal.name
            )));
        }
    }
    Ok(())
}
