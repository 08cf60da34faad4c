use super::engine::future_value;
use super::error::PlanError;

pub const SOLVER_ITERATIONS: u32 = 50;
pub const SOLVER_MIN_UPPER_BOUND: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContributionSolve {
    /// Smallest tested starting contribution meeting the target.
    pub value: f64,
    pub upper_bound: f64,
    /// The target lies beyond the upper bound, so `value` is the bound
    /// itself and understates the real requirement.
    pub capped: bool,
}

/// Starting monthly contribution that grows to `target` over `years`.
pub fn required_contribution(
    target: f64,
    annual_rate: f64,
    years: f64,
    lumpsum: f64,
    step_up_fraction: f64,
) -> Result<f64, PlanError> {
    solve_required_contribution(target, annual_rate, years, lumpsum, step_up_fraction)
        .map(|solve| solve.value)
}

/// Fixed-round bisection over `[0, max(target / 12, 1_000_000)]`. Future
/// value is non-decreasing in the contribution for rate and step-up above
/// -100%, which is what the guard enforces.
pub fn solve_required_contribution(
    target: f64,
    annual_rate: f64,
    years: f64,
    lumpsum: f64,
    step_up_fraction: f64,
) -> Result<ContributionSolve, PlanError> {
    validate_solve(target, annual_rate, years, lumpsum, step_up_fraction)?;

    let upper_bound = (target / 12.0).max(SOLVER_MIN_UPPER_BOUND);
    let mut lo = 0.0;
    let mut hi = upper_bound;
    for _ in 0..SOLVER_ITERATIONS {
        let mid = (lo + hi) * 0.5;
        let fv = future_value(annual_rate, years, mid, lumpsum, step_up_fraction);
        if fv < target {
            lo = mid;
        } else {
            hi = mid;
        }
    }

    let capped = future_value(annual_rate, years, upper_bound, lumpsum, step_up_fraction) < target;
    Ok(ContributionSolve {
        value: hi,
        upper_bound,
        capped,
    })
}

fn validate_solve(
    target: f64,
    annual_rate: f64,
    years: f64,
    lumpsum: f64,
    step_up_fraction: f64,
) -> Result<(), PlanError> {
    for (name, value) in [
        ("target", target),
        ("annual_rate", annual_rate),
        ("years", years),
        ("lumpsum", lumpsum),
        ("step_up_fraction", step_up_fraction),
    ] {
        if !value.is_finite() {
            return Err(PlanError::UnsolvableTarget(format!(
                "{name} must be finite, got {value}"
            )));
        }
    }
    if annual_rate <= -1.0 {
        return Err(PlanError::UnsolvableTarget(
            "annual_rate must be > -100%".to_string(),
        ));
    }
    if step_up_fraction <= -1.0 {
        return Err(PlanError::UnsolvableTarget(
            "step_up_fraction must be > -100%".to_string(),
        ));
    }
    if years < 0.0 {
        return Err(PlanError::InvalidInput("years must be >= 0".to_string()));
    }
    Ok(())
}
