use super::error::PlanError;
use super::solver::solve_required_contribution;
use super::types::{Goal, GoalResult, LedgerState, RateSpec};

/// Gains below this are exempt from capital-gains tax.
pub const CAPITAL_GAINS_EXEMPTION: f64 = 125_000.0;
pub const CAPITAL_GAINS_RATE: f64 = 0.125;
pub const ASSUMED_INFLATION: f64 = 0.06;

/// Future value of a lumpsum plus a monthly contribution that steps up once
/// per completed year, at `annual_rate` compounded monthly.
///
/// Each deposit compounds from its deposit month to the end of the horizon.
/// Whole years run first; a trailing partial year deposits `floor(f * 12)`
/// more months at the last stepped-up amount. Nothing is rounded here.
pub fn future_value(
    annual_rate: f64,
    years: f64,
    starting_monthly_contribution: f64,
    lumpsum: f64,
    step_up_fraction: f64,
) -> f64 {
    let growth = 1.0 + annual_rate / 12.0;
    let grown_lumpsum = lumpsum * growth.powf(years * 12.0);

    let whole_years = years.floor().max(0.0) as u32;
    let mut contribution = starting_monthly_contribution;
    let mut grown_contributions = 0.0;
    for year in 1..=whole_years {
        let months_after_year = (years - f64::from(year)) * 12.0;
        for month in 0..12u32 {
            let months_compounding = months_after_year + f64::from(12 - month - 1);
            grown_contributions += contribution * growth.powf(months_compounding);
        }
        contribution *= 1.0 + step_up_fraction;
    }

    let trailing_months = ((years - f64::from(whole_years)) * 12.0).floor().max(0.0) as u32;
    for deposit in 0..trailing_months {
        grown_contributions += contribution * growth.powi((trailing_months - deposit - 1) as i32);
    }

    grown_lumpsum + grown_contributions
}

/// Principal paid in over `gap` whole years, stepping up after each year.
pub fn principal_added(running_contribution: f64, gap: f64, step_up_fraction: f64) -> f64 {
    let mut contribution = running_contribution;
    let mut invested = 0.0;
    for _ in 0..gap.floor().max(0.0) as u32 {
        invested += contribution * 12.0;
        contribution *= 1.0 + step_up_fraction;
    }
    invested
}

pub fn capital_gains_tax(pre_tax_value: f64, cumulative_investment: f64) -> f64 {
    ((pre_tax_value - cumulative_investment) - CAPITAL_GAINS_EXEMPTION).max(0.0) * CAPITAL_GAINS_RATE
}

/// Goal amount inflated from today to the goal year.
pub fn inflation_adjusted_target(amount: f64, years: f64) -> f64 {
    amount * (1.0 + ASSUMED_INFLATION).powf(years)
}

/// Walks the goals in ascending year order (stable for ties), growing the
/// carried corpus between milestones and settling each goal against its
/// inflated target.
///
/// A met goal rolls its surplus forward and that surplus also becomes the
/// new tax basis. This is a simplification kept from the planning model, not
/// an exact cost-basis ledger. A missed goal zeroes the corpus and reports
/// the starting contribution, from today with the original lumpsum, that
/// would have met it.
pub fn run_goal_ledger(
    goals: &[Goal],
    rate: RateSpec,
    lumpsum: f64,
    starting_contribution: f64,
    step_up_fraction: f64,
) -> Result<Vec<GoalResult>, PlanError> {
    for goal in goals {
        if !goal.years.is_finite() || goal.years < 0.0 {
            return Err(PlanError::InvalidInput(format!(
                "goal '{}' must have years >= 0, got {}",
                goal.name, goal.years
            )));
        }
    }

    let mut ordered = goals.iter().collect::<Vec<_>>();
    ordered.sort_by(|a, b| a.years.total_cmp(&b.years));

    let mut state = LedgerState::new(lumpsum, starting_contribution);
    let mut results = Vec::with_capacity(ordered.len());
    for goal in ordered {
        results.push(settle_goal(
            &mut state,
            goal,
            rate,
            lumpsum,
            step_up_fraction,
        )?);
    }
    Ok(results)
}

fn settle_goal(
    state: &mut LedgerState,
    goal: &Goal,
    rate: RateSpec,
    original_lumpsum: f64,
    step_up_fraction: f64,
) -> Result<GoalResult, PlanError> {
    let gap = goal.years - state.last_milestone_year;
    if gap < 0.0 {
        return Err(PlanError::InvalidInput(format!(
            "goal '{}' at year {} precedes milestone year {}",
            goal.name, goal.years, state.last_milestone_year
        )));
    }

    let pre_tax_value = future_value(
        rate.annual(),
        gap,
        state.running_contribution,
        state.corpus,
        step_up_fraction,
    );
    let invested_this_segment = principal_added(state.running_contribution, gap, step_up_fraction);
    state.cumulative_investment += invested_this_segment;

    let tax = capital_gains_tax(pre_tax_value, state.cumulative_investment);
    let post_tax_value = pre_tax_value - tax;
    let target = inflation_adjusted_target(goal.amount, goal.years);
    if ![pre_tax_value, state.cumulative_investment, target]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(PlanError::InvalidInput(format!(
            "goal '{}' at year {} overflows the projection",
            goal.name, goal.years
        )));
    }
    let achieved = post_tax_value >= target;

    let mut result = GoalResult {
        name: goal.name.clone(),
        years: goal.years,
        gap_years: gap,
        invested_this_segment,
        pre_tax_value,
        tax,
        post_tax_value,
        inflation_adjusted_target: target,
        achieved,
        surplus: 0.0,
        shortfall: 0.0,
        required_contribution: None,
        required_contribution_capped: false,
    };

    if achieved {
        result.surplus = post_tax_value - target;
        state.corpus = result.surplus;
        state.cumulative_investment = result.surplus;
        log::debug!(
            "goal '{}' met at year {}: surplus {:.2} carried forward",
            goal.name,
            goal.years,
            result.surplus
        );
    } else {
        result.shortfall = target - post_tax_value;
        let solve = solve_required_contribution(
            target,
            rate.annual(),
            goal.years,
            original_lumpsum,
            step_up_fraction,
        )?;
        result.required_contribution = Some(solve.value);
        result.required_contribution_capped = solve.capped;
        state.corpus = 0.0;
        log::info!(
            "goal '{}' short by {:.2} at year {}; starting SIP needed {:.2}{}",
            goal.name,
            result.shortfall,
            goal.years,
            solve.value,
            if solve.capped { " (solver bound hit)" } else { "" }
        );
    }

    state.running_contribution *= (1.0 + step_up_fraction).powf(gap);
    state.last_milestone_year = goal.years;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assume, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn rate(annual: f64) -> RateSpec {
        RateSpec::new(annual).expect("valid rate")
    }

    /// Flat SIP deposited at the end of each month plus a grown lumpsum.
    fn flat_sip_closed_form(annual_rate: f64, years: f64, sip: f64, lumpsum: f64) -> f64 {
        let r = annual_rate / 12.0;
        let n = years * 12.0;
        let growth = (1.0 + r).powf(n);
        sip * ((growth - 1.0) / r) + lumpsum * growth
    }

    #[test]
    fn reference_step_up_projection() {
        let fv = future_value(0.105, 10.0, 10_000.0, 0.0, 0.10);
        assert_close(fv, 3_096_838.175, 0.01);
    }

    #[test]
    fn flat_sip_matches_closed_form() {
        let fv = future_value(0.105, 10.0, 10_000.0, 0.0, 0.0);
        assert_close(fv, 2_108_148.135, 0.01);
        assert_close(fv, flat_sip_closed_form(0.105, 10.0, 10_000.0, 0.0), 1e-4);
    }

    #[test]
    fn annuity_due_form_is_one_month_of_growth_ahead() {
        let r: f64 = 0.105 / 12.0;
        let fv = future_value(0.105, 10.0, 10_000.0, 0.0, 0.0);
        let due = 10_000.0 * (((1.0 + r).powi(120) - 1.0) / r) * (1.0 + r);
        assert_close(due / fv, 1.0 + r, 1e-12);
    }

    #[test]
    fn fractional_year_adds_trailing_months_at_stepped_amount() {
        let fv = future_value(0.105, 2.5, 1_000.0, 0.0, 0.10);
        assert_close(fv, 36_751.259, 0.001);
    }

    #[test]
    fn one_year_of_contributions_ignores_step_up() {
        let flat = future_value(0.12, 1.0, 1_000.0, 0.0, 0.0);
        let stepped = future_value(0.12, 1.0, 1_000.0, 0.0, 0.5);
        assert_close(flat, stepped, 1e-9);
        assert_close(flat, 12_682.503, 0.001);
    }

    #[test]
    fn zero_rate_sums_deposits() {
        let fv = future_value(0.0, 3.0, 1_000.0, 5_000.0, 0.10);
        assert_close(fv, 5_000.0 + 12_000.0 + 13_200.0 + 14_520.0, 1e-6);
    }

    #[test]
    fn zero_contribution_grows_lumpsum_only() {
        let fv = future_value(0.12, 4.0, 0.0, 100_000.0, 0.1);
        assert_close(fv, 100_000.0 * 1.01f64.powi(48), 1e-6);
    }

    #[test]
    fn capital_gains_tax_applies_above_exemption_only() {
        assert_eq!(capital_gains_tax(200_000.0, 100_000.0), 0.0);
        assert_eq!(capital_gains_tax(50_000.0, 100_000.0), 0.0);
        assert_close(capital_gains_tax(425_000.0, 100_000.0), 25_000.0, 1e-9);
    }

    #[test]
    fn principal_counts_whole_years_only() {
        assert_close(principal_added(1_000.0, 2.7, 0.1), 12_000.0 + 13_200.0, 1e-9);
        assert_eq!(principal_added(1_000.0, 0.0, 0.1), 0.0);
    }

    #[test]
    fn target_inflates_from_today() {
        assert_close(inflation_adjusted_target(1_000_000.0, 5.0), 1_338_225.5776, 1e-4);
        assert_eq!(inflation_adjusted_target(300_000.0, 0.0), 300_000.0);
    }

    #[test]
    fn ledger_processes_goals_in_ascending_years() {
        let goals = vec![
            Goal::new("Retirement Planning", 5_000_000.0, 18.0),
            Goal::new("Child's Education", 1_000_000.0, 5.0),
            Goal::new("Medical Emergency Fund", 300_000.0, 0.0),
        ];
        let results =
            run_goal_ledger(&goals, rate(0.105), 100_000.0, 10_000.0, 0.10).expect("ledger runs");

        let years = results.iter().map(|r| r.years).collect::<Vec<_>>();
        assert_eq!(years, vec![0.0, 5.0, 18.0]);
        let gaps = results.iter().map(|r| r.gap_years).collect::<Vec<_>>();
        assert_eq!(gaps, vec![0.0, 5.0, 13.0]);
        assert!(years.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn ledger_shortfalls_reset_corpus_and_report_required_sip() {
        let goals = vec![
            Goal::new("Retirement Planning", 5_000_000.0, 18.0),
            Goal::new("Child's Education", 1_000_000.0, 5.0),
            Goal::new("Medical Emergency Fund", 300_000.0, 0.0),
        ];
        let results =
            run_goal_ledger(&goals, rate(0.105), 100_000.0, 10_000.0, 0.10).expect("ledger runs");

        let emergency = &results[0];
        assert_eq!(emergency.pre_tax_value, 100_000.0);
        assert_eq!(emergency.tax, 0.0);
        assert!(!emergency.achieved);
        assert_close(emergency.shortfall, 200_000.0, 1e-9);
        assert_eq!(emergency.required_contribution, Some(1_000_000.0));
        assert!(emergency.required_contribution_capped);

        let education = &results[1];
        assert_close(education.pre_tax_value, 939_257.524, 0.001);
        assert_eq!(education.tax, 0.0);
        assert_close(education.inflation_adjusted_target, 1_338_225.578, 0.001);
        assert_close(education.shortfall, 398_968.054, 0.001);
        assert_close(
            education.required_contribution.expect("shortfall solves"),
            12_452.019,
            0.01,
        );
        assert!(!education.required_contribution_capped);

        let retirement = &results[2];
        assert_close(retirement.pre_tax_value, 8_752_348.455, 0.01);
        assert_close(retirement.tax, 381_930.960, 0.01);
        assert_close(retirement.post_tax_value, 8_370_417.495, 0.01);
        assert_close(retirement.shortfall, 5_901_278.270, 0.01);
        assert_close(
            retirement.required_contribution.expect("shortfall solves"),
            10_972.506,
            0.01,
        );
    }

    #[test]
    fn ledger_carries_surplus_and_resets_tax_basis() {
        let goals = vec![
            Goal::new("Medical Emergency Fund", 100_000.0, 0.0),
            Goal::new("Home Purchase", 500_000.0, 3.0),
        ];
        let results =
            run_goal_ledger(&goals, rate(0.105), 200_000.0, 20_000.0, 0.0).expect("ledger runs");

        assert!(results[0].achieved);
        assert_close(results[0].surplus, 100_000.0, 1e-9);
        assert_eq!(results[0].required_contribution, None);

        let home = &results[1];
        assert_close(home.invested_this_segment, 720_000.0, 1e-9);
        assert_close(home.pre_tax_value, 978_856.948, 0.001);
        assert_close(home.tax, 4_232.118, 0.001);
        assert_close(home.inflation_adjusted_target, 595_508.0, 1e-6);
        assert!(home.achieved);
        assert_close(home.surplus, 379_116.829, 0.001);
        assert_eq!(home.shortfall, 0.0);
    }

    #[test]
    fn same_year_goals_keep_input_order_and_see_no_growth() {
        let goals = vec![
            Goal::new("First", 10.0, 2.0),
            Goal::new("Second", 10.0, 2.0),
        ];
        let results =
            run_goal_ledger(&goals, rate(0.08), 0.0, 1_000.0, 0.1).expect("ledger runs");
        assert_eq!(results[0].name, "First");
        assert_eq!(results[1].name, "Second");
        assert_eq!(results[1].gap_years, 0.0);
        assert_close(results[1].pre_tax_value, results[0].surplus, 1e-9);
    }

    #[test]
    fn ledger_rejects_negative_years() {
        let goals = vec![Goal::new("Backdated", 1_000.0, -1.0)];
        let err = run_goal_ledger(&goals, rate(0.08), 0.0, 1_000.0, 0.1)
            .expect_err("negative years must fail");
        assert!(matches!(err, PlanError::InvalidInput(_)));
    }

    #[test]
    fn ledger_rejects_horizons_that_overflow() {
        let goals = vec![Goal::new("Far", 1_000_000.0, 8_000.0)];
        let err = run_goal_ledger(&goals, rate(0.105), 100_000.0, 10_000.0, 0.1)
            .expect_err("overflowing projection must fail");
        assert!(matches!(err, PlanError::InvalidInput(_)));

        let goals = vec![
            Goal::new("Near", 100_000.0, 5.0),
            Goal::new("Distant", 1_000_000.0, 20_000.0),
        ];
        let err = run_goal_ledger(&goals, rate(0.105), 100_000.0, 10_000.0, 0.1)
            .expect_err("overflowing later goal must fail");
        assert!(err.to_string().contains("Distant"));
    }

    #[test]
    fn running_contribution_steps_up_by_gap() {
        let goals = vec![
            Goal::new("A", 1.0, 2.0),
            Goal::new("B", 1.0, 3.0),
        ];
        let results =
            run_goal_ledger(&goals, rate(0.0), 0.0, 1_000.0, 0.1).expect("ledger runs");
        // Second segment starts from 1000 * 1.1^2.
        assert_close(results[1].invested_this_segment, 1_210.0 * 12.0, 1e-9);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_zero_horizon_returns_lumpsum(
            annual_rate in 0.0f64..0.3,
            sip in 0.0f64..1_000_000.0,
            lumpsum in 0.0f64..10_000_000.0,
            step_up in -0.5f64..1.0,
        ) {
            prop_assert!(future_value(annual_rate, 0.0, sip, lumpsum, step_up) == lumpsum);
        }

        #[test]
        fn prop_flat_sip_matches_closed_form(
            annual_rate in 0.001f64..0.3,
            years in 0u32..40,
            sip in 0.0f64..100_000.0,
            lumpsum in 0.0f64..5_000_000.0,
        ) {
            let years = years as f64;
            let fv = future_value(annual_rate, years, sip, lumpsum, 0.0);
            let expected = flat_sip_closed_form(annual_rate, years, sip, lumpsum);
            prop_assert!(
                (fv - expected).abs() <= expected.abs() * 1e-9 + 1e-6,
                "fv {fv}, closed form {expected}"
            );
        }

        #[test]
        fn prop_monotone_in_sip_lumpsum_and_step_up(
            annual_rate in 0.0f64..0.3,
            years in 0.0f64..30.0,
            sip in 0.0f64..50_000.0,
            lumpsum in 0.0f64..1_000_000.0,
            step_up in 0.0f64..0.25,
            bump in 0.0f64..10_000.0,
        ) {
            let base = future_value(annual_rate, years, sip, lumpsum, step_up);
            prop_assert!(future_value(annual_rate, years, sip + bump, lumpsum, step_up) >= base);
            prop_assert!(future_value(annual_rate, years, sip, lumpsum + bump, step_up) >= base);
            prop_assert!(
                future_value(annual_rate, years, sip, lumpsum, step_up + bump / 100_000.0) >= base
            );
        }

        #[test]
        fn prop_monotone_in_years(
            annual_rate in 0.001f64..0.3,
            years in 0.0f64..30.0,
            extra in 0.0f64..5.0,
            sip in 0.0f64..50_000.0,
            lumpsum in 0.0f64..1_000_000.0,
            step_up in 0.0f64..0.25,
        ) {
            prop_assume!(sip > 0.0 || lumpsum > 0.0);
            let shorter = future_value(annual_rate, years, sip, lumpsum, step_up);
            let longer = future_value(annual_rate, years + extra, sip, lumpsum, step_up);
            prop_assert!(longer >= shorter * (1.0 - 1e-12), "shorter {shorter}, longer {longer}");
        }

        #[test]
        fn prop_ledger_milestones_never_decrease(
            years in proptest::collection::vec(0u32..40, 1..8),
        ) {
            let goals = years
                .iter()
                .enumerate()
                .map(|(i, y)| Goal::new(format!("goal-{i}"), 100_000.0, *y as f64))
                .collect::<Vec<_>>();
            let results = run_goal_ledger(&goals, rate(0.1), 50_000.0, 5_000.0, 0.1)
                .expect("ledger runs");
            prop_assert!(results.len() == goals.len());
            prop_assert!(results.windows(2).all(|w| w[0].years <= w[1].years));
            prop_assert!(results.iter().all(|r| r.gap_years >= 0.0 && r.tax >= 0.0));
        }
    }
}
