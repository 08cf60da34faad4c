use serde::{Deserialize, Serialize};

use super::error::PlanError;
use super::market::MarketSnapshot;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskProfile {
    Conservative,
    Balanced,
    Aggressive,
}

impl RiskProfile {
    pub const ALL: [RiskProfile; 3] = [
        RiskProfile::Conservative,
        RiskProfile::Balanced,
        RiskProfile::Aggressive,
    ];

    pub fn label(self) -> &'static str {
        match self {
            RiskProfile::Conservative => "Conservative",
            RiskProfile::Balanced => "Balanced",
            RiskProfile::Aggressive => "Aggressive",
        }
    }

    /// Resolves a free-text profile label such as `"aggressive"` or
    /// `"Conservative (7.5% CAGR)"`. Anything unrecognised is Balanced.
    pub fn from_label(label: &str) -> Self {
        let normalized = label.trim().to_ascii_lowercase();
        if normalized.starts_with("conservative") {
            RiskProfile::Conservative
        } else if normalized.starts_with("aggressive") {
            RiskProfile::Aggressive
        } else {
            RiskProfile::Balanced
        }
    }

    /// Projected annual growth for the profile under the current trend.
    pub fn cagr(self, is_bullish: bool) -> f64 {
        match (self, is_bullish) {
            (RiskProfile::Conservative, _) => 0.075,
            (RiskProfile::Balanced, true) => 0.105,
            (RiskProfile::Balanced, false) => 0.09,
            (RiskProfile::Aggressive, true) => 0.145,
            (RiskProfile::Aggressive, false) => 0.115,
        }
    }
}

/// Annual nominal growth rate, compounded monthly.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RateSpec {
    annual: f64,
}

impl RateSpec {
    pub fn new(annual: f64) -> Result<Self, PlanError> {
        if !annual.is_finite() || annual < 0.0 {
            return Err(PlanError::InvalidInput(format!(
                "growth rate must be a finite value >= 0, got {annual}"
            )));
        }
        Ok(Self { annual })
    }

    pub fn annual(self) -> f64 {
        self.annual
    }
}

/// Built-in goal kinds offered by the intake form.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LifeEvent {
    ChildEducation,
    ChildMarriage,
    HomePurchase,
    RetirementPlanning,
    MedicalEmergencyFund,
}

pub const DEFAULT_CHILD_TARGET_AGE: u32 = 18;

impl LifeEvent {
    pub const ALL: [LifeEvent; 5] = [
        LifeEvent::ChildEducation,
        LifeEvent::ChildMarriage,
        LifeEvent::HomePurchase,
        LifeEvent::RetirementPlanning,
        LifeEvent::MedicalEmergencyFund,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LifeEvent::ChildEducation => "Child's Education",
            LifeEvent::ChildMarriage => "Child's Marriage",
            LifeEvent::HomePurchase => "Home Purchase",
            LifeEvent::RetirementPlanning => "Retirement Planning",
            LifeEvent::MedicalEmergencyFund => "Medical Emergency Fund",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let wanted = label.trim();
        Self::ALL
            .into_iter()
            .find(|event| event.label().eq_ignore_ascii_case(wanted))
    }

    pub fn is_age_based(self) -> bool {
        matches!(self, LifeEvent::ChildEducation | LifeEvent::ChildMarriage)
    }

    pub fn is_emergency(self) -> bool {
        self == LifeEvent::MedicalEmergencyFund
    }

    /// Years until the goal falls due. Age-based goals count from the
    /// child's age to the target age (at least one year); an unknown child
    /// age (0) means the goal is due now.
    pub fn years_to_goal(self, entered_years: f64, child_age: u32, target_age: u32) -> f64 {
        if self.is_emergency() {
            0.0
        } else if self.is_age_based() {
            if child_age > 0 {
                (i64::from(target_age) - i64::from(child_age)).max(1) as f64
            } else {
                0.0
            }
        } else {
            entered_years
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub name: String,
    /// Target in present-day currency.
    pub amount: f64,
    pub years: f64,
}

impl Goal {
    pub fn new(name: impl Into<String>, amount: f64, years: f64) -> Self {
        Self {
            name: name.into(),
            amount,
            years,
        }
    }
}

/// Accounting threaded through the goal sequence. Fresh per report run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LedgerState {
    pub corpus: f64,
    pub cumulative_investment: f64,
    pub running_contribution: f64,
    pub last_milestone_year: f64,
}

impl LedgerState {
    pub fn new(lumpsum: f64, starting_contribution: f64) -> Self {
        Self {
            corpus: lumpsum,
            cumulative_investment: lumpsum,
            running_contribution: starting_contribution,
            last_milestone_year: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalResult {
    pub name: String,
    pub years: f64,
    pub gap_years: f64,
    pub invested_this_segment: f64,
    pub pre_tax_value: f64,
    pub tax: f64,
    pub post_tax_value: f64,
    pub inflation_adjusted_target: f64,
    pub achieved: bool,
    pub surplus: f64,
    pub shortfall: f64,
    pub required_contribution: Option<f64>,
    /// Set when the solver's upper bound could not reach the target, so
    /// `required_contribution` understates the true requirement.
    pub required_contribution_capped: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetWeight {
    pub asset: String,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationTable {
    pub risk_profile: RiskProfile,
    pub tactical: bool,
    pub weights: Vec<AssetWeight>,
}

impl AllocationTable {
    pub fn total(&self) -> u32 {
        self.weights.iter().map(|w| w.weight).sum()
    }

    pub fn weight(&self, asset: &str) -> Option<u32> {
        self.weights
            .iter()
            .find(|w| w.asset == asset)
            .map(|w| w.weight)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TacticalShift {
    Offensive,
    Defensive,
}

/// Everything one report needs, resolved up front by the caller.
#[derive(Debug, Clone)]
pub struct PlanInputs {
    pub client_name: String,
    pub risk_profile: RiskProfile,
    pub cagr: f64,
    pub lumpsum: f64,
    pub starting_sip: f64,
    pub step_up_fraction: f64,
    pub market: MarketSnapshot,
    pub goals: Vec<Goal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub goals_total: usize,
    pub goals_achieved: usize,
    pub total_shortfall: f64,
    pub closing_corpus: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanReport {
    pub client_name: String,
    pub risk_profile: RiskProfile,
    pub sentiment: Sentiment,
    pub tactical_shift: TacticalShift,
    pub cagr: f64,
    pub step_up_fraction: f64,
    pub market: MarketSnapshot,
    pub goals: Vec<GoalResult>,
    pub allocation: AllocationTable,
    pub summary: PlanSummary,
}
