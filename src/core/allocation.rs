use super::types::{AllocationTable, AssetWeight, RiskProfile};

const CONSERVATIVE_BASE: [(&str, u32); 4] = [
    ("Equity Index", 15),
    ("Debt Funds", 45),
    ("Govt Bonds", 30),
    ("Gold", 10),
];
const BALANCED_BASE: [(&str, u32); 4] = [
    ("Equity Flexi", 50),
    ("Debt Funds", 25),
    ("Corp Bonds", 15),
    ("Gold", 10),
];
const AGGRESSIVE_BASE: [(&str, u32); 4] = [
    ("Equity Mid/Small", 75),
    ("Intl Equity", 10),
    ("Debt/Cash", 10),
    ("Gold", 5),
];

const BEARISH_EQUITY_CUT: u32 = 10;
const BEARISH_GOLD_ADD: u32 = 3;
const BEARISH_DEBT_ADD: u32 = 7;

pub fn base_allocation(risk_profile: RiskProfile) -> AllocationTable {
    let base = match risk_profile {
        RiskProfile::Conservative => CONSERVATIVE_BASE,
        RiskProfile::Balanced => BALANCED_BASE,
        RiskProfile::Aggressive => AGGRESSIVE_BASE,
    };
    AllocationTable {
        risk_profile,
        tactical: false,
        weights: base
            .iter()
            .map(|(asset, weight)| AssetWeight {
                asset: (*asset).to_string(),
                weight: *weight,
            })
            .collect(),
    }
}

/// Strategic weights for the profile, tilted defensively when the trend is
/// not bullish. The tilt moves ten points out of equity into gold and debt,
/// so the table still sums to 100.
pub fn allocate(risk_profile: RiskProfile, is_bullish: bool) -> AllocationTable {
    let mut table = base_allocation(risk_profile);
    if !is_bullish {
        apply_bearish_tilt(&mut table);
    }
    table
}

fn apply_bearish_tilt(table: &mut AllocationTable) {
    let equity = table
        .weights
        .iter()
        .position(|w| w.asset.contains("Equity"));
    let gold = table.weights.iter().position(|w| w.asset == "Gold");
    let debt = debt_bucket(&table.weights);

    let (Some(equity), Some(gold), Some(debt)) = (equity, gold, debt) else {
        log::warn!(
            "{} allocation is missing a tilt bucket; keeping strategic weights",
            table.risk_profile.label()
        );
        return;
    };
    if table.weights[equity].weight < BEARISH_EQUITY_CUT {
        log::warn!(
            "{} equity weight below tactical cut; keeping strategic weights",
            table.risk_profile.label()
        );
        return;
    }

    table.weights[equity].weight -= BEARISH_EQUITY_CUT;
    table.weights[gold].weight += BEARISH_GOLD_ADD;
    table.weights[debt].weight += BEARISH_DEBT_ADD;
    table.tactical = true;
}

fn debt_bucket(weights: &[AssetWeight]) -> Option<usize> {
    ["Debt Funds", "Govt Bonds"]
        .iter()
        .find_map(|label| weights.iter().position(|w| w.asset == *label))
        .or_else(|| weights.iter().position(|w| w.asset.contains("Debt")))
}
