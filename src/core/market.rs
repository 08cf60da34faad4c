use serde::{Deserialize, Serialize};

pub const GRAMS_PER_TROY_OUNCE: f64 = 31.1035;
pub const TREND_WINDOW: usize = 200;

/// Market inputs for one report. Treated as an immutable snapshot; fetching
/// and caching quotes is the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub usd_inr: f64,
    pub nifty: f64,
    pub is_bullish: bool,
    pub gold_gram: f64,
    pub silver_gram: f64,
}

impl Default for MarketSnapshot {
    fn default() -> Self {
        Self::fallback()
    }
}

/// Raw quotes as a market-data provider would return them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarketQuotes {
    pub usd_inr: Option<f64>,
    pub nifty_closes: Vec<f64>,
    pub gold_usd_oz: Option<f64>,
    pub silver_usd_oz: Option<f64>,
}

impl MarketSnapshot {
    /// Snapshot used when live quotes are unavailable.
    pub fn fallback() -> Self {
        Self {
            usd_inr: 90.66,
            nifty: 23_000.0,
            is_bullish: true,
            gold_gram: 7_200.0,
            silver_gram: 95.0,
        }
    }

    pub fn with_trend(self, is_bullish: bool) -> Self {
        Self { is_bullish, ..self }
    }

    /// Builds a snapshot from raw quotes. Any unusable quote (missing,
    /// non-finite, non-positive, or too little price history) discards the
    /// whole set in favour of the fallback snapshot.
    pub fn from_quotes(quotes: &MarketQuotes) -> Self {
        let (Some(usd_inr), Some(gold), Some(silver)) =
            (quotes.usd_inr, quotes.gold_usd_oz, quotes.silver_usd_oz)
        else {
            log::warn!("incomplete market quotes; using fallback snapshot");
            return Self::fallback();
        };
        if ![usd_inr, gold, silver].iter().all(|v| is_price(*v)) {
            log::warn!("non-positive market quote; using fallback snapshot");
            return Self::fallback();
        }
        let (Some(&nifty), Some(is_bullish)) = (
            quotes.nifty_closes.last(),
            is_bullish_from_closes(&quotes.nifty_closes),
        ) else {
            log::warn!(
                "need {TREND_WINDOW} index closes for the trend, got {}; using fallback snapshot",
                quotes.nifty_closes.len()
            );
            return Self::fallback();
        };

        Self {
            usd_inr,
            nifty,
            is_bullish,
            gold_gram: inr_per_gram(gold, usd_inr),
            silver_gram: inr_per_gram(silver, usd_inr),
        }
    }
}

fn is_price(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Bullish when the last close sits above its 200-period simple moving
/// average. `None` without a full window of finite closes.
pub fn is_bullish_from_closes(closes: &[f64]) -> Option<bool> {
    if closes.len() < TREND_WINDOW || !closes.iter().all(|c| c.is_finite()) {
        return None;
    }
    let window = &closes[closes.len() - TREND_WINDOW..];
    let sma = window.iter().sum::<f64>() / TREND_WINDOW as f64;
    closes.last().map(|last| *last > sma)
}

pub fn inr_per_gram(usd_per_troy_ounce: f64, usd_inr: f64) -> f64 {
    usd_per_troy_ounce / GRAMS_PER_TROY_OUNCE * usd_inr
}
