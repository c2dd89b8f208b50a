use crate::indicators;
use crate::models::{Candle, Signal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaCrossoverParams {
    pub short_period: usize,
    pub long_period: usize,
}

/// Golden cross buys, death cross sells. The caller guarantees at least
/// `long_period + 2` candles so both the current and previous averages exist.
pub(crate) fn signal(params: &MaCrossoverParams, candles: &[Candle]) -> Signal {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let n = closes.len();

    let short = indicators::sma(&closes, params.short_period);
    let long = indicators::sma(&closes, params.long_period);
    let prev_short = indicators::sma(&closes[..n - 1], params.short_period);
    let prev_long = indicators::sma(&closes[..n - 1], params.long_period);

    if prev_short <= prev_long && short > long {
        Signal::Buy
    } else if prev_short >= prev_long && short < long {
        Signal::Sell
    } else {
        Signal::Neutral
    }
}
