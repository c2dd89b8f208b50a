use crate::models::{Candle, Signal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakoutParams {
    pub lookback_period: usize,
    /// Percent beyond the channel edge the close must travel, e.g. 2.0
    /// requires a close 2% above the lookback high.
    pub breakout_threshold: f64,
}

/// Channel breakout: the lookback window excludes the current candle so a
/// new high is compared against history, not itself.
pub(crate) fn signal(params: &BreakoutParams, candles: &[Candle]) -> Signal {
    let n = candles.len();
    let window = &candles[n - 1 - params.lookback_period..n - 1];

    let highest_high = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let lowest_low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let close = candles[n - 1].close;
    let factor = params.breakout_threshold / 100.0;

    if close > highest_high * (1.0 + factor) {
        Signal::Buy
    } else if close < lowest_low * (1.0 - factor) {
        Signal::Sell
    } else {
        Signal::Neutral
    }
}
