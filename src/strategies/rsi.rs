use crate::indicators;
use crate::models::{Candle, Signal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RsiParams {
    pub period: usize,
    pub overbought: f64,
    pub oversold: f64,
}

/// Buys when RSI crosses up through the oversold level, sells when it
/// crosses down through the overbought level. Sitting inside either band
/// without a cross stays neutral.
pub(crate) fn signal(params: &RsiParams, candles: &[Candle]) -> Signal {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let n = closes.len();

    let current = indicators::rsi(&closes, params.period);
    let previous = indicators::rsi(&closes[..n - 1], params.period);

    if previous <= params.oversold && current > params.oversold {
        Signal::Buy
    } else if previous >= params.overbought && current < params.overbought {
        Signal::Sell
    } else {
        Signal::Neutral
    }
}
