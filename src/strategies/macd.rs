use crate::indicators;
use crate::models::{Candle, Signal};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacdParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
}

/// MACD-line/signal-line crossovers, same crossover convention as the
/// moving-average strategy.
pub(crate) fn signal(params: &MacdParams, candles: &[Candle]) -> Signal {
    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let series = indicators::macd(
        &closes,
        params.fast_period,
        params.slow_period,
        params.signal_period,
    );

    if series.macd_line.len() < 2 || series.signal_line.len() < 2 {
        return Signal::Neutral;
    }

    let current_macd = series.macd_line[series.macd_line.len() - 1];
    let prev_macd = series.macd_line[series.macd_line.len() - 2];
    let current_signal = series.signal_line[series.signal_line.len() - 1];
    let prev_signal = series.signal_line[series.signal_line.len() - 2];

    if prev_macd <= prev_signal && current_macd > current_signal {
        Signal::Buy
    } else if prev_macd >= prev_signal && current_macd < current_signal {
        Signal::Sell
    } else {
        Signal::Neutral
    }
}
