/// Arithmetic mean of the last `period` values. Returns 0.0 when fewer than
/// `period` values are available; callers treat that as "no reading yet"
/// rather than an error.
pub fn sma(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() < period {
        return 0.0;
    }
    let window = &values[values.len() - period..];
    window.iter().sum::<f64>() / period as f64
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values. Output index 0 corresponds to input index `period - 1`, so the
/// result has `values.len() - period + 1` entries.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut ema_values = Vec::with_capacity(values.len() - period + 1);
    ema_values.push(seed);
    for value in &values[period..] {
        let prev = *ema_values.last().expect("seeded above");
        ema_values.push((value - prev) * multiplier + prev);
    }

    ema_values
}

/// Wilder-smoothed RSI over the full series, returning the value at the last
/// index. 50.0 when there are not enough values, 100.0 when the smoothed
/// average loss is exactly zero.
pub fn rsi(values: &[f64], period: usize) -> f64 {
    if period == 0 || values.len() < period + 1 {
        return 50.0;
    }

    let mut sum_gain = 0.0;
    let mut sum_loss = 0.0;
    for i in 1..=period {
        let delta = values[i] - values[i - 1];
        if delta >= 0.0 {
            sum_gain += delta;
        } else {
            sum_loss += -delta;
        }
    }

    let mut avg_gain = sum_gain / period as f64;
    let mut avg_loss = sum_loss / period as f64;

    for i in (period + 1)..values.len() {
        let delta = values[i] - values[i - 1];
        let gain = if delta > 0.0 { delta } else { 0.0 };
        let loss = if delta < 0.0 { -delta } else { 0.0 };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
    }

    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
}

/// MACD line (`EMA(fast) - EMA(slow)`, aligned to the slow EMA's start
/// offset) and its signal line (`EMA(macd_line, signal_period)`). Both are
/// empty when the series is shorter than the slow period.
pub fn macd(
    values: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> MacdSeries {
    if fast_period == 0 || signal_period == 0 || fast_period >= slow_period {
        return MacdSeries {
            macd_line: Vec::new(),
            signal_line: Vec::new(),
        };
    }

    let fast_ema = ema(values, fast_period);
    let slow_ema = ema(values, slow_period);
    if slow_ema.is_empty() {
        return MacdSeries {
            macd_line: Vec::new(),
            signal_line: Vec::new(),
        };
    }

    let offset = slow_period - fast_period;
    let macd_line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, slow)| fast_ema[i + offset] - slow)
        .collect();
    let signal_line = ema(&macd_line, signal_period);

    MacdSeries {
        macd_line,
        signal_line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_returns_zero_when_window_is_short() {
        assert_eq!(sma(&[1.0, 2.0], 3), 0.0);
        assert_eq!(sma(&[1.0, 2.0, 3.0], 0), 0.0);
    }

    #[test]
    fn sma_uses_only_the_trailing_window() {
        let values = [10.0, 11.0, 9.0, 12.0, 8.0];
        assert!((sma(&values, 2) - 10.0).abs() < 1e-9);
        assert!((sma(&values, 3) - (9.0 + 12.0 + 8.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn ema_is_seeded_with_the_initial_sma() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        let result = ema(&values, 3);
        assert_eq!(result.len(), 3);
        assert!((result[0] - 2.0).abs() < 1e-9);
        assert!((result[1] - 3.0).abs() < 1e-9);
        assert!((result[2] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn ema_is_empty_on_insufficient_data() {
        assert!(ema(&[1.0, 2.0], 3).is_empty());
    }

    #[test]
    fn rsi_falls_back_to_fifty_when_data_is_short() {
        assert_eq!(rsi(&[1.0, 2.0, 3.0], 3), 50.0);
    }

    #[test]
    fn rsi_is_one_hundred_without_losses() {
        assert_eq!(rsi(&[1.0, 2.0, 3.0, 4.0, 5.0], 3), 100.0);
    }

    #[test]
    fn rsi_matches_wilder_reference_values() {
        let values = [44.0, 44.34, 44.09, 44.15, 43.61, 44.33];
        let expected = {
            let avg_gain = (0.34 + 0.06 + 0.72) / 5.0;
            let avg_loss = (0.25 + 0.54) / 5.0;
            100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
        };
        assert!((rsi(&values, 5) - expected).abs() < 1e-9);
    }

    #[test]
    fn macd_aligns_fast_ema_to_the_slow_offset() {
        let values: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        let series = macd(&values, 3, 6, 4);
        assert_eq!(series.macd_line.len(), values.len() - 6 + 1);
        assert_eq!(series.signal_line.len(), series.macd_line.len() - 4 + 1);

        let fast = ema(&values, 3);
        let slow = ema(&values, 6);
        assert!((series.macd_line[0] - (fast[3] - slow[0])).abs() < 1e-9);
    }

    #[test]
    fn macd_is_empty_when_periods_are_degenerate() {
        let values: Vec<f64> = (1..=20).map(|v| v as f64).collect();
        assert!(macd(&values, 6, 3, 4).macd_line.is_empty());
        assert!(macd(&values[..4], 3, 6, 4).macd_line.is_empty());
    }
}
