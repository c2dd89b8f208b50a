use crate::error::EngineError;
use crate::models::{Candle, Signal};
use crate::params::{get_param_f64, get_param_usize, require_period};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[path = "strategies/ma_crossover.rs"]
pub mod ma_crossover;

pub use ma_crossover::MaCrossoverParams;

#[path = "strategies/rsi.rs"]
pub mod rsi;

pub use rsi::RsiParams;

#[path = "strategies/breakout.rs"]
pub mod breakout;

pub use breakout::BreakoutParams;

#[path = "strategies/macd.rs"]
pub mod macd;

pub use macd::MacdParams;

/// Exhaustive strategy sum type. Every variant carries its own typed
/// parameter record; dispatch is a plain `match`, so a new variant cannot be
/// added without handling it everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "parameters", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StrategyKind {
    MaCrossover(MaCrossoverParams),
    Rsi(RsiParams),
    Breakout(BreakoutParams),
    Macd(MacdParams),
}

impl StrategyKind {
    /// Longest indicator lookback this variant needs.
    pub fn longest_lookback(&self) -> usize {
        match self {
            StrategyKind::MaCrossover(p) => p.long_period,
            StrategyKind::Rsi(p) => p.period,
            StrategyKind::Breakout(p) => p.lookback_period,
            StrategyKind::Macd(p) => p.slow_period + p.signal_period,
        }
    }

    /// Minimum candle count for crossover detection: one full lookback plus
    /// the previous and current readings.
    pub fn min_candles(&self) -> usize {
        self.longest_lookback() + 2
    }

    /// Signal for the window ending at the last candle. Never fails:
    /// insufficient history is Neutral by contract.
    pub fn generate_signal(&self, candles: &[Candle]) -> Signal {
        if candles.len() < self.min_candles() {
            return Signal::Neutral;
        }

        match self {
            StrategyKind::MaCrossover(p) => ma_crossover::signal(p, candles),
            StrategyKind::Rsi(p) => rsi::signal(p, candles),
            StrategyKind::Breakout(p) => breakout::signal(p, candles),
            StrategyKind::Macd(p) => macd::signal(p, candles),
        }
    }

    /// Build a typed strategy from a type tag and a flat parameter map (the
    /// representation used at the optimizer boundary). Unknown tags and
    /// inconsistent parameters are rejected here so the engine never sees
    /// them.
    pub fn from_parameters(
        type_tag: &str,
        parameters: &HashMap<String, f64>,
    ) -> Result<Self, EngineError> {
        match type_tag.trim().to_ascii_uppercase().as_str() {
            "MA_CROSSOVER" => {
                let short_period = require_period(
                    get_param_usize(parameters, "shortPeriod", 10),
                    "shortPeriod",
                )?;
                let long_period = require_period(
                    get_param_usize(parameters, "longPeriod", 30),
                    "longPeriod",
                )?;
                if short_period >= long_period {
                    return Err(EngineError::InvalidParameter {
                        name: "shortPeriod",
                        reason: format!(
                            "must be smaller than longPeriod ({} >= {})",
                            short_period, long_period
                        ),
                    });
                }
                Ok(StrategyKind::MaCrossover(MaCrossoverParams {
                    short_period,
                    long_period,
                }))
            }
            "RSI" => {
                let period = require_period(get_param_usize(parameters, "period", 14), "period")?;
                let overbought = get_param_f64(parameters, "overbought", 70.0);
                let oversold = get_param_f64(parameters, "oversold", 30.0);
                if oversold >= overbought {
                    return Err(EngineError::InvalidParameter {
                        name: "oversold",
                        reason: format!(
                            "must be below overbought ({} >= {})",
                            oversold, overbought
                        ),
                    });
                }
                Ok(StrategyKind::Rsi(RsiParams {
                    period,
                    overbought,
                    oversold,
                }))
            }
            "BREAKOUT" => {
                let lookback_period = require_period(
                    get_param_usize(parameters, "lookbackPeriod", 20),
                    "lookbackPeriod",
                )?;
                let breakout_threshold = get_param_f64(parameters, "breakoutThreshold", 2.0);
                if breakout_threshold < 0.0 {
                    return Err(EngineError::InvalidParameter {
                        name: "breakoutThreshold",
                        reason: format!("must be non-negative (got {})", breakout_threshold),
                    });
                }
                Ok(StrategyKind::Breakout(BreakoutParams {
                    lookback_period,
                    breakout_threshold,
                }))
            }
            "MACD" => {
                let fast_period = require_period(
                    get_param_usize(parameters, "fastPeriod", 12),
                    "fastPeriod",
                )?;
                let slow_period = require_period(
                    get_param_usize(parameters, "slowPeriod", 26),
                    "slowPeriod",
                )?;
                let signal_period = require_period(
                    get_param_usize(parameters, "signalPeriod", 9),
                    "signalPeriod",
                )?;
                if fast_period >= slow_period {
                    return Err(EngineError::InvalidParameter {
                        name: "fastPeriod",
                        reason: format!(
                            "must be smaller than slowPeriod ({} >= {})",
                            fast_period, slow_period
                        ),
                    });
                }
                Ok(StrategyKind::Macd(MacdParams {
                    fast_period,
                    slow_period,
                    signal_period,
                }))
            }
            other => Err(EngineError::UnknownStrategy(other.to_string())),
        }
    }
}

/// A user-defined strategy. The engine never mutates the identity fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: String,
    pub name: String,
    pub pair: String,
    #[serde(flatten)]
    pub kind: StrategyKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_strategy_types() {
        let result = StrategyKind::from_parameters("FIBONACCI", &HashMap::new());
        assert!(matches!(result, Err(EngineError::UnknownStrategy(_))));
    }

    #[test]
    fn rejects_inverted_ma_periods() {
        let mut params = HashMap::new();
        params.insert("shortPeriod".to_string(), 30.0);
        params.insert("longPeriod".to_string(), 10.0);
        let result = StrategyKind::from_parameters("MA_CROSSOVER", &params);
        assert!(matches!(
            result,
            Err(EngineError::InvalidParameter { name: "shortPeriod", .. })
        ));
    }

    #[test]
    fn applies_defaults_for_missing_parameters() {
        let kind = StrategyKind::from_parameters("RSI", &HashMap::new()).unwrap();
        assert_eq!(
            kind,
            StrategyKind::Rsi(RsiParams {
                period: 14,
                overbought: 70.0,
                oversold: 30.0,
            })
        );
        assert_eq!(kind.min_candles(), 16);
    }

    #[test]
    fn serializes_with_the_wire_type_tag() {
        let strategy = Strategy {
            id: "s1".to_string(),
            name: "MA 10/30".to_string(),
            pair: "BTC/USDT".to_string(),
            kind: StrategyKind::MaCrossover(MaCrossoverParams {
                short_period: 10,
                long_period: 30,
            }),
        };
        let json = serde_json::to_value(&strategy).unwrap();
        assert_eq!(json["type"], "MA_CROSSOVER");
        assert_eq!(json["parameters"]["shortPeriod"], 10);

        let back: Strategy = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind, strategy.kind);
    }

    #[test]
    fn macd_lookback_covers_slow_and_signal_periods() {
        let kind = StrategyKind::Macd(MacdParams {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        });
        assert_eq!(kind.longest_lookback(), 35);
    }
}
