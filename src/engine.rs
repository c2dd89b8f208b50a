use crate::error::EngineError;
use crate::metrics::MetricsCalculator;
use crate::models::{BacktestResult, Candle};
use crate::simulator::{PositionSizing, Simulator, SimulatorConfig};
use crate::strategy::Strategy;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Everything a single backtest run needs beyond the strategy and the data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRequest {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub initial_balance: f64,
    pub fee_rate: f64,
    pub slippage: f64,
    pub stop_loss_percent: Option<f64>,
    pub take_profit_percent: Option<f64>,
    pub sizing: PositionSizing,
    /// Risk-free rate per day, subtracted from the mean daily return in the
    /// Sharpe calculation.
    pub daily_risk_free_rate: f64,
}

impl BacktestRequest {
    pub fn new(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        Self {
            start_date,
            end_date,
            initial_balance: 10_000.0,
            fee_rate: 0.0,
            slippage: 0.0,
            stop_loss_percent: None,
            take_profit_percent: None,
            sizing: PositionSizing::PercentOfBalance(1.0),
            daily_risk_free_rate: 0.0,
        }
    }
}

/// Stateless orchestrator: validates the request, windows the data, feeds
/// signals into the simulator and hands the ledger to the metrics
/// calculator. Holds no per-run state, so one instance serves concurrent
/// sweeps.
pub struct BacktestEngine;

impl BacktestEngine {
    pub fn run_backtest(
        strategy: &Strategy,
        request: &BacktestRequest,
        candles: &[Candle],
    ) -> Result<BacktestResult, EngineError> {
        if strategy.pair.trim().is_empty() {
            return Err(EngineError::MissingField("pair"));
        }
        if request.end_date <= request.start_date {
            return Err(EngineError::InvalidDateRange {
                start: request.start_date,
                end: request.end_date,
            });
        }

        let window: Vec<Candle> = candles
            .iter()
            .filter(|c| c.timestamp >= request.start_date && c.timestamp <= request.end_date)
            .copied()
            .collect();
        if window.is_empty() {
            return Err(EngineError::NoMarketData {
                pair: strategy.pair.clone(),
                start: request.start_date,
                end: request.end_date,
            });
        }

        debug!(
            "Backtesting {} on {} over {} candles",
            strategy.name,
            strategy.pair,
            window.len()
        );

        let config = SimulatorConfig {
            initial_balance: request.initial_balance,
            fee_rate: request.fee_rate,
            slippage: request.slippage,
            stop_loss_percent: request.stop_loss_percent,
            take_profit_percent: request.take_profit_percent,
            sizing: request.sizing,
        };

        let outcome = Simulator::run(&config, &strategy.pair, &window, |index| {
            strategy.kind.generate_signal(&window[..=index])
        });

        let metrics = MetricsCalculator::calculate(
            &outcome.trades,
            &outcome.balance_history,
            request.daily_risk_free_rate,
        );

        let total_pnl = outcome.final_balance - request.initial_balance;
        info!(
            "{} on {}: {} trades, PnL {:.2}",
            strategy.name,
            strategy.pair,
            outcome.trades.len(),
            total_pnl
        );

        Ok(BacktestResult {
            strategy_id: strategy.id.clone(),
            pair: strategy.pair.clone(),
            start_date: request.start_date,
            end_date: request.end_date,
            initial_balance: request.initial_balance,
            final_balance: outcome.final_balance,
            total_pnl,
            total_trades: outcome.trades.len() as u32,
            winning_trades: outcome.totals.winning_trades,
            losing_trades: outcome.totals.losing_trades,
            win_rate: metrics.win_rate,
            max_drawdown: metrics.max_drawdown,
            sharpe_ratio: metrics.sharpe_ratio,
            trades: outcome.trades,
            balance_history: outcome.balance_history,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{MaCrossoverParams, StrategyKind};
    use chrono::{Duration, TimeZone};

    fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    fn ma_strategy(pair: &str) -> Strategy {
        Strategy {
            id: "s1".to_string(),
            name: "MA 2/3".to_string(),
            pair: pair.to_string(),
            kind: StrategyKind::MaCrossover(MaCrossoverParams {
                short_period: 2,
                long_period: 3,
            }),
        }
    }

    fn request_for(candles: &[Candle]) -> BacktestRequest {
        BacktestRequest::new(
            candles.first().unwrap().timestamp,
            candles.last().unwrap().timestamp,
        )
    }

    #[test]
    fn rejects_an_empty_pair() {
        let candles = candles_from_closes(&[10.0, 11.0, 9.0, 12.0, 8.0, 15.0]);
        let request = request_for(&candles);
        let result = BacktestEngine::run_backtest(&ma_strategy(" "), &request, &candles);
        assert!(matches!(result, Err(EngineError::MissingField("pair"))));
    }

    #[test]
    fn rejects_an_inverted_date_range() {
        let candles = candles_from_closes(&[10.0, 11.0, 9.0]);
        let mut request = request_for(&candles);
        std::mem::swap(&mut request.start_date, &mut request.end_date);
        let result = BacktestEngine::run_backtest(&ma_strategy("BTC/USDT"), &request, &candles);
        assert!(matches!(result, Err(EngineError::InvalidDateRange { .. })));
    }

    #[test]
    fn rejects_a_window_with_no_candles() {
        let candles = candles_from_closes(&[10.0, 11.0, 9.0]);
        let start = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let request = BacktestRequest::new(start, start + Duration::days(10));
        let result = BacktestEngine::run_backtest(&ma_strategy("BTC/USDT"), &request, &candles);
        assert!(matches!(result, Err(EngineError::NoMarketData { .. })));
    }

    #[test]
    fn crossover_fixture_produces_one_round_trip() {
        // Short/long SMA cross buys on the rally to 8->15 build-up and sells
        // on the final bar, so the run books exactly one closed trade.
        let candles = candles_from_closes(&[10.0, 11.0, 9.0, 12.0, 8.0, 15.0]);
        let request = request_for(&candles);
        let result =
            BacktestEngine::run_backtest(&ma_strategy("BTC/USDT"), &request, &candles).unwrap();

        assert_eq!(result.total_trades, 1);
        assert_eq!(result.trades.len(), 1);
        let pnl_sum: f64 = result.trades.iter().map(|t| t.pnl).sum();
        assert!((result.final_balance - (result.initial_balance + pnl_sum)).abs() < 1e-9);
        assert!((result.total_pnl - pnl_sum).abs() < 1e-9);
    }

    #[test]
    fn repeated_runs_are_deterministic() {
        let candles = candles_from_closes(&[10.0, 11.0, 9.0, 12.0, 8.0, 15.0, 13.0, 16.0]);
        let request = request_for(&candles);
        let strategy = ma_strategy("BTC/USDT");

        let first = BacktestEngine::run_backtest(&strategy, &request, &candles).unwrap();
        let second = BacktestEngine::run_backtest(&strategy, &request, &candles).unwrap();

        assert_eq!(first.total_trades, second.total_trades);
        assert!((first.final_balance - second.final_balance).abs() < 1e-12);
        assert!((first.max_drawdown - second.max_drawdown).abs() < 1e-12);
    }
}
