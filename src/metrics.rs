use crate::models::{BacktestMetrics, BalancePoint, RatioValue, Trade};
use chrono::NaiveDate;
use statrs::statistics::Statistics;

struct DrawdownInfo {
    max_drawdown_percent: f64,
    max_drawdown_absolute: f64,
}

/// Derives every headline number from the closed-trade ledger and the
/// balance history. Pure over its inputs.
pub struct MetricsCalculator;

impl MetricsCalculator {
    pub fn calculate(
        trades: &[Trade],
        balance_history: &[BalancePoint],
        daily_risk_free_rate: f64,
    ) -> BacktestMetrics {
        let mut winning_pnls = Vec::new();
        let mut losing_pnls = Vec::new();
        let mut trade_pnls = Vec::with_capacity(trades.len());

        for trade in trades {
            trade_pnls.push(trade.pnl);
            if trade.pnl > 0.0 {
                winning_pnls.push(trade.pnl);
            } else if trade.pnl < 0.0 {
                losing_pnls.push(trade.pnl);
            }
        }

        let win_rate = if trades.is_empty() {
            0.0
        } else {
            winning_pnls.len() as f64 / trades.len() as f64
        };

        let gross_wins: f64 = winning_pnls.iter().sum();
        let gross_losses: f64 = losing_pnls.iter().sum();
        let total_pnl: f64 = trade_pnls.iter().sum();

        let largest_win = winning_pnls.iter().copied().fold(0.0, f64::max);
        let largest_loss = losing_pnls.iter().copied().fold(0.0, f64::min);

        let drawdown = Self::max_drawdown(balance_history);
        let daily_returns = Self::daily_returns(balance_history);
        let volatility = Self::population_std_dev(&daily_returns);

        let sharpe_ratio = if daily_returns.len() < 2 || volatility == 0.0 {
            0.0
        } else {
            let mean_return = daily_returns.iter().copied().mean();
            (mean_return - daily_risk_free_rate) / volatility
        };

        let profit_factor = Self::ratio(gross_wins, gross_losses.abs());
        // A run that never dipped below its peak has no drawdown to recover
        // from, so any traded outcome counts as unbounded recovery. Only an
        // empty ledger scores zero.
        let recovery_factor = if drawdown.max_drawdown_absolute > 0.0 {
            RatioValue::Finite(total_pnl / drawdown.max_drawdown_absolute)
        } else if trades.is_empty() {
            RatioValue::Finite(0.0)
        } else {
            RatioValue::Unbounded
        };

        let durations: Vec<f64> = trades
            .iter()
            .map(|t| (t.timestamp - t.metadata.entry_timestamp).num_seconds() as f64 / 86_400.0)
            .collect();

        BacktestMetrics {
            win_rate,
            max_drawdown: drawdown.max_drawdown_percent,
            volatility,
            sharpe_ratio,
            profit_factor,
            recovery_factor,
            average_win: Self::average(&winning_pnls),
            average_loss: Self::average(&losing_pnls),
            average_trade: Self::average(&trade_pnls),
            average_trade_duration_days: Self::average(&durations),
            largest_win,
            largest_loss,
            gross_wins,
            gross_losses,
        }
    }

    /// A ratio whose denominator is legitimately zero when nothing went
    /// against the strategy. Positive numerator over zero is unbounded, not
    /// an IEEE infinity.
    fn ratio(numerator: f64, denominator: f64) -> RatioValue {
        if denominator > 0.0 {
            RatioValue::Finite(numerator / denominator)
        } else if numerator > 0.0 {
            RatioValue::Unbounded
        } else {
            RatioValue::Finite(0.0)
        }
    }

    fn average(values: &[f64]) -> f64 {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    }

    fn population_std_dev(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().copied().population_std_dev()
    }

    fn max_drawdown(balance_history: &[BalancePoint]) -> DrawdownInfo {
        let mut info = DrawdownInfo {
            max_drawdown_percent: 0.0,
            max_drawdown_absolute: 0.0,
        };
        let Some(first) = balance_history.first() else {
            return info;
        };

        let mut peak = first.balance;
        for point in balance_history {
            if point.balance > peak {
                peak = point.balance;
            } else {
                let drawdown = peak - point.balance;
                if drawdown > info.max_drawdown_absolute {
                    info.max_drawdown_absolute = drawdown;
                }
                if peak > 0.0 {
                    let percent = drawdown / peak * 100.0;
                    if percent > info.max_drawdown_percent {
                        info.max_drawdown_percent = percent;
                    }
                }
            }
        }

        info
    }

    /// Returns between consecutive UTC calendar days, taking the last
    /// recorded balance of each day as that day's close.
    fn daily_returns(balance_history: &[BalancePoint]) -> Vec<f64> {
        let closes = Self::daily_closing_balances(balance_history);

        closes
            .windows(2)
            .map(|window| {
                if window[0] > 0.0 {
                    (window[1] - window[0]) / window[0]
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn daily_closing_balances(balance_history: &[BalancePoint]) -> Vec<f64> {
        let mut closes: Vec<f64> = Vec::new();
        let mut current_day: Option<NaiveDate> = None;

        for point in balance_history {
            let day = point.timestamp.date_naive();
            if current_day == Some(day) {
                *closes.last_mut().expect("day tracked alongside closes") = point.balance;
            } else {
                current_day = Some(day);
                closes.push(point.balance);
            }
        }

        closes
    }
}
