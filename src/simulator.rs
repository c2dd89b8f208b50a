use crate::models::{
    trade_id, BalancePoint, Candle, ExitReason, Signal, Trade, TradeMetadata, TradeSide,
    TradeStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PositionSizing {
    /// Fraction of the current balance committed per entry.
    PercentOfBalance(f64),
    /// Fixed notional per entry, still capped at the available balance.
    FixedNotional(f64),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatorConfig {
    pub initial_balance: f64,
    /// Fee charged per leg as a fraction of notional.
    pub fee_rate: f64,
    /// Price impact per fill as a fraction of price, always against the trader.
    pub slippage: f64,
    /// Adverse move, in percent of entry, that forces an exit.
    pub stop_loss_percent: Option<f64>,
    /// Favorable move, in percent of entry, that takes profit.
    pub take_profit_percent: Option<f64>,
    pub sizing: PositionSizing,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_balance: 10_000.0,
            fee_rate: 0.0,
            slippage: 0.0,
            stop_loss_percent: None,
            take_profit_percent: None,
            sizing: PositionSizing::PercentOfBalance(1.0),
        }
    }
}

/// The single live position. At most one exists at any candle boundary.
#[derive(Debug, Clone)]
struct Position {
    entry_price: f64,
    amount: f64,
    side: TradeSide,
    entry_timestamp: DateTime<Utc>,
}

/// Win/loss counters the loop accumulates alongside the ledger. Breakeven
/// trades count as neither.
#[derive(Debug, Clone, Default)]
pub struct LedgerTotals {
    pub winning_trades: u32,
    pub losing_trades: u32,
}

#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub trades: Vec<Trade>,
    pub balance_history: Vec<BalancePoint>,
    pub final_balance: f64,
    pub totals: LedgerTotals,
}

/// Stateful position-lifecycle loop: FLAT -> IN_POSITION -> FLAT, closed out
/// at end of data. All per-run state is local; the simulator holds nothing
/// between runs.
pub struct Simulator;

impl Simulator {
    /// Run the loop over `candles`, pulling the signal for each index from
    /// `signal_at`. Insufficient data simply produces zero trades; passing an
    /// empty candle slice is the caller's validation failure and yields an
    /// empty outcome.
    pub fn run<F>(
        config: &SimulatorConfig,
        pair: &str,
        candles: &[Candle],
        mut signal_at: F,
    ) -> SimulationOutcome
    where
        F: FnMut(usize) -> Signal,
    {
        let mut balance = config.initial_balance;
        let mut trades: Vec<Trade> = Vec::new();
        let mut totals = LedgerTotals::default();
        let mut balance_history: Vec<BalancePoint> = Vec::new();
        let mut position: Option<Position> = None;

        let Some(first) = candles.first() else {
            return SimulationOutcome {
                trades,
                balance_history,
                final_balance: balance,
                totals,
            };
        };
        balance_history.push(BalancePoint {
            timestamp: first.timestamp,
            balance,
        });

        for (index, candle) in candles.iter().enumerate() {
            let signal = signal_at(index);

            let exit = position
                .as_ref()
                .and_then(|open| Self::exit_reason(open, candle.close, signal, config));

            if let Some(reason) = exit {
                let open = position.take().expect("exit reason implies an open position");
                let trade =
                    Self::close_position(config, pair, open, candle, reason, trades.len());
                Self::settle(
                    trade,
                    &mut balance,
                    &mut totals,
                    &mut trades,
                    &mut balance_history,
                );
            } else if position.is_none() && signal != Signal::Neutral {
                position = Self::open_position(config, candle, balance, signal);
            }
        }

        // End of data closes whatever is still open at the last close.
        if let Some(open) = position.take() {
            let last = candles.last().expect("candles checked non-empty");
            let trade = Self::close_position(
                config,
                pair,
                open,
                last,
                ExitReason::EndOfData,
                trades.len(),
            );
            Self::settle(
                trade,
                &mut balance,
                &mut totals,
                &mut trades,
                &mut balance_history,
            );
        }

        SimulationOutcome {
            trades,
            balance_history,
            final_balance: balance,
            totals,
        }
    }

    /// Exit precedence: opposing signal, then stop-loss, then take-profit.
    fn exit_reason(
        position: &Position,
        close: f64,
        signal: Signal,
        config: &SimulatorConfig,
    ) -> Option<ExitReason> {
        let opposing = matches!(
            (position.side, signal),
            (TradeSide::Long, Signal::Sell) | (TradeSide::Short, Signal::Buy)
        );
        if opposing {
            return Some(ExitReason::OpposingSignal);
        }

        if position.entry_price <= 0.0 {
            return None;
        }
        let adverse_percent = match position.side {
            TradeSide::Long => (position.entry_price - close) / position.entry_price * 100.0,
            TradeSide::Short => (close - position.entry_price) / position.entry_price * 100.0,
        };

        if let Some(stop_loss) = config.stop_loss_percent {
            if adverse_percent >= stop_loss {
                return Some(ExitReason::StopLoss);
            }
        }
        if let Some(take_profit) = config.take_profit_percent {
            if -adverse_percent >= take_profit {
                return Some(ExitReason::TakeProfit);
            }
        }

        None
    }

    fn open_position(
        config: &SimulatorConfig,
        candle: &Candle,
        balance: f64,
        signal: Signal,
    ) -> Option<Position> {
        let side = match signal {
            Signal::Buy => TradeSide::Long,
            Signal::Sell => TradeSide::Short,
            Signal::Neutral => return None,
        };

        let entry_price = match side {
            TradeSide::Long => candle.close * (1.0 + config.slippage),
            TradeSide::Short => candle.close * (1.0 - config.slippage),
        };
        if entry_price <= 0.0 {
            return None;
        }

        let requested = match config.sizing {
            PositionSizing::PercentOfBalance(fraction) => balance * fraction,
            PositionSizing::FixedNotional(notional) => notional,
        };
        let notional = requested.min(balance);
        if notional <= 0.0 {
            return None;
        }

        Some(Position {
            entry_price,
            amount: notional / entry_price,
            side,
            entry_timestamp: candle.timestamp,
        })
    }

    fn close_position(
        config: &SimulatorConfig,
        pair: &str,
        position: Position,
        candle: &Candle,
        reason: ExitReason,
        ordinal: usize,
    ) -> Trade {
        let exit_price = match position.side {
            TradeSide::Long => candle.close * (1.0 - config.slippage),
            TradeSide::Short => candle.close * (1.0 + config.slippage),
        };

        let gross = match position.side {
            TradeSide::Long => (exit_price - position.entry_price) * position.amount,
            TradeSide::Short => (position.entry_price - exit_price) * position.amount,
        };
        let entry_notional = position.entry_price * position.amount;
        let exit_notional = exit_price * position.amount;
        let fees = (entry_notional + exit_notional) * config.fee_rate;
        let pnl = gross - fees;
        let pnl_percent = if entry_notional > 0.0 {
            pnl / entry_notional * 100.0
        } else {
            0.0
        };

        Trade {
            id: trade_id(pair, position.entry_timestamp, ordinal),
            pair: pair.to_string(),
            timestamp: candle.timestamp,
            side: position.side,
            price: exit_price,
            amount: position.amount,
            total: exit_notional,
            pnl,
            pnl_percent,
            status: TradeStatus::Closed,
            metadata: TradeMetadata {
                entry_price: position.entry_price,
                entry_timestamp: position.entry_timestamp,
                exit_reason: reason,
            },
        }
    }

    fn settle(
        trade: Trade,
        balance: &mut f64,
        totals: &mut LedgerTotals,
        trades: &mut Vec<Trade>,
        balance_history: &mut Vec<BalancePoint>,
    ) {
        *balance += trade.pnl;

        if trade.pnl > 0.0 {
            totals.winning_trades += 1;
        } else if trade.pnl < 0.0 {
            totals.losing_trades += 1;
        }

        balance_history.push(BalancePoint {
            timestamp: trade.timestamp,
            balance: *balance,
        });
        trades.push(trade);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

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

    fn run_with_signals(
        config: &SimulatorConfig,
        closes: &[f64],
        signals: &[Signal],
    ) -> SimulationOutcome {
        let candles = candles_from_closes(closes);
        Simulator::run(config, "BTC/USDT", &candles, |i| signals[i])
    }

    #[test]
    fn single_long_trade_books_the_expected_pnl() {
        let config = SimulatorConfig {
            initial_balance: 10_000.0,
            sizing: PositionSizing::FixedNotional(1_000.0),
            ..SimulatorConfig::default()
        };
        let outcome = run_with_signals(
            &config,
            &[100.0, 105.0, 110.0],
            &[Signal::Buy, Signal::Neutral, Signal::Sell],
        );

        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert_eq!(trade.side, TradeSide::Long);
        assert_eq!(trade.metadata.exit_reason, ExitReason::OpposingSignal);
        assert!((trade.amount - 10.0).abs() < 1e-9);
        assert!((trade.pnl - 100.0).abs() < 1e-9);
        assert!((outcome.final_balance - 10_100.0).abs() < 1e-9);
        assert_eq!(outcome.totals.winning_trades, 1);
        assert_eq!(outcome.totals.losing_trades, 0);
    }

    #[test]
    fn fees_are_charged_on_both_legs() {
        let config = SimulatorConfig {
            initial_balance: 10_000.0,
            fee_rate: 0.001,
            sizing: PositionSizing::FixedNotional(1_000.0),
            ..SimulatorConfig::default()
        };
        let outcome = run_with_signals(
            &config,
            &[100.0, 110.0],
            &[Signal::Buy, Signal::Sell],
        );

        let trade = &outcome.trades[0];
        // gross 100, fees (1000 + 1100) * 0.001 = 2.1
        assert!((trade.pnl - 97.9).abs() < 1e-9);
        assert!((outcome.final_balance - 10_097.9).abs() < 1e-9);
    }

    #[test]
    fn short_positions_profit_from_falling_prices() {
        let config = SimulatorConfig {
            sizing: PositionSizing::FixedNotional(1_000.0),
            ..SimulatorConfig::default()
        };
        let outcome = run_with_signals(
            &config,
            &[100.0, 90.0],
            &[Signal::Sell, Signal::Buy],
        );

        let trade = &outcome.trades[0];
        assert_eq!(trade.side, TradeSide::Short);
        assert!((trade.pnl - 100.0).abs() < 1e-9);
    }

    #[test]
    fn stop_loss_closes_an_adverse_long() {
        let config = SimulatorConfig {
            stop_loss_percent: Some(5.0),
            ..SimulatorConfig::default()
        };
        let outcome = run_with_signals(
            &config,
            &[100.0, 97.0, 94.0, 93.0],
            &[Signal::Buy, Signal::Neutral, Signal::Neutral, Signal::Neutral],
        );

        assert_eq!(outcome.trades.len(), 1);
        let trade = &outcome.trades[0];
        assert_eq!(trade.metadata.exit_reason, ExitReason::StopLoss);
        // 94 is the first close at least 5% below the 100 entry.
        assert!((trade.price - 94.0).abs() < 1e-9);
    }

    #[test]
    fn take_profit_closes_a_favorable_short() {
        let config = SimulatorConfig {
            take_profit_percent: Some(5.0),
            ..SimulatorConfig::default()
        };
        let outcome = run_with_signals(
            &config,
            &[100.0, 98.0, 94.0],
            &[Signal::Sell, Signal::Neutral, Signal::Neutral],
        );

        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(
            outcome.trades[0].metadata.exit_reason,
            ExitReason::TakeProfit
        );
    }

    #[test]
    fn opposing_signal_takes_precedence_over_stop_loss() {
        let config = SimulatorConfig {
            stop_loss_percent: Some(5.0),
            ..SimulatorConfig::default()
        };
        let outcome = run_with_signals(
            &config,
            &[100.0, 90.0],
            &[Signal::Buy, Signal::Sell],
        );

        assert_eq!(
            outcome.trades[0].metadata.exit_reason,
            ExitReason::OpposingSignal
        );
    }

    #[test]
    fn open_position_is_force_closed_at_end_of_data() {
        let config = SimulatorConfig::default();
        let outcome = run_with_signals(
            &config,
            &[100.0, 101.0, 102.0],
            &[Signal::Buy, Signal::Neutral, Signal::Neutral],
        );

        assert_eq!(outcome.trades.len(), 1);
        assert_eq!(
            outcome.trades[0].metadata.exit_reason,
            ExitReason::EndOfData
        );
    }

    #[test]
    fn repeated_entry_signals_never_stack_positions() {
        let config = SimulatorConfig::default();
        let outcome = run_with_signals(
            &config,
            &[100.0, 101.0, 102.0, 103.0],
            &[Signal::Buy, Signal::Buy, Signal::Buy, Signal::Sell],
        );

        assert_eq!(outcome.trades.len(), 1);
    }

    #[test]
    fn final_balance_equals_initial_plus_trade_pnl() {
        let config = SimulatorConfig {
            fee_rate: 0.002,
            slippage: 0.001,
            stop_loss_percent: Some(4.0),
            take_profit_percent: Some(6.0),
            sizing: PositionSizing::PercentOfBalance(0.5),
            ..SimulatorConfig::default()
        };
        let closes = [100.0, 104.0, 99.0, 93.0, 97.0, 105.0, 101.0, 96.0];
        let signals = [
            Signal::Buy,
            Signal::Neutral,
            Signal::Sell,
            Signal::Neutral,
            Signal::Buy,
            Signal::Neutral,
            Signal::Neutral,
            Signal::Neutral,
        ];
        let outcome = run_with_signals(&config, &closes, &signals);

        let pnl_sum: f64 = outcome.trades.iter().map(|t| t.pnl).sum();
        assert!((outcome.final_balance - (config.initial_balance + pnl_sum)).abs() < 1e-9);
        // One balance point at the start plus one per closed trade.
        assert_eq!(
            outcome.balance_history.len(),
            outcome.trades.len() + 1
        );
    }

    #[test]
    fn slippage_moves_both_fills_against_the_trader() {
        let config = SimulatorConfig {
            slippage: 0.01,
            sizing: PositionSizing::FixedNotional(1_010.0),
            ..SimulatorConfig::default()
        };
        let outcome = run_with_signals(
            &config,
            &[100.0, 110.0],
            &[Signal::Buy, Signal::Sell],
        );

        let trade = &outcome.trades[0];
        assert!((trade.metadata.entry_price - 101.0).abs() < 1e-9);
        assert!((trade.price - 108.9).abs() < 1e-9);
    }

    #[test]
    fn trade_ids_are_stable_across_identical_runs() {
        let config = SimulatorConfig::default();
        let closes = [100.0, 104.0, 99.0, 103.0, 98.0];
        let signals = [
            Signal::Buy,
            Signal::Neutral,
            Signal::Sell,
            Signal::Buy,
            Signal::Sell,
        ];
        let first = run_with_signals(&config, &closes, &signals);
        let second = run_with_signals(&config, &closes, &signals);

        assert_eq!(first.trades.len(), 2);
        assert_ne!(first.trades[0].id, first.trades[1].id);
        for (a, b) in first.trades.iter().zip(second.trades.iter()) {
            assert_eq!(a.id, b.id);
        }
    }

    #[test]
    fn empty_candles_produce_an_empty_outcome() {
        let config = SimulatorConfig::default();
        let outcome = Simulator::run(&config, "BTC/USDT", &[], |_| Signal::Neutral);
        assert!(outcome.trades.is_empty());
        assert!(outcome.balance_history.is_empty());
        assert!((outcome.final_balance - config.initial_balance).abs() < 1e-9);
    }
}
