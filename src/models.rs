use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Neutral => "neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Long => "long",
            TradeSide::Short => "short",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExitReason {
    OpposingSignal,
    StopLoss,
    TakeProfit,
    EndOfData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::OpposingSignal => "opposing-signal",
            ExitReason::StopLoss => "stop-loss",
            ExitReason::TakeProfit => "take-profit",
            ExitReason::EndOfData => "end-of-data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeMetadata {
    pub entry_price: f64,
    pub entry_timestamp: DateTime<Utc>,
    pub exit_reason: ExitReason,
}

/// Immutable record emitted once per closed position. `price` is the exit
/// fill after slippage; `pnl` is net of fees on both legs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub pair: String,
    pub timestamp: DateTime<Utc>,
    pub side: TradeSide,
    pub price: f64,
    pub amount: f64,
    pub total: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub status: TradeStatus,
    pub metadata: TradeMetadata,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancePoint {
    pub timestamp: DateTime<Utc>,
    pub balance: f64,
}

/// Explicit representation for ratios whose denominator can legitimately be
/// zero (profit factor with no losses, recovery factor with no drawdown).
/// Keeps the unbounded case out of ordinary float arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RatioValue {
    Finite(f64),
    Unbounded,
}

impl RatioValue {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, RatioValue::Unbounded)
    }

    pub fn finite(&self) -> Option<f64> {
        match self {
            RatioValue::Finite(value) => Some(*value),
            RatioValue::Unbounded => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestMetrics {
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub profit_factor: RatioValue,
    pub recovery_factor: RatioValue,
    pub average_win: f64,
    pub average_loss: f64,
    pub average_trade: f64,
    pub average_trade_duration_days: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub gross_wins: f64,
    pub gross_losses: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub strategy_id: String,
    pub pair: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_pnl: f64,
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub win_rate: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub trades: Vec<Trade>,
    pub balance_history: Vec<BalancePoint>,
    pub metrics: BacktestMetrics,
}

/// Inclusive `[start, end]` sweep range with a fixed step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParameterRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

/// A named range; the sweep keeps ranges as an ordered list rather than a
/// map so the caller's parameter ordering survives serialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamedParameterRange {
    pub name: String,
    #[serde(flatten)]
    pub range: ParameterRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetMetric {
    TotalPnl,
    WinRate,
    MaxDrawdown,
    SharpeRatio,
    ProfitFactor,
    RecoveryFactor,
}

impl TargetMetric {
    pub fn label(&self) -> &'static str {
        match self {
            TargetMetric::TotalPnl => "total PnL",
            TargetMetric::WinRate => "win rate",
            TargetMetric::MaxDrawdown => "max drawdown",
            TargetMetric::SharpeRatio => "Sharpe ratio",
            TargetMetric::ProfitFactor => "profit factor",
            TargetMetric::RecoveryFactor => "recovery factor",
        }
    }
}

impl FromStr for TargetMetric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "totalpnl" | "total_pnl" | "pnl" => Ok(TargetMetric::TotalPnl),
            "winrate" | "win_rate" => Ok(TargetMetric::WinRate),
            "maxdrawdown" | "max_drawdown" => Ok(TargetMetric::MaxDrawdown),
            "sharpe" | "sharperatio" | "sharpe_ratio" => Ok(TargetMetric::SharpeRatio),
            "profitfactor" | "profit_factor" => Ok(TargetMetric::ProfitFactor),
            "recoveryfactor" | "recovery_factor" => Ok(TargetMetric::RecoveryFactor),
            other => Err(anyhow!("Unknown target metric '{}'", other)),
        }
    }
}

/// One evaluated parameter combination with the target metric value
/// extracted from its run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRecord {
    pub parameters: HashMap<String, f64>,
    pub score: RatioValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub parameter_ranges: Vec<NamedParameterRange>,
    pub base_parameters: HashMap<String, f64>,
    pub target_metric: TargetMetric,
    pub results: Vec<OptimizationRecord>,
    pub best_parameters: HashMap<String, f64>,
    pub best_result: Option<BacktestResult>,
}

/// Trade ids are a pure function of the run inputs (pair, entry time and
/// close ordinal), so identical runs serialize byte-identically.
pub fn trade_id(pair: &str, entry_timestamp: DateTime<Utc>, ordinal: usize) -> String {
    let seed = format!(
        "{}|{}|{}",
        pair,
        entry_timestamp.timestamp_millis(),
        ordinal
    );
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, seed.as_bytes()).to_string()
}
