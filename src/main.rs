use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::info;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tradebench::data;
use tradebench::engine::{BacktestEngine, BacktestRequest};
use tradebench::models::{BacktestResult, Candle, NamedParameterRange, ParameterRange, RatioValue, TargetMetric};
use tradebench::optimizer::{OptimizeRequest, Optimizer};
use tradebench::simulator::PositionSizing;
use tradebench::strategy::{Strategy, StrategyKind};

#[derive(Parser)]
#[command(name = "tradebench")]
#[command(about = "Backtest and brute-force optimize candle-based trading strategies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single backtest over a candle snapshot
    Backtest {
        /// Strategy type: MA_CROSSOVER, RSI, BREAKOUT or MACD
        strategy_type: String,
        /// Path to the candle snapshot file
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: PathBuf,
        /// Trading pair label carried into the results
        #[arg(long, default_value = "BTC/USDT")]
        pair: String,
        /// Window start (RFC 3339 or YYYY-MM-DD); defaults to the first candle
        #[arg(long)]
        start: Option<String>,
        /// Window end (RFC 3339 or YYYY-MM-DD); defaults to the last candle
        #[arg(long)]
        end: Option<String>,
        /// Strategy parameter override, repeatable (e.g. --param shortPeriod=10)
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        #[arg(long, default_value_t = 10_000.0)]
        initial_balance: f64,
        /// Fee per fill as a fraction of notional
        #[arg(long, default_value_t = 0.001)]
        fee_rate: f64,
        /// Slippage per fill as a fraction of price
        #[arg(long, default_value_t = 0.0)]
        slippage: f64,
        /// Stop-loss as a percent move against the entry
        #[arg(long)]
        stop_loss: Option<f64>,
        /// Take-profit as a percent move in the entry's favor
        #[arg(long)]
        take_profit: Option<f64>,
        /// Fraction of the balance committed per entry
        #[arg(long, default_value_t = 1.0)]
        size_percent: f64,
        /// Daily risk-free rate used in the Sharpe ratio
        #[arg(long, default_value_t = 0.0)]
        daily_risk_free_rate: f64,
    },
    /// Sweep parameter ranges and rank every combination
    Optimize {
        /// Strategy type: MA_CROSSOVER, RSI, BREAKOUT or MACD
        strategy_type: String,
        /// Path to the candle snapshot file
        #[arg(long = "data-file", value_name = "PATH")]
        data_file: PathBuf,
        #[arg(long, default_value = "BTC/USDT")]
        pair: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        /// Base parameter held fixed across the sweep, repeatable
        #[arg(long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Swept range, repeatable (e.g. --range shortPeriod=5:20:5)
        #[arg(long = "range", value_name = "NAME=START:END:STEP", required = true)]
        ranges: Vec<String>,
        /// Metric to rank by: totalPnl, winRate, maxDrawdown, sharpe, profitFactor or recoveryFactor
        #[arg(long, default_value = "totalPnl")]
        target: String,
        /// How many ranked combinations to print
        #[arg(long, default_value_t = 10)]
        top: usize,
        #[arg(long, default_value_t = 10_000.0)]
        initial_balance: f64,
        #[arg(long, default_value_t = 0.001)]
        fee_rate: f64,
        #[arg(long, default_value_t = 0.0)]
        slippage: f64,
        #[arg(long)]
        stop_loss: Option<f64>,
        #[arg(long)]
        take_profit: Option<f64>,
    },
    /// Write a deterministic synthetic candle snapshot for experiments
    GenerateCandles {
        /// Destination file for the snapshot
        #[arg(short, long, value_name = "PATH")]
        output: PathBuf,
        #[arg(long, default_value = "2023-01-01")]
        start: String,
        #[arg(long, default_value_t = 365)]
        days: usize,
        #[arg(long, default_value_t = 100.0)]
        base_price: f64,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            strategy_type,
            data_file,
            pair,
            start,
            end,
            params,
            initial_balance,
            fee_rate,
            slippage,
            stop_loss,
            take_profit,
            size_percent,
            daily_risk_free_rate,
        } => {
            let candles = data::load_candles(&data_file)?;
            let (start, end) = resolve_window(&candles, start.as_deref(), end.as_deref())?;
            let parameters = parse_params(&params)?;
            let kind = StrategyKind::from_parameters(&strategy_type, &parameters)?;
            let strategy = Strategy {
                id: format!("cli_{}", strategy_type.to_lowercase()),
                name: strategy_type.clone(),
                pair,
                kind,
            };

            let request = BacktestRequest {
                start_date: start,
                end_date: end,
                initial_balance,
                fee_rate,
                slippage,
                stop_loss_percent: stop_loss,
                take_profit_percent: take_profit,
                sizing: PositionSizing::PercentOfBalance(size_percent),
                daily_risk_free_rate,
            };

            let result = BacktestEngine::run_backtest(&strategy, &request, &candles)?;
            print_backtest_summary(&result);
        }
        Commands::Optimize {
            strategy_type,
            data_file,
            pair,
            start,
            end,
            params,
            ranges,
            target,
            top,
            initial_balance,
            fee_rate,
            slippage,
            stop_loss,
            take_profit,
        } => {
            let candles = data::load_candles(&data_file)?;
            let (start, end) = resolve_window(&candles, start.as_deref(), end.as_deref())?;
            let target_metric: TargetMetric = target.parse()?;

            let request = OptimizeRequest {
                strategy_type,
                pair,
                base_parameters: parse_params(&params)?,
                parameter_ranges: parse_ranges(&ranges)?,
                target_metric,
            };
            let backtest = BacktestRequest {
                start_date: start,
                end_date: end,
                initial_balance,
                fee_rate,
                slippage,
                stop_loss_percent: stop_loss,
                take_profit_percent: take_profit,
                sizing: PositionSizing::PercentOfBalance(1.0),
                daily_risk_free_rate: 0.0,
            };

            let cancelled = Arc::new(AtomicBool::new(false));
            let result = Optimizer::optimize(&request, &backtest, &candles, &cancelled)?;
            Optimizer::print_results(&result, top);

            if let Some(best) = &result.best_result {
                println!("=== BEST COMBINATION IN FULL ===");
                print_backtest_summary(best);
            }
        }
        Commands::GenerateCandles {
            output,
            start,
            days,
            base_price,
        } => {
            let start = data::parse_date(&start)?;
            let candles = data::generate_candles(start, days, base_price);
            data::save_candles(&output, &candles)?;
            info!("Snapshot ready at {}", output.display());
        }
    }

    Ok(())
}

fn resolve_window(
    candles: &[Candle],
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let first = candles
        .first()
        .ok_or_else(|| anyhow!("Candle snapshot is empty"))?;
    let last = candles.last().expect("non-empty checked above");

    let start = match start {
        Some(raw) => data::parse_date(raw)?,
        None => first.timestamp,
    };
    let end = match end {
        Some(raw) => data::parse_date(raw)?,
        None => last.timestamp,
    };
    Ok((start, end))
}

fn parse_params(raw: &[String]) -> Result<HashMap<String, f64>> {
    let mut parameters = HashMap::new();
    for entry in raw {
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected NAME=VALUE, got '{}'", entry))?;
        let value: f64 = value
            .trim()
            .parse()
            .with_context(|| format!("Parameter '{}' has a non-numeric value", name))?;
        parameters.insert(name.trim().to_string(), value);
    }
    Ok(parameters)
}

fn parse_ranges(raw: &[String]) -> Result<Vec<NamedParameterRange>> {
    let mut ranges = Vec::with_capacity(raw.len());
    for entry in raw {
        let (name, bounds) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected NAME=START:END:STEP, got '{}'", entry))?;
        let parts: Vec<&str> = bounds.split(':').collect();
        if parts.len() != 3 {
            return Err(anyhow!("Expected NAME=START:END:STEP, got '{}'", entry));
        }
        let parse = |label: &str, value: &str| -> Result<f64> {
            value
                .trim()
                .parse()
                .with_context(|| format!("Range '{}' has a non-numeric {}", name, label))
        };
        ranges.push(NamedParameterRange {
            name: name.trim().to_string(),
            range: ParameterRange {
                start: parse("start", parts[0])?,
                end: parse("end", parts[1])?,
                step: parse("step", parts[2])?,
            },
        });
    }
    Ok(ranges)
}

fn format_ratio(ratio: &RatioValue) -> String {
    match ratio {
        RatioValue::Finite(value) => format!("{:.4}", value),
        RatioValue::Unbounded => "unbounded".to_string(),
    }
}

fn print_backtest_summary(result: &BacktestResult) {
    println!("\n=== BACKTEST SUMMARY: {} ===", result.pair);
    println!("  Window: {} .. {}", result.start_date, result.end_date);
    println!(
        "  Balance: {:.2} -> {:.2} (PnL {:.2})",
        result.initial_balance, result.final_balance, result.total_pnl
    );
    println!(
        "  Trades: {} ({} wins / {} losses, win rate {:.2}%)",
        result.total_trades,
        result.winning_trades,
        result.losing_trades,
        result.win_rate * 100.0
    );
    println!("  Max Drawdown: {:.2}%", result.max_drawdown);
    println!("  Sharpe Ratio: {:.4}", result.sharpe_ratio);
    println!("  Volatility: {:.6}", result.metrics.volatility);
    println!(
        "  Profit Factor: {}",
        format_ratio(&result.metrics.profit_factor)
    );
    println!(
        "  Recovery Factor: {}",
        format_ratio(&result.metrics.recovery_factor)
    );
    println!(
        "  Avg Trade: {:.2} (best {:.2}, worst {:.2})",
        result.metrics.average_trade,
        result.metrics.largest_win,
        result.metrics.largest_loss
    );
    println!(
        "  Avg Trade Duration: {:.1} days",
        result.metrics.average_trade_duration_days
    );
    println!();
}
