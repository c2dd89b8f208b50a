use crate::engine::{BacktestEngine, BacktestRequest};
use crate::error::EngineError;
use crate::models::{
    BacktestResult, Candle, NamedParameterRange, OptimizationRecord, OptimizationResult,
    ParameterRange, RatioValue, TargetMetric,
};
use crate::strategy::{Strategy, StrategyKind};
use crossbeam_channel::{bounded, Receiver, Sender};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread;

/// A brute-force sweep over every combination of the given ranges, applied
/// on top of the base parameters.
#[derive(Debug, Clone)]
pub struct OptimizeRequest {
    pub strategy_type: String,
    pub pair: String,
    pub base_parameters: HashMap<String, f64>,
    pub parameter_ranges: Vec<NamedParameterRange>,
    pub target_metric: TargetMetric,
}

struct SweepTask {
    index: usize,
    parameters: HashMap<String, f64>,
}

struct SweepOutcome {
    index: usize,
    parameters: HashMap<String, f64>,
    run: Result<BacktestResult, String>,
}

/// Expand an inclusive range into concrete values. The value count is fixed
/// up front from an integer step count, so fractional steps cannot
/// accumulate into an extra or missing endpoint.
pub fn expand_range(range: &ParameterRange) -> Result<Vec<f64>, EngineError> {
    if !range.step.is_finite() || range.step <= 0.0 {
        return Err(EngineError::InvalidParameter {
            name: "step",
            reason: format!("must be a positive number (got {})", range.step),
        });
    }
    if range.end < range.start {
        return Err(EngineError::InvalidParameter {
            name: "end",
            reason: format!("must not precede start ({} < {})", range.end, range.start),
        });
    }

    let count = ((range.end - range.start) / range.step).round() as usize;
    Ok((0..=count)
        .map(|i| range.start + i as f64 * range.step)
        .collect())
}

/// Cartesian product of the expanded ranges, odometer-style: the last range
/// varies fastest and the combination order is a pure function of the input
/// order.
pub fn expand_combinations(
    ranges: &[NamedParameterRange],
) -> Result<Vec<HashMap<String, f64>>, EngineError> {
    let axes: Vec<Vec<f64>> = ranges
        .iter()
        .map(|named| expand_range(&named.range))
        .collect::<Result<_, _>>()?;

    let mut combinations = Vec::new();
    if axes.is_empty() {
        return Ok(combinations);
    }

    let mut indices = vec![0usize; axes.len()];
    'outer: loop {
        let mut combination = HashMap::with_capacity(axes.len());
        for (axis, &value_index) in indices.iter().enumerate() {
            combination.insert(ranges[axis].name.clone(), axes[axis][value_index]);
        }
        combinations.push(combination);

        for position in (0..axes.len()).rev() {
            indices[position] += 1;
            if indices[position] < axes[position].len() {
                continue 'outer;
            }
            indices[position] = 0;
        }
        break;
    }

    Ok(combinations)
}

fn score_for(result: &BacktestResult, metric: TargetMetric) -> RatioValue {
    match metric {
        TargetMetric::TotalPnl => RatioValue::Finite(result.total_pnl),
        TargetMetric::WinRate => RatioValue::Finite(result.win_rate),
        TargetMetric::MaxDrawdown => RatioValue::Finite(result.max_drawdown),
        TargetMetric::SharpeRatio => RatioValue::Finite(result.sharpe_ratio),
        TargetMetric::ProfitFactor => result.metrics.profit_factor,
        TargetMetric::RecoveryFactor => result.metrics.recovery_factor,
    }
}

/// Ranking order: highest score first, for every target metric alike. An
/// unbounded ratio outranks any finite score.
pub(crate) fn compare_scores(a: &RatioValue, b: &RatioValue) -> Ordering {
    match (a, b) {
        (RatioValue::Unbounded, RatioValue::Unbounded) => Ordering::Equal,
        (RatioValue::Unbounded, RatioValue::Finite(_)) => Ordering::Less,
        (RatioValue::Finite(_), RatioValue::Unbounded) => Ordering::Greater,
        (RatioValue::Finite(x), RatioValue::Finite(y)) => {
            y.partial_cmp(x).unwrap_or(Ordering::Equal)
        }
    }
}

pub struct Optimizer;

impl Optimizer {
    /// Sweep every parameter combination, rank the completed runs by the
    /// target metric and keep the best full result. Combinations that fail
    /// to parse or backtest are logged and skipped; a set cancellation flag
    /// drains the remaining work and returns whatever finished.
    pub fn optimize(
        request: &OptimizeRequest,
        backtest: &BacktestRequest,
        candles: &[Candle],
        cancelled: &Arc<AtomicBool>,
    ) -> Result<OptimizationResult, EngineError> {
        if request.parameter_ranges.is_empty() {
            return Err(EngineError::InvalidParameter {
                name: "parameterRanges",
                reason: "at least one range is required".to_string(),
            });
        }

        let combinations = expand_combinations(&request.parameter_ranges)?;
        let combination_count = combinations.len();
        info!(
            "Optimizing {} on {}: {} combinations, target {}",
            request.strategy_type,
            request.pair,
            combination_count,
            request.target_metric.label()
        );

        let mut outcomes = Self::run_sweep(request, backtest, candles, combinations, cancelled);
        outcomes.sort_by_key(|outcome| outcome.index);

        let mut ranked: Vec<(usize, HashMap<String, f64>, RatioValue, BacktestResult)> =
            Vec::new();
        for outcome in outcomes {
            match outcome.run {
                Ok(result) => {
                    let score = score_for(&result, request.target_metric);
                    ranked.push((outcome.index, outcome.parameters, score, result));
                }
                Err(reason) => {
                    warn!(
                        "Skipping combination {}: {}",
                        outcome.index + 1,
                        reason
                    );
                }
            }
        }

        // Stable sort keeps equal scores in combination order, so repeated
        // sweeps rank identically regardless of worker scheduling.
        ranked.sort_by(|a, b| compare_scores(&a.2, &b.2));

        let best = ranked.first();
        let best_parameters = best.map(|(_, p, _, _)| p.clone()).unwrap_or_default();
        let best_result = best.map(|(_, _, _, r)| r.clone());

        let results: Vec<OptimizationRecord> = ranked
            .iter()
            .map(|(_, parameters, score, _)| OptimizationRecord {
                parameters: parameters.clone(),
                score: *score,
            })
            .collect();

        info!(
            "Sweep complete: {} of {} combinations ranked",
            results.len(),
            combination_count
        );

        Ok(OptimizationResult {
            parameter_ranges: request.parameter_ranges.clone(),
            base_parameters: request.base_parameters.clone(),
            target_metric: request.target_metric,
            results,
            best_parameters,
            best_result,
        })
    }

    fn run_sweep(
        request: &OptimizeRequest,
        backtest: &BacktestRequest,
        candles: &[Candle],
        combinations: Vec<HashMap<String, f64>>,
        cancelled: &Arc<AtomicBool>,
    ) -> Vec<SweepOutcome> {
        let combination_count = combinations.len();
        let num_workers = std::cmp::min(combination_count, std::cmp::max(1, num_cpus::get()));
        debug!("Using {} worker threads", num_workers);

        let (task_tx, task_rx): (Sender<SweepTask>, Receiver<SweepTask>) =
            bounded(combination_count);
        let (result_tx, result_rx): (Sender<SweepOutcome>, Receiver<SweepOutcome>) =
            bounded(combination_count);

        let shared_candles: Arc<Vec<Candle>> = Arc::new(candles.to_vec());
        let mut handles = Vec::new();
        for _ in 0..num_workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let candles = Arc::clone(&shared_candles);
            let cancelled = Arc::clone(cancelled);
            let strategy_type = request.strategy_type.clone();
            let pair = request.pair.clone();
            let backtest = backtest.clone();

            let handle = thread::spawn(move || {
                while let Ok(task) = task_rx.recv() {
                    let run = if cancelled.load(AtomicOrdering::Relaxed) {
                        Err("cancelled".to_string())
                    } else {
                        Self::run_combination(
                            &strategy_type,
                            &pair,
                            &backtest,
                            &candles,
                            &task,
                        )
                    };

                    let outcome = SweepOutcome {
                        index: task.index,
                        parameters: task.parameters,
                        run,
                    };
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                }
            });
            handles.push(handle);
        }

        for (index, combination) in combinations.into_iter().enumerate() {
            let mut parameters = request.base_parameters.clone();
            parameters.extend(combination);
            // bounded(combination_count) can hold the whole queue
            let _ = task_tx.send(SweepTask { index, parameters });
        }
        drop(task_tx);
        drop(result_tx);

        let progress = ProgressBar::new(combination_count as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
                )
                .unwrap()
                .progress_chars("#>-"),
        );

        let mut outcomes = Vec::with_capacity(combination_count);
        while let Ok(outcome) = result_rx.recv() {
            outcomes.push(outcome);
            progress.set_position(outcomes.len() as u64);
        }
        progress.finish_and_clear();

        for handle in handles {
            let _ = handle.join();
        }

        outcomes
    }

    fn run_combination(
        strategy_type: &str,
        pair: &str,
        backtest: &BacktestRequest,
        candles: &[Candle],
        task: &SweepTask,
    ) -> Result<BacktestResult, String> {
        let kind = StrategyKind::from_parameters(strategy_type, &task.parameters)
            .map_err(|e| e.to_string())?;
        let strategy = Strategy {
            id: format!("sweep_{}", task.index),
            name: strategy_type.to_string(),
            pair: pair.to_string(),
            kind,
        };

        BacktestEngine::run_backtest(&strategy, backtest, candles).map_err(|e| e.to_string())
    }

    /// Human-readable summary of the top ranked combinations.
    pub fn print_results(result: &OptimizationResult, top_n: usize) {
        println!(
            "\n=== TOP {} PARAMETER COMBINATIONS ({}) ===\n",
            std::cmp::min(top_n, result.results.len()),
            result.target_metric.label()
        );

        for (i, record) in result.results.iter().take(top_n).enumerate() {
            let score = match record.score {
                RatioValue::Finite(value) => format!("{:.4}", value),
                RatioValue::Unbounded => "unbounded".to_string(),
            };
            println!("Rank {}: score {}", i + 1, score);
            let mut parameters: Vec<_> = record.parameters.iter().collect();
            parameters.sort_by(|a, b| a.0.cmp(b.0));
            for (name, value) in parameters {
                println!("  {}: {}", name, value);
            }
            println!();
        }
    }
}
