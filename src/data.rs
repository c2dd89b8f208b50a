use crate::models::Candle;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use log::info;
use std::fs;
use std::path::Path;

/// Load a candle snapshot written by [`save_candles`]. The file is a JSON
/// array sorted by timestamp; unsorted input is rejected rather than
/// silently reordered.
pub fn load_candles(path: &Path) -> Result<Vec<Candle>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read candle snapshot at {}", path.display()))?;
    let candles: Vec<Candle> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse candle snapshot at {}", path.display()))?;

    for window in candles.windows(2) {
        if window[1].timestamp < window[0].timestamp {
            return Err(anyhow!(
                "Candle snapshot {} is not sorted by timestamp",
                path.display()
            ));
        }
    }

    info!("Loaded {} candles from {}", candles.len(), path.display());
    Ok(candles)
}

pub fn save_candles(path: &Path, candles: &[Candle]) -> Result<()> {
    let raw = serde_json::to_string_pretty(candles).context("Failed to serialize candles")?;
    fs::write(path, raw)
        .with_context(|| format!("Failed to write candle snapshot to {}", path.display()))?;
    info!("Wrote {} candles to {}", candles.len(), path.display());
    Ok(())
}

/// Candles whose timestamps fall inside the inclusive `[start, end]` window.
pub fn filter_by_range(
    candles: &[Candle],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<Candle> {
    candles
        .iter()
        .filter(|c| c.timestamp >= start && c.timestamp <= end)
        .copied()
        .collect()
}

/// Accepts either an RFC 3339 timestamp or a plain `YYYY-MM-DD` date, the
/// latter anchored at midnight UTC.
pub fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| anyhow!("Unrecognized date '{}': expected RFC 3339 or YYYY-MM-DD", value))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow!("Invalid date '{}'", value))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

/// Deterministic daily candles: layered sine waves over a linear drift, so
/// crossover and breakout strategies all see actionable structure. Same
/// inputs, same series; there is no randomness to seed.
pub fn generate_candles(start: DateTime<Utc>, days: usize, base_price: f64) -> Vec<Candle> {
    let mut candles = Vec::with_capacity(days);

    for day in 0..days {
        let day_f = day as f64;
        let fast_wave = (day_f / 4.0).sin();
        let slow_wave = (day_f / 23.0).cos();
        let seasonal_wave = (day_f / 90.0 * std::f64::consts::PI).sin();

        let drift = day_f * base_price * 0.0004;
        let swing = base_price * (0.04 * seasonal_wave + 0.025 * slow_wave + 0.012 * fast_wave);
        let close = (base_price + drift + swing).max(1.0);

        let intraday_range =
            base_price * (0.006 + 0.012 * fast_wave.abs() + 0.008 * slow_wave.abs());
        let open = (close - fast_wave * intraday_range * 0.45).max(1.0);
        let high = close.max(open) + intraday_range * 0.55;
        let low = (close.min(open) - intraday_range * 0.55).max(1.0);
        let volume = 750_000.0 + 260_000.0 * (fast_wave.abs() + slow_wave.abs());

        candles.push(Candle {
            timestamp: start + Duration::days(day as i64),
            open,
            high,
            low,
            close,
            volume,
        });
    }

    candles
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_plain_dates_at_midnight_utc() {
        let parsed = parse_date("2024-03-05").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap());
    }

    #[test]
    fn parses_rfc3339_timestamps() {
        let parsed = parse_date("2024-03-05T12:30:00Z").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 3, 5, 12, 30, 0).unwrap());
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(parse_date("yesterday").is_err());
        assert!(parse_date("2024-13-40").is_err());
    }

    #[test]
    fn generated_candles_are_well_formed() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = generate_candles(start, 120, 100.0);

        assert_eq!(candles.len(), 120);
        for candle in &candles {
            assert!(candle.low <= candle.open && candle.open <= candle.high);
            assert!(candle.low <= candle.close && candle.close <= candle.high);
            assert!(candle.low > 0.0);
            assert!(candle.volume > 0.0);
        }
        for window in candles.windows(2) {
            assert_eq!(window[1].timestamp - window[0].timestamp, Duration::days(1));
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let first = generate_candles(start, 30, 100.0);
        let second = generate_candles(start, 30, 100.0);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.close, b.close);
            assert_eq!(a.volume, b.volume);
        }
    }

    #[test]
    fn filter_keeps_both_endpoints() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = generate_candles(start, 10, 100.0);
        let filtered = filter_by_range(
            &candles,
            start + Duration::days(2),
            start + Duration::days(5),
        );
        assert_eq!(filtered.len(), 4);
        assert_eq!(filtered[0].timestamp, start + Duration::days(2));
        assert_eq!(filtered[3].timestamp, start + Duration::days(5));
    }

    #[test]
    fn snapshot_round_trip_preserves_the_series() {
        let dir = std::env::temp_dir().join("tradebench-data-test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("candles.json");

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = generate_candles(start, 15, 100.0);
        save_candles(&path, &candles).unwrap();
        let loaded = load_candles(&path).unwrap();

        assert_eq!(loaded.len(), candles.len());
        for (a, b) in candles.iter().zip(loaded.iter()) {
            assert_eq!(a.timestamp, b.timestamp);
            assert!((a.close - b.close).abs() < 1e-9);
        }
        fs::remove_file(&path).unwrap();
    }
}
