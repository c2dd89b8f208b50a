use crate::error::EngineError;
use std::collections::HashMap;

/// Extract a parameter as f64 with a default value
pub fn get_param_f64(params: &HashMap<String, f64>, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .copied()
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

/// Extract a parameter as a rounded usize with a default value
pub fn get_param_usize(params: &HashMap<String, f64>, key: &str, default: usize) -> usize {
    params
        .get(key)
        .copied()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.round() as usize)
        .unwrap_or(default)
}

/// Validate that a period parameter is usable as an indicator lookback
pub fn require_period(value: usize, name: &'static str) -> Result<usize, EngineError> {
    if value == 0 {
        return Err(EngineError::InvalidParameter {
            name,
            reason: "period must be at least 1".to_string(),
        });
    }
    Ok(value)
}
