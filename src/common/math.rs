//! Shared math primitives for indicator calculations

/// Simple moving average over the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let sum: f64 = values[values.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// Exponential moving average over the full series, seeded with an SMA
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let mut ema_value = sma(&values[..period], period)?;
    for &value in &values[period..] {
        ema_value = ema_from_previous(value, ema_value, period);
    }
    Some(ema_value)
}

/// Single EMA step from the previous EMA value
pub fn ema_from_previous(value: f64, previous: f64, period: usize) -> f64 {
    let multiplier = 2.0 / (period as f64 + 1.0);
    (value - previous) * multiplier + previous
}

/// True range of a candle given the previous close
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    let hl = high - low;
    let hc = (high - prev_close).abs();
    let lc = (low - prev_close).abs();
    hl.max(hc).max(lc)
}

/// Mean of a slice (None when empty)
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
