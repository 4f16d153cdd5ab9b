//! Volume predicates: trailing-average confirmation, surge ratio, and
//! volume-up-with-price detection.

use crate::domain::bar::DailyBar;
use chrono::NaiveDate;

/// Current volume at `i` is at least `factor` times the average volume over
/// the `window` bars before it (current bar excluded). A zero trailing
/// average is degenerate and never confirms.
pub fn volume_confirmed(bars: &[DailyBar], i: usize, window: usize, factor: f64) -> bool {
    if window == 0 || i < window || i >= bars.len() {
        return false;
    }
    let avg: f64 = bars[i - window..i].iter().map(|b| b.volume).sum::<f64>() / window as f64;
    if avg <= 0.0 {
        return false;
    }
    bars[i].volume >= avg * factor
}

/// Ratio of recent to preceding volume.
///
/// Recent window covers the last `recent_days + 1` bars; the previous window
/// covers the `previous_days` bars before that. `None` when the sequence is
/// too short or the previous-window sum is zero (degenerate ratio).
pub fn surge_ratio(bars: &[DailyBar], recent_days: usize, previous_days: usize) -> Option<f64> {
    let recent_size = recent_days + 1;
    let total = recent_size + previous_days;
    if previous_days == 0 || bars.len() < total {
        return None;
    }

    let split = bars.len() - recent_size;
    let recent_sum: f64 = bars[split..].iter().map(|b| b.volume).sum();
    let previous_sum: f64 = bars[split - previous_days..split].iter().map(|b| b.volume).sum();

    if previous_sum == 0.0 {
        return None;
    }
    Some(recent_sum / previous_sum)
}

/// Detail of a volume-up-with-price pass over one symbol's window.
#[derive(Debug, Clone)]
pub struct VolumeUpCheck {
    pub matched_dates: Vec<NaiveDate>,
    pub peak_ratio: f64,
    pub peak_price_change_pct: f64,
}

/// Find dates in the last `lookback` bars where volume expanded against its
/// moving average while price rose.
///
/// A date at index i matches when volume[i] / SMA(volume, `sma_period`)[i]
/// is at least `ratio_threshold` and the close-to-close change from i-1 is
/// at least `min_price_change_pct` percent. Indices with an undefined or
/// zero volume average, or a non-positive previous close, are skipped.
/// `None` when no date matches.
pub fn volume_up_with_price(
    bars: &[DailyBar],
    lookback: usize,
    sma_period: usize,
    ratio_threshold: f64,
    min_price_change_pct: f64,
) -> Option<VolumeUpCheck> {
    if sma_period == 0 || bars.len() < sma_period + 1 {
        return None;
    }

    let mut matched_dates = Vec::new();
    let mut peak_ratio = 0.0;
    let mut peak_price_change_pct = 0.0;

    let warmup = sma_period.max(1);
    let start = bars.len().saturating_sub(lookback).max(warmup);

    for i in start..bars.len() {
        let window = &bars[i + 1 - sma_period..=i];
        let avg: f64 = window.iter().map(|b| b.volume).sum::<f64>() / sma_period as f64;
        if avg <= 0.0 {
            continue;
        }

        let prev_close = bars[i - 1].close;
        if prev_close <= 0.0 {
            continue;
        }

        let ratio = bars[i].volume / avg;
        let change_pct = (bars[i].close - prev_close) / prev_close * 100.0;

        if ratio >= ratio_threshold && change_pct >= min_price_change_pct {
            matched_dates.push(bars[i].date);
            if ratio > peak_ratio {
                peak_ratio = ratio;
                peak_price_change_pct = change_pct;
            }
        }
    }

    if matched_dates.is_empty() {
        None
    } else {
        Some(VolumeUpCheck {
            matched_dates,
            peak_ratio,
            peak_price_change_pct,
        })
    }
}
