//! Trend predicates: sustained EMA ordering, sideway detection, EMA slope.

use crate::domain::indicator::IndicatorType;
use crate::domain::indicator_set::IndicatorSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Bullish,
    Bearish,
    Sideway,
}

/// Classify the trailing trend over the last `sustain_days` bars.
///
/// Bullish: EMA(short) > EMA(long) at every index in the window.
/// Bearish: EMA(short) < EMA(long) at every index in the window.
/// Sideway: |EMA(short) - EMA(long)| / close <= `sideway_epsilon_ratio`
/// at every index in the window (trend-neutral, bullish-compatible).
///
/// Returns `None` when the window is mixed or warm-up is not satisfied
/// across the whole window.
pub fn classify_trend(
    set: &IndicatorSet,
    short: usize,
    long: usize,
    sustain_days: usize,
    sideway_epsilon_ratio: f64,
) -> Option<TrendDirection> {
    let last = set.last_index()?;
    if sustain_days == 0 || last + 1 < sustain_days {
        return None;
    }

    let short_ty = IndicatorType::Ema(short);
    let long_ty = IndicatorType::Ema(long);
    let start = last + 1 - sustain_days;

    let mut all_above = true;
    let mut all_below = true;
    let mut all_flat = true;

    for i in start..=last {
        let s = set.simple_at(&short_ty, i)?;
        let l = set.simple_at(&long_ty, i)?;
        let close = set.bars[i].close;

        all_above &= s > l;
        all_below &= s < l;
        all_flat &= close > 0.0 && ((s - l).abs() / close) <= sideway_epsilon_ratio;
    }

    if all_above {
        Some(TrendDirection::Bullish)
    } else if all_below {
        Some(TrendDirection::Bearish)
    } else if all_flat {
        Some(TrendDirection::Sideway)
    } else {
        None
    }
}

/// Sum of successive deltas over the trailing `days` steps of a series.
///
/// `None` unless every point in the window (days + 1 values) is defined.
pub fn tail_slope<F>(last: usize, days: usize, value_at: F) -> Option<f64>
where
    F: Fn(usize) -> Option<f64>,
{
    if days == 0 || last < days {
        return None;
    }
    let mut sum = 0.0;
    for i in (last - days + 1)..=last {
        sum += value_at(i)? - value_at(i - 1)?;
    }
    Some(sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::DailyBar;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn make_set(closes: &[f64]) -> IndicatorSet {
        let bars: Vec<DailyBar> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let month = i / 28 + 1;
                let day = i % 28 + 1;
                DailyBar {
                    code: "600000".into(),
                    date: NaiveDate::from_ymd_opt(2024, month as u32, day as u32).unwrap(),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1000.0,
                    turnover: 0.0,
                }
            })
            .collect();
        let mut set = IndicatorSet::new("600000".into(), bars);
        set.compute(IndicatorType::Ema(3));
        set.compute(IndicatorType::Ema(5));
        set
    }

    #[test]
    fn rising_closes_classify_bullish() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + 2.0 * i as f64).collect();
        let set = make_set(&closes);
        assert_eq!(
            classify_trend(&set, 3, 5, 3, 0.001),
            Some(TrendDirection::Bullish)
        );
    }

    #[test]
    fn falling_closes_classify_bearish() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - 2.0 * i as f64).collect();
        let set = make_set(&closes);
        assert_eq!(
            classify_trend(&set, 3, 5, 3, 0.001),
            Some(TrendDirection::Bearish)
        );
    }

    #[test]
    fn flat_closes_classify_sideway() {
        let set = make_set(&[100.0; 20]);
        assert_eq!(
            classify_trend(&set, 3, 5, 3, 0.001),
            Some(TrendDirection::Sideway)
        );
    }

    #[test]
    fn warmup_window_returns_none() {
        // Only 4 bars: EMA(5) never becomes valid.
        let set = make_set(&[100.0, 101.0, 102.0, 103.0]);
        assert_eq!(classify_trend(&set, 3, 5, 3, 0.001), None);
    }

    #[test]
    fn zero_sustain_returns_none() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let set = make_set(&closes);
        assert_eq!(classify_trend(&set, 3, 5, 0, 0.001), None);
    }

    #[test]
    fn tail_slope_sums_deltas() {
        let values = [1.0, 2.0, 4.0, 7.0];
        let slope = tail_slope(3, 2, |i| Some(values[i])).unwrap();
        // (4-2) + (7-4)
        assert_relative_eq!(slope, 5.0);
    }

    #[test]
    fn tail_slope_requires_full_window() {
        let values = [1.0, 2.0, 4.0];
        assert_eq!(tail_slope(2, 5, |i| values.get(i).copied()), None);
        assert_eq!(tail_slope(2, 2, |_| None), None);
    }
}
