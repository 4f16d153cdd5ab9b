//! Bollinger channel predicates: narrow-channel tally and band position.

use crate::domain::indicator::bollinger::width_ratio;
use crate::domain::indicator::IndicatorType;
use crate::domain::indicator_set::IndicatorSet;
use chrono::NaiveDate;

/// Outcome of walking a lookback window against a width-ratio threshold.
#[derive(Debug, Clone)]
pub struct ChannelCheck {
    pub matched_dates: Vec<NaiveDate>,
    pub violations: usize,
}

/// Tally narrow-channel dates and violations over the last `lookback` bars.
///
/// A date matches when the band width ratio is at or below
/// `max_width_ratio`; a wider ratio counts as a violation. Warm-up indices
/// are skipped entirely (neither match nor violation).
pub fn narrow_channel(
    set: &IndicatorSet,
    boll: &IndicatorType,
    lookback: usize,
    max_width_ratio: f64,
) -> ChannelCheck {
    let mut matched_dates = Vec::new();
    let mut violations = 0;

    let len = set.bar_count();
    let start = len.saturating_sub(lookback);

    for i in start..len {
        let Some((upper, middle, lower)) = set.bollinger_at(boll, i) else {
            continue;
        };
        if width_ratio(upper, middle, lower) <= max_width_ratio {
            matched_dates.push(set.bars[i].date);
        } else {
            violations += 1;
        }
    }

    ChannelCheck {
        matched_dates,
        violations,
    }
}

/// Buy-side position: close within [middle, upper] at index `i`.
pub fn in_buy_zone(set: &IndicatorSet, boll: &IndicatorType, i: usize) -> bool {
    match set.bollinger_at(boll, i) {
        Some((upper, middle, _)) => {
            let close = set.bars[i].close;
            close >= middle && close <= upper
        }
        None => false,
    }
}

/// True when the high touched or pierced the upper band at any index in
/// `[i - window, i]`.
pub fn touched_upper_within(
    set: &IndicatorSet,
    boll: &IndicatorType,
    i: usize,
    window: usize,
) -> bool {
    let start = i.saturating_sub(window);
    (start..=i).any(|j| match set.bollinger_at(boll, j) {
        Some((upper, _, _)) => set.bars[j].high >= upper,
        None => false,
    })
}

/// Sell-side position: close below the middle band after touching the upper
/// band within the recent `touch_window` bars.
pub fn in_sell_zone(
    set: &IndicatorSet,
    boll: &IndicatorType,
    i: usize,
    touch_window: usize,
) -> bool {
    match set.bollinger_at(boll, i) {
        Some((_, middle, _)) => {
            set.bars[i].close < middle && touched_upper_within(set, boll, i, touch_window)
        }
        None => false,
    }
}
