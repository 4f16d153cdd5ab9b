//! Composite Buy / Sell / Watch signal evaluation.
//!
//! Each composite ANDs its applicable sub-predicates: trailing trend
//! direction, most-recent cross kind and recency, Bollinger band position,
//! and (buy-side) optional volume confirmation. Watch looks for conflicting
//! signals instead of confirming ones.

use crate::domain::cross::{detect_crosses, last_cross, CrossEvent, CrossKind};
use crate::domain::error::MarketscanError;
use crate::domain::indicator::IndicatorType;
use crate::domain::indicator_set::IndicatorSet;
use crate::domain::strategy::channel::{in_buy_zone, in_sell_zone};
use crate::domain::strategy::trend::{classify_trend, TrendDirection};
use crate::domain::strategy::volume::volume_confirmed;
use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct SignalParams {
    /// Bars beyond warm-up fetched for cross detection.
    pub lookback: usize,
    pub ema_short: usize,
    pub ema_long: usize,
    pub sustain_days: usize,
    pub sideway_epsilon_ratio: f64,
    pub macd_short: usize,
    pub macd_long: usize,
    pub macd_signal: usize,
    pub cross_epsilon: f64,
    /// Cross must fall within this many days of the last bar; <= 0 disables.
    pub within_days: i64,
    pub boll_period: usize,
    pub boll_mult_x100: u32,
    /// Sell side: upper-band touch must occur within this many bars.
    pub touch_window: usize,
    pub volume_window: usize,
    pub volume_factor: f64,
    pub require_volume: bool,
}

impl Default for SignalParams {
    fn default() -> Self {
        Self {
            lookback: 60,
            ema_short: 5,
            ema_long: 20,
            sustain_days: 3,
            sideway_epsilon_ratio: 0.01,
            macd_short: 12,
            macd_long: 26,
            macd_signal: 9,
            cross_epsilon: crate::domain::cross::DEFAULT_CROSS_EPSILON,
            within_days: 5,
            boll_period: 20,
            boll_mult_x100: 200,
            touch_window: 5,
            volume_window: 5,
            volume_factor: 1.5,
            require_volume: false,
        }
    }
}

impl SignalParams {
    pub fn validate(&self) -> Result<(), MarketscanError> {
        let positives: [(&str, usize); 8] = [
            ("lookback", self.lookback),
            ("ema_short", self.ema_short),
            ("ema_long", self.ema_long),
            ("sustain_days", self.sustain_days),
            ("macd_short", self.macd_short),
            ("macd_long", self.macd_long),
            ("macd_signal", self.macd_signal),
            ("boll_period", self.boll_period),
        ];
        for (name, value) in positives {
            if value == 0 {
                return Err(MarketscanError::InvalidParameter {
                    name: name.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }
        if self.ema_short >= self.ema_long {
            return Err(MarketscanError::InvalidParameter {
                name: "ema_short".to_string(),
                reason: "must be less than ema_long".to_string(),
            });
        }
        if self.macd_short >= self.macd_long {
            return Err(MarketscanError::InvalidParameter {
                name: "macd_short".to_string(),
                reason: "must be less than macd_long".to_string(),
            });
        }
        if self.cross_epsilon < 0.0 {
            return Err(MarketscanError::InvalidParameter {
                name: "cross_epsilon".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        if self.require_volume && (self.volume_window == 0 || self.volume_factor <= 0.0) {
            return Err(MarketscanError::InvalidParameter {
                name: "volume_window".to_string(),
                reason: "volume confirmation needs a positive window and factor".to_string(),
            });
        }
        Ok(())
    }

    /// Minimum bar count before any sub-predicate can produce a value.
    pub fn min_bars(&self) -> usize {
        let macd_bars = self.macd_long + self.macd_signal;
        let trend_bars = self.ema_long + self.sustain_days - 1;
        macd_bars.max(trend_bars).max(self.boll_period)
    }

    /// Bars to request per symbol: lookback on top of the warm-up cost.
    pub fn need(&self) -> usize {
        self.lookback + self.min_bars()
    }

    pub fn indicator_types(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Ema(self.ema_short),
            IndicatorType::Ema(self.ema_long),
            IndicatorType::Macd {
                short: self.macd_short,
                long: self.macd_long,
                signal: self.macd_signal,
            },
            IndicatorType::Bollinger {
                period: self.boll_period,
                stddev_mult_x100: self.boll_mult_x100,
            },
        ]
    }

    fn macd_type(&self) -> IndicatorType {
        IndicatorType::Macd {
            short: self.macd_short,
            long: self.macd_long,
            signal: self.macd_signal,
        }
    }

    fn boll_type(&self) -> IndicatorType {
        IndicatorType::Bollinger {
            period: self.boll_period,
            stddev_mult_x100: self.boll_mult_x100,
        }
    }
}

/// One symbol's passing composite evaluation.
#[derive(Debug, Clone)]
pub struct SignalMatch {
    pub code: String,
    pub trend: TrendDirection,
    pub cross_kind: CrossKind,
    pub cross_date: NaiveDate,
    pub dif: f64,
    pub dea: f64,
    pub histogram: f64,
}

fn within_recency(event_date: NaiveDate, last_date: NaiveDate, within_days: i64) -> bool {
    within_days <= 0 || (last_date - event_date).num_days() <= within_days
}

fn signal_match(code: &str, trend: TrendDirection, event: &CrossEvent) -> SignalMatch {
    SignalMatch {
        code: code.to_string(),
        trend,
        cross_kind: event.kind,
        cross_date: event.date,
        dif: event.dif,
        dea: event.dea,
        histogram: event.histogram,
    }
}

/// Buy: bullish-or-sideway trend, most recent cross is golden and recent,
/// close in the upper-middle channel, optional volume confirmation.
pub fn evaluate_buy(set: &IndicatorSet, params: &SignalParams) -> Option<SignalMatch> {
    let last = set.last_index()?;
    let last_date = set.last_date()?;

    let trend = classify_trend(
        set,
        params.ema_short,
        params.ema_long,
        params.sustain_days,
        params.sideway_epsilon_ratio,
    )?;
    if trend == TrendDirection::Bearish {
        return None;
    }

    let macd = set.series(&params.macd_type())?;
    let events = detect_crosses(macd, params.cross_epsilon);
    let event = last_cross(&events)?;
    if event.kind != CrossKind::Golden || !within_recency(event.date, last_date, params.within_days)
    {
        return None;
    }

    if !in_buy_zone(set, &params.boll_type(), last) {
        return None;
    }

    if params.require_volume
        && !volume_confirmed(&set.bars, last, params.volume_window, params.volume_factor)
    {
        return None;
    }

    Some(signal_match(&set.code, trend, event))
}

/// Sell: bearish trend, most recent cross is death and recent, close below
/// the middle band after an upper-band touch.
pub fn evaluate_sell(set: &IndicatorSet, params: &SignalParams) -> Option<SignalMatch> {
    let last = set.last_index()?;
    let last_date = set.last_date()?;

    let trend = classify_trend(
        set,
        params.ema_short,
        params.ema_long,
        params.sustain_days,
        params.sideway_epsilon_ratio,
    )?;
    if trend != TrendDirection::Bearish {
        return None;
    }

    let macd = set.series(&params.macd_type())?;
    let events = detect_crosses(macd, params.cross_epsilon);
    let event = last_cross(&events)?;
    if event.kind != CrossKind::Death || !within_recency(event.date, last_date, params.within_days)
    {
        return None;
    }

    if !in_sell_zone(set, &params.boll_type(), last, params.touch_window) {
        return None;
    }

    Some(signal_match(&set.code, trend, event))
}

/// Watch: conflicting signals — bullish trend with a recent death cross, or
/// bearish trend with a recent golden cross.
pub fn evaluate_watch(set: &IndicatorSet, params: &SignalParams) -> Option<SignalMatch> {
    let last_date = set.last_date()?;

    let trend = classify_trend(
        set,
        params.ema_short,
        params.ema_long,
        params.sustain_days,
        params.sideway_epsilon_ratio,
    )?;

    let macd = set.series(&params.macd_type())?;
    let events = detect_crosses(macd, params.cross_epsilon);
    let event = last_cross(&events)?;
    if !within_recency(event.date, last_date, params.within_days) {
        return None;
    }

    let conflicting = matches!(
        (trend, event.kind),
        (TrendDirection::Bullish, CrossKind::Death)
            | (TrendDirection::Bearish, CrossKind::Golden)
    );
    if !conflicting {
        return None;
    }

    Some(signal_match(&set.code, trend, event))
}
