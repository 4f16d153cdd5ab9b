//! Cross-entity screening: industry aggregate gate plus constituent check.
//!
//! A symbol passes only when its industry's aggregate index shows a growth
//! phase (bullish EMA ordering, rising EMA slope, bullish-or-fresh-golden
//! MACD, close holding the Bollinger middle with the middle rising) and the
//! symbol itself shows the analogous favorable phase (same structure
//! without the middle-band slope requirement).

use crate::domain::cross::{detect_crosses, last_cross_of, CrossKind};
use crate::domain::error::MarketscanError;
use crate::domain::indicator::IndicatorType;
use crate::domain::indicator_set::IndicatorSet;
use crate::domain::scan::{build_pool, ScanEngine};
use crate::domain::strategy::trend::tail_slope;
use crate::ports::data_port::{SymbolInfo, UniverseFilter};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct ScreenParams {
    pub lookback: usize,
    pub ema_short: usize,
    pub ema_mid: usize,
    pub ema_long: usize,
    /// Trailing window for the long-EMA slope sum.
    pub ema_slope_days: usize,
    pub macd_short: usize,
    pub macd_long: usize,
    pub macd_signal: usize,
    pub cross_epsilon: f64,
    /// Golden cross freshness for the MACD leg; <= 0 disables.
    pub within_days: i64,
    pub boll_period: usize,
    pub boll_mult_x100: u32,
    /// Trailing window for the middle-band slope sum (aggregate only).
    pub middle_slope_days: usize,
}

impl Default for ScreenParams {
    fn default() -> Self {
        Self {
            lookback: 60,
            ema_short: 5,
            ema_mid: 10,
            ema_long: 20,
            ema_slope_days: 5,
            macd_short: 12,
            macd_long: 26,
            macd_signal: 9,
            cross_epsilon: crate::domain::cross::DEFAULT_CROSS_EPSILON,
            within_days: 5,
            boll_period: 20,
            boll_mult_x100: 200,
            middle_slope_days: 5,
        }
    }
}

impl ScreenParams {
    pub fn validate(&self) -> Result<(), MarketscanError> {
        let positives: [(&str, usize); 9] = [
            ("lookback", self.lookback),
            ("ema_short", self.ema_short),
            ("ema_mid", self.ema_mid),
            ("ema_long", self.ema_long),
            ("ema_slope_days", self.ema_slope_days),
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
        if !(self.ema_short < self.ema_mid && self.ema_mid < self.ema_long) {
            return Err(MarketscanError::InvalidParameter {
                name: "ema_short".to_string(),
                reason: "EMA periods must be strictly increasing".to_string(),
            });
        }
        if self.middle_slope_days == 0 {
            return Err(MarketscanError::InvalidParameter {
                name: "middle_slope_days".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn min_bars(&self) -> usize {
        let macd_bars = self.macd_long + self.macd_signal;
        let ema_bars = self.ema_long + self.ema_slope_days;
        let boll_bars = self.boll_period + self.middle_slope_days;
        macd_bars.max(ema_bars).max(boll_bars)
    }

    pub fn need(&self) -> usize {
        self.lookback + self.min_bars()
    }

    fn indicator_types(&self) -> Vec<IndicatorType> {
        vec![
            IndicatorType::Ema(self.ema_short),
            IndicatorType::Ema(self.ema_mid),
            IndicatorType::Ema(self.ema_long),
            self.macd_type(),
            self.boll_type(),
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

/// Growth-phase predicate shared by both legs of the screen. The aggregate
/// leg additionally requires the Bollinger middle to slope upward.
pub fn growth_phase(set: &IndicatorSet, params: &ScreenParams, require_middle_slope: bool) -> bool {
    growth_phase_inner(set, params, require_middle_slope).unwrap_or(false)
}

fn growth_phase_inner(
    set: &IndicatorSet,
    params: &ScreenParams,
    require_middle_slope: bool,
) -> Option<bool> {
    let last = set.last_index()?;
    let last_date = set.last_date()?;

    let ema_s = set.simple_at(&IndicatorType::Ema(params.ema_short), last)?;
    let ema_m = set.simple_at(&IndicatorType::Ema(params.ema_mid), last)?;
    let ema_l = set.simple_at(&IndicatorType::Ema(params.ema_long), last)?;
    if !(ema_s > ema_m && ema_m > ema_l) {
        return Some(false);
    }

    let long_ty = IndicatorType::Ema(params.ema_long);
    let slope = tail_slope(last, params.ema_slope_days, |i| set.simple_at(&long_ty, i))?;
    if slope <= 0.0 {
        return Some(false);
    }

    let macd = set.series(&params.macd_type())?;
    let (dif, dea, _) = macd.macd_at(last)?;
    let bullish = dif > dea;
    let fresh_golden = {
        let events = detect_crosses(macd, params.cross_epsilon);
        last_cross_of(&events, CrossKind::Golden).is_some_and(|event| {
            params.within_days <= 0
                || (last_date - event.date).num_days() <= params.within_days
        })
    };
    if !bullish && !fresh_golden {
        return Some(false);
    }

    let boll_ty = params.boll_type();
    let (_, middle, _) = set.bollinger_at(&boll_ty, last)?;
    if set.bars[last].close < middle {
        return Some(false);
    }

    if require_middle_slope {
        let middle_slope = tail_slope(last, params.middle_slope_days, |i| {
            set.bollinger_at(&boll_ty, i).map(|(_, m, _)| m)
        })?;
        if middle_slope <= 0.0 {
            return Some(false);
        }
    }

    Some(true)
}

impl ScanEngine<'_> {
    /// Screen the universe against industry growth phases.
    ///
    /// Aggregates are evaluated once per distinct industry; constituents of
    /// passing industries are then checked individually. Returns passing
    /// symbol codes, ascending.
    pub fn screen_growth(
        &self,
        filter: &UniverseFilter,
        params: &ScreenParams,
    ) -> Result<Vec<String>, MarketscanError> {
        params.validate()?;

        let universe = self.port().universe(filter)?;
        let mut by_industry: HashMap<&str, Vec<&SymbolInfo>> = HashMap::new();
        for info in &universe {
            if info.industry.is_empty() {
                debug!(code = %info.code, "skipping symbol: no industry");
                continue;
            }
            by_industry.entry(info.industry.as_str()).or_default().push(info);
        }

        let industries: Vec<&str> = by_industry.keys().copied().collect();
        let pool = build_pool(self.options().concurrency)?;

        let passing: HashSet<&str> = pool.install(|| {
            industries
                .par_iter()
                .filter_map(|&industry| {
                    if self.is_cancelled() {
                        return None;
                    }
                    self.aggregate_passes(industry, params).then_some(industry)
                })
                .collect()
        });

        let mut codes: Vec<String> = pool.install(|| {
            universe
                .par_iter()
                .filter_map(|info| {
                    if self.is_cancelled() {
                        return None;
                    }
                    if !passing.contains(info.industry.as_str()) {
                        return None;
                    }
                    let set = self.screen_set(&info.code, params)?;
                    growth_phase(&set, params, false).then(|| info.code.clone())
                })
                .collect()
        });

        if self.is_cancelled() {
            return Err(MarketscanError::Cancelled);
        }

        codes.sort();
        info!(
            universe = universe.len(),
            industries = industries.len(),
            passing_industries = passing.len(),
            matches = codes.len(),
            "screen pass complete"
        );
        Ok(codes)
    }

    fn aggregate_passes(&self, industry: &str, params: &ScreenParams) -> bool {
        let aggregate = match self.port().industry_aggregate(industry) {
            Ok(Some(aggregate)) => aggregate,
            Ok(None) => {
                debug!(industry, "skipping industry: no aggregate record");
                return false;
            }
            Err(err) => {
                warn!(industry, error = %err, "skipping industry: aggregate lookup failed");
                return false;
            }
        };
        match self.screen_set(&aggregate.code, params) {
            Some(set) => growth_phase(&set, params, true),
            None => false,
        }
    }

    fn screen_set(&self, code: &str, params: &ScreenParams) -> Option<IndicatorSet> {
        let bars = self.fetch_window(code, params.need(), params.min_bars())?;
        let mut set = IndicatorSet::new(code.to_string(), bars)
            .with_hist_multiplier(self.options().hist_multiplier);
        for ty in params.indicator_types() {
            set.compute(ty);
        }
        Some(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bar::DailyBar;
    use chrono::NaiveDate;

    fn make_set(closes: &[f64], params: &ScreenParams) -> IndicatorSet {
        let bars: Vec<DailyBar> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let month = i / 28 + 1;
                let day = i % 28 + 1;
                DailyBar {
                    code: "880001".into(),
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
        let mut set = IndicatorSet::new("880001".into(), bars);
        for ty in params.indicator_types() {
            set.compute(ty);
        }
        set
    }

    #[test]
    fn default_params_validate() {
        assert!(ScreenParams::default().validate().is_ok());
    }

    #[test]
    fn non_increasing_ema_periods_rejected() {
        let params = ScreenParams {
            ema_short: 10,
            ema_mid: 10,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn steady_uptrend_is_growth_phase() {
        let params = ScreenParams::default();
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + 0.8 * i as f64).collect();
        let set = make_set(&closes, &params);

        assert!(growth_phase(&set, &params, true));
        assert!(growth_phase(&set, &params, false));
    }

    #[test]
    fn downtrend_is_not_growth_phase() {
        let params = ScreenParams::default();
        let closes: Vec<f64> = (0..80).map(|i| 200.0 - 0.8 * i as f64).collect();
        let set = make_set(&closes, &params);

        assert!(!growth_phase(&set, &params, true));
        assert!(!growth_phase(&set, &params, false));
    }

    #[test]
    fn flat_closes_fail_slope_requirement() {
        let params = ScreenParams::default();
        let set = make_set(&[100.0; 80], &params);
        assert!(!growth_phase(&set, &params, false));
    }

    #[test]
    fn insufficient_warmup_is_not_growth_phase() {
        let params = ScreenParams::default();
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let set = make_set(&closes, &params);
        assert!(!growth_phase(&set, &params, true));
    }

    #[test]
    fn min_bars_covers_all_legs() {
        let params = ScreenParams::default();
        // macd 35, ema 25, boll 25
        assert_eq!(params.min_bars(), 35);
        assert_eq!(params.need(), 95);
    }
}
