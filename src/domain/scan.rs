//! Universe scan engine.
//!
//! A scan is a batch pass over a symbol universe: per symbol it fetches a
//! bounded recent window, builds indicators, evaluates one strategy
//! predicate, and finally ranks all matches descending on the strategy's
//! sort key. Per-symbol evaluation is independent, so the pass fans out on
//! a bounded rayon pool; ranking is a single-threaded reduce afterwards.
//!
//! Per-symbol fetch or data problems never abort a scan: the symbol is
//! logged and skipped. Invalid parameters are the only error class that
//! rejects the whole operation, before any fetch happens.

use crate::domain::bar::{build_bar_sequence, DailyBar};
use crate::domain::error::MarketscanError;
use crate::domain::indicator_set::IndicatorSet;
use crate::domain::strategy::channel::narrow_channel;
use crate::domain::strategy::composite::{
    evaluate_buy, evaluate_sell, evaluate_watch, SignalMatch, SignalParams,
};
use crate::domain::strategy::volume::{surge_ratio, volume_up_with_price};
use crate::ports::data_port::{MarketDataPort, SymbolInfo, UniverseFilter};
use chrono::NaiveDate;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared flag that aborts an in-flight scan. Partial results are
/// discarded, never returned.
pub type CancelToken = Arc<AtomicBool>;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Worker pool size; match it to what the data backend can serve.
    pub concurrency: usize,
    pub hist_multiplier: f64,
    pub cancel: Option<CancelToken>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            hist_multiplier: 1.0,
            cancel: None,
        }
    }
}

impl ScanOptions {
    pub fn validate(&self) -> Result<(), MarketscanError> {
        if self.concurrency == 0 {
            return Err(MarketscanError::InvalidParameter {
                name: "concurrency".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !self.hist_multiplier.is_finite() {
            return Err(MarketscanError::InvalidParameter {
                name: "hist_multiplier".to_string(),
                reason: "must be finite".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ChannelParams {
    pub lookback: usize,
    pub boll_period: usize,
    pub boll_mult_x100: u32,
    pub max_width_ratio: f64,
    pub allowed_exceed_days: usize,
}

impl Default for ChannelParams {
    fn default() -> Self {
        Self {
            lookback: 20,
            boll_period: 20,
            boll_mult_x100: 200,
            max_width_ratio: 0.04,
            allowed_exceed_days: 2,
        }
    }
}

impl ChannelParams {
    pub fn validate(&self) -> Result<(), MarketscanError> {
        if self.lookback == 0 {
            return Err(MarketscanError::InvalidParameter {
                name: "lookback".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.boll_period == 0 {
            return Err(MarketscanError::InvalidParameter {
                name: "boll_period".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.max_width_ratio <= 0.0 {
            return Err(MarketscanError::InvalidParameter {
                name: "max_width_ratio".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn min_bars(&self) -> usize {
        self.boll_period
    }

    pub fn need(&self) -> usize {
        self.lookback + self.boll_period
    }
}

#[derive(Debug, Clone)]
pub struct SurgeParams {
    pub recent_days: usize,
    pub previous_days: usize,
    /// Minimum ratio to report; 0.0 reports every defined ratio.
    pub min_ratio: f64,
}

impl Default for SurgeParams {
    fn default() -> Self {
        Self {
            recent_days: 2,
            previous_days: 5,
            min_ratio: 0.0,
        }
    }
}

impl SurgeParams {
    pub fn validate(&self) -> Result<(), MarketscanError> {
        if self.previous_days == 0 {
            return Err(MarketscanError::InvalidParameter {
                name: "previous_days".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.min_ratio < 0.0 {
            return Err(MarketscanError::InvalidParameter {
                name: "min_ratio".to_string(),
                reason: "must be non-negative".to_string(),
            });
        }
        Ok(())
    }

    pub fn min_bars(&self) -> usize {
        self.recent_days + 1 + self.previous_days
    }

    pub fn need(&self) -> usize {
        self.min_bars()
    }
}

#[derive(Debug, Clone)]
pub struct VolumeUpParams {
    pub lookback: usize,
    pub volume_sma_period: usize,
    pub volume_ratio_threshold: f64,
    pub min_price_change_pct: f64,
}

impl Default for VolumeUpParams {
    fn default() -> Self {
        Self {
            lookback: 20,
            volume_sma_period: 5,
            volume_ratio_threshold: 2.0,
            min_price_change_pct: 1.0,
        }
    }
}

impl VolumeUpParams {
    pub fn validate(&self) -> Result<(), MarketscanError> {
        if self.lookback == 0 {
            return Err(MarketscanError::InvalidParameter {
                name: "lookback".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.volume_sma_period == 0 {
            return Err(MarketscanError::InvalidParameter {
                name: "volume_sma_period".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.volume_ratio_threshold <= 0.0 {
            return Err(MarketscanError::InvalidParameter {
                name: "volume_ratio_threshold".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    pub fn min_bars(&self) -> usize {
        self.volume_sma_period + 1
    }

    pub fn need(&self) -> usize {
        self.lookback + self.volume_sma_period
    }
}

/// Narrow-channel scan detail for one symbol.
#[derive(Debug, Clone)]
pub struct ChannelMatch {
    pub code: String,
    pub matched_dates: Vec<NaiveDate>,
    pub violations: usize,
    pub last_match_date: NaiveDate,
}

/// Volume-surge scan detail for one symbol.
#[derive(Debug, Clone)]
pub struct SurgeMatch {
    pub code: String,
    pub ratio: f64,
}

/// Volume-up-with-price scan detail for one symbol.
#[derive(Debug, Clone)]
pub struct VolumeUpMatch {
    pub code: String,
    pub matched_dates: Vec<NaiveDate>,
    pub peak_ratio: f64,
    pub peak_price_change_pct: f64,
    pub last_match_date: NaiveDate,
}

pub struct ScanEngine<'a> {
    port: &'a (dyn MarketDataPort + Sync),
    options: ScanOptions,
}

impl<'a> ScanEngine<'a> {
    pub fn new(
        port: &'a (dyn MarketDataPort + Sync),
        options: ScanOptions,
    ) -> Result<Self, MarketscanError> {
        options.validate()?;
        Ok(Self { port, options })
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    pub(crate) fn port(&self) -> &(dyn MarketDataPort + Sync) {
        self.port
    }

    /// Buy signals, ranked by cross date, most recent first.
    pub fn scan_buy(
        &self,
        filter: &UniverseFilter,
        params: &SignalParams,
    ) -> Result<Vec<SignalMatch>, MarketscanError> {
        params.validate()?;
        let mut results = self.run_scan(filter, params.need(), params.min_bars(), |info, bars| {
            let set = self.indicator_set(info, bars, params);
            evaluate_buy(&set, params)
        })?;
        rank_signals(&mut results);
        Ok(results)
    }

    /// Sell signals, ranked by cross date, most recent first.
    pub fn scan_sell(
        &self,
        filter: &UniverseFilter,
        params: &SignalParams,
    ) -> Result<Vec<SignalMatch>, MarketscanError> {
        params.validate()?;
        let mut results = self.run_scan(filter, params.need(), params.min_bars(), |info, bars| {
            let set = self.indicator_set(info, bars, params);
            evaluate_sell(&set, params)
        })?;
        rank_signals(&mut results);
        Ok(results)
    }

    /// Watch signals (conflicting trend/cross), ranked by cross date.
    pub fn scan_watch(
        &self,
        filter: &UniverseFilter,
        params: &SignalParams,
    ) -> Result<Vec<SignalMatch>, MarketscanError> {
        params.validate()?;
        let mut results = self.run_scan(filter, params.need(), params.min_bars(), |info, bars| {
            let set = self.indicator_set(info, bars, params);
            evaluate_watch(&set, params)
        })?;
        rank_signals(&mut results);
        Ok(results)
    }

    /// Narrow-channel candidates, ranked by last matching date, then match
    /// count.
    pub fn scan_narrow_channel(
        &self,
        filter: &UniverseFilter,
        params: &ChannelParams,
    ) -> Result<Vec<ChannelMatch>, MarketscanError> {
        params.validate()?;
        let boll = crate::domain::indicator::IndicatorType::Bollinger {
            period: params.boll_period,
            stddev_mult_x100: params.boll_mult_x100,
        };
        let mut results = self.run_scan(filter, params.need(), params.min_bars(), |info, bars| {
            let mut set = IndicatorSet::new(info.code.clone(), bars);
            set.compute(boll.clone());
            let check = narrow_channel(&set, &boll, params.lookback, params.max_width_ratio);
            if check.violations > params.allowed_exceed_days {
                return None;
            }
            let last_match_date = *check.matched_dates.last()?;
            Some(ChannelMatch {
                code: info.code.clone(),
                matched_dates: check.matched_dates,
                violations: check.violations,
                last_match_date,
            })
        })?;
        results.sort_by(|a, b| {
            b.last_match_date
                .cmp(&a.last_match_date)
                .then(b.matched_dates.len().cmp(&a.matched_dates.len()))
                .then(a.code.cmp(&b.code))
        });
        Ok(results)
    }

    /// Volume-surge candidates, ranked by ratio descending.
    pub fn scan_volume_surge(
        &self,
        filter: &UniverseFilter,
        params: &SurgeParams,
    ) -> Result<Vec<SurgeMatch>, MarketscanError> {
        params.validate()?;
        let mut results = self.run_scan(filter, params.need(), params.min_bars(), |info, bars| {
            let ratio = surge_ratio(&bars, params.recent_days, params.previous_days)?;
            if ratio < params.min_ratio {
                return None;
            }
            Some(SurgeMatch {
                code: info.code.clone(),
                ratio,
            })
        })?;
        results.sort_by(|a, b| b.ratio.total_cmp(&a.ratio).then(a.code.cmp(&b.code)));
        Ok(results)
    }

    /// Volume-up-with-price candidates, ranked by last matching date, match
    /// count, then peak ratio.
    pub fn scan_volume_up(
        &self,
        filter: &UniverseFilter,
        params: &VolumeUpParams,
    ) -> Result<Vec<VolumeUpMatch>, MarketscanError> {
        params.validate()?;
        let mut results = self.run_scan(filter, params.need(), params.min_bars(), |info, bars| {
            let check = volume_up_with_price(
                &bars,
                params.lookback,
                params.volume_sma_period,
                params.volume_ratio_threshold,
                params.min_price_change_pct,
            )?;
            let last_match_date = *check.matched_dates.last()?;
            Some(VolumeUpMatch {
                code: info.code.clone(),
                matched_dates: check.matched_dates,
                peak_ratio: check.peak_ratio,
                peak_price_change_pct: check.peak_price_change_pct,
                last_match_date,
            })
        })?;
        results.sort_by(|a, b| {
            b.last_match_date
                .cmp(&a.last_match_date)
                .then(b.matched_dates.len().cmp(&a.matched_dates.len()))
                .then(b.peak_ratio.total_cmp(&a.peak_ratio))
                .then(a.code.cmp(&b.code))
        });
        Ok(results)
    }

    fn indicator_set(
        &self,
        info: &SymbolInfo,
        bars: Vec<DailyBar>,
        params: &SignalParams,
    ) -> IndicatorSet {
        let mut set = IndicatorSet::new(info.code.clone(), bars)
            .with_hist_multiplier(self.options.hist_multiplier);
        for ty in params.indicator_types() {
            set.compute(ty);
        }
        set
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.options
            .cancel
            .as_ref()
            .is_some_and(|token| token.load(Ordering::Relaxed))
    }

    /// Fetch one symbol's recent window, ascending. `None` on any per-symbol
    /// problem; the scan continues without it.
    pub(crate) fn fetch_window(&self, code: &str, need: usize, min_bars: usize) -> Option<Vec<DailyBar>> {
        let records = match self.port.latest_by_code(code, need) {
            Ok(records) => records,
            Err(err) => {
                warn!(code, error = %err, "skipping symbol: fetch failed");
                return None;
            }
        };
        if records.is_empty() {
            debug!(code, "skipping symbol: no data");
            return None;
        }
        let bars = build_bar_sequence(code, records);
        if bars.len() < min_bars {
            debug!(
                code,
                bars = bars.len(),
                minimum = min_bars,
                "skipping symbol: insufficient data"
            );
            return None;
        }
        Some(bars)
    }

    fn run_scan<R, F>(
        &self,
        filter: &UniverseFilter,
        need: usize,
        min_bars: usize,
        eval: F,
    ) -> Result<Vec<R>, MarketscanError>
    where
        R: Send,
        F: Fn(&SymbolInfo, Vec<DailyBar>) -> Option<R> + Sync,
    {
        let universe = self.port.universe(filter)?;
        let pool = build_pool(self.options.concurrency)?;

        let results: Vec<R> = pool.install(|| {
            universe
                .par_iter()
                .filter_map(|info| {
                    if self.is_cancelled() {
                        return None;
                    }
                    let bars = self.fetch_window(&info.code, need, min_bars)?;
                    eval(info, bars)
                })
                .collect()
        });

        if self.is_cancelled() {
            return Err(MarketscanError::Cancelled);
        }

        info!(
            universe = universe.len(),
            matches = results.len(),
            "scan pass complete"
        );
        Ok(results)
    }
}

pub(crate) fn build_pool(concurrency: usize) -> Result<rayon::ThreadPool, MarketscanError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency)
        .build()
        .map_err(|e| MarketscanError::InvalidParameter {
            name: "concurrency".to_string(),
            reason: e.to_string(),
        })
}

fn rank_signals(results: &mut [SignalMatch]) {
    results.sort_by(|a, b| b.cross_date.cmp(&a.cross_date).then(a.code.cmp(&b.code)));
}
