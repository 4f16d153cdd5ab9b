//! Per-symbol bundle of bars and computed indicator series.
//!
//! Built fresh for every scan pass; nothing persists between invocations.
//! All series are index-aligned with the bar sequence, and accessors return
//! `None` inside warm-up windows.

use crate::domain::bar::DailyBar;
use crate::domain::indicator::bollinger::calculate_bollinger;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::macd::calculate_macd;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::stddev::calculate_stddev;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub code: String,
    pub bars: Vec<DailyBar>,
    pub hist_multiplier: f64,
    indicators: HashMap<IndicatorType, IndicatorSeries>,
    date_index: HashMap<NaiveDate, usize>,
}

impl IndicatorSet {
    pub fn new(code: String, bars: Vec<DailyBar>) -> Self {
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            code,
            bars,
            hist_multiplier: 1.0,
            indicators: HashMap::new(),
            date_index,
        }
    }

    pub fn with_hist_multiplier(mut self, hist_multiplier: f64) -> Self {
        self.hist_multiplier = hist_multiplier;
        self
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.bars.len().checked_sub(1)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }

    /// Compute and cache a series if not already present.
    pub fn compute(&mut self, ty: IndicatorType) {
        if self.indicators.contains_key(&ty) {
            return;
        }
        let series = match ty {
            IndicatorType::Sma(period) => calculate_sma(&self.bars, period),
            IndicatorType::Ema(period) => calculate_ema(&self.bars, period),
            IndicatorType::Stddev(period) => calculate_stddev(&self.bars, period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => calculate_bollinger(&self.bars, period, stddev_mult_x100),
            IndicatorType::Macd {
                short,
                long,
                signal,
            } => calculate_macd(&self.bars, short, long, signal, self.hist_multiplier),
        };
        self.indicators.insert(ty, series);
    }

    pub fn series(&self, ty: &IndicatorType) -> Option<&IndicatorSeries> {
        self.indicators.get(ty)
    }

    /// Single value at index `i`, `None` when missing or inside warm-up.
    pub fn simple_at(&self, ty: &IndicatorType, i: usize) -> Option<f64> {
        self.indicators.get(ty)?.simple_at(i)
    }

    /// (upper, middle, lower) at index `i`.
    pub fn bollinger_at(&self, ty: &IndicatorType, i: usize) -> Option<(f64, f64, f64)> {
        self.indicators.get(ty)?.bollinger_at(i)
    }

    /// (dif, dea, histogram) at index `i`.
    pub fn macd_at(&self, ty: &IndicatorType, i: usize) -> Option<(f64, f64, f64)> {
        self.indicators.get(ty)?.macd_at(i)
    }
}
