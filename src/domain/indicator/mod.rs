//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values
//!
//! Every series is index-aligned with the bar sequence it was computed from.
//! Points inside the warm-up window carry `valid = false` and must be
//! skipped, never read as zero.

pub mod sma;
pub mod ema;
pub mod stddev;
pub mod bollinger;
pub mod macd;

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
    Macd {
        dif: f64,
        dea: f64,
        histogram: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Stddev(usize),
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Macd {
        short: usize,
        long: usize,
        signal: usize,
    },
}

impl IndicatorType {
    /// Number of bars consumed before the first valid point.
    pub fn warmup(&self) -> usize {
        match *self {
            IndicatorType::Sma(period)
            | IndicatorType::Ema(period)
            | IndicatorType::Stddev(period) => period.saturating_sub(1),
            IndicatorType::Bollinger { period, .. } => period.saturating_sub(1),
            IndicatorType::Macd { long, signal, .. } => {
                long.saturating_sub(1) + signal.saturating_sub(1)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Value at index `i` for single-valued series, only when warm-up is satisfied.
    pub fn simple_at(&self, i: usize) -> Option<f64> {
        match self.values.get(i) {
            Some(point) if point.valid => match point.value {
                IndicatorValue::Simple(v) => Some(v),
                _ => None,
            },
            _ => None,
        }
    }

    /// (upper, middle, lower) at index `i`, only when warm-up is satisfied.
    pub fn bollinger_at(&self, i: usize) -> Option<(f64, f64, f64)> {
        match self.values.get(i) {
            Some(point) if point.valid => match point.value {
                IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                } => Some((upper, middle, lower)),
                _ => None,
            },
            _ => None,
        }
    }

    /// (dif, dea, histogram) at index `i`, only when warm-up is satisfied.
    pub fn macd_at(&self, i: usize) -> Option<(f64, f64, f64)> {
        match self.values.get(i) {
            Some(point) if point.valid => match point.value {
                IndicatorValue::Macd {
                    dif,
                    dea,
                    histogram,
                } => Some((dif, dea, histogram)),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::Macd {
                short,
                long,
                signal,
            } => {
                write!(f, "MACD({},{},{})", short, long, signal)
            }
        }
    }
}
