//! MACD (Moving Average Convergence Divergence) indicator.
//!
//! DIF = EMA(short) - EMA(long)
//! DEA = EMA(signal) of the DIF series
//! Histogram = (DIF - DEA) × multiplier
//!
//! Default parameters: short=12, long=26, signal=9, multiplier=1.0
//! Warmup: (long - 1) + (signal - 1) bars.

use crate::domain::bar::DailyBar;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_SHORT: usize = 12;
pub const DEFAULT_LONG: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;
pub const DEFAULT_HIST_MULTIPLIER: f64 = 1.0;

pub fn calculate_macd(
    bars: &[DailyBar],
    short: usize,
    long: usize,
    signal_period: usize,
    hist_multiplier: f64,
) -> IndicatorSeries {
    if bars.is_empty() || short == 0 || long == 0 || signal_period == 0 {
        return IndicatorSeries {
            indicator_type: IndicatorType::Macd {
                short,
                long,
                signal: signal_period,
            },
            values: Vec::new(),
        };
    }

    let ema_short = ema_raw_values(bars, short);
    let ema_long = ema_raw_values(bars, long);

    let mut dif_line: Vec<f64> = Vec::with_capacity(bars.len());
    for i in 0..bars.len() {
        dif_line.push(ema_short[i] - ema_long[i]);
    }

    // DEA seeds from the SMA of the first `signal_period` defined DIF values.
    let k = 2.0 / (signal_period as f64 + 1.0);
    let mut dea_line: Vec<f64> = vec![0.0; bars.len()];
    let dif_warmup = long - 1;

    if bars.len() > dif_warmup {
        let mut sum = 0.0;
        let seed_end = (dif_warmup + signal_period).min(bars.len());
        for value in dif_line.iter().take(seed_end).skip(dif_warmup) {
            sum += value;
        }

        if dif_warmup + signal_period <= bars.len() {
            let mut dea = sum / signal_period as f64;
            dea_line[dif_warmup + signal_period - 1] = dea;

            for i in (dif_warmup + signal_period)..bars.len() {
                dea = dif_line[i] * k + dea * (1.0 - k);
                dea_line[i] = dea;
            }
        }
    }

    let warmup = long - 1 + signal_period - 1;

    let mut values = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let valid = i >= warmup;
        let dif = dif_line[i];
        let dea = dea_line[i];
        let histogram = (dif - dea) * hist_multiplier;

        values.push(IndicatorPoint {
            date: bar.date,
            valid,
            value: IndicatorValue::Macd {
                dif,
                dea,
                histogram,
            },
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Macd {
            short,
            long,
            signal: signal_period,
        },
        values,
    }
}

pub fn calculate_macd_default(bars: &[DailyBar]) -> IndicatorSeries {
    calculate_macd(
        bars,
        DEFAULT_SHORT,
        DEFAULT_LONG,
        DEFAULT_SIGNAL,
        DEFAULT_HIST_MULTIPLIER,
    )
}

/// Extract raw f64 values from the EMA series, 0.0 inside warmup.
fn ema_raw_values(bars: &[DailyBar], period: usize) -> Vec<f64> {
    let series = calculate_ema(bars, period);
    series
        .values
        .iter()
        .map(|p| match p.value {
            IndicatorValue::Simple(v) => v,
            _ => 0.0,
        })
        .collect()
}
