//! End-to-end scan scenarios against the in-memory data port.

mod common;

use approx::assert_relative_eq;
use common::*;
use marketscan::domain::bar::build_bar_sequence;
use marketscan::domain::cross::{detect_crosses, DEFAULT_CROSS_EPSILON};
use marketscan::domain::error::MarketscanError;
use marketscan::domain::indicator::bollinger::width_ratio;
use marketscan::domain::indicator::IndicatorType;
use marketscan::domain::indicator_set::IndicatorSet;
use marketscan::domain::scan::{
    CancelToken, ChannelParams, ScanEngine, ScanOptions, SurgeParams, VolumeUpParams,
};
use marketscan::domain::screen::ScreenParams;
use marketscan::domain::strategy::composite::SignalParams;
use marketscan::ports::data_port::UniverseFilter;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn engine(port: &MockDataPort) -> ScanEngine<'_> {
    ScanEngine::new(port, ScanOptions::default()).unwrap()
}

fn serial_engine(port: &MockDataPort) -> ScanEngine<'_> {
    ScanEngine::new(
        port,
        ScanOptions {
            concurrency: 1,
            ..Default::default()
        },
    )
    .unwrap()
}

#[test]
fn rising_closes_sma_and_band_width() {
    // 25 bars, closes 10..=34.
    let closes: Vec<f64> = (0..25).map(|i| 10.0 + i as f64).collect();
    let bars = build_bar_sequence("600000", records_from_closes(&closes));

    let mut set = IndicatorSet::new("600000".into(), bars);
    let sma20 = IndicatorType::Sma(20);
    let boll20 = IndicatorType::Bollinger {
        period: 20,
        stddev_mult_x100: 200,
    };
    set.compute(sma20.clone());
    set.compute(boll20.clone());

    // SMA(20) at index 19 is the mean of the first 20 closes: (10+29)/2.
    assert_relative_eq!(set.simple_at(&sma20, 19).unwrap(), 19.5, max_relative = 1e-12);
    assert_eq!(set.simple_at(&sma20, 18), None);

    // A steady riser is anything but a narrow channel.
    let (upper, middle, lower) = set.bollinger_at(&boll20, 19).unwrap();
    assert!(width_ratio(upper, middle, lower) > 0.04);
}

#[test]
fn narrow_channel_scan_flags_flat_symbol_only() {
    let flat = records_from_closes(&[10.0; 45]);
    let mut volatile_closes = Vec::new();
    for i in 0..45 {
        volatile_closes.push(if i % 2 == 0 { 10.0 } else { 14.0 });
    }

    let port = MockDataPort::new()
        .with_symbol("600001", "Banking", flat)
        .with_symbol("600002", "Banking", records_from_closes(&volatile_closes));

    let results = serial_engine(&port)
        .scan_narrow_channel(&UniverseFilter::default(), &ChannelParams::default())
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].code, "600001");
    assert_eq!(results[0].violations, 0);
    assert_eq!(results[0].matched_dates.len(), 20);
}

#[test]
fn identical_closes_produce_no_cross_events() {
    let bars = build_bar_sequence("600000", records_from_closes(&[10.0; 60]));
    let mut set = IndicatorSet::new("600000".into(), bars);
    let macd = IndicatorType::Macd {
        short: 12,
        long: 26,
        signal: 9,
    };
    set.compute(macd.clone());

    let series = set.series(&macd).unwrap();
    assert!(detect_crosses(series, DEFAULT_CROSS_EPSILON).is_empty());
    let (_, _, histogram) = series.macd_at(59).unwrap();
    assert_relative_eq!(histogram, 0.0);
}

#[test]
fn buy_scan_finds_v_shape_recovery() {
    let v_shape = records_from_closes(&v_shape_closes(60, 40));
    let falling: Vec<f64> = (0..100).map(|i| 200.0 - i as f64).collect();

    let port = MockDataPort::new()
        .with_symbol("600010", "Retail", v_shape)
        .with_symbol("600020", "Retail", records_from_closes(&falling));

    let params = SignalParams {
        within_days: 0, // the cross happened well before the last bar
        ..Default::default()
    };
    let results = engine(&port)
        .scan_buy(&UniverseFilter::default(), &params)
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].code, "600010");
}

#[test]
fn short_history_is_excluded_without_error() {
    // 10 bars against a warm-up of 26+9: skipped, not an error.
    let closes: Vec<f64> = (0..10).map(|i| 10.0 + i as f64).collect();
    let port = MockDataPort::new().with_symbol("600030", "Retail", records_from_closes(&closes));

    let results = engine(&port)
        .scan_buy(&UniverseFilter::default(), &SignalParams::default())
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn per_symbol_fetch_failure_skips_only_that_symbol() {
    let port = MockDataPort::new()
        .with_symbol("600040", "Retail", records_from_closes(&[10.0; 45]))
        .with_symbol("600041", "Retail", Vec::new())
        .with_error("600041", "connection reset");

    let results = serial_engine(&port)
        .scan_narrow_channel(&UniverseFilter::default(), &ChannelParams::default())
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].code, "600040");
}

#[test]
fn invalid_parameters_abort_before_any_fetch() {
    let port = MockDataPort::new();
    let params = SignalParams {
        lookback: 0,
        ..Default::default()
    };
    let err = engine(&port)
        .scan_buy(&UniverseFilter::default(), &params)
        .unwrap_err();
    assert!(matches!(err, MarketscanError::InvalidParameter { .. }));
}

#[test]
fn surge_ratio_boundary_and_exclusions() {
    // Flat volume: ratio exactly 1.0 stays in the results.
    // Zero previous-window sum: excluded.
    // Doubled recent volume: ranked first.
    let port = MockDataPort::new()
        .with_symbol("600050", "Retail", records_from_volumes(&[50.0; 6]))
        .with_symbol(
            "600051",
            "Retail",
            records_from_volumes(&[0.0, 0.0, 0.0, 200.0, 200.0, 200.0]),
        )
        .with_symbol(
            "600052",
            "Retail",
            records_from_volumes(&[100.0, 100.0, 100.0, 200.0, 200.0, 200.0]),
        );

    let params = SurgeParams {
        recent_days: 2,
        previous_days: 3,
        min_ratio: 0.0,
    };
    let results = serial_engine(&port)
        .scan_volume_surge(&UniverseFilter::default(), &params)
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].code, "600052");
    assert_relative_eq!(results[0].ratio, 2.0);
    assert_eq!(results[1].code, "600050");
    assert_relative_eq!(results[1].ratio, 1.0);
}

#[test]
fn surge_ranking_ties_break_by_code() {
    let port = MockDataPort::new()
        .with_symbol("600062", "Retail", records_from_volumes(&[50.0; 6]))
        .with_symbol("600061", "Retail", records_from_volumes(&[80.0; 6]));

    let params = SurgeParams {
        recent_days: 2,
        previous_days: 3,
        min_ratio: 0.0,
    };
    let results = serial_engine(&port)
        .scan_volume_surge(&UniverseFilter::default(), &params)
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].code, "600061");
    assert_eq!(results[1].code, "600062");
}

#[test]
fn volume_up_scan_reports_peak_and_dates() {
    let mut records = records_from_volumes(&[1000.0; 30]);
    // Spike volume and price on the final bar.
    let last = records.len() - 1;
    records[last].volume = Some(5000.0);
    records[last].close = Some(10.6);

    let port = MockDataPort::new().with_symbol("600070", "Retail", records);

    let params = VolumeUpParams {
        lookback: 10,
        volume_sma_period: 5,
        volume_ratio_threshold: 2.0,
        min_price_change_pct: 2.0,
    };
    let results = serial_engine(&port)
        .scan_volume_up(&UniverseFilter::default(), &params)
        .unwrap();

    assert_eq!(results.len(), 1);
    let m = &results[0];
    assert_eq!(m.matched_dates.len(), 1);
    assert_eq!(m.last_match_date, trading_date(last));
    // 5000 against an average of (4*1000 + 5000)/5 = 1800.
    assert_relative_eq!(m.peak_ratio, 5000.0 / 1800.0, max_relative = 1e-9);
    assert_relative_eq!(m.peak_price_change_pct, 6.0, max_relative = 1e-9);
}

#[test]
fn universe_filter_restricts_scan() {
    let port = MockDataPort::new()
        .with_symbol("600080", "Retail", records_from_closes(&[10.0; 45]))
        .with_symbol("600081", "Retail", records_from_closes(&[10.0; 45]));

    let filter = UniverseFilter {
        exchange: Some("HKEX".to_string()),
        ..Default::default()
    };
    let results = serial_engine(&port)
        .scan_narrow_channel(&filter, &ChannelParams::default())
        .unwrap();
    assert!(results.is_empty());
}

#[test]
fn cancelled_scan_discards_partial_results() {
    let port = MockDataPort::new().with_symbol(
        "600090",
        "Retail",
        records_from_closes(&[10.0; 45]),
    );

    let cancel: CancelToken = Arc::new(AtomicBool::new(false));
    cancel.store(true, Ordering::Relaxed);
    let engine = ScanEngine::new(
        &port,
        ScanOptions {
            concurrency: 1,
            cancel: Some(cancel),
            ..Default::default()
        },
    )
    .unwrap();

    let err = engine
        .scan_narrow_channel(&UniverseFilter::default(), &ChannelParams::default())
        .unwrap_err();
    assert!(matches!(err, MarketscanError::Cancelled));
}

#[test]
fn screen_requires_both_aggregate_and_constituent() {
    let rising: Vec<f64> = (0..120).map(|i| 100.0 + 0.8 * i as f64).collect();
    let falling: Vec<f64> = (0..120).map(|i| 200.0 - 0.5 * i as f64).collect();

    let port = MockDataPort::new()
        // Banking aggregate rises; its rising constituent passes, the
        // falling one does not.
        .with_symbol("600100", "Banking", records_from_closes(&rising))
        .with_symbol("600101", "Banking", records_from_closes(&falling))
        // Retail aggregate falls; even a rising constituent is gated out.
        .with_symbol("600200", "Retail", records_from_closes(&rising))
        .with_bars("880471", records_from_closes(&rising))
        .with_bars("880482", records_from_closes(&falling))
        .with_aggregate("Banking", "880471", trading_date(119))
        .with_aggregate("Retail", "880482", trading_date(119));

    let codes = engine(&port)
        .screen_growth(&UniverseFilter::default(), &ScreenParams::default())
        .unwrap();

    assert_eq!(codes, vec!["600100".to_string()]);
}

#[test]
fn screen_skips_industries_without_aggregate() {
    let rising: Vec<f64> = (0..120).map(|i| 100.0 + 0.8 * i as f64).collect();
    let port = MockDataPort::new().with_symbol("600300", "Unmapped", records_from_closes(&rising));

    let codes = engine(&port)
        .screen_growth(&UniverseFilter::default(), &ScreenParams::default())
        .unwrap();
    assert!(codes.is_empty());
}
