//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
#[cfg(feature = "sqlite")]
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::domain::bar::build_bar_sequence;
use crate::domain::cross::{CrossKind, DEFAULT_CROSS_EPSILON};
use crate::domain::error::MarketscanError;
use crate::domain::scan::{
    ChannelParams, ScanEngine, ScanOptions, SurgeParams, VolumeUpParams,
};
use crate::domain::screen::ScreenParams;
use crate::domain::strategy::composite::SignalParams;
use crate::domain::strategy::trend::TrendDirection;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{MarketDataPort, UniverseFilter};

#[derive(Parser, Debug)]
#[command(name = "marketscan", about = "Multi-signal technical scanner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan for buy signals (trend + golden cross + channel position)
    Buy {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        lookback: Option<usize>,
        #[arg(long)]
        within_days: Option<i64>,
        #[arg(long)]
        require_volume: bool,
    },
    /// Scan for sell signals (bearish trend + death cross + band rejection)
    Sell {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        lookback: Option<usize>,
        #[arg(long)]
        within_days: Option<i64>,
    },
    /// Scan for conflicting trend/cross combinations worth watching
    Watch {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        lookback: Option<usize>,
        #[arg(long)]
        within_days: Option<i64>,
    },
    /// Scan for narrow Bollinger channels
    Channel {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        lookback: Option<usize>,
        #[arg(long)]
        max_width_ratio: Option<f64>,
    },
    /// Scan for volume surges against the preceding window
    Surge {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        recent_days: Option<usize>,
        #[arg(long)]
        previous_days: Option<usize>,
    },
    /// Scan for volume expansion with rising price
    VolumeUp {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        exchange: Option<String>,
        #[arg(long)]
        lookback: Option<usize>,
    },
    /// Screen constituents whose industry aggregate is in a growth phase
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        exchange: Option<String>,
    },
    /// List symbols in the configured universe
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        exchange: Option<String>,
    },
    /// Show stored data range and latest bar for a symbol
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
    },
    /// Print stored daily bars for a symbol over a date range
    History {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        code: String,
        #[arg(long)]
        start: NaiveDate,
        #[arg(long)]
        end: NaiveDate,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Buy {
            config,
            exchange,
            lookback,
            within_days,
            require_volume,
        } => run_signal_scan(&config, exchange, SignalKind::Buy, |params| {
            apply_signal_overrides(params, lookback, within_days);
            params.require_volume |= require_volume;
        }),
        Command::Sell {
            config,
            exchange,
            lookback,
            within_days,
        } => run_signal_scan(&config, exchange, SignalKind::Sell, |params| {
            apply_signal_overrides(params, lookback, within_days);
        }),
        Command::Watch {
            config,
            exchange,
            lookback,
            within_days,
        } => run_signal_scan(&config, exchange, SignalKind::Watch, |params| {
            apply_signal_overrides(params, lookback, within_days);
        }),
        Command::Channel {
            config,
            exchange,
            lookback,
            max_width_ratio,
        } => run_channel(&config, exchange, lookback, max_width_ratio),
        Command::Surge {
            config,
            exchange,
            recent_days,
            previous_days,
        } => run_surge(&config, exchange, recent_days, previous_days),
        Command::VolumeUp {
            config,
            exchange,
            lookback,
        } => run_volume_up(&config, exchange, lookback),
        Command::Screen { config, exchange } => run_screen(&config, exchange),
        Command::ListSymbols { config, exchange } => run_list_symbols(&config, exchange),
        Command::Info { config, code } => run_info(&config, &code),
        Command::History {
            config,
            code,
            start,
            end,
        } => run_history(&config, &code, start, end),
    }
}

enum SignalKind {
    Buy,
    Sell,
    Watch,
}

fn apply_signal_overrides(
    params: &mut SignalParams,
    lookback: Option<usize>,
    within_days: Option<i64>,
) {
    if let Some(lookback) = lookback {
        params.lookback = lookback;
    }
    if let Some(within_days) = within_days {
        params.within_days = within_days;
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = MarketscanError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

/// Open the configured data store: `[sqlite] path` wins, `[csv] path` is the
/// fallback.
pub fn open_data_port(
    config: &dyn ConfigPort,
) -> Result<Box<dyn MarketDataPort + Sync>, MarketscanError> {
    #[cfg(feature = "sqlite")]
    if config.get_string("sqlite", "path").is_some() {
        return Ok(Box::new(SqliteAdapter::from_config(config)?));
    }

    if let Some(path) = config.get_string("csv", "path") {
        return Ok(Box::new(CsvAdapter::new(PathBuf::from(path))));
    }

    Err(MarketscanError::ConfigMissing {
        section: "sqlite".into(),
        key: "path".into(),
    })
}

pub fn build_scan_options(config: &dyn ConfigPort) -> ScanOptions {
    ScanOptions {
        concurrency: config.get_int("scan", "concurrency", 8).max(0) as usize,
        hist_multiplier: config.get_double("macd", "hist_multiplier", 1.0),
        cancel: None,
    }
}

pub fn build_filter(config: &dyn ConfigPort, exchange: Option<String>) -> UniverseFilter {
    UniverseFilter {
        exchange: exchange.or_else(|| config.get_string("scan", "exchange")),
        asset_type: config.get_string("scan", "asset_type"),
        status: config.get_string("scan", "status"),
    }
}

pub fn build_signal_params(config: &dyn ConfigPort) -> SignalParams {
    let defaults = SignalParams::default();
    SignalParams {
        lookback: config.get_int("scan", "lookback", defaults.lookback as i64) as usize,
        ema_short: config.get_int("ema", "short", defaults.ema_short as i64) as usize,
        ema_long: config.get_int("ema", "long", defaults.ema_long as i64) as usize,
        sustain_days: config.get_int("scan", "sustain_days", defaults.sustain_days as i64)
            as usize,
        sideway_epsilon_ratio: config.get_double(
            "scan",
            "sideway_epsilon",
            defaults.sideway_epsilon_ratio,
        ),
        macd_short: config.get_int("macd", "short", defaults.macd_short as i64) as usize,
        macd_long: config.get_int("macd", "long", defaults.macd_long as i64) as usize,
        macd_signal: config.get_int("macd", "signal", defaults.macd_signal as i64) as usize,
        cross_epsilon: config.get_double("macd", "cross_epsilon", DEFAULT_CROSS_EPSILON),
        within_days: config.get_int("scan", "within_days", defaults.within_days),
        boll_period: config.get_int("bollinger", "period", defaults.boll_period as i64) as usize,
        boll_mult_x100: boll_mult_x100(config, defaults.boll_mult_x100),
        touch_window: config.get_int("bollinger", "touch_window", defaults.touch_window as i64)
            as usize,
        volume_window: config.get_int("volume", "window", defaults.volume_window as i64) as usize,
        volume_factor: config.get_double("volume", "factor", defaults.volume_factor),
        require_volume: config.get_bool("volume", "required", defaults.require_volume),
    }
}

pub fn build_channel_params(config: &dyn ConfigPort) -> ChannelParams {
    let defaults = ChannelParams::default();
    ChannelParams {
        lookback: config.get_int("scan", "lookback", defaults.lookback as i64) as usize,
        boll_period: config.get_int("bollinger", "period", defaults.boll_period as i64) as usize,
        boll_mult_x100: boll_mult_x100(config, defaults.boll_mult_x100),
        max_width_ratio: config.get_double(
            "bollinger",
            "max_width_ratio",
            defaults.max_width_ratio,
        ),
        allowed_exceed_days: config.get_int(
            "bollinger",
            "allowed_exceed_days",
            defaults.allowed_exceed_days as i64,
        ) as usize,
    }
}

pub fn build_surge_params(config: &dyn ConfigPort) -> SurgeParams {
    let defaults = SurgeParams::default();
    SurgeParams {
        recent_days: config.get_int("volume", "recent_days", defaults.recent_days as i64)
            as usize,
        previous_days: config.get_int("volume", "previous_days", defaults.previous_days as i64)
            as usize,
        min_ratio: config.get_double("volume", "min_surge_ratio", defaults.min_ratio),
    }
}

pub fn build_volume_up_params(config: &dyn ConfigPort) -> VolumeUpParams {
    let defaults = VolumeUpParams::default();
    VolumeUpParams {
        lookback: config.get_int("scan", "lookback", defaults.lookback as i64) as usize,
        volume_sma_period: config.get_int(
            "volume",
            "sma_period",
            defaults.volume_sma_period as i64,
        ) as usize,
        volume_ratio_threshold: config.get_double(
            "volume",
            "ratio_threshold",
            defaults.volume_ratio_threshold,
        ),
        min_price_change_pct: config.get_double(
            "volume",
            "min_price_change_pct",
            defaults.min_price_change_pct,
        ),
    }
}

pub fn build_screen_params(config: &dyn ConfigPort) -> ScreenParams {
    let defaults = ScreenParams::default();
    ScreenParams {
        lookback: config.get_int("scan", "lookback", defaults.lookback as i64) as usize,
        ema_short: config.get_int("screen", "ema_short", defaults.ema_short as i64) as usize,
        ema_mid: config.get_int("screen", "ema_mid", defaults.ema_mid as i64) as usize,
        ema_long: config.get_int("screen", "ema_long", defaults.ema_long as i64) as usize,
        ema_slope_days: config.get_int(
            "screen",
            "ema_slope_days",
            defaults.ema_slope_days as i64,
        ) as usize,
        macd_short: config.get_int("macd", "short", defaults.macd_short as i64) as usize,
        macd_long: config.get_int("macd", "long", defaults.macd_long as i64) as usize,
        macd_signal: config.get_int("macd", "signal", defaults.macd_signal as i64) as usize,
        cross_epsilon: config.get_double("macd", "cross_epsilon", DEFAULT_CROSS_EPSILON),
        within_days: config.get_int("scan", "within_days", defaults.within_days),
        boll_period: config.get_int("bollinger", "period", defaults.boll_period as i64) as usize,
        boll_mult_x100: boll_mult_x100(config, defaults.boll_mult_x100),
        middle_slope_days: config.get_int(
            "screen",
            "middle_slope_days",
            defaults.middle_slope_days as i64,
        ) as usize,
    }
}

fn boll_mult_x100(config: &dyn ConfigPort, default_x100: u32) -> u32 {
    let mult = config.get_double("bollinger", "multiplier", default_x100 as f64 / 100.0);
    (mult * 100.0).round().max(0.0) as u32
}

fn fail(err: MarketscanError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

fn trend_label(trend: TrendDirection) -> &'static str {
    match trend {
        TrendDirection::Bullish => "bullish",
        TrendDirection::Bearish => "bearish",
        TrendDirection::Sideway => "sideway",
    }
}

fn cross_label(kind: CrossKind) -> &'static str {
    match kind {
        CrossKind::Golden => "golden",
        CrossKind::Death => "death",
    }
}

fn run_signal_scan<F>(
    config_path: &PathBuf,
    exchange: Option<String>,
    kind: SignalKind,
    adjust: F,
) -> ExitCode
where
    F: FnOnce(&mut SignalParams),
{
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(exit) => return exit,
    };

    let port = match open_data_port(&config) {
        Ok(port) => port,
        Err(err) => return fail(err),
    };

    let mut params = build_signal_params(&config);
    adjust(&mut params);
    let filter = build_filter(&config, exchange);

    let result = ScanEngine::new(port.as_ref(), build_scan_options(&config)).and_then(|engine| {
        match kind {
            SignalKind::Buy => engine.scan_buy(&filter, &params),
            SignalKind::Sell => engine.scan_sell(&filter, &params),
            SignalKind::Watch => engine.scan_watch(&filter, &params),
        }
    });

    match result {
        Ok(matches) => {
            for m in &matches {
                println!(
                    "{}  {}  {} cross  trend={}  dif={:.4} dea={:.4} hist={:.4}",
                    m.code,
                    m.cross_date,
                    cross_label(m.cross_kind),
                    trend_label(m.trend),
                    m.dif,
                    m.dea,
                    m.histogram
                );
            }
            println!("{} match(es)", matches.len());
            ExitCode::SUCCESS
        }
        Err(err) => fail(err),
    }
}

fn run_channel(
    config_path: &PathBuf,
    exchange: Option<String>,
    lookback: Option<usize>,
    max_width_ratio: Option<f64>,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(exit) => return exit,
    };
    let port = match open_data_port(&config) {
        Ok(port) => port,
        Err(err) => return fail(err),
    };

    let mut params = build_channel_params(&config);
    if let Some(lookback) = lookback {
        params.lookback = lookback;
    }
    if let Some(ratio) = max_width_ratio {
        params.max_width_ratio = ratio;
    }
    let filter = build_filter(&config, exchange);

    let result = ScanEngine::new(port.as_ref(), build_scan_options(&config))
        .and_then(|engine| engine.scan_narrow_channel(&filter, &params));

    match result {
        Ok(matches) => {
            for m in &matches {
                println!(
                    "{}  last={}  matches={}  violations={}",
                    m.code,
                    m.last_match_date,
                    m.matched_dates.len(),
                    m.violations
                );
            }
            println!("{} match(es)", matches.len());
            ExitCode::SUCCESS
        }
        Err(err) => fail(err),
    }
}

fn run_surge(
    config_path: &PathBuf,
    exchange: Option<String>,
    recent_days: Option<usize>,
    previous_days: Option<usize>,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(exit) => return exit,
    };
    let port = match open_data_port(&config) {
        Ok(port) => port,
        Err(err) => return fail(err),
    };

    let mut params = build_surge_params(&config);
    if let Some(recent) = recent_days {
        params.recent_days = recent;
    }
    if let Some(previous) = previous_days {
        params.previous_days = previous;
    }
    let filter = build_filter(&config, exchange);

    let result = ScanEngine::new(port.as_ref(), build_scan_options(&config))
        .and_then(|engine| engine.scan_volume_surge(&filter, &params));

    match result {
        Ok(matches) => {
            for m in &matches {
                println!("{}  ratio={:.3}", m.code, m.ratio);
            }
            println!("{} match(es)", matches.len());
            ExitCode::SUCCESS
        }
        Err(err) => fail(err),
    }
}

fn run_volume_up(
    config_path: &PathBuf,
    exchange: Option<String>,
    lookback: Option<usize>,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(exit) => return exit,
    };
    let port = match open_data_port(&config) {
        Ok(port) => port,
        Err(err) => return fail(err),
    };

    let mut params = build_volume_up_params(&config);
    if let Some(lookback) = lookback {
        params.lookback = lookback;
    }
    let filter = build_filter(&config, exchange);

    let result = ScanEngine::new(port.as_ref(), build_scan_options(&config))
        .and_then(|engine| engine.scan_volume_up(&filter, &params));

    match result {
        Ok(matches) => {
            for m in &matches {
                println!(
                    "{}  last={}  matches={}  peak_ratio={:.2}  change={:+.2}%",
                    m.code,
                    m.last_match_date,
                    m.matched_dates.len(),
                    m.peak_ratio,
                    m.peak_price_change_pct
                );
            }
            println!("{} match(es)", matches.len());
            ExitCode::SUCCESS
        }
        Err(err) => fail(err),
    }
}

fn run_screen(config_path: &PathBuf, exchange: Option<String>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(exit) => return exit,
    };
    let port = match open_data_port(&config) {
        Ok(port) => port,
        Err(err) => return fail(err),
    };

    let params = build_screen_params(&config);
    let filter = build_filter(&config, exchange);

    let result = ScanEngine::new(port.as_ref(), build_scan_options(&config))
        .and_then(|engine| engine.screen_growth(&filter, &params));

    match result {
        Ok(codes) => {
            for code in &codes {
                println!("{code}");
            }
            println!("{} match(es)", codes.len());
            ExitCode::SUCCESS
        }
        Err(err) => fail(err),
    }
}

fn run_list_symbols(config_path: &PathBuf, exchange: Option<String>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(exit) => return exit,
    };
    let port = match open_data_port(&config) {
        Ok(port) => port,
        Err(err) => return fail(err),
    };

    let filter = build_filter(&config, exchange);
    match port.universe(&filter) {
        Ok(symbols) => {
            for symbol in &symbols {
                println!(
                    "{}  {}  {}  {}",
                    symbol.code, symbol.exchange, symbol.industry, symbol.name
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => fail(err),
    }
}

fn run_info(config_path: &PathBuf, code: &str) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(exit) => return exit,
    };
    let port = match open_data_port(&config) {
        Ok(port) => port,
        Err(err) => return fail(err),
    };

    match port.data_range(code) {
        Ok(Some((min, max, count))) => {
            println!("{}: {} bars from {} to {}", code, count, min, max);
            match port.latest_single(code) {
                Ok(Some(latest)) => {
                    println!(
                        "latest {}: close={} volume={}",
                        latest.date,
                        latest.close.map_or("-".to_string(), |v| format!("{v:.2}")),
                        latest.volume.map_or("-".to_string(), |v| format!("{v:.0}"))
                    );
                    ExitCode::SUCCESS
                }
                Ok(None) => ExitCode::SUCCESS,
                Err(err) => fail(err),
            }
        }
        Ok(None) => {
            println!("{}: no data", code);
            ExitCode::SUCCESS
        }
        Err(err) => fail(err),
    }
}

fn run_history(config_path: &PathBuf, code: &str, start: NaiveDate, end: NaiveDate) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(exit) => return exit,
    };
    let port = match open_data_port(&config) {
        Ok(port) => port,
        Err(err) => return fail(err),
    };

    match port.range_by_code(code, start, end) {
        Ok(records) => {
            for bar in build_bar_sequence(code, records) {
                println!(
                    "{}  o={:.2} h={:.2} l={:.2} c={:.2} v={:.0}",
                    bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => fail(err),
    }
}
