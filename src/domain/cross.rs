//! Golden/death cross detection over the MACD spread.
//!
//! The detector walks consecutive valid MACD points and applies a hysteresis
//! band of ±epsilon around zero to the spread S = DIF - DEA:
//! - golden cross at i iff S[i-1] <= 0 and S[i] > epsilon
//! - death cross at i iff S[i-1] >= 0 and S[i] < -epsilon
//!
//! The two conditions cannot hold at the same index.

use crate::domain::indicator::IndicatorSeries;
use chrono::NaiveDate;

pub const DEFAULT_CROSS_EPSILON: f64 = 1e-4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossKind {
    Golden,
    Death,
}

#[derive(Debug, Clone)]
pub struct CrossEvent {
    pub date: NaiveDate,
    pub kind: CrossKind,
    pub dif: f64,
    pub dea: f64,
    pub histogram: f64,
}

/// Scan a MACD series for cross events, in date order.
///
/// Only index pairs where both points have satisfied warm-up are considered.
pub fn detect_crosses(macd: &IndicatorSeries, epsilon: f64) -> Vec<CrossEvent> {
    let mut events = Vec::new();

    for i in 1..macd.values.len() {
        let Some((prev_dif, prev_dea, _)) = macd.macd_at(i - 1) else {
            continue;
        };
        let Some((dif, dea, histogram)) = macd.macd_at(i) else {
            continue;
        };

        let prev_spread = prev_dif - prev_dea;
        let spread = dif - dea;

        let kind = if prev_spread <= 0.0 && spread > epsilon {
            Some(CrossKind::Golden)
        } else if prev_spread >= 0.0 && spread < -epsilon {
            Some(CrossKind::Death)
        } else {
            None
        };

        if let Some(kind) = kind {
            events.push(CrossEvent {
                date: macd.values[i].date,
                kind,
                dif,
                dea,
                histogram,
            });
        }
    }

    events
}

/// Most recent event of any kind.
pub fn last_cross(events: &[CrossEvent]) -> Option<&CrossEvent> {
    events.last()
}

/// Most recent event of the given kind.
pub fn last_cross_of(events: &[CrossEvent], kind: CrossKind) -> Option<&CrossEvent> {
    events.iter().rev().find(|e| e.kind == kind)
}
