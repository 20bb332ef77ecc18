//! Whale classification.
//!
//! Scores a trade against the rolling windows. Per-market deviation is
//! weighted more heavily than global deviation: "large for this market" is a
//! stronger signal than "large overall". The result is a pure function of
//! the two z-scores, the global percentile, and the absolute notional, so
//! identical window contents always reproduce the identical verdict.

use crate::stats::{RollingStats, WindowKey};
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use whale_watch_core::{AnomalyResult, Severity, TradeEvent};

const GLOBAL_Z_WEIGHT: f64 = 0.4;
const MARKET_Z_WEIGHT: f64 = 0.6;

const ANOMALY_Z_THRESHOLD: f64 = 1.5;
const ANOMALY_NOTIONAL_FLOOR: f64 = 5_000.0;

const MAX_Z_COMPONENT: f64 = 40.0;
const MAX_PERCENTILE_COMPONENT: f64 = 30.0;

pub struct WhaleClassifier {
    stats: Arc<RollingStats>,
}

impl WhaleClassifier {
    #[must_use]
    pub fn new(stats: Arc<RollingStats>) -> Self {
        Self { stats }
    }

    /// Classifies a trade. Callers must have already applied `observe` for
    /// the trade's notional to both the global and the market window, so the
    /// trade itself is part of the baseline it is scored against.
    #[must_use]
    pub fn classify(&self, trade: &TradeEvent) -> AnomalyResult {
        let notional = trade.notional.to_f64().unwrap_or(0.0);

        let global_z = self.stats.z_score(WindowKey::Global, notional);
        let market_z = self.stats.z_score(WindowKey::Market(&trade.market_id), notional);
        let percentile = self.stats.percentile(WindowKey::Global, notional);

        let combined_z = GLOBAL_Z_WEIGHT * global_z + MARKET_Z_WEIGHT * market_z;

        AnomalyResult {
            is_anomaly: combined_z > ANOMALY_Z_THRESHOLD || notional > ANOMALY_NOTIONAL_FLOOR,
            combined_z,
            percentile,
            suspicion_score: suspicion_score(combined_z, percentile, notional),
            severity: severity_for(combined_z, notional),
        }
    }
}

/// Step bonus at fixed notional thresholds, largest first.
fn size_bucket_bonus(notional: f64) -> f64 {
    if notional > 100_000.0 {
        30.0
    } else if notional > 50_000.0 {
        25.0
    } else if notional > 25_000.0 {
        20.0
    } else if notional > 10_000.0 {
        15.0
    } else if notional > 5_000.0 {
        10.0
    } else {
        0.0
    }
}

fn suspicion_score(combined_z: f64, percentile: f64, notional: f64) -> f64 {
    let z_component = (combined_z.abs() * 12.0).min(MAX_Z_COMPONENT);
    let percentile_component = ((percentile - 50.0) * 0.6).min(MAX_PERCENTILE_COMPONENT);
    (z_component + percentile_component + size_bucket_bonus(notional)).clamp(0.0, 100.0)
}

/// Severity ladder, strongest tier first.
fn severity_for(combined_z: f64, notional: f64) -> Severity {
    if combined_z > 4.0 || notional > 100_000.0 {
        Severity::Extreme
    } else if combined_z > 3.0 || notional > 50_000.0 {
        Severity::High
    } else if combined_z > 2.5 || notional > 25_000.0 {
        Severity::Medium
    } else {
        Severity::Low
    }
}
