//! Synthetic weather-station time series.
//!
//! `patterns` holds the per-metric models, `synth` combines them into one
//! reading, and [`build_series`] walks a time window tick by tick, dropping
//! whole ticks to simulate station outages.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, FixedOffset, Offset, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::models::{Device, Reading};

pub mod patterns;
mod synth;

pub use synth::{ReadingSynthesizer, WalkState};

// ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemperaturePattern {
    #[default]
    Diurnal,
    Flat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HumidityPattern {
    #[default]
    InverseTemp,
    Flat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pm25Pattern {
    #[default]
    Urban,
    Rural,
    Flat,
}

/// Which model each correlated metric follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patterns {
    pub temperature: TemperaturePattern,
    pub humidity: HumidityPattern,
    pub pm25: Pm25Pattern,
}

/// Spacing between ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    OneMinute,
    #[default]
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
}

impl Interval {
    pub fn duration(self) -> Duration {
        match self {
            Interval::OneMinute => Duration::minutes(1),
            Interval::FiveMinutes => Duration::minutes(5),
            Interval::FifteenMinutes => Duration::minutes(15),
        }
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::OneMinute),
            "5m" => Ok(Interval::FiveMinutes),
            "15m" => Ok(Interval::FifteenMinutes),
            other => Err(format!("unknown interval '{other}', expected 1m, 5m or 15m")),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Interval::OneMinute => "1m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
        };
        f.write_str(s)
    }
}

/// How pressure and wind-direction walks are tracked across devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WalkMode {
    /// Every device keeps its own continuous walk.
    #[default]
    PerDevice,
    /// One walk is shared by all devices, each reading continuing from
    /// whichever device was generated last.
    Shared,
}

impl FromStr for WalkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per-device" => Ok(WalkMode::PerDevice),
            "shared" => Ok(WalkMode::Shared),
            other => Err(format!("unknown walk mode '{other}', expected per-device or shared")),
        }
    }
}

/// Parameters for one generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesConfig {
    pub days: u32,
    pub interval: Interval,
    pub gap_probability: f64,
    pub patterns: Patterns,
    pub walk_mode: WalkMode,
    /// Station-local offset used to derive the hour of day.
    pub local_offset: FixedOffset,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            days: 7,
            interval: Interval::FiveMinutes,
            gap_probability: 0.02,
            patterns: Patterns::default(),
            walk_mode: WalkMode::PerDevice,
            local_offset: Utc.fix(),
        }
    }
}

/// Generate readings for every device over `[now - days, now]`.
///
/// At each tick a Bernoulli draw with `gap_probability` decides whether the
/// whole network is down; an outage drops the current tick and jumps ahead
/// by 1-3 intervals in total. Otherwise one reading per device is emitted.
/// The day offset fed to the battery model counts whole days since the
/// start of the window and never wraps. A window reaching past the
/// representable date range yields no readings.
pub fn build_series<R: Rng>(
    rng: &mut R,
    devices: &[Device],
    cfg: &SeriesConfig,
    now: DateTime<Utc>,
) -> Vec<Reading> {
    // ---
    let step = cfg.interval.duration();
    let Some(start) = now.checked_sub_signed(Duration::days(i64::from(cfg.days))) else {
        tracing::warn!(days = cfg.days, "series window is out of range, nothing generated");
        return Vec::new();
    };
    let gap_probability = cfg.gap_probability.clamp(0.0, 1.0);
    let synth = ReadingSynthesizer::new(cfg.patterns, cfg.local_offset);

    let walks = match cfg.walk_mode {
        WalkMode::PerDevice => devices.len(),
        WalkMode::Shared => 1,
    };
    let mut states = vec![WalkState::default(); walks];

    let expected_ticks = (now - start).num_seconds() / step.num_seconds() + 1;
    let mut readings = Vec::with_capacity(expected_ticks as usize * devices.len());
    let mut gaps = 0usize;
    let mut at = start;

    while at <= now {
        if rng.gen_bool(gap_probability) {
            let skip = rng.gen_range(1..=3_i32);
            at += step * skip;
            gaps += 1;
            continue;
        }

        let day_offset = (at - start).num_days() as u32;

        for (idx, device) in devices.iter().enumerate() {
            let slot = match cfg.walk_mode {
                WalkMode::PerDevice => idx,
                WalkMode::Shared => 0,
            };
            let (reading, next) = synth.synthesize(rng, device, at, day_offset, states[slot]);
            states[slot] = next;
            readings.push(reading);
        }

        at += step;
    }

    tracing::debug!(
        devices = devices.len(),
        days = cfg.days,
        interval = %cfg.interval,
        gaps,
        readings = readings.len(),
        "series generated"
    );

    readings
}
