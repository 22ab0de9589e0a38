//! Composes the single-metric models into one complete reading.

use chrono::{DateTime, FixedOffset, Timelike, Utc};
use rand::Rng;

use super::patterns;
use super::{HumidityPattern, Patterns, Pm25Pattern, TemperaturePattern};
use crate::models::{Device, Reading};

// ---

/// State carried from one reading to the next so pressure and wind
/// direction move as continuous walks instead of independent draws.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WalkState {
    pub pressure: Option<f64>,
    pub wind_dir: Option<i32>,
}

/// Builds readings for a fixed pattern selection and station timezone.
///
/// Holds no state between calls; the walk state is passed in and handed
/// back, so callers must feed readings for one walk strictly in order.
#[derive(Debug, Clone)]
pub struct ReadingSynthesizer {
    patterns: Patterns,
    local_offset: FixedOffset,
}

impl ReadingSynthesizer {
    pub fn new(patterns: Patterns, local_offset: FixedOffset) -> Self {
        Self {
            patterns,
            local_offset,
        }
    }

    /// Hour of day at the station, used by every diurnal model.
    pub fn local_hour(&self, at: DateTime<Utc>) -> u32 {
        at.with_timezone(&self.local_offset).hour()
    }

    pub fn synthesize<R: Rng>(
        &self,
        rng: &mut R,
        device: &Device,
        at: DateTime<Utc>,
        day_offset: u32,
        state: WalkState,
    ) -> (Reading, WalkState) {
        // ---
        let hour = self.local_hour(at);

        let temperature_c = match self.patterns.temperature {
            TemperaturePattern::Diurnal => {
                patterns::diurnal_temperature(rng, f64::from(hour), patterns::DEFAULT_BASE_TEMP)
            }
            TemperaturePattern::Flat => patterns::flat_temperature(rng),
        };

        let humidity_pct = match self.patterns.humidity {
            HumidityPattern::InverseTemp => patterns::inverse_humidity(rng, temperature_c),
            HumidityPattern::Flat => patterns::flat_humidity(rng),
        };

        let pm25 = match self.patterns.pm25 {
            Pm25Pattern::Urban => patterns::urban_pm25(rng, hour, patterns::DEFAULT_BASE_PM25),
            Pm25Pattern::Rural | Pm25Pattern::Flat => patterns::flat_pm25(rng),
        };

        let pressure_hpa = patterns::pressure(rng, state.pressure);
        let wind_dir_deg = patterns::wind_direction(rng, state.wind_dir);

        let reading = Reading {
            device_id: device.id.clone(),
            recorded_at: at,
            temperature_c,
            humidity_pct,
            pressure_hpa,
            pm25,
            pm10: patterns::pm10(rng, pm25),
            wind_speed_ms: patterns::wind_speed(rng),
            wind_dir_deg,
            battery_v: patterns::battery_voltage(rng, hour, day_offset),
            rssi: patterns::rssi(rng),
        };

        let next = WalkState {
            pressure: Some(pressure_hpa),
            wind_dir: Some(wind_dir_deg),
        };

        (reading, next)
    }
}
