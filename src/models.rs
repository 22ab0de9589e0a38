//! Data models shared by the generator, the ingest route and the query layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// A registered sensor station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    // ---
    pub id: String,
    pub name: String,
    pub location: String,
    /// `None` means "installed when first registered".
    pub installed_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Device {
    /// An active device with no recorded installation time.
    pub fn new(id: impl Into<String>, name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            location: location.into(),
            installed_at: None,
            is_active: true,
        }
    }
}

/// One generated multivariate sample. The generator always populates every
/// field; the storage layer keeps the numeric columns nullable for ingest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    // ---
    pub device_id: String,
    pub recorded_at: DateTime<Utc>,
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub pm25: i32,
    pub pm10: i32,
    pub wind_speed_ms: f64,
    pub wind_dir_deg: i32,
    pub battery_v: f64,
    pub rssi: i32,
}

/// Aggregate statistics for one labelled window.
///
/// Averages are `None` when the window holds no readings; `reading_count`
/// is always present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    // ---
    pub period: String,
    pub avg_temperature: Option<f64>,
    pub min_temperature: Option<f64>,
    pub max_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
    pub avg_pm25: Option<f64>,
    pub max_pm25: Option<f64>,
    pub reading_count: i64,
}

/// Body of `POST /ingest` as sent by a field station.
#[derive(Debug, Clone, Deserialize)]
pub struct IngestPayload {
    // ---
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub readings: IngestReadings,
    pub meta: IngestMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestReadings {
    pub temperature_c: f64,
    pub humidity_pct: f64,
    pub pressure_hpa: f64,
    pub pm25: i32,
    pub pm10: i32,
    pub wind_speed_ms: Option<f64>,
    pub wind_dir_deg: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestMeta {
    pub battery_v: f64,
    pub rssi: i32,
}

impl IngestPayload {
    /// Check every field against its physical range.
    ///
    /// Returns one message per failing field so the caller can report them
    /// all at once.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        // ---
        let mut errors = Vec::new();
        let r = &self.readings;

        if self.device_id.is_empty() || self.device_id.chars().count() > 64 {
            errors.push("device_id: must be 1-64 characters".to_string());
        }

        check_range(&mut errors, "readings.temperature_c", r.temperature_c, -50.0, 60.0);
        check_range(&mut errors, "readings.humidity_pct", r.humidity_pct, 0.0, 100.0);
        check_range(&mut errors, "readings.pressure_hpa", r.pressure_hpa, 800.0, 1200.0);
        check_range(&mut errors, "readings.pm25", f64::from(r.pm25), 0.0, 1000.0);
        check_range(&mut errors, "readings.pm10", f64::from(r.pm10), 0.0, 1000.0);
        if let Some(speed) = r.wind_speed_ms {
            check_range(&mut errors, "readings.wind_speed_ms", speed, 0.0, 100.0);
        }
        if let Some(dir) = r.wind_dir_deg {
            check_range(&mut errors, "readings.wind_dir_deg", f64::from(dir), 0.0, 359.0);
        }
        check_range(&mut errors, "meta.battery_v", self.meta.battery_v, 2.5, 4.5);
        check_range(&mut errors, "meta.rssi", f64::from(self.meta.rssi), -120.0, 0.0);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn check_range(errors: &mut Vec<String>, field: &str, value: f64, min: f64, max: f64) {
    // NaN fails both comparisons, so test for containment explicitly
    if !(min..=max).contains(&value) {
        errors.push(format!("{field}: must be between {min} and {max}"));
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn create_test_payload() -> IngestPayload {
        // ---
        IngestPayload {
            device_id: "station-01".to_string(),
            timestamp: Utc.with_ymd_and_hms(2025, 3, 26, 18, 45, 0).unwrap(),
            readings: IngestReadings {
                temperature_c: 14.2,
                humidity_pct: 61.5,
                pressure_hpa: 1012.8,
                pm25: 18,
                pm10: 31,
                wind_speed_ms: Some(2.4),
                wind_dir_deg: Some(210),
            },
            meta: IngestMeta {
                battery_v: 3.94,
                rssi: -67,
            },
        }
    }

    #[test]
    fn test_valid_payload_passes() {
        // ---
        assert!(create_test_payload().validate().is_ok());
    }

    #[test]
    fn test_optional_sensors_may_be_omitted() {
        // ---
        let mut payload = create_test_payload();
        payload.readings.wind_speed_ms = None;
        payload.readings.wind_dir_deg = None;

        assert!(payload.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_fields_are_all_reported() {
        // ---
        let mut payload = create_test_payload();
        payload.device_id = String::new();
        payload.readings.humidity_pct = 140.0;
        payload.meta.rssi = 5;

        let errors = payload.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].starts_with("device_id"));
        assert!(errors.iter().any(|e| e.starts_with("readings.humidity_pct")));
        assert!(errors.iter().any(|e| e.starts_with("meta.rssi")));
    }

    #[test]
    fn test_nan_is_rejected() {
        // ---
        let mut payload = create_test_payload();
        payload.readings.temperature_c = f64::NAN;

        let errors = payload.validate().unwrap_err();
        assert_eq!(errors, vec!["readings.temperature_c: must be between -50 and 60"]);
    }

    #[test]
    fn test_payload_deserializes_from_station_json() {
        // ---
        let body = r#"{
            "device_id": "station-02",
            "timestamp": "2025-03-26T18:45:00Z",
            "readings": {
                "temperature_c": 9.5, "humidity_pct": 80.0, "pressure_hpa": 1001.2,
                "pm25": 12, "pm10": 20
            },
            "meta": { "battery_v": 3.71, "rssi": -72 }
        }"#;

        let payload: IngestPayload = serde_json::from_str(body).unwrap();
        assert_eq!(payload.device_id, "station-02");
        assert_eq!(payload.readings.wind_speed_ms, None);
        assert!(payload.validate().is_ok());
    }
}
