//! Single-metric value models.
//!
//! Each function draws one value from the caller's RNG so a seeded
//! [`rand::rngs::StdRng`] reproduces a whole dataset. Random-walk metrics
//! take the previous value of the walk; `None` starts a new walk.

use std::f64::consts::PI;

use rand::Rng;

// ---

pub const HUMIDITY_RANGE: (f64, f64) = (30.0, 95.0);
pub const PRESSURE_RANGE: (f64, f64) = (990.0, 1040.0);
pub const WIND_SPEED_RANGE: (f64, f64) = (0.0, 15.0);
pub const BATTERY_RANGE: (f64, f64) = (3.2, 4.2);

pub const DEFAULT_BASE_TEMP: f64 = 12.0;
pub const DEFAULT_BASE_PM25: f64 = 15.0;
pub const DEFAULT_PRESSURE: f64 = 1013.0;

const TEMP_AMPLITUDE: f64 = 7.0;
const TEMP_PEAK_HOUR: f64 = 14.0;
const MIN_PM25: f64 = 5.0;

/// Temperature following a daily cosine with its peak at 14:00 and its
/// trough around 02:00-04:00.
pub fn diurnal_temperature<R: Rng>(rng: &mut R, hour: f64, base_temp: f64) -> f64 {
    // ---
    let radians = (hour - TEMP_PEAK_HOUR) * PI / 12.0;
    let temp = base_temp + TEMP_AMPLITUDE * radians.cos();
    round_to(temp + rng.gen_range(-0.5..0.5_f64), 1)
}

/// Relative humidity falling 2 % per degree above 12 °C.
pub fn inverse_humidity<R: Rng>(rng: &mut R, temperature: f64) -> f64 {
    // ---
    let humidity = 70.0 - 2.0 * (temperature - 12.0) + rng.gen_range(-2.5..2.5_f64);
    round_to(humidity.clamp(HUMIDITY_RANGE.0, HUMIDITY_RANGE.1), 1)
}

/// PM2.5 with morning and evening traffic peaks plus an occasional
/// evening cooking spike that can stack on the traffic peak.
pub fn urban_pm25<R: Rng>(rng: &mut R, hour: u32, base_pm: f64) -> i32 {
    // ---
    let mut pm = base_pm;
    let mut spiked = false;

    if (7..=9).contains(&hour) {
        pm += rng.gen_range(20.0..35.0_f64);
        spiked = true;
    }
    if (17..=19).contains(&hour) {
        pm += rng.gen_range(25.0..45.0_f64);
        spiked = true;
    }
    if (18..=20).contains(&hour) && rng.gen_bool(0.3) {
        pm += rng.gen_range(30.0..55.0_f64);
        spiked = true;
    }
    if !spiked {
        pm += rng.gen_range(-5.0..5.0_f64);
    }

    pm.max(MIN_PM25).round() as i32
}

/// PM10 as a 1.5-2.0 multiple of PM2.5, so it never drops below it.
pub fn pm10<R: Rng>(rng: &mut R, pm25: i32) -> i32 {
    // ---
    let ratio = rng.gen_range(1.5..=2.0_f64);
    (f64::from(pm25) * ratio).round() as i32
}

/// Barometric pressure as a bounded random walk of at most 1 hPa per step.
pub fn pressure<R: Rng>(rng: &mut R, prev: Option<f64>) -> f64 {
    // ---
    let base = prev.unwrap_or(DEFAULT_PRESSURE);
    let next = base + rng.gen_range(-1.0..=1.0_f64);
    round_to(next.clamp(PRESSURE_RANGE.0, PRESSURE_RANGE.1), 1)
}

/// Wind speed skewed towards calm conditions.
pub fn wind_speed<R: Rng>(rng: &mut R) -> f64 {
    // ---
    let u: f64 = rng.gen();
    let speed = (2.0 * u).exp() - 1.0;
    round_to(speed.clamp(WIND_SPEED_RANGE.0, WIND_SPEED_RANGE.1), 1)
}

/// Wind direction in whole degrees, veering at most 15° per step and
/// wrapping through north.
pub fn wind_direction<R: Rng>(rng: &mut R, prev: Option<i32>) -> i32 {
    // ---
    match prev {
        None => rng.gen_range(0..360),
        Some(prev) => {
            let next = f64::from(prev) + rng.gen_range(-15.0..15.0_f64);
            (next.round() as i32).rem_euclid(360)
        }
    }
}

/// Cell voltage: a slow drain of 0.05 V per elapsed day, a solar charging
/// bump between 08:00 and 18:59 and a small overnight drain.
pub fn battery_voltage<R: Rng>(rng: &mut R, hour: u32, day_offset: u32) -> f64 {
    // ---
    let mut voltage = 4.0 - 0.05 * f64::from(day_offset);
    if (8..=18).contains(&hour) {
        voltage += rng.gen_range(0.1..0.2_f64);
    } else {
        voltage -= 0.02;
    }
    round_to(voltage.clamp(BATTERY_RANGE.0, BATTERY_RANGE.1), 2)
}

/// Received signal strength in dBm, between -80 and -60.
pub fn rssi<R: Rng>(rng: &mut R) -> i32 {
    // ---
    (-60.0 - rng.gen_range(0.0..20.0_f64)).round() as i32
}

pub fn flat_temperature<R: Rng>(rng: &mut R) -> f64 {
    round_to(15.0 + rng.gen_range(-1.0..1.0_f64), 1)
}

pub fn flat_humidity<R: Rng>(rng: &mut R) -> f64 {
    round_to(60.0 + rng.gen_range(-5.0..5.0_f64), 1)
}

/// Background PM2.5 used by both the rural and flat profiles.
pub fn flat_pm25<R: Rng>(rng: &mut R) -> i32 {
    (10.0 + rng.gen_range(0.0..5.0_f64)).round() as i32
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn mean(values: impl Iterator<Item = f64>) -> f64 {
        let values: Vec<f64> = values.collect();
        values.iter().sum::<f64>() / values.len() as f64
    }

    #[test]
    fn test_temperature_coldest_before_dawn() {
        // ---
        let mut rng = rng();
        let avg = mean((0..100).map(|_| diurnal_temperature(&mut rng, 4.0, DEFAULT_BASE_TEMP)));

        // base 12 with a 7 degree swing puts 04:00 near 5.9
        assert!(avg > 2.0 && avg < 8.0, "avg at 04:00 was {avg}");
    }

    #[test]
    fn test_temperature_warmest_mid_afternoon() {
        // ---
        let mut rng = rng();
        let avg = mean((0..100).map(|_| diurnal_temperature(&mut rng, 14.0, DEFAULT_BASE_TEMP)));

        assert!(avg > 16.0 && avg < 22.0, "avg at 14:00 was {avg}");
    }

    #[test]
    fn test_afternoon_warmer_than_early_morning() {
        // ---
        let mut rng = rng();
        let at = |rng: &mut StdRng, hour: f64| {
            mean((0..100).map(|_| diurnal_temperature(rng, hour, DEFAULT_BASE_TEMP)))
        };

        let four = at(&mut rng, 4.0);
        let six = at(&mut rng, 6.0);
        let fourteen = at(&mut rng, 14.0);

        assert!(four < fourteen);
        assert!(fourteen > six);
    }

    #[test]
    fn test_humidity_falls_as_temperature_rises() {
        // ---
        let mut rng = rng();
        let cold = mean((0..50).map(|_| inverse_humidity(&mut rng, 5.0)));
        let warm = mean((0..50).map(|_| inverse_humidity(&mut rng, 20.0)));

        assert!(cold > warm);
    }

    #[test]
    fn test_humidity_stays_in_range() {
        // ---
        let mut rng = rng();
        for temp in (-40..=60).map(f64::from) {
            let h = inverse_humidity(&mut rng, temp);
            assert!((30.0..=95.0).contains(&h), "humidity {h} at {temp}C");
        }
    }

    #[test]
    fn test_pm25_rush_hours_exceed_quiet_hours() {
        // ---
        let mut rng = rng();
        let at = |rng: &mut StdRng, hour: u32| {
            mean((0..100).map(|_| f64::from(urban_pm25(rng, hour, DEFAULT_BASE_PM25))))
        };

        assert!(at(&mut rng, 8) > at(&mut rng, 2));
        assert!(at(&mut rng, 18) > at(&mut rng, 12));
    }

    #[test]
    fn test_pm25_has_a_floor() {
        // ---
        let mut rng = rng();
        for hour in 0..24 {
            for _ in 0..50 {
                assert!(urban_pm25(&mut rng, hour, 0.0) >= 5);
            }
        }
    }

    #[test]
    fn test_pm10_never_below_pm25() {
        // ---
        let mut rng = rng();
        for hour in 0..24 {
            for _ in 0..50 {
                let fine = urban_pm25(&mut rng, hour, DEFAULT_BASE_PM25);
                assert!(pm10(&mut rng, fine) >= fine);
            }
        }
    }

    #[test]
    fn test_pressure_walk_stays_bounded() {
        // ---
        let mut rng = rng();
        let mut prev = None;
        for _ in 0..5_000 {
            let p = pressure(&mut rng, prev);
            assert!((990.0..=1040.0).contains(&p));
            prev = Some(p);
        }

        // predecessors at or beyond the bounds are pulled back in
        for edge in [990.0, 1040.0, 1200.0, 0.0] {
            let p = pressure(&mut rng, Some(edge));
            assert!((990.0..=1040.0).contains(&p), "{p} from {edge}");
        }
    }

    #[test]
    fn test_pressure_steps_are_small() {
        // ---
        let mut rng = rng();
        let first = pressure(&mut rng, None);
        assert!((first - 1013.0).abs() <= 1.05);

        let next = pressure(&mut rng, Some(first));
        assert!((next - first).abs() <= 1.05);
    }

    #[test]
    fn test_wind_speed_in_range() {
        // ---
        let mut rng = rng();
        for _ in 0..1_000 {
            let s = wind_speed(&mut rng);
            assert!((0.0..=15.0).contains(&s));
        }
    }

    #[test]
    fn test_wind_direction_wraps() {
        // ---
        let mut rng = rng();
        let mut prev = None;
        for _ in 0..1_000 {
            let d = wind_direction(&mut rng, prev);
            assert!((0..360).contains(&d));
            prev = Some(d);
        }

        for edge in [0, 1, 358, 359] {
            for _ in 0..100 {
                let d = wind_direction(&mut rng, Some(edge));
                assert!((0..360).contains(&d), "{d} from {edge}");
            }
        }
    }

    #[test]
    fn test_battery_voltage_in_range_for_a_week() {
        // ---
        let mut rng = rng();
        for hour in 0..24 {
            for day in 0..7 {
                let v = battery_voltage(&mut rng, hour, day);
                assert!((3.2..=4.2).contains(&v), "{v}V at hour {hour} day {day}");
            }
        }

        // a long run drains down to the floor, never below it
        assert_eq!(battery_voltage(&mut rng, 2, 60), 3.2);
    }

    #[test]
    fn test_battery_charges_during_daylight() {
        // ---
        let mut rng = rng();
        assert!(battery_voltage(&mut rng, 12, 0) > battery_voltage(&mut rng, 2, 0));
    }

    #[test]
    fn test_rssi_in_typical_range() {
        // ---
        let mut rng = rng();
        for _ in 0..1_000 {
            let r = rssi(&mut rng);
            assert!((-80..=-60).contains(&r));
        }
    }

    #[test]
    fn test_round_to() {
        // ---
        assert_eq!(round_to(12.345, 1), 12.3);
        assert_eq!(round_to(3.996, 2), 4.0);
        assert_eq!(round_to(-0.06, 1), -0.1);
    }
}
