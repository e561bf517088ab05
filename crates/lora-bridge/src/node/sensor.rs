// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Sensor sources
//!
//! Values are reported as read. Range checking belongs downstream of the
//! broker, not on the node.

/// One raw sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Temperature in °C
    pub temperature: f64,
    /// Vibration magnitude in g
    pub vibration: f64,
    /// Rotational speed in rpm
    pub rpm: u32,
}

/// Something the node can read telemetry from
pub trait Sensor {
    /// Take one sample
    fn sample(&mut self) -> SensorSample;
}

impl<F> Sensor for F
where
    F: FnMut() -> SensorSample,
{
    fn sample(&mut self) -> SensorSample {
        self()
    }
}

/// Pseudo-random telemetry around a fixed operating point
///
/// Seeded, so a given seed always yields the same sequence.
pub struct SimulatedSensor {
    rng: fastrand::Rng,
    base_temperature: f64,
    base_rpm: u32,
}

impl SimulatedSensor {
    /// Lathe-like operating point (~65 °C, 3200 rpm)
    pub fn new(seed: u64) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            base_temperature: 65.0,
            base_rpm: 3200,
        }
    }

    /// Override the operating point
    pub fn with_baseline(mut self, temperature: f64, rpm: u32) -> Self {
        self.base_temperature = temperature;
        self.base_rpm = rpm;
        self
    }
}

impl Sensor for SimulatedSensor {
    fn sample(&mut self) -> SensorSample {
        // +/- 2 °C, 5-25 mg, +/- 50 rpm
        let temperature = self.base_temperature + (self.rng.f64() - 0.5) * 4.0;
        let vibration = 0.005 + self.rng.f64() * 0.02;
        let rpm = self
            .base_rpm
            .saturating_sub(50)
            .saturating_add(self.rng.u32(0..=100));
        SensorSample {
            temperature,
            vibration,
            rpm,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_sensor_is_reproducible() {
        let mut a = SimulatedSensor::new(7);
        let mut b = SimulatedSensor::new(7);
        for _ in 0..10 {
            assert_eq!(a.sample(), b.sample());
        }
    }

    #[test]
    fn test_simulated_sensor_stays_near_baseline() {
        let mut sensor = SimulatedSensor::new(1).with_baseline(40.0, 1000);
        for _ in 0..100 {
            let s = sensor.sample();
            assert!((38.0..=42.0).contains(&s.temperature));
            assert!((0.005..=0.025).contains(&s.vibration));
            assert!((950..=1050).contains(&s.rpm));
        }
    }

    #[test]
    fn test_simulated_sensor_saturates_at_rpm_limit() {
        let mut sensor = SimulatedSensor::new(3).with_baseline(20.0, u32::MAX - 10);
        for _ in 0..100 {
            assert!(sensor.sample().rpm >= u32::MAX - 60);
        }
    }

    #[test]
    fn test_closure_sensor() {
        let mut calls = 0;
        let mut sensor = || {
            calls += 1;
            SensorSample {
                temperature: 20.0,
                vibration: 0.0,
                rpm: 0,
            }
        };
        assert_eq!(Sensor::sample(&mut sensor).temperature, 20.0);
        drop(sensor);
        assert_eq!(calls, 1);
    }
}
