//! Simulated runtime telemetry
//!
//! Values are pure functions of the time elapsed since the entity started,
//! read through a [`Clock`] so tests can pin them.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Source of elapsed time since start-up
pub trait Clock: Send + Sync + fmt::Debug {
    fn elapsed(&self) -> Duration;
}

/// Wall-clock time since construction
#[derive(Debug, Clone)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Manually advanced clock
#[derive(Debug, Default)]
pub struct ManualClock {
    elapsed: Mutex<Duration>,
}

impl ManualClock {
    pub fn new(elapsed: Duration) -> Arc<Self> {
        Arc::new(Self {
            elapsed: Mutex::new(elapsed),
        })
    }

    pub fn set(&self, elapsed: Duration) {
        *self.elapsed.lock() = elapsed;
    }

    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }
}

impl Clock for ManualClock {
    fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

/// One reading of every telemetry channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Telemetry {
    pub operating_hours: u32,
    /// km/h
    pub vehicle_speed: u16,
    pub engine_rpm: u16,
    /// mV
    pub battery_voltage: u16,
    /// 0.1 degC
    pub engine_temperature: i16,
    /// percent
    pub fuel_level: u8,
}

impl Telemetry {
    /// Telemetry after `elapsed`, starting from `base_hours` operating hours
    pub fn at(elapsed: Duration, base_hours: u32) -> Self {
        let t = elapsed.as_secs_f64();
        let wave = |center: f64, amplitude: f64, period: f64| {
            center + amplitude * (t / period).sin()
        };

        let hours = u32::try_from(elapsed.as_secs() / 3600).unwrap_or(u32::MAX);
        let fuel_drop = (elapsed.as_secs() / 60) % 60;

        Self {
            operating_hours: base_hours.saturating_add(hours),
            vehicle_speed: wave(60.0, 40.0, 30.0).round() as u16,
            engine_rpm: wave(2000.0, 1000.0, 20.0).round() as u16,
            battery_voltage: wave(13800.0, 400.0, 45.0).round() as u16,
            engine_temperature: wave(900.0, 50.0, 120.0).round() as i16,
            fuel_level: 80 - fuel_drop as u8,
        }
    }
}
