use crate::config::SettingsConfig;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::debug;

pub const PHOTO_COUNT_RANGE: RangeInclusive<u32> = 1..=10;
pub const INTERVAL_SECONDS_RANGE: RangeInclusive<u32> = 1..=10;
pub const EXPOSURE_RANGE: RangeInclusive<f32> = -2.0..=2.0;

/// Capture parameters edited from the settings panel.
///
/// Only `exposure_compensation` reaches the camera; photo count and interval
/// are stored for the panel and not interpreted by the capture flow.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    pub photo_count: u32,
    pub interval_seconds: u32,
    pub exposure_compensation: f32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            photo_count: *PHOTO_COUNT_RANGE.start(),
            interval_seconds: *INTERVAL_SECONDS_RANGE.start(),
            exposure_compensation: 0.0,
        }
    }
}

/// Holds the three bounded capture parameters. Values live for the process
/// lifetime only.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    current: CaptureSettings,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from configured launch values, clamping each into range
    pub fn from_config(config: &SettingsConfig) -> Self {
        let mut store = Self::new();
        store.set_photo_count(config.photo_count);
        store.set_interval_seconds(config.interval_seconds);
        store.set_exposure_compensation(config.exposure_compensation as f32);
        store
    }

    pub fn current(&self) -> CaptureSettings {
        self.current
    }

    pub fn photo_count(&self) -> u32 {
        self.current.photo_count
    }

    pub fn interval_seconds(&self) -> u32 {
        self.current.interval_seconds
    }

    pub fn exposure_compensation(&self) -> f32 {
        self.current.exposure_compensation
    }

    /// Returns the stored (clamped) value
    pub fn set_photo_count(&mut self, value: i64) -> u32 {
        self.current.photo_count = clamp_u32(value, &PHOTO_COUNT_RANGE);
        debug!("Photo count set to {}", self.current.photo_count);
        self.current.photo_count
    }

    pub fn set_interval_seconds(&mut self, value: i64) -> u32 {
        self.current.interval_seconds = clamp_u32(value, &INTERVAL_SECONDS_RANGE);
        debug!("Interval set to {}s", self.current.interval_seconds);
        self.current.interval_seconds
    }

    pub fn set_exposure_compensation(&mut self, value: f32) -> f32 {
        // NaN would slip through clamp unchanged
        let value = if value.is_nan() { 0.0 } else { value };
        self.current.exposure_compensation =
            value.clamp(*EXPOSURE_RANGE.start(), *EXPOSURE_RANGE.end());
        debug!(
            "Exposure compensation set to {:+.1} EV",
            self.current.exposure_compensation
        );
        self.current.exposure_compensation
    }

    pub fn apply(&mut self, update: SettingsUpdate) -> CaptureSettings {
        match update {
            SettingsUpdate::PhotoCount(value) => {
                self.set_photo_count(value);
            }
            SettingsUpdate::IntervalSeconds(value) => {
                self.set_interval_seconds(value);
            }
            SettingsUpdate::ExposureCompensation(value) => {
                self.set_exposure_compensation(value);
            }
        }
        self.current
    }
}

/// A single setter call sent from the settings panel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingsUpdate {
    PhotoCount(i64),
    IntervalSeconds(i64),
    ExposureCompensation(f32),
}

fn clamp_u32(value: i64, range: &RangeInclusive<u32>) -> u32 {
    value.clamp(*range.start() as i64, *range.end() as i64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_clamp_to_range() {
        let mut store = SettingsStore::new();

        assert_eq!(store.set_photo_count(15), 10);
        assert_eq!(store.set_photo_count(0), 1);
        assert_eq!(store.set_interval_seconds(-3), 1);
        assert_eq!(store.set_interval_seconds(7), 7);
        assert_eq!(store.set_exposure_compensation(-5.0), -2.0);
        assert_eq!(store.set_exposure_compensation(2.5), 2.0);
        assert_eq!(store.set_exposure_compensation(0.5), 0.5);
    }

    #[test]
    fn test_nan_exposure_resets_to_neutral() {
        let mut store = SettingsStore::new();
        store.set_exposure_compensation(1.0);
        assert_eq!(store.set_exposure_compensation(f32::NAN), 0.0);
    }

    #[test]
    fn test_from_config_clamps_launch_values() {
        let store = SettingsStore::from_config(&SettingsConfig {
            photo_count: 42,
            interval_seconds: 3,
            exposure_compensation: -9.0,
        });

        assert_eq!(
            store.current(),
            CaptureSettings {
                photo_count: 10,
                interval_seconds: 3,
                exposure_compensation: -2.0,
            }
        );
    }

    #[test]
    fn test_apply_updates_only_the_named_value() {
        let mut store = SettingsStore::new();
        let settings = store.apply(SettingsUpdate::IntervalSeconds(4));

        assert_eq!(settings.interval_seconds, 4);
        assert_eq!(settings.photo_count, 1);
        assert_eq!(settings.exposure_compensation, 0.0);
    }
}
