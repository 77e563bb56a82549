// src/tuning.rs - Operator-adjustable control parameters
use std::sync::{Arc, RwLock};

use serde::Serialize;
use thiserror::Error;

/// A rejected parameter write. The previous value is kept.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {name}: {value} ({reason})")]
pub struct InvalidParameter {
    pub name: &'static str,
    pub value: f64,
    pub reason: &'static str,
}

fn positive_finite(name: &'static str, value: f64) -> Result<f64, InvalidParameter> {
    if !value.is_finite() {
        return Err(InvalidParameter { name, value, reason: "must be finite" });
    }
    if value <= 0.0 {
        return Err(InvalidParameter { name, value, reason: "must be greater than zero" });
    }
    Ok(value)
}

/// Consistent snapshot of every tunable, taken once per tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tuning {
    pub target_temperature: Option<f64>,
    pub tolerance: f64,
    /// Seconds of heating per degree of rise.
    pub heating_rate: f64,
    /// Seconds of passive cooling per degree of fall.
    pub cooling_rate: f64,
}

impl Tuning {
    /// Build a validated tuning set, e.g. from the config file.
    pub fn new(
        target_temperature: Option<f64>,
        tolerance: f64,
        heating_rate: f64,
        cooling_rate: f64,
    ) -> Result<Self, InvalidParameter> {
        if let Some(target) = target_temperature {
            if !target.is_finite() {
                return Err(InvalidParameter { name: "target temperature", value: target, reason: "must be finite" });
            }
        }
        Ok(Self {
            target_temperature,
            tolerance: positive_finite("tolerance", tolerance)?,
            heating_rate: positive_finite("heating rate", heating_rate)?,
            cooling_rate: positive_finite("cooling rate", cooling_rate)?,
        })
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            target_temperature: None,
            tolerance: 0.5,
            heating_rate: 100.0,
            cooling_rate: 600.0,
        }
    }
}

/// Shared, validated tuning values behind a single lock, so readers never
/// see half of a multi-field update.
#[derive(Debug, Clone, Default)]
pub struct TuningStore {
    inner: Arc<RwLock<Tuning>>,
}

impl TuningStore {
    pub fn new(initial: Tuning) -> Self {
        Self { inner: Arc::new(RwLock::new(initial)) }
    }

    pub fn snapshot(&self) -> Tuning {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut Tuning)) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard);
    }

    pub fn set_tolerance(&self, value: f64) -> Result<(), InvalidParameter> {
        let value = positive_finite("tolerance", value)?;
        self.update(|t| t.tolerance = value);
        Ok(())
    }

    pub fn set_heating_rate(&self, value: f64) -> Result<(), InvalidParameter> {
        let value = positive_finite("heating rate", value)?;
        self.update(|t| t.heating_rate = value);
        Ok(())
    }

    pub fn set_cooling_rate(&self, value: f64) -> Result<(), InvalidParameter> {
        let value = positive_finite("cooling rate", value)?;
        self.update(|t| t.cooling_rate = value);
        Ok(())
    }

    /// Only the controller writes the target, since it also drives the state machine.
    pub(crate) fn set_target(&self, value: Option<f64>) -> Result<(), InvalidParameter> {
        if let Some(target) = value {
            if !target.is_finite() {
                return Err(InvalidParameter { name: "target temperature", value: target, reason: "must be finite" });
            }
        }
        self.update(|t| t.target_temperature = value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_round_trip() {
        let store = TuningStore::default();
        store.set_tolerance(0.25).unwrap();
        store.set_heating_rate(80.0).unwrap();
        store.set_cooling_rate(900.0).unwrap();
        let t = store.snapshot();
        assert_eq!(t.tolerance, 0.25);
        assert_eq!(t.heating_rate, 80.0);
        assert_eq!(t.cooling_rate, 900.0);
    }

    #[test]
    fn test_rejects_non_positive_and_keeps_prior_value() {
        let store = TuningStore::default();
        let err = store.set_tolerance(-1.0).unwrap_err();
        assert_eq!(err.name, "tolerance");
        assert!(store.set_tolerance(0.0).is_err());
        assert!(store.set_heating_rate(f64::NAN).is_err());
        assert!(store.set_cooling_rate(f64::INFINITY).is_err());
        assert_eq!(store.snapshot(), Tuning::default());
    }

    #[test]
    fn test_target_must_be_finite() {
        let store = TuningStore::default();
        assert!(store.set_target(Some(f64::NAN)).is_err());
        store.set_target(Some(22.0)).unwrap();
        assert_eq!(store.snapshot().target_temperature, Some(22.0));
        store.set_target(None).unwrap();
        assert_eq!(store.snapshot().target_temperature, None);
    }

    #[test]
    fn test_validated_constructor() {
        assert!(Tuning::new(Some(22.0), 0.5, 100.0, 600.0).is_ok());
        assert!(Tuning::new(None, -0.5, 100.0, 600.0).is_err());
        assert!(Tuning::new(Some(f64::INFINITY), 0.5, 100.0, 600.0).is_err());
    }

    #[test]
    fn test_clones_share_values() {
        let store = TuningStore::default();
        let other = store.clone();
        other.set_tolerance(1.5).unwrap();
        assert_eq!(store.snapshot().tolerance, 1.5);
    }
}
