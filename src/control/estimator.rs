// src/control/estimator.rs - Linear overshoot estimate

/// Heater gain in °C/s for a heating rate given in seconds per °C.
pub fn gain_from_heating_rate(heating_rate_sec_per_degree: f64) -> f64 {
    1.0 / heating_rate_sec_per_degree
}

/// Temperature the enclosure is expected to coast to if the heater were
/// switched off now: it keeps rising at `gain` for `inertia_duration` seconds.
pub fn predict(current_temp: f64, gain: f64, inertia_duration: f64) -> f64 {
    current_temp + gain * inertia_duration
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_gain_is_inverse_rate() {
        assert!(approx(gain_from_heating_rate(100.0), 0.01));
        assert!(approx(gain_from_heating_rate(0.5), 2.0));
    }

    #[test]
    fn test_predict_reference_values() {
        assert!(approx(predict(19.0, 0.01, 200.0), 21.0));
        assert!(approx(predict(20.6, 0.01, 200.0), 22.6));
    }

    #[test]
    fn test_zero_inertia_predicts_current() {
        assert_eq!(predict(21.3, 0.05, 0.0), 21.3);
    }

    #[test]
    fn test_prediction_grows_with_inertia() {
        let short = predict(20.0, 0.01, 100.0);
        let long = predict(20.0, 0.01, 300.0);
        assert!(long > short);
    }
}
