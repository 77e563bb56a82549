// src/control/transition.rs - The per-tick transition table
//!
//! Rules are checked in priority order and the first match wins:
//!
//! | # | condition                                   | result                                   |
//! |---|---------------------------------------------|------------------------------------------|
//! | 1 | wait > 0                                    | count down, nothing else                 |
//! | 2 | Off, no target (or control stopped)         | idle                                     |
//! | 3 | Off, target set                             | -> InitialHeating                        |
//! | 4 | InitialHeating, predicted <= upper          | heater on                                |
//! | 5 | InitialHeating, predicted > upper           | heater off, -> InertiaWait               |
//! | 6 | InertiaWait, wait <= 0                      | -> Control                               |
//! | 7 | Control, T > target                         | heater off                               |
//! | 8 | Control, lower <= T <= target               | heater on, -> SmallBurst                 |
//! | 9 | Control, T < lower                          | heater on, -> LargeBurst                 |
//! |10 | Small/LargeBurst, wait <= 0                 | heater off, -> InertiaWait               |
//! |11 | anything else                               | anomaly, no change                       |

use super::context::ControllerContext;
use super::estimator::{gain_from_heating_rate, predict};
use super::{Action, ControlState, ControlTiming};

/// Outcome of one evaluation of the transition table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub next_state: ControlState,
    /// `None` leaves the heater as it is.
    pub heater: Option<bool>,
    pub wait_remaining_sec: f64,
    pub action: Action,
    pub upper_threshold: Option<f64>,
    pub lower_threshold: Option<f64>,
    pub predicted_temperature: Option<f64>,
}

impl Decision {
    fn hold(ctx: &ControllerContext, action: Action) -> Self {
        Self {
            next_state: ctx.state,
            heater: None,
            wait_remaining_sec: ctx.wait_remaining_sec,
            action,
            upper_threshold: None,
            lower_threshold: None,
            predicted_temperature: None,
        }
    }

    fn to(mut self, state: ControlState) -> Self {
        self.next_state = state;
        self
    }

    fn heater(mut self, energized: bool) -> Self {
        self.heater = Some(energized);
        self
    }

    fn wait(mut self, secs: f64) -> Self {
        self.wait_remaining_sec = secs;
        self
    }
}

/// Evaluate the transition table for a reading of `temperature`, taken
/// `elapsed_secs` after the previous completed tick. Pure: the caller
/// applies the result.
pub fn decide(
    ctx: &ControllerContext,
    temperature: f64,
    elapsed_secs: f64,
    timing: &ControlTiming,
) -> Decision {
    let thresholds = ctx.thresholds();
    let predicted = ctx.target_temperature.map(|_| {
        predict(
            temperature,
            gain_from_heating_rate(ctx.heating_rate_sec_per_degree),
            timing.inertia_duration,
        )
    });
    let annotate = |mut d: Decision| {
        d.lower_threshold = thresholds.map(|(lower, _)| lower);
        d.upper_threshold = thresholds.map(|(_, upper)| upper);
        d.predicted_temperature = predicted;
        d
    };

    // 1. Pending wait: only the clock moves.
    if ctx.wait_remaining_sec > 0.0 {
        let remaining = (ctx.wait_remaining_sec - elapsed_secs.max(0.0)).max(0.0);
        return annotate(Decision::hold(ctx, Action::Waiting).wait(remaining));
    }

    let (target, lower, upper, predicted_if_off) = match (ctx.state, ctx.target_temperature) {
        // 2. Nothing to do without a target, or while stopped.
        (ControlState::Off, None) => return annotate(Decision::hold(ctx, Action::IdleNoTarget)),
        (ControlState::Off, Some(_)) if !ctx.automatic => {
            return annotate(Decision::hold(ctx, Action::Stopped));
        }
        // 3. Arm.
        (ControlState::Off, Some(_)) => {
            return annotate(Decision::hold(ctx, Action::Armed).to(ControlState::InitialHeating));
        }
        (_, Some(target)) if ctx.automatic => {
            // thresholds and prediction always exist when a target does
            let (lower, upper) = (target - ctx.tolerance, target + ctx.tolerance);
            let predicted_if_off = predicted.unwrap_or(temperature);
            (target, lower, upper, predicted_if_off)
        }
        _ => return annotate(Decision::hold(ctx, Action::Anomaly)),
    };

    let decision = match ctx.state {
        // 4.
        ControlState::InitialHeating if predicted_if_off <= upper => {
            Decision::hold(ctx, Action::Heating).heater(true)
        }
        // 5.
        ControlState::InitialHeating if predicted_if_off > upper => Decision::hold(ctx, Action::Coasting)
            .heater(false)
            .to(ControlState::InertiaWait)
            .wait(timing.inertia_duration),
        // 6.
        ControlState::InertiaWait => Decision::hold(ctx, Action::EnterControl).to(ControlState::Control),
        // 7.
        ControlState::Control if temperature > target => {
            Decision::hold(ctx, Action::AboveTarget).heater(false)
        }
        // 8.
        ControlState::Control if temperature >= lower && temperature <= target => {
            Decision::hold(ctx, Action::SmallBurst)
                .heater(true)
                .to(ControlState::SmallBurst)
                .wait(timing.small_burst_duration)
        }
        // 9.
        ControlState::Control if temperature < lower => Decision::hold(ctx, Action::LargeBurst)
            .heater(true)
            .to(ControlState::LargeBurst)
            .wait(timing.large_burst_duration),
        // 10.
        ControlState::SmallBurst | ControlState::LargeBurst => Decision::hold(ctx, Action::BurstComplete)
            .heater(false)
            .to(ControlState::InertiaWait)
            .wait(timing.inertia_duration),
        // 11. e.g. a NaN reading that fails every comparison
        _ => Decision::hold(ctx, Action::Anomaly),
    };
    annotate(decision)
}
