//! The calibration loop
//!
//! Walks the offered load upward from `initial` in steps of `increment`,
//! running one trial per level, until a trial exceeds the CPU threshold or
//! the next step would pass `max`. No level is probed twice and there is no
//! refinement below `increment`.

use crate::error::{CalibrationError, Result};
use crate::models::{CalibrationResult, TrialOutcome};
use crate::shutdown::Shutdown;
use crate::trial::{TrialRunner, TrialTarget};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Load levels to walk through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRamp {
    pub initial: u32,
    pub max: u32,
    pub increment: u32,
}

impl LoadRamp {
    pub fn new(initial: u32, max: u32, increment: u32) -> Result<Self> {
        if increment == 0 {
            return Err(CalibrationError::InvalidRamp(
                "increment must be greater than zero".to_string(),
            ));
        }
        if initial > max {
            return Err(CalibrationError::InvalidRamp(format!(
                "initial load {} exceeds max load {}",
                initial, max
            )));
        }
        Ok(Self {
            initial,
            max,
            increment,
        })
    }

    /// Upper bound on the number of trials for this ramp
    pub fn max_trials(&self) -> u32 {
        (self.max - self.initial) / self.increment + 1
    }
}

/// State of the calibration loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationState {
    Probing(u32),
    Reached { load: u32, mean_cpu: f64 },
    Exhausted { final_load: u32, mean_cpu: f64 },
}

impl CalibrationState {
    pub fn start(ramp: &LoadRamp) -> Self {
        Self::Probing(ramp.initial)
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Probing(_))
    }

    /// Apply the outcome of the trial run at the current probing level
    pub fn advance(self, ramp: &LoadRamp, outcome: &TrialOutcome) -> Self {
        let Self::Probing(load) = self else {
            return self;
        };

        if outcome.exceeded {
            return Self::Reached {
                load,
                mean_cpu: outcome.mean_cpu,
            };
        }

        match load.checked_add(ramp.increment) {
            Some(next) if next <= ramp.max => Self::Probing(next),
            // Reported one step past the last tried load, as result files always have
            _ => Self::Exhausted {
                final_load: load.saturating_add(ramp.increment),
                mean_cpu: outcome.mean_cpu,
            },
        }
    }
}

/// Run the calibration loop for one target
///
/// Any trial error ends the loop and is returned unchanged.
pub async fn calibrate<R>(
    runner: &R,
    target: &TrialTarget,
    ramp: &LoadRamp,
    shutdown: &Shutdown,
) -> Result<CalibrationResult>
where
    R: TrialRunner + ?Sized,
{
    let mut state = CalibrationState::start(ramp);
    let mut probed_loads = Vec::new();

    loop {
        match state {
            CalibrationState::Probing(load) => {
                if shutdown.is_triggered() {
                    return Err(CalibrationError::Cancelled);
                }

                let outcome = runner.run_trial(target, load).await?;
                probed_loads.push(load);
                state = state.advance(ramp, &outcome);
                debug!(load = load, exceeded = outcome.exceeded, next = ?state, "Trial evaluated");
            }
            CalibrationState::Reached { load, mean_cpu } => {
                return Ok(CalibrationResult {
                    reached_target: true,
                    final_load: load,
                    avg_cpu_usage: mean_cpu,
                    probed_loads,
                });
            }
            CalibrationState::Exhausted {
                final_load,
                mean_cpu,
            } => {
                return Ok(CalibrationResult {
                    reached_target: false,
                    final_load,
                    avg_cpu_usage: mean_cpu,
                    probed_loads,
                });
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Trial runner returning scripted outcomes per load level
    #[derive(Default)]
    pub struct ScriptedRunner {
        /// load -> (exceeded, mean_cpu); unscripted loads are (false, 0.0)
        pub outcomes: HashMap<u32, (bool, f64)>,
        /// Container ids for which every trial fails
        pub failing: Vec<String>,
        pub calls: Mutex<Vec<u32>>,
    }

    impl ScriptedRunner {
        pub fn with(mut self, load: u32, exceeded: bool, mean_cpu: f64) -> Self {
            self.outcomes.insert(load, (exceeded, mean_cpu));
            self
        }

        pub fn failing_for(mut self, container_id: &str) -> Self {
            self.failing.push(container_id.to_string());
            self
        }

        pub fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TrialRunner for ScriptedRunner {
        async fn run_trial(&self, target: &TrialTarget, load: u32) -> Result<TrialOutcome> {
            self.calls.lock().unwrap().push(load);
            if self.failing.contains(&target.container_id) {
                return Err(CalibrationError::ContainerNotFound(
                    target.container_id.clone(),
                ));
            }
            let (exceeded, mean_cpu) = self.outcomes.get(&load).copied().unwrap_or((false, 0.0));
            Ok(TrialOutcome {
                load,
                exceeded,
                mean_cpu,
                samples: Vec::new(),
            })
        }
    }
}
