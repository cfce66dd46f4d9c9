//! Motion calibration.
//!
//! `move` and `turn` are open-loop: the runner drives the motors at a fixed
//! power for a computed time. How far the robot gets at that power is a
//! property of the individual robot, so the constants come from config.

use crate::program::{MoveDirection, TurnDirection};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Invalid calibration values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MotionError {
    #[error("`{field}` must be a finite number greater than zero")]
    NotPositive { field: &'static str },

    #[error("`{field}` must lie in [0, 1]")]
    OutOfRange { field: &'static str },
}

/// Calibration constants.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionProfile {
    /// Motor power (0..=1) used for straight moves.
    pub motor_power: f64,
    /// Speed in cm/s reached at `motor_power`.
    pub motor_speed: f64,
    /// Motor power (0..=1) used for turns.
    pub turn_power: f64,
    /// Seconds for a 90 degree turn at `turn_power`.
    pub turn_time: f64,
}

impl Default for MotionProfile {
    fn default() -> Self {
        Self {
            motor_power: 0.8,
            motor_speed: 17.0,
            turn_power: 0.5,
            turn_time: 1.8,
        }
    }
}

/// Motor command plus how long to hold it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Maneuver {
    pub x: f64,
    pub y: f64,
    pub duration: Duration,
}

impl MotionProfile {
    /// Check the constants.
    pub fn validate(&self) -> Result<(), MotionError> {
        positive("motor_speed", self.motor_speed)?;
        positive("turn_time", self.turn_time)?;
        unit("motor_power", self.motor_power)?;
        unit("turn_power", self.turn_power)?;
        Ok(())
    }

    /// Straight drive over `distance` cm.
    pub fn drive(
        &self,
        direction: MoveDirection,
        distance: f64,
    ) -> Maneuver {
        let y = match direction {
            MoveDirection::Forward => self.motor_power,
            MoveDirection::Backward => -self.motor_power,
        };
        Maneuver {
            x: 0.0,
            y,
            duration: seconds(distance / self.motor_speed),
        }
    }

    /// Turn on the spot by `degrees`. Left is negative x.
    pub fn turn(
        &self,
        direction: TurnDirection,
        degrees: f64,
    ) -> Maneuver {
        let x = match direction {
            TurnDirection::Left => -self.turn_power,
            TurnDirection::Right => self.turn_power,
        };
        Maneuver {
            x,
            y: 0.0,
            duration: seconds(degrees / 90.0 * self.turn_time),
        }
    }
}

/// Clamp to a valid duration; negative and NaN become zero.
pub(crate) fn seconds(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

fn positive(
    field: &'static str,
    value: f64,
) -> Result<(), MotionError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(MotionError::NotPositive { field })
    }
}

fn unit(
    field: &'static str,
    value: f64,
) -> Result<(), MotionError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(MotionError::OutOfRange { field })
    }
}
