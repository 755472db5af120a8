//! Simple pure pursuit path follower

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use nalgebra::Point2;

use super::FollowerParams;
use crate::{
    geom::Pose,
    replan_loop::{DrivingCommand, PathController},
};
use util::maths::{clamp, lin_map, wrap_pi};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Steers towards the first waypoint at least the lookahead distance beyond the closest
/// waypoint to the vehicle.
#[derive(Debug, Clone)]
pub struct WaypointFollower {
    params: FollowerParams,

    path: Vec<Point2<f64>>,

    pose: Option<Pose>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FollowerError {
    #[error("The full steer heading error must be positive and finite, got {0}")]
    InvalidFullSteerError(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl WaypointFollower {
    pub fn new(params: FollowerParams) -> Result<Self, FollowerError> {
        // Used as a divisor when mapping heading error to steering
        if !(params.full_steer_error_rad > 0.0 && params.full_steer_error_rad.is_finite()) {
            return Err(FollowerError::InvalidFullSteerError(
                params.full_steer_error_rad,
            ));
        }

        Ok(Self {
            params,
            path: Vec::new(),
            pose: None,
        })
    }

    pub fn path(&self) -> &[Point2<f64>] {
        &self.path
    }

    /// The waypoint currently being steered towards.
    pub fn target(&self) -> Option<Point2<f64>> {
        let pose = self.pose.as_ref()?;
        let position = pose.position_2d();

        let (closest_idx, _) = self
            .path
            .iter()
            .enumerate()
            .map(|(i, p)| (i, nalgebra::distance_squared(p, &position)))
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;

        self.path[closest_idx..]
            .iter()
            .find(|p| nalgebra::distance(*p, &position) >= self.params.lookahead_m)
            .or_else(|| self.path.last())
            .copied()
    }

    fn stop() -> DrivingCommand {
        DrivingCommand {
            throttle: 0.0,
            steering: 0.0,
            braking: 1.0,
        }
    }
}

impl PathController for WaypointFollower {
    fn set_current_state(&mut self, pose: &Pose) {
        self.pose = Some(*pose);
    }

    fn driving_command(&mut self, _dt_s: f64) -> DrivingCommand {
        let (pose, target) = match (self.pose, self.target()) {
            (Some(pose), Some(target)) => (pose, target),
            _ => return Self::stop(),
        };

        let to_target = target - pose.position_2d();
        if to_target.norm() < 1e-3 {
            return Self::stop();
        }

        let heading_error_rad = wrap_pi(to_target.y.atan2(to_target.x) - pose.heading_rad());

        let full = self.params.full_steer_error_rad;
        let steering = clamp(
            lin_map((-full, full), (-1.0, 1.0), heading_error_rad),
            -1.0,
            1.0,
        );

        // Slow down while turning sharply
        let throttle = if heading_error_rad.abs() < full {
            self.params.cruise_throttle
        } else {
            0.25 * self.params.cruise_throttle
        };

        trace!(
            "Following towards ({:.02}, {:.02}), heading error {:.03} rad",
            target.x,
            target.y,
            heading_error_rad
        );

        DrivingCommand {
            throttle,
            steering,
            braking: 0.0,
        }
    }

    fn set_desired_path(&mut self, path: Vec<Point2<f64>>) {
        self.path = path;
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
