//! Kinematic (unicycle) vehicle model

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Vector3;

use super::VehicleParams;
use crate::{
    geom::Pose,
    replan_loop::{DrivingCommand, Vehicle},
};
use util::maths::{clamp, wrap_pi};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A vehicle which drives on the XY plane.
///
/// Throttle sets the target speed as a fraction of the maximum, which is approached at the
/// maximum acceleration. Any braking overrides the throttle. Steering sets the yaw rate as a
/// fraction of the maximum.
#[derive(Debug, Clone)]
pub struct KinematicVehicle {
    params: VehicleParams,

    position_m: Vector3<f64>,

    heading_rad: f64,

    speed_ms: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl KinematicVehicle {
    pub fn new(params: VehicleParams) -> Self {
        let p = params.start_position_m;

        Self {
            position_m: Vector3::new(p[0], p[1], p[2]),
            heading_rad: wrap_pi(params.start_heading_rad),
            speed_ms: 0.0,
            params,
        }
    }

    pub fn speed_ms(&self) -> f64 {
        self.speed_ms
    }

    pub fn heading_rad(&self) -> f64 {
        self.heading_rad
    }
}

impl Vehicle for KinematicVehicle {
    fn pose(&self) -> Pose {
        Pose::from_heading(self.position_m, self.heading_rad)
    }

    fn update(&mut self, cmd: &DrivingCommand, dt_s: f64) {
        let throttle = clamp(cmd.throttle, 0.0, 1.0);
        let braking = clamp(cmd.braking, 0.0, 1.0);
        let steering = clamp(cmd.steering, -1.0, 1.0);

        // Speed
        if braking > 0.0 {
            self.speed_ms -= braking * self.params.max_decel_mss * dt_s;
        } else {
            let target_ms = throttle * self.params.max_speed_ms;
            let max_change_ms = self.params.max_accel_mss * dt_s;
            self.speed_ms += clamp(target_ms - self.speed_ms, -max_change_ms, max_change_ms);
        }
        self.speed_ms = clamp(self.speed_ms, 0.0, self.params.max_speed_ms);

        // Heading
        self.heading_rad =
            wrap_pi(self.heading_rad + steering * self.params.max_yaw_rate_rads * dt_s);

        // Position
        self.position_m.x += self.speed_ms * self.heading_rad.cos() * dt_s;
        self.position_m.y += self.speed_ms * self.heading_rad.sin() * dt_s;
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
