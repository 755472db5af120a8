//! Parameters for the simulated vehicle, controller and lidar

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SimParams {
    pub vehicle: VehicleParams,

    pub follower: FollowerParams,

    pub lidar: LidarParams,

    /// Obstacles in the world
    #[serde(default)]
    pub obstacles: Vec<BoxObstacle>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleParams {
    /// Starting position of the vehicle.
    ///
    /// Units: meters,
    /// Frame: World
    pub start_position_m: [f64; 3],

    /// Starting heading, anticlockwise from +X.
    ///
    /// Units: radians
    pub start_heading_rad: f64,

    /// Speed reached at full throttle.
    ///
    /// Units: meters/second
    pub max_speed_ms: f64,

    /// Units: meters/second^2
    pub max_accel_mss: f64,

    /// Deceleration at full brake.
    ///
    /// Units: meters/second^2
    pub max_decel_mss: f64,

    /// Yaw rate at full steering.
    ///
    /// Units: radians/second
    pub max_yaw_rate_rads: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowerParams {
    /// Distance ahead of the vehicle at which the target waypoint is chosen.
    ///
    /// Units: meters
    pub lookahead_m: f64,

    /// Throttle used when the target is roughly ahead
    pub cruise_throttle: f64,

    /// Heading error which gives full steering.
    ///
    /// Units: radians
    pub full_steer_error_rad: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LidarParams {
    /// Height of the lidar above the vehicle origin.
    ///
    /// Units: meters
    pub mount_height_m: f64,

    /// Units: meters
    pub max_range_m: f64,

    /// Number of beams spread evenly around each ring
    pub num_azimuth_beams: usize,

    /// Elevation of each ring of beams, positive up.
    ///
    /// Units: radians
    pub elevations_rad: Vec<f64>,
}

/// An axis aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BoxObstacle {
    /// Units: meters,
    /// Frame: World
    pub min_m: [f64; 3],

    /// Units: meters,
    /// Frame: World
    pub max_m: [f64; 3],
}
