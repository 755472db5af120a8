//! # Simulation
//!
//! Minimal simulated collaborators for the [`ReplanLoop`](crate::replan_loop::ReplanLoop), so
//! the executable and tests can run without an external simulator:
//!
//! - [`KinematicVehicle`] - unicycle vehicle model
//! - [`WaypointFollower`] - pure pursuit path follower
//! - [`BoxWorldLidar`] - ring lidar in a world of axis aligned boxes

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod follower;
mod lidar;
mod params;
mod vehicle;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use follower::{FollowerError, WaypointFollower};
pub use lidar::BoxWorldLidar;
pub use params::{BoxObstacle, FollowerParams, LidarParams, SimParams, VehicleParams};
pub use vehicle::KinematicVehicle;
