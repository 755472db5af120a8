//! # Navigation library.
//!
//! Occupancy grid mapping and A* replanning for a ground vehicle. This library allows the
//! executable, benchmarks and other crates in the workspace to access items defined inside the
//! navigation crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Geometry - poses and quaternion rotation between the vehicle and world frames
pub mod geom;

/// Map - the binary occupancy grid built from lidar points
pub mod map;

/// Navigation - A* path planning through the occupancy grid
pub mod nav;

/// Replan manager - updates the grid and replans on a fixed cadence
pub mod replan;

/// Replanning loop - the fixed rate loop driving the vehicle, controller and sensor
pub mod replan_loop;

/// Simulation - simple vehicle, controller and lidar stand-ins
pub mod sim;
