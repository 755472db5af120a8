//! # Navigation
//!
//! This module provides path planning over the [`OccupancyGrid`](crate::map::OccupancyGrid).
//!
//! - [`PathPlanner`] - An 8-connected A* search from the vehicle's cell to the goal cell,
//!   returning the shortest path through free cells or [`PlanError::PathNotFound`].

// ------------------------------------------------------------------------------------------------
// MODS
// ------------------------------------------------------------------------------------------------

mod path_planner;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use path_planner::{DiagonalPolicy, PathPlanner, PathPlannerParams, PlanError, PlannedPath};
