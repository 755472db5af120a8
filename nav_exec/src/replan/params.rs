//! # Replan Manager Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use crate::{map::GridParams, nav::PathPlannerParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReplanParams {
    /// The grid is updated and the path replanned once every this many ticks
    #[serde(default = "default_replan_period_ticks")]
    pub replan_period_ticks: u64,

    /// Fixed goal position in the world frame
    pub goal_m: [f64; 2],

    /// The goal is reached once the vehicle is closer than this to it
    #[serde(default = "default_goal_tolerance_m")]
    pub goal_tolerance_m: f64,

    /// If true point clouds are already in the world frame, otherwise they are in the sensor
    /// frame and are transformed by the vehicle pose
    #[serde(default)]
    pub points_registered: bool,

    pub grid: GridParams,

    #[serde(default)]
    pub planner: PathPlannerParams,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Default for ReplanParams {
    fn default() -> Self {
        Self {
            replan_period_ticks: default_replan_period_ticks(),
            goal_m: [0.0, 0.0],
            goal_tolerance_m: default_goal_tolerance_m(),
            points_registered: false,
            grid: GridParams::default(),
            planner: PathPlannerParams::default(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_replan_period_ticks() -> u64 {
    3
}

fn default_goal_tolerance_m() -> f64 {
    4.0
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
