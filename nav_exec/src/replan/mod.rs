//! # Replan Manager
//!
//! Keeps the occupancy grid up to date with the range sensor and replans the path to the goal
//! at a fixed cadence. A failed replan is not an error: the manager warns and the previously
//! planned path stays in force.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod params;
mod state;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use crate::{geom::Pose, map::GridError};

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use params::ReplanParams;
pub use state::{InputData as ReplanInput, PlanOutcome, PointCloud, ReplanMgr, StatusReport};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Possible errors that can occur during ReplanMgr operation.
#[derive(Debug, thiserror::Error)]
pub enum ReplanError {
    #[error("Could not load the replan parameters: {0}")]
    ParamLoadError(#[from] util::params::LoadError),

    #[error("Could not build the occupancy grid: {0}")]
    GridError(#[from] GridError),

    #[error("The replan period must be at least one tick")]
    InvalidReplanPeriod,

    #[error("Received a pose with a non-finite position: {0:?}")]
    NonFinitePose(Pose),
}
