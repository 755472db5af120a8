//! Implementations for the ReplanMgr state structure

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::path::PathBuf;

use log::{debug, info, warn};
use nalgebra::{Point2, Vector3};
use serde::Serialize;

use super::{ReplanError, ReplanParams};
use crate::{
    geom::Pose,
    map::{CellIndex, OccupancyGrid},
    nav::{PathPlanner, PlanError},
};
use util::{module::State, params, session::Session};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Replan manager module state.
///
/// Owns the occupancy grid and the planner. On every replan tick the latest point cloud is
/// inserted into the grid and a new path is planned from the vehicle's current cell to the goal
/// cell.
pub struct ReplanMgr {
    params: ReplanParams,

    grid: OccupancyGrid,

    planner: PathPlanner,

    goal_index: CellIndex,

    /// The last successfully planned path in world coordinates
    last_path: Option<Vec<Point2<f64>>>,

    report: StatusReport,

    num_replans: u64,

    num_successful_replans: u64,
}

/// Input data to the replan manager.
#[derive(Debug, Clone)]
pub struct InputData {
    /// Tick number, counted from 1
    pub tick: u64,

    /// Current vehicle pose
    pub pose: Pose,

    /// The latest point cloud, if one was captured this tick
    pub point_cloud: Option<PointCloud>,
}

/// Status report for replan manager processing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// True if this was a replan tick
    pub replanned: bool,

    /// True if a point cloud was inserted into the grid
    pub grid_updated: bool,

    /// Outcome of the planner, if it was run
    pub plan_outcome: Option<PlanOutcome>,

    /// Number of cells newly marked occupied by this tick's point cloud
    pub num_newly_occupied: usize,

    /// Number of waypoints in the path output this tick, zero if there was none
    pub path_len: usize,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A set of points from the range sensor.
#[derive(Debug, Clone, PartialEq)]
pub enum PointCloud {
    /// Points in the sensor frame, which must be transformed by the vehicle pose
    Local(Vec<Vector3<f64>>),

    /// Points already registered into the world frame
    Registered(Vec<Vector3<f64>>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PlanOutcome {
    Found {
        num_cells: usize,
        cost_cells: f64,
        num_expanded: usize,
    },
    Failed(PlanError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ReplanMgr {
    /// Create a new manager, building an empty grid from the parameters.
    pub fn new(params: ReplanParams) -> Result<Self, ReplanError> {
        if params.replan_period_ticks == 0 {
            return Err(ReplanError::InvalidReplanPeriod);
        }

        let grid = OccupancyGrid::from_params(&params.grid)?;
        let planner = PathPlanner::new(params.planner.clone());
        let goal_index = grid.coordinate_to_index(params.goal_m[0], params.goal_m[1]);

        if !grid.in_bounds(goal_index) {
            warn!(
                "Goal ({}, {}) maps to cell {} which is outside the grid, planning will fail",
                params.goal_m[0], params.goal_m[1], goal_index
            );
        }

        info!(
            "ReplanMgr ready: goal {} ({}, {}), replanning every {} ticks",
            goal_index, params.goal_m[0], params.goal_m[1], params.replan_period_ticks
        );

        Ok(Self {
            params,
            grid,
            planner,
            goal_index,
            last_path: None,
            report: StatusReport::default(),
            num_replans: 0,
            num_successful_replans: 0,
        })
    }

    /// True if the grid should be updated and the path replanned on this (1-based) tick.
    pub fn is_replan_tick(&self, tick: u64) -> bool {
        tick > 0 && tick % self.params.replan_period_ticks == 0
    }

    pub fn params(&self) -> &ReplanParams {
        &self.params
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn goal_index(&self) -> CellIndex {
        self.goal_index
    }

    pub fn goal_m(&self) -> Point2<f64> {
        Point2::new(self.params.goal_m[0], self.params.goal_m[1])
    }

    /// Planar distance from the pose to the goal.
    pub fn dist_to_goal_m(&self, pose: &Pose) -> f64 {
        nalgebra::distance(&pose.position_2d(), &self.goal_m())
    }

    /// True if the pose is within the goal tolerance.
    pub fn goal_reached(&self, pose: &Pose) -> bool {
        self.dist_to_goal_m(pose) <= self.params.goal_tolerance_m
    }

    /// The last successfully planned path, which stays in place when later replans fail.
    pub fn last_path(&self) -> Option<&Vec<Point2<f64>>> {
        self.last_path.as_ref()
    }

    pub fn num_replans(&self) -> u64 {
        self.num_replans
    }

    pub fn num_successful_replans(&self) -> u64 {
        self.num_successful_replans
    }

    /// Insert a point cloud into the grid in whichever frame it was given.
    fn update_grid(&mut self, pose: &Pose, cloud: &PointCloud) {
        let insert_report = match cloud {
            PointCloud::Local(points) => self.grid.insert_points_local(pose, points),
            PointCloud::Registered(points) => self.grid.insert_points_world(points),
        };

        debug!(
            "Grid updated: {} points, {} newly occupied, {} occupied in total",
            insert_report.num_points,
            insert_report.num_newly_occupied,
            self.grid.num_occupied()
        );

        self.report.grid_updated = true;
        self.report.num_newly_occupied = insert_report.num_newly_occupied;
    }

    /// Plan from the pose to the goal, returning the new path in world coordinates if the
    /// planner succeeded.
    fn replan(&mut self, pose: &Pose) -> Option<Vec<Point2<f64>>> {
        let position = pose.position_2d();
        let start = self.grid.coordinate_to_index(position.x, position.y);

        self.num_replans += 1;

        match self.planner.plan(&self.grid, start, self.goal_index) {
            Ok(path) => {
                self.num_successful_replans += 1;
                self.report.plan_outcome = Some(PlanOutcome::Found {
                    num_cells: path.len(),
                    cost_cells: path.cost_cells,
                    num_expanded: path.num_expanded,
                });

                let points = path.world_points(&self.grid);
                self.last_path = Some(points.clone());
                self.report.path_len = points.len();

                Some(points)
            }
            Err(e) => {
                warn!("Replan from {} failed, keeping previous path: {}", start, e);
                self.report.plan_outcome = Some(PlanOutcome::Failed(e));

                None
            }
        }
    }
}

impl Default for ReplanMgr {
    /// An uninitialised manager with a single cell grid. Call [`State::init`] before use.
    fn default() -> Self {
        let params = ReplanParams::default();

        Self {
            grid: OccupancyGrid::new(params.grid.height_thresh_m),
            planner: PathPlanner::new(params.planner.clone()),
            params,
            goal_index: CellIndex::default(),
            last_path: None,
            report: StatusReport::default(),
            num_replans: 0,
            num_successful_replans: 0,
        }
    }
}

impl State for ReplanMgr {
    type InitData = PathBuf;
    type InitError = ReplanError;

    type InputData = InputData;
    type OutputData = Option<Vec<Point2<f64>>>;
    type StatusReport = StatusReport;
    type ProcError = ReplanError;

    /// Initialise the ReplanMgr module.
    ///
    /// Expected init data is the path to the parameter file.
    fn init(&mut self, init_data: Self::InitData, _session: &Session) -> Result<(), Self::InitError> {
        let params: ReplanParams = params::load_path(&init_data)?;

        *self = Self::new(params)?;

        Ok(())
    }

    /// Perform cyclic processing of the replan manager.
    ///
    /// Outputs a new desired path only on replan ticks where the planner succeeded. In every
    /// other case the output is `None` and the previous path should be kept.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        self.report = StatusReport::default();

        if !self.is_replan_tick(input_data.tick) {
            return Ok((None, self.report.clone()));
        }

        let pose = &input_data.pose;
        let p = &pose.position_m;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return Err(ReplanError::NonFinitePose(*pose));
        }

        self.report.replanned = true;

        if let Some(ref cloud) = input_data.point_cloud {
            self.update_grid(pose, cloud);
        }

        let output = self.replan(pose);

        Ok((output, self.report.clone()))
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
