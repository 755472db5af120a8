//! # Replanning Loop
//!
//! The fixed rate control loop which ties the vehicle, the path following controller, and the
//! range sensor to the [`ReplanMgr`].
//!
//! Each tick:
//! - The controller is given the current pose and asked for a driving command
//! - The vehicle (and its environment) is advanced by one tick period
//! - The distance to the goal is checked
//! - On replan ticks the sensor is scanned and the manager updates the grid and replans. A new
//!   path replaces the controller's desired path, otherwise the old path is kept.
//! - In real time mode the loop sleeps for whatever is left of the tick period
//!
//! The loop is single threaded. The vehicle, controller and sensor are only reached through the
//! [`Vehicle`], [`PathController`] and [`PointCloudSource`] traits so the loop can run against
//! a simulator, real hardware, or test mocks.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, trace, warn};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::{
    geom::Pose,
    replan::{PointCloud, ReplanError, ReplanInput, ReplanMgr},
};
use util::module::State;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// The vehicle being driven, along with whatever environment it moves through.
pub trait Vehicle {
    /// Current pose of the vehicle in the world frame.
    fn pose(&self) -> Pose;

    /// Apply the driving command and advance the vehicle and environment by `dt_s`.
    fn update(&mut self, cmd: &DrivingCommand, dt_s: f64);
}

/// A controller which follows a desired path.
pub trait PathController {
    fn set_current_state(&mut self, pose: &Pose);

    fn driving_command(&mut self, dt_s: f64) -> DrivingCommand;

    /// Replace the desired path wholesale.
    fn set_desired_path(&mut self, path: Vec<Point2<f64>>);
}

/// A range sensor producing point clouds.
pub trait PointCloudSource {
    /// Take a scan from the given pose.
    fn scan(&mut self, pose: &Pose, dt_s: f64) -> PointCloud;
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Driving command produced by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DrivingCommand {
    /// Throttle demand, 0 to 1
    pub throttle: f64,

    /// Steering demand, -1 (full right) to +1 (full left)
    pub steering: f64,

    /// Brake demand, 0 to 1
    pub braking: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoopParams {
    /// Period of one tick
    #[serde(default = "default_tick_period_s")]
    pub tick_period_s: f64,

    /// If true each tick sleeps for the remainder of the tick period
    #[serde(default = "default_real_time")]
    pub real_time: bool,

    #[serde(default)]
    pub termination: Termination,

    /// Stop after this many ticks whether or not the goal has been reached
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

/// Summary of a loop run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoopReport {
    pub num_ticks: u64,
    pub num_replans: u64,
    pub num_successful_replans: u64,
    pub num_overruns: u64,
    pub reached_goal: bool,
    pub final_dist_to_goal_m: f64,
}

pub struct ReplanLoop<V, C, S> {
    params: LoopParams,

    tick_period: Duration,

    mgr: ReplanMgr,

    vehicle: V,

    controller: C,

    sensor: S,

    tick: u64,

    num_overruns: u64,

    reached_goal: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// When the loop should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// Stop once the vehicle is within the goal tolerance
    GoalReached,

    /// Keep going until `max_ticks`, if set
    Indefinite,
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    GoalReached,
    MaxTicksReached,
}

#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    #[error("The tick period must be positive and fit in a Duration, got {0}")]
    InvalidTickPeriod(f64),

    #[error("Replanning failed: {0}")]
    ReplanError(#[from] ReplanError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<V, C, S> ReplanLoop<V, C, S>
where
    V: Vehicle,
    C: PathController,
    S: PointCloudSource,
{
    pub fn new(
        params: LoopParams,
        mgr: ReplanMgr,
        vehicle: V,
        controller: C,
        sensor: S,
    ) -> Result<Self, LoopError> {
        if !(params.tick_period_s > 0.0) {
            return Err(LoopError::InvalidTickPeriod(params.tick_period_s));
        }

        // Also rejects infinite and NaN periods, and those too long for a Duration
        let tick_period = Duration::try_from_secs_f64(params.tick_period_s)
            .map_err(|_| LoopError::InvalidTickPeriod(params.tick_period_s))?;

        Ok(Self {
            tick_period,
            params,
            mgr,
            vehicle,
            controller,
            sensor,
            tick: 0,
            num_overruns: 0,
            reached_goal: false,
        })
    }

    /// Run ticks until the termination condition is met.
    pub fn run(&mut self) -> Result<LoopReport, LoopError> {
        info!(
            "Starting replanning loop at {:.02} Hz ({:?}, max ticks {:?})",
            1.0 / self.params.tick_period_s,
            self.params.termination,
            self.params.max_ticks
        );

        loop {
            match self.step()? {
                StepOutcome::Continue => (),
                StepOutcome::GoalReached => {
                    info!("Goal reached after {} ticks", self.tick);
                    break;
                }
                StepOutcome::MaxTicksReached => {
                    info!("Tick limit of {} reached", self.tick);
                    break;
                }
            }
        }

        let report = self.report();
        info!("Replanning loop finished: {:#?}", report);

        Ok(report)
    }

    /// Run a single tick.
    pub fn step(&mut self) -> Result<StepOutcome, LoopError> {
        let tick_start = Instant::now();
        let dt_s = self.params.tick_period_s;

        self.tick += 1;

        // ---- DRIVE ----

        let pose = self.vehicle.pose();
        self.controller.set_current_state(&pose);
        let cmd = self.controller.driving_command(dt_s);
        self.vehicle.update(&cmd, dt_s);

        let pose = self.vehicle.pose();
        let dist_to_goal_m = self.mgr.dist_to_goal_m(&pose);

        trace!(
            "Tick {}: cmd {:?}, at ({:.02}, {:.02}), {:.02} m to goal",
            self.tick,
            cmd,
            pose.position_m.x,
            pose.position_m.y,
            dist_to_goal_m
        );

        // ---- REPLAN ----

        let point_cloud = if self.mgr.is_replan_tick(self.tick) {
            Some(self.sensor.scan(&pose, dt_s))
        } else {
            None
        };

        let (new_path, status) = self.mgr.proc(&ReplanInput {
            tick: self.tick,
            pose,
            point_cloud,
        })?;

        if let Some(path) = new_path {
            debug!("New path of {} waypoints", path.len());
            self.controller.set_desired_path(path);
        }

        if status.replanned {
            trace!("Replan status: {:?}", status);
        }

        // ---- PACING ----

        if self.params.real_time {
            let elapsed = Instant::now() - tick_start;

            match self.tick_period.checked_sub(elapsed) {
                Some(d) => thread::sleep(d),
                None => {
                    self.num_overruns += 1;
                    warn!(
                        "Tick {} overran by {:.06} s",
                        self.tick,
                        util::time::overrun_seconds(elapsed, self.tick_period).unwrap_or(0.0)
                    );
                }
            }
        }

        // ---- TERMINATION ----

        if self.params.termination == Termination::GoalReached && self.mgr.goal_reached(&pose) {
            self.reached_goal = true;
            return Ok(StepOutcome::GoalReached);
        }

        match self.params.max_ticks {
            Some(max) if self.tick >= max => Ok(StepOutcome::MaxTicksReached),
            _ => Ok(StepOutcome::Continue),
        }
    }

    /// Summary of the loop so far.
    pub fn report(&self) -> LoopReport {
        LoopReport {
            num_ticks: self.tick,
            num_replans: self.mgr.num_replans(),
            num_successful_replans: self.mgr.num_successful_replans(),
            num_overruns: self.num_overruns,
            reached_goal: self.reached_goal,
            final_dist_to_goal_m: self.mgr.dist_to_goal_m(&self.vehicle.pose()),
        }
    }

    pub fn mgr(&self) -> &ReplanMgr {
        &self.mgr
    }

    pub fn vehicle(&self) -> &V {
        &self.vehicle
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }
}

impl Default for Termination {
    fn default() -> Self {
        Termination::GoalReached
    }
}

impl Default for LoopParams {
    fn default() -> Self {
        Self {
            tick_period_s: default_tick_period_s(),
            real_time: default_real_time(),
            termination: Termination::default(),
            max_ticks: None,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_tick_period_s() -> f64 {
    1.0 / 30.0
}

fn default_real_time() -> bool {
    true
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{map::GridParams, replan::ReplanParams};
    use nalgebra::Vector3;

    /// Moves `throttle` meters along +X per tick, ignoring steering.
    struct MockVehicle {
        pose: Pose,
        num_updates: u64,
    }

    #[derive(Default)]
    struct MockController {
        paths: Vec<Vec<Point2<f64>>>,
        num_states: u64,
    }

    /// Returns `clouds[n]` on the n-th scan, then empty clouds.
    #[derive(Default)]
    struct MockSensor {
        clouds: Vec<Vec<Vector3<f64>>>,
        num_scans: usize,
    }

    impl Vehicle for MockVehicle {
        fn pose(&self) -> Pose {
            self.pose
        }

        fn update(&mut self, cmd: &DrivingCommand, _dt_s: f64) {
            self.pose.position_m.x += cmd.throttle;
            self.num_updates += 1;
        }
    }

    impl PathController for MockController {
        fn set_current_state(&mut self, _pose: &Pose) {
            self.num_states += 1;
        }

        fn driving_command(&mut self, _dt_s: f64) -> DrivingCommand {
            DrivingCommand {
                throttle: 1.0,
                ..Default::default()
            }
        }

        fn set_desired_path(&mut self, path: Vec<Point2<f64>>) {
            self.paths.push(path);
        }
    }

    impl PointCloudSource for MockSensor {
        fn scan(&mut self, _pose: &Pose, _dt_s: f64) -> PointCloud {
            let cloud = self.clouds.get(self.num_scans).cloned().unwrap_or_default();
            self.num_scans += 1;
            PointCloud::Registered(cloud)
        }
    }

    /// 20 x 5 grid at the origin with the goal in cell (18, 2).
    fn mgr() -> ReplanMgr {
        ReplanMgr::new(ReplanParams {
            replan_period_ticks: 3,
            goal_m: [18.5, 2.5],
            goal_tolerance_m: 1.0,
            points_registered: true,
            grid: GridParams {
                resolution_m: 1.0,
                width: 20,
                height: 5,
                origin_m: [0.0, 0.0],
                height_thresh_m: 1.0,
            },
            planner: Default::default(),
        })
        .unwrap()
    }

    fn vehicle(throttle_x: f64) -> MockVehicle {
        MockVehicle {
            pose: Pose::from_heading(Vector3::new(throttle_x, 2.5, 0.0), 0.0),
            num_updates: 0,
        }
    }

    fn params(termination: Termination, max_ticks: Option<u64>) -> LoopParams {
        LoopParams {
            tick_period_s: 1.0 / 30.0,
            real_time: false,
            termination,
            max_ticks,
        }
    }

    #[test]
    fn test_replan_cadence() {
        for &n in &[1u64, 2, 3, 10, 12] {
            let mut rl = ReplanLoop::new(
                params(Termination::Indefinite, Some(n)),
                mgr(),
                vehicle(0.5),
                MockController::default(),
                MockSensor::default(),
            )
            .unwrap();

            let report = rl.run().unwrap();

            assert_eq!(report.num_ticks, n);
            assert_eq!(report.num_replans, n / 3);
            assert_eq!(rl.sensor().num_scans as u64, n / 3);
            assert_eq!(rl.controller().paths.len() as u64, n / 3);
            assert_eq!(rl.controller().num_states, n);
            assert_eq!(rl.vehicle().num_updates, n);
            assert!(!report.reached_goal);
        }
    }

    #[test]
    fn test_stops_at_goal() {
        let mut rl = ReplanLoop::new(
            params(Termination::GoalReached, Some(1000)),
            mgr(),
            vehicle(0.5),
            MockController::default(),
            MockSensor::default(),
        )
        .unwrap();

        let report = rl.run().unwrap();

        // After tick k the vehicle is at x = 0.5 + k, which is within 1 m of 18.5 at k = 17
        assert!(report.reached_goal);
        assert_eq!(report.num_ticks, 17);
        assert!(report.final_dist_to_goal_m <= 1.0);
        assert_eq!(report.num_replans, 5);
    }

    #[test]
    fn test_tick_limit_without_goal() {
        let mut rl = ReplanLoop::new(
            params(Termination::GoalReached, Some(5)),
            mgr(),
            vehicle(0.5),
            MockController::default(),
            MockSensor::default(),
        )
        .unwrap();

        let report = rl.run().unwrap();

        assert!(!report.reached_goal);
        assert_eq!(report.num_ticks, 5);
        assert!((report.final_dist_to_goal_m - 13.0).abs() < 1e-9);
    }

    #[test]
    fn test_failed_replan_keeps_controller_path() {
        // Second scan walls off the goal
        let wall: Vec<_> = (0..5)
            .map(|j| Vector3::new(15.5, j as f64 + 0.5, 2.0))
            .collect();
        let sensor = MockSensor {
            clouds: vec![vec![], wall],
            num_scans: 0,
        };

        let mut rl = ReplanLoop::new(
            params(Termination::Indefinite, Some(9)),
            mgr(),
            vehicle(0.5),
            MockController::default(),
            sensor,
        )
        .unwrap();

        let report = rl.run().unwrap();

        assert_eq!(report.num_replans, 3);
        assert_eq!(report.num_successful_replans, 1);
        assert_eq!(rl.controller().paths.len(), 1);
        assert_eq!(rl.mgr().last_path(), rl.controller().paths.last());
        assert!(rl.controller().paths.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn test_step_indefinite() {
        let mut rl = ReplanLoop::new(
            params(Termination::Indefinite, None),
            mgr(),
            vehicle(17.5),
            MockController::default(),
            MockSensor::default(),
        )
        .unwrap();

        // Passes through the goal without stopping
        for _ in 0..4 {
            assert_eq!(rl.step().unwrap(), StepOutcome::Continue);
        }
        assert_eq!(rl.tick(), 4);
        assert!(!rl.report().reached_goal);
    }

    #[test]
    fn test_invalid_tick_period() {
        for &period_s in &[0.0, -1.0, f64::NAN, f64::INFINITY, 1e30] {
            let mut p = params(Termination::Indefinite, Some(1));
            p.tick_period_s = period_s;

            assert!(
                matches!(
                    ReplanLoop::new(
                        p,
                        mgr(),
                        vehicle(0.5),
                        MockController::default(),
                        MockSensor::default()
                    ),
                    Err(LoopError::InvalidTickPeriod(_))
                ),
                "period {}",
                period_s
            );
        }
    }

    #[test]
    fn test_overruns_counted_not_fatal() {
        let mut p = params(Termination::Indefinite, Some(6));
        p.real_time = true;
        p.tick_period_s = 1e-9;

        let mut rl = ReplanLoop::new(
            p,
            mgr(),
            vehicle(0.5),
            MockController::default(),
            MockSensor::default(),
        )
        .unwrap();

        let report = rl.run().unwrap();

        assert_eq!(report.num_ticks, 6);
        assert!(report.num_overruns > 0);
    }

    #[test]
    fn test_params_defaults() {
        let p: LoopParams = util::params::from_str("real_time = false").unwrap();

        assert!((p.tick_period_s - 1.0 / 30.0).abs() < 1e-12);
        assert!(!p.real_time);
        assert_eq!(p.termination, Termination::GoalReached);
        assert_eq!(p.max_ticks, None);
    }
}
