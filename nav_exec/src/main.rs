//! Main navigation executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Initialise the session and logging
//!     - Load parameters and initialise the replan manager
//!     - Build the simulated vehicle, controller and lidar
//!     - Main loop, at a fixed tick rate:
//!         - Controller and vehicle update
//!         - Every few ticks:
//!             - Lidar scan and occupancy grid update
//!             - A* replan from the vehicle to the goal
//!         - Pacing to real time
//!     - Save the loop report to the session
//!
//! Parameter files are found in `$NAV_SW_ROOT/params` unless an absolute path is given.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Report};
use log::info;
use std::path::PathBuf;
use structopt::StructOpt;

// Internal
use nav_lib::{
    replan::ReplanMgr,
    replan_loop::{LoopParams, ReplanLoop, Termination},
    sim::{BoxWorldLidar, KinematicVehicle, SimParams, WaypointFollower},
};
use util::{
    logger::{logger_init, LevelFilter},
    module::State,
    session::Session,
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Name of the loop report written to the session directory.
const LOOP_REPORT_FILE: &str = "loop_report.json";

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Drive a simulated vehicle to a goal, mapping obstacles with lidar and replanning with A*.
#[derive(Debug, StructOpt)]
#[structopt(name = "nav_exec")]
struct Opts {
    /// Replan manager parameter file
    #[structopt(long, parse(from_os_str), default_value = "replan.toml")]
    replan_params: PathBuf,

    /// Loop parameter file
    #[structopt(long, parse(from_os_str), default_value = "loop.toml")]
    loop_params: PathBuf,

    /// Simulation parameter file
    #[structopt(long, parse(from_os_str), default_value = "sim.toml")]
    sim_params: PathBuf,

    /// Stop after this many ticks
    #[structopt(long)]
    max_ticks: Option<u64>,

    /// Run as fast as possible instead of in real time
    #[structopt(long)]
    fast: bool,

    /// Keep running after the goal is reached (needs --max-ticks to stop)
    #[structopt(long)]
    indefinite: bool,

    /// Console log level, at least `info`
    #[structopt(long, default_value = "info")]
    log_level: LevelFilter,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("nav_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(opts.log_level, LevelFilter::Trace, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Navigation Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut loop_params: LoopParams = util::params::load(&opts.loop_params)
        .wrap_err("Could not load loop params")?;

    if let Some(max_ticks) = opts.max_ticks {
        loop_params.max_ticks = Some(max_ticks);
    }
    if opts.fast {
        loop_params.real_time = false;
    }
    if opts.indefinite {
        loop_params.termination = Termination::Indefinite;
    }

    let sim_params: SimParams = util::params::load(&opts.sim_params)
        .wrap_err("Could not load sim params")?;

    info!("Exec parameters loaded");

    // ---- MODULE INITIALISATION ----

    let mut replan_mgr = ReplanMgr::default();
    replan_mgr
        .init(
            util::params::resolve(&opts.replan_params)
                .wrap_err("Could not find the replan params")?,
            &session,
        )
        .wrap_err("Failed to initialise ReplanMgr")?;

    let vehicle = KinematicVehicle::new(sim_params.vehicle);
    let follower =
        WaypointFollower::new(sim_params.follower).wrap_err("Invalid follower params")?;
    let lidar = BoxWorldLidar::new(
        sim_params.lidar,
        sim_params.obstacles,
        replan_mgr.params().points_registered,
    );

    info!("Simulation ready with {} lidar beams", lidar.num_beams());

    let mut replan_loop = ReplanLoop::new(loop_params, replan_mgr, vehicle, follower, lidar)
        .wrap_err("Failed to create the replanning loop")?;

    info!("Module initialisation complete\n");

    // ---- MAIN LOOP ----

    let report = replan_loop.run().wrap_err("Replanning loop failed")?;

    // ---- SHUTDOWN ----

    session
        .save(LOOP_REPORT_FILE, &report)
        .wrap_err("Failed to save the loop report")?;

    info!("End of execution");

    Ok(())
}
