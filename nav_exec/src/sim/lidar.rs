//! Simulated lidar in a world of boxes on a flat ground plane

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;
use nalgebra::Vector3;

use super::{BoxObstacle, LidarParams};
use crate::{
    geom::{rotate, Pose},
    replan::PointCloud,
    replan_loop::PointCloudSource,
};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Ray direction components smaller than this are treated as parallel to the slab.
const PARALLEL_EPSILON: f64 = 1e-12;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Casts rings of beams from a lidar mounted on the vehicle, returning one point per beam which
/// hits a box or the ground (z = 0) within range.
#[derive(Debug, Clone)]
pub struct BoxWorldLidar {
    params: LidarParams,

    obstacles: Vec<BoxObstacle>,

    /// Return points in the world frame rather than the vehicle frame
    registered: bool,

    /// Unit beam directions in the vehicle frame
    beams: Vec<Vector3<f64>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BoxWorldLidar {
    pub fn new(params: LidarParams, obstacles: Vec<BoxObstacle>, registered: bool) -> Self {
        let n = params.num_azimuth_beams;
        let mut beams = Vec::with_capacity(n * params.elevations_rad.len());

        for &el in params.elevations_rad.iter() {
            for k in 0..n {
                let az = 2.0 * std::f64::consts::PI * (k as f64) / (n as f64);
                beams.push(Vector3::new(
                    el.cos() * az.cos(),
                    el.cos() * az.sin(),
                    el.sin(),
                ));
            }
        }

        Self {
            params,
            obstacles,
            registered,
            beams,
        }
    }

    pub fn num_beams(&self) -> usize {
        self.beams.len()
    }

    /// Distance along the ray to the nearest surface, if any is within range.
    fn cast(&self, origin_m: &Vector3<f64>, dir: &Vector3<f64>) -> Option<f64> {
        let mut nearest = self.params.max_range_m;
        let mut hit = false;

        // Ground
        if dir.z < -PARALLEL_EPSILON {
            let t = -origin_m.z / dir.z;
            if t > 0.0 && t < nearest {
                nearest = t;
                hit = true;
            }
        }

        for obstacle in self.obstacles.iter() {
            if let Some(t) = ray_box_intersection(origin_m, dir, obstacle) {
                if t < nearest {
                    nearest = t;
                    hit = true;
                }
            }
        }

        if hit {
            Some(nearest)
        } else {
            None
        }
    }
}

impl PointCloudSource for BoxWorldLidar {
    fn scan(&mut self, pose: &Pose, _dt_s: f64) -> PointCloud {
        let mount_m = Vector3::new(0.0, 0.0, self.params.mount_height_m);
        let origin_m = pose.transform_point(&mount_m);

        let mut points = Vec::new();

        for beam in self.beams.iter() {
            let dir = rotate(&pose.attitude_q, beam);

            if let Some(t) = self.cast(&origin_m, &dir) {
                if self.registered {
                    points.push(origin_m + dir * t);
                } else {
                    points.push(mount_m + beam * t);
                }
            }
        }

        trace!("Lidar returned {} of {} beams", points.len(), self.beams.len());

        if self.registered {
            PointCloud::Registered(points)
        } else {
            PointCloud::Local(points)
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Slab test for a ray against an axis aligned box. Returns the distance to the entry point, or
/// `None` if the ray misses or starts inside the box.
fn ray_box_intersection(
    origin_m: &Vector3<f64>,
    dir: &Vector3<f64>,
    obstacle: &BoxObstacle,
) -> Option<f64> {
    let mut t_enter = 0.0f64;
    let mut t_exit = std::f64::INFINITY;

    for axis in 0..3 {
        let o = origin_m[axis];
        let d = dir[axis];
        let min = obstacle.min_m[axis];
        let max = obstacle.max_m[axis];

        if d.abs() < PARALLEL_EPSILON {
            if o < min || o > max {
                return None;
            }
            continue;
        }

        let mut t0 = (min - o) / d;
        let mut t1 = (max - o) / d;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }

        t_enter = t_enter.max(t0);
        t_exit = t_exit.min(t1);

        if t_enter > t_exit {
            return None;
        }
    }

    if t_enter > 0.0 {
        Some(t_enter)
    } else {
        None
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::map::{GridParams, OccupancyGrid};

    const TOL: f64 = 1e-9;

    fn lidar_params(elevations_rad: Vec<f64>, num_azimuth_beams: usize) -> LidarParams {
        LidarParams {
            mount_height_m: 1.0,
            max_range_m: 20.0,
            num_azimuth_beams,
            elevations_rad,
        }
    }

    fn points(cloud: PointCloud) -> Vec<Vector3<f64>> {
        match cloud {
            PointCloud::Local(p) | PointCloud::Registered(p) => p,
        }
    }

    #[test]
    fn test_hits_box_ahead() {
        let wall = BoxObstacle {
            min_m: [5.0, -1.0, 0.0],
            max_m: [6.0, 1.0, 3.0],
        };
        let mut lidar = BoxWorldLidar::new(lidar_params(vec![0.0], 4), vec![wall], false);
        assert_eq!(lidar.num_beams(), 4);

        let cloud = lidar.scan(&Pose::identity(), 0.1);
        assert!(matches!(cloud, PointCloud::Local(_)));

        let pts = points(cloud);
        assert_eq!(pts.len(), 1);
        assert!((pts[0] - Vector3::new(5.0, 0.0, 1.0)).norm() < TOL);
    }

    #[test]
    fn test_local_and_registered_agree() {
        let wall = BoxObstacle {
            min_m: [-1.0, 5.0, 0.0],
            max_m: [1.0, 6.0, 3.0],
        };
        let pose = Pose::from_heading(Vector3::new(0.0, 0.0, 0.0), std::f64::consts::FRAC_PI_2);

        let local = points(
            BoxWorldLidar::new(lidar_params(vec![0.0], 4), vec![wall], false).scan(&pose, 0.1),
        );
        let registered = points(
            BoxWorldLidar::new(lidar_params(vec![0.0], 4), vec![wall], true).scan(&pose, 0.1),
        );

        assert_eq!(local.len(), 1);
        assert_eq!(registered.len(), 1);
        assert!((local[0] - Vector3::new(5.0, 0.0, 1.0)).norm() < 1e-6);
        assert!((registered[0] - Vector3::new(0.0, 5.0, 1.0)).norm() < 1e-6);
        assert!((pose.transform_point(&local[0]) - registered[0]).norm() < 1e-6);
    }

    #[test]
    fn test_ground_returns_do_not_occupy() {
        let mut lidar = BoxWorldLidar::new(lidar_params(vec![-0.1], 8), vec![], true);
        let pts = points(lidar.scan(&Pose::identity(), 0.1));

        assert_eq!(pts.len(), 8);
        assert!(pts.iter().all(|p| p.z.abs() < TOL));

        let mut grid = OccupancyGrid::from_params(&GridParams::default()).unwrap();
        grid.insert_points_world(&pts);
        assert_eq!(grid.num_occupied(), 0);
    }

    #[test]
    fn test_out_of_range() {
        let far = BoxObstacle {
            min_m: [50.0, -1.0, 0.0],
            max_m: [51.0, 1.0, 3.0],
        };
        let mut lidar = BoxWorldLidar::new(lidar_params(vec![0.0], 4), vec![far], true);

        assert!(points(lidar.scan(&Pose::identity(), 0.1)).is_empty());
    }

    #[test]
    fn test_ray_box_inside_and_behind() {
        let b = BoxObstacle {
            min_m: [-1.0, -1.0, -1.0],
            max_m: [1.0, 1.0, 1.0],
        };
        let x = Vector3::new(1.0, 0.0, 0.0);

        assert_eq!(ray_box_intersection(&Vector3::zeros(), &x, &b), None);
        assert_eq!(ray_box_intersection(&Vector3::new(3.0, 0.0, 0.0), &x, &b), None);
        assert_eq!(
            ray_box_intersection(&Vector3::new(-3.0, 0.0, 0.0), &x, &b),
            Some(2.0)
        );
    }
}
