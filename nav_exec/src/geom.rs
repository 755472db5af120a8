//! # Geometry
//!
//! Rigid-body transforms between the sensor/vehicle frame and the world (ENU) frame.
//!
//! Vectors and quaternions are the `nalgebra` types. Quaternions are unit-norm by convention
//! only: nothing here normalises them behind the caller's back, so [`rotate`] with a non-unit
//! quaternion scales as well as rotates. Use [`normalize_quaternion`] first if that matters.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{Point2, Quaternion, Vector3};
use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Magnitude below which a vector or quaternion is considered degenerate and cannot be
/// normalised.
pub const MIN_NORM: f64 = 1e-12;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A rigid transform from a local (vehicle or sensor) frame into the world frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Position of the local frame's origin in the world frame
    pub position_m: Vector3<f64>,

    /// Attitude of the local frame in the world frame. Rotates a vector from the local frame
    /// into the world frame.
    pub attitude_q: Quaternion<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum GeomError {
    #[error("Cannot normalise a vector or quaternion of magnitude {0:e}")]
    DegenerateVector(f64),
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Returns `v` scaled to unit length.
pub fn normalize_vector(v: &Vector3<f64>) -> Result<Vector3<f64>, GeomError> {
    let norm = v.norm();
    if !(norm >= MIN_NORM) {
        return Err(GeomError::DegenerateVector(norm));
    }

    Ok(v / norm)
}

/// Scales `v` to unit length in place. `v` is left untouched on error.
pub fn normalize_vector_mut(v: &mut Vector3<f64>) -> Result<(), GeomError> {
    *v = normalize_vector(v)?;
    Ok(())
}

/// Returns `q` scaled to unit norm.
pub fn normalize_quaternion(q: &Quaternion<f64>) -> Result<Quaternion<f64>, GeomError> {
    let norm = q.norm();
    if !(norm >= MIN_NORM) {
        return Err(GeomError::DegenerateVector(norm));
    }

    Ok(Quaternion::new(q.w / norm, q.i / norm, q.j / norm, q.k / norm))
}

/// Rotates `v` by `q`, computing `q * (0, v) * conj(q)`.
///
/// `q` must be unit-norm for this to be a pure rotation.
pub fn rotate(q: &Quaternion<f64>, v: &Vector3<f64>) -> Vector3<f64> {
    (q * Quaternion::from_imag(*v) * q.conjugate()).imag()
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Pose {
    pub fn new(position_m: Vector3<f64>, attitude_q: Quaternion<f64>) -> Self {
        Self {
            position_m,
            attitude_q,
        }
    }

    /// Build a pose from the raw arrays reported by the vehicle: position as `[x, y, z]` and
    /// orientation as `[w, x, y, z]`.
    pub fn from_arrays(position_m: [f64; 3], attitude_q_wxyz: [f64; 4]) -> Self {
        Self {
            position_m: Vector3::new(position_m[0], position_m[1], position_m[2]),
            attitude_q: Quaternion::new(
                attitude_q_wxyz[0],
                attitude_q_wxyz[1],
                attitude_q_wxyz[2],
                attitude_q_wxyz[3],
            ),
        }
    }

    /// Pose at `position_m` with the given heading (rotation about +Z) in radians.
    pub fn from_heading(position_m: Vector3<f64>, heading_rad: f64) -> Self {
        let half = 0.5 * heading_rad;
        Self::new(position_m, Quaternion::new(half.cos(), 0.0, 0.0, half.sin()))
    }

    pub fn identity() -> Self {
        Self::new(Vector3::zeros(), Quaternion::identity())
    }

    /// Maps a point in this pose's local frame into the world frame.
    pub fn transform_point(&self, local_point_m: &Vector3<f64>) -> Vector3<f64> {
        rotate(&self.attitude_q, local_point_m) + self.position_m
    }

    /// The position projected onto the XY plane.
    pub fn position_2d(&self) -> Point2<f64> {
        Point2::new(self.position_m.x, self.position_m.y)
    }

    /// Heading (yaw, angle to the +X axis about +Z) in radians, in the range [-pi, pi].
    pub fn heading_rad(&self) -> f64 {
        let q = &self.attitude_q;
        (2.0 * (q.w * q.k + q.i * q.j)).atan2(1.0 - 2.0 * (q.j * q.j + q.k * q.k))
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const TOL: f64 = 1e-4;

    fn assert_vec_near(a: Vector3<f64>, b: Vector3<f64>) {
        assert!((a - b).norm() < TOL, "{} != {}", a, b);
    }

    #[test]
    fn test_rotate_quarter_turn_about_z() {
        let q = Quaternion::new(0.7071, 0.0, 0.0, 0.7071);
        let v = rotate(&q, &Vector3::new(1.0, 0.0, 0.0));

        assert_vec_near(v, Vector3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_rotate_identity_and_half_turn() {
        let v = Vector3::new(1.0, 2.0, 3.0);
        assert_vec_near(rotate(&Quaternion::identity(), &v), v);

        // 180 degrees about X flips Y and Z
        let q = Quaternion::new(0.0, 1.0, 0.0, 0.0);
        assert_vec_near(rotate(&q, &v), Vector3::new(1.0, -2.0, -3.0));
    }

    #[test]
    fn test_rotate_does_not_normalise() {
        // A quaternion of norm 2 scales by 4
        let q = Quaternion::new(2.0, 0.0, 0.0, 0.0);
        assert_vec_near(rotate(&q, &Vector3::new(1.0, 0.0, 0.0)), Vector3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_transform_point() {
        let pose = Pose::from_arrays([10.0, 7.5, 0.0], [0.7071, 0.0, 0.0, 0.7071]);
        let p = pose.transform_point(&Vector3::new(1.0, 0.0, 2.0));

        assert_vec_near(p, Vector3::new(10.0, 8.5, 2.0));
    }

    #[test]
    fn test_normalize() {
        let mut v = Vector3::new(3.0, 0.0, 4.0);
        normalize_vector_mut(&mut v).unwrap();
        assert_vec_near(v, Vector3::new(0.6, 0.0, 0.8));

        let q = normalize_quaternion(&Quaternion::new(0.0, 0.0, 0.0, 2.0)).unwrap();
        assert_eq!(q, Quaternion::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_normalize_degenerate() {
        let mut v = Vector3::zeros();
        assert!(matches!(
            normalize_vector_mut(&mut v),
            Err(GeomError::DegenerateVector(_))
        ));
        assert_eq!(v, Vector3::zeros());

        assert!(matches!(
            normalize_quaternion(&Quaternion::new(0.0, 1e-14, 0.0, 0.0)),
            Err(GeomError::DegenerateVector(_))
        ));

        // NaN inputs are rejected rather than propagated
        assert!(normalize_vector(&Vector3::new(std::f64::NAN, 0.0, 0.0)).is_err());
    }

    #[test]
    fn test_heading() {
        let pose = Pose::from_heading(Vector3::zeros(), 1.2);
        assert!((pose.heading_rad() - 1.2).abs() < 1e-12);

        let forward = pose.transform_point(&Vector3::new(1.0, 0.0, 0.0));
        assert!((forward.y.atan2(forward.x) - 1.2).abs() < 1e-12);
    }
}
