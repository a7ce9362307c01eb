//! Piecewise cubic Bezier fitting and sampling of joint trajectories.
//!
//! Every fitted channel (position, and velocity/acceleration when present) is an
//! interpolating cubic B-spline through the waypoint samples, parameterized
//! uniformly per segment. The de Boor control points come from the tridiagonal
//! system
//!
//! ```text
//! d[i-1] + 4 d[i] + d[i+1] = 6 x[i]      for 0 < i < N
//! d[0] = x[0],  d[N] = x[N]               (natural end conditions)
//! ```
//!
//! and segment `i` is the cubic Bezier with control points
//! `x[i], (2 d[i] + d[i+1]) / 3, (d[i] + 2 d[i+1]) / 3, x[i+1]`, which makes
//! the spline C2 at every interior waypoint.

use thiserror::Error;

use super::{Dimensions, TrajectoryPoint};

/// Bezier control values `b0..b3` of one segment.
pub type BezierCoeffs = [f64; 4];

#[derive(Debug, Error, PartialEq)]
pub enum FitError {
    #[error("At least 2 waypoints are required, got {0}")]
    TooFewWaypoints(usize),
    #[error("Waypoint {index} has {found} {field} values, expected {expected}")]
    DimensionMismatch {
        index: usize,
        field: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("Waypoint {0} contains a non-finite value")]
    NonFinite(usize),
    #[error("Waypoint {0} starts before the previous waypoint")]
    NonMonotonicTime(usize),
}

/// Position (and optional velocity/acceleration) of one joint at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSample {
    pub position: f64,
    pub velocity: Option<f64>,
    pub acceleration: Option<f64>,
}

/// Per-channel segment coefficients of one joint; channel 0 is position.
#[derive(Debug, Clone)]
struct JointCurve {
    channels: Vec<Vec<BezierCoeffs>>,
}

/// The fitted curve of every joint of a trajectory. Immutable once built.
#[derive(Debug, Clone)]
pub struct FittedCurve {
    joints: Vec<JointCurve>,
    dimensions: Dimensions,
    segments: usize,
}

/// Fit one curve per joint through `points`.
///
/// `points` must be sorted by time and hold one position per joint; velocity and
/// acceleration samples are only read for the dimensions enabled in `dimensions`.
pub fn fit(
    joint_names: &[String],
    points: &[TrajectoryPoint],
    dimensions: Dimensions,
) -> Result<FittedCurve, FitError> {
    if points.len() < 2 {
        return Err(FitError::TooFewWaypoints(points.len()));
    }
    let num_joints = joint_names.len();
    check_points(points, num_joints, dimensions)?;

    let segments = points.len() - 1;
    let mut joints = Vec::with_capacity(num_joints);
    let mut samples = vec![0.0; points.len()];
    for jnt in 0..num_joints {
        let mut channels = Vec::with_capacity(dimensions.count());
        for channel in 0..dimensions.count() {
            for (idx, point) in points.iter().enumerate() {
                samples[idx] = channel_values(point, channel, dimensions)[jnt];
            }
            let control = de_boor_control_points(&samples);
            channels.push(bezier_coefficients(&samples, &control));
        }
        joints.push(JointCurve { channels });
    }

    tracing::trace!("Fitted {} segments for {} joints", segments, num_joints);
    Ok(FittedCurve {
        joints,
        dimensions,
        segments,
    })
}

impl FittedCurve {
    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    pub fn num_segments(&self) -> usize {
        self.segments
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Coefficients of one channel of one joint, for inspection.
    pub fn coefficients(&self, joint: usize, channel: usize) -> Option<&[BezierCoeffs]> {
        self.joints
            .get(joint)
            .and_then(|j| j.channels.get(channel))
            .map(Vec::as_slice)
    }

    /// Sample one joint. A segment past the end holds the final point (t = 1).
    pub fn sample_joint(&self, joint: usize, segment: usize, t: f64) -> Option<JointSample> {
        let curve = self.joints.get(joint)?;
        let (segment, t) = if segment >= self.segments {
            (self.segments - 1, 1.0)
        } else {
            (segment, t.clamp(0.0, 1.0))
        };
        let value = |channel: usize| evaluate(&curve.channels[channel][segment], t);
        let velocity = self.dimensions.velocities.then(|| value(1));
        let acceleration = self.dimensions.accelerations.then(|| value(self.dimensions.count() - 1));
        Some(JointSample {
            position: value(0),
            velocity,
            acceleration,
        })
    }

    /// Sample every joint at once. `time_from_start` is left at zero.
    pub fn sample(&self, segment: usize, t: f64) -> TrajectoryPoint {
        let mut point = TrajectoryPoint::default();
        for joint in 0..self.joints.len() {
            let Some(sample) = self.sample_joint(joint, segment, t) else {
                continue;
            };
            point.positions.push(sample.position);
            if let Some(velocity) = sample.velocity {
                point.velocities.push(velocity);
            }
            if let Some(acceleration) = sample.acceleration {
                point.accelerations.push(acceleration);
            }
        }
        point
    }
}

fn check_points(points: &[TrajectoryPoint], num_joints: usize, dimensions: Dimensions) -> Result<(), FitError> {
    let mut previous_time = f64::NEG_INFINITY;
    for (index, point) in points.iter().enumerate() {
        if !point.time_from_start.is_finite() {
            return Err(FitError::NonFinite(index));
        }
        if point.time_from_start < previous_time {
            return Err(FitError::NonMonotonicTime(index));
        }
        previous_time = point.time_from_start;

        let mut fields = vec![("positions", &point.positions)];
        if dimensions.velocities {
            fields.push(("velocities", &point.velocities));
        }
        if dimensions.accelerations {
            fields.push(("accelerations", &point.accelerations));
        }
        for (field, values) in fields {
            if values.len() != num_joints {
                return Err(FitError::DimensionMismatch {
                    index,
                    field,
                    expected: num_joints,
                    found: values.len(),
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(FitError::NonFinite(index));
            }
        }
    }
    Ok(())
}

fn channel_values(point: &TrajectoryPoint, channel: usize, dimensions: Dimensions) -> &[f64] {
    match channel {
        0 => &point.positions,
        1 if dimensions.velocities => &point.velocities,
        _ => &point.accelerations,
    }
}

/// De Boor points `d[0..=N]` of the natural interpolating spline through `x[0..=N]`.
fn de_boor_control_points(x: &[f64]) -> Vec<f64> {
    let n = x.len() - 1;
    let mut d = vec![0.0; n + 1];
    d[0] = x[0];
    d[n] = x[n];
    let unknowns = n.saturating_sub(1);
    if unknowns == 0 {
        return d;
    }

    let mut rhs: Vec<f64> = (1..n).map(|i| 6.0 * x[i]).collect();
    rhs[0] -= d[0];
    rhs[unknowns - 1] -= d[n];

    // Thomas algorithm on the [1, 4, 1] system; strictly diagonally dominant
    let mut upper = vec![0.0; unknowns];
    upper[0] = 1.0 / 4.0;
    rhs[0] /= 4.0;
    for i in 1..unknowns {
        let denom = 4.0 - upper[i - 1];
        upper[i] = 1.0 / denom;
        rhs[i] = (rhs[i] - rhs[i - 1]) / denom;
    }
    for i in (0..unknowns - 1).rev() {
        rhs[i] -= upper[i] * rhs[i + 1];
    }

    d[1..n].copy_from_slice(&rhs);
    d
}

fn bezier_coefficients(x: &[f64], d: &[f64]) -> Vec<BezierCoeffs> {
    (0..x.len() - 1)
        .map(|i| {
            [
                x[i],
                (2.0 * d[i] + d[i + 1]) / 3.0,
                (d[i] + 2.0 * d[i + 1]) / 3.0,
                x[i + 1],
            ]
        })
        .collect()
}

fn evaluate(b: &BezierCoeffs, t: f64) -> f64 {
    let s = 1.0 - t;
    s * s * s * b[0] + 3.0 * t * s * s * b[1] + 3.0 * t * t * s * b[2] + t * t * t * b[3]
}
