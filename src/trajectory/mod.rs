// src/trajectory/mod.rs - Waypoints, goal requests and trajectory normalization
pub mod bezier;
pub mod scheduler;

pub use bezier::{fit, FitError, FittedCurve, JointSample};
pub use scheduler::{SchedulePhase, TrajectoryScheduler};

use serde::{Deserialize, Serialize};

/// A timed point for every joint of a trajectory.
///
/// Empty `velocities`/`accelerations` mean the dimension is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Offset from trajectory start (seconds)
    pub time_from_start: f64,
    /// Joint positions (radians)
    pub positions: Vec<f64>,
    #[serde(default)]
    pub velocities: Vec<f64>,
    #[serde(default)]
    pub accelerations: Vec<f64>,
}

impl TrajectoryPoint {
    pub fn new(time_from_start: f64, positions: Vec<f64>) -> Self {
        Self {
            time_from_start,
            positions,
            ..Default::default()
        }
    }

    pub fn with_velocities(mut self, velocities: Vec<f64>) -> Self {
        self.velocities = velocities;
        self
    }

    pub fn with_accelerations(mut self, accelerations: Vec<f64>) -> Self {
        self.accelerations = accelerations;
        self
    }
}

/// Which optional dimensions a trajectory carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dimensions {
    pub velocities: bool,
    pub accelerations: bool,
}

impl Dimensions {
    /// A dimension is active only when both the first and last point carry it.
    pub fn of(points: &[TrajectoryPoint]) -> Self {
        match (points.first(), points.last()) {
            (Some(first), Some(last)) => Self {
                velocities: !first.velocities.is_empty() && !last.velocities.is_empty(),
                accelerations: !first.accelerations.is_empty() && !last.accelerations.is_empty(),
            },
            _ => Self::default(),
        }
    }

    /// Number of fitted channels per joint (position always included).
    pub fn count(&self) -> usize {
        1 + self.velocities as usize + self.accelerations as usize
    }
}

/// A request to follow a joint trajectory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalRequest {
    pub joint_names: Vec<String>,
    pub points: Vec<TrajectoryPoint>,
    /// Absolute start time (seconds on the node clock); absent or zero means now
    #[serde(default)]
    pub start_time: Option<f64>,
    /// Grace period after the last point (seconds); absent or zero uses the configured default
    #[serde(default)]
    pub goal_time_tolerance: Option<f64>,
}

impl GoalRequest {
    pub fn new(joint_names: Vec<String>, points: Vec<TrajectoryPoint>) -> Self {
        Self {
            joint_names,
            points,
            start_time: None,
            goal_time_tolerance: None,
        }
    }

    pub fn with_start_time(mut self, start_time: f64) -> Self {
        self.start_time = Some(start_time);
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.goal_time_tolerance = Some(tolerance);
        self
    }

    /// Nominal duration, the last point's offset.
    pub fn duration(&self) -> f64 {
        self.points.last().map(|p| p.time_from_start).unwrap_or(0.0)
    }
}

/// A validated trajectory, ready for fitting.
#[derive(Debug, Clone)]
pub struct Trajectory {
    pub joint_names: Vec<String>,
    pub points: Vec<TrajectoryPoint>,
    pub dimensions: Dimensions,
    pub tolerance: f64,
}

impl Trajectory {
    /// Callers guarantee `points` is not empty.
    pub fn new(joint_names: Vec<String>, points: Vec<TrajectoryPoint>, tolerance: f64) -> Self {
        let dimensions = Dimensions::of(&points);
        Self {
            joint_names,
            points,
            dimensions,
            tolerance,
        }
    }

    pub fn needs_leading_point(&self) -> bool {
        self.points.len() == 1
    }

    /// Insert a t=0 point at `positions`, keeping the sole point's velocity and
    /// acceleration so a one-point goal becomes a two-point trajectory.
    pub fn prepend_start(&mut self, positions: Vec<f64>) {
        let Some(target) = self.points.first() else {
            return;
        };
        let mut start = TrajectoryPoint::new(0.0, positions);
        if self.dimensions.velocities {
            start.velocities = target.velocities.clone();
        }
        if self.dimensions.accelerations {
            start.accelerations = target.accelerations.clone();
        }
        self.points.insert(0, start);
    }

    /// Zero the final velocity and acceleration so the arm ends at rest.
    pub fn bring_to_rest(&mut self) {
        let joints = self.joint_names.len();
        let dimensions = self.dimensions;
        if let Some(last) = self.points.last_mut() {
            if dimensions.velocities {
                last.velocities = vec![0.0; joints];
            }
            if dimensions.accelerations {
                last.accelerations = vec![0.0; joints];
            }
        }
    }

    pub fn times(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.time_from_start).collect()
    }

    pub fn end_time(&self) -> f64 {
        self.points.last().map(|p| p.time_from_start).unwrap_or(0.0)
    }

    pub fn last_point(&self) -> Option<&TrajectoryPoint> {
        self.points.last()
    }
}
