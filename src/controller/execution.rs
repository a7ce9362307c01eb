// src/controller/execution.rs - State of one accepted goal between ticks
use uuid::Uuid;

use super::goal::{FeedbackSample, GoalResult};
use crate::trajectory::{FittedCurve, SchedulePhase, Trajectory, TrajectoryPoint, TrajectoryScheduler};

/// A validated, fitted goal and its schedule.
#[derive(Debug, Clone)]
pub struct GoalExecution {
    id: Uuid,
    trajectory: Trajectory,
    curve: FittedCurve,
    scheduler: TrajectoryScheduler,
    start_time: f64,
}

/// What one control tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Start time not reached; nothing commanded.
    Waiting,
    /// Joints commanded; feedback for this tick.
    Commanded(FeedbackSample),
    Finished(GoalResult),
}

impl GoalExecution {
    pub fn new(id: Uuid, trajectory: Trajectory, curve: FittedCurve, start_time: f64) -> Self {
        let scheduler = TrajectoryScheduler::new(trajectory.times(), trajectory.tolerance);
        Self {
            id,
            trajectory,
            curve,
            scheduler,
            start_time,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn joint_names(&self) -> &[String] {
        &self.trajectory.joint_names
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn curve(&self) -> &FittedCurve {
        &self.curve
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> f64 {
        self.scheduler.end_time()
    }

    pub fn elapsed(&self, now: f64) -> f64 {
        now - self.start_time
    }

    pub fn phase_at(&self, now: f64) -> SchedulePhase {
        self.scheduler.phase(self.elapsed(now))
    }

    /// The point to command for `phase`, stamped with `elapsed`.
    pub fn desired_point(&self, phase: SchedulePhase, elapsed: f64) -> Option<TrajectoryPoint> {
        let mut point = match phase {
            SchedulePhase::InMotion { segment, t } => self.curve.sample(segment, t),
            SchedulePhase::Tolerating => self.trajectory.last_point()?.clone(),
            SchedulePhase::Waiting | SchedulePhase::Done => return None,
        };
        point.time_from_start = elapsed;
        Some(point)
    }
}
