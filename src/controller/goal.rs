//! Goal types exchanged between clients and the control loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::hardware::HardwareError;
use crate::trajectory::{FitError, GoalRequest, TrajectoryPoint};

const FEEDBACK_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalState {
    Idle,
    Validating,
    Executing,
    Succeeded,
    Aborted,
    Preempted,
}

impl GoalState {
    pub fn is_terminal(self) -> bool {
        matches!(self, GoalState::Succeeded | GoalState::Aborted | GoalState::Preempted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AbortReason {
    InvalidJoints,
    EmptyTrajectory,
    FitFailure,
    CommandFailure,
}

/// Terminal outcome of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalResult {
    Succeeded,
    Aborted(AbortReason),
    Preempted,
}

impl GoalResult {
    pub fn state(self) -> GoalState {
        match self {
            GoalResult::Succeeded => GoalState::Succeeded,
            GoalResult::Aborted(_) => GoalState::Aborted,
            GoalResult::Preempted => GoalState::Preempted,
        }
    }
}

/// Why commanding the joints failed during one tick.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("Point is invalid: {names} joint names for {positions} positions")]
    LengthMismatch { names: usize, positions: usize },
    #[error("Point is invalid: joint {0} not found")]
    UnknownJoint(String),
    #[error("Joint {0} is compliant, the trajectory cannot execute")]
    Compliant(String),
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),
}

#[derive(Debug, Error, PartialEq)]
pub enum GoalError {
    #[error("Goal names no joints")]
    NoJoints,
    #[error("Provided invalid joint name {0}")]
    InvalidJoint(String),
    #[error("Empty trajectory")]
    EmptyTrajectory,
    #[error("Failed to compute a Bezier trajectory: {0}")]
    Fit(#[from] FitError),
    #[error("Command failed: {0}")]
    Command(#[from] CommandError),
}

impl GoalError {
    pub fn abort_reason(&self) -> AbortReason {
        match self {
            GoalError::NoJoints | GoalError::InvalidJoint(_) => AbortReason::InvalidJoints,
            GoalError::EmptyTrajectory => AbortReason::EmptyTrajectory,
            GoalError::Fit(_) => AbortReason::FitFailure,
            GoalError::Command(_) => AbortReason::CommandFailure,
        }
    }
}

/// One control-cycle report: what was commanded, what was measured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSample {
    pub goal_id: Uuid,
    pub joint_names: Vec<String>,
    pub desired: TrajectoryPoint,
    pub actual: TrajectoryPoint,
    /// Position error only (desired - actual)
    pub error: TrajectoryPoint,
    /// Seconds since the trajectory start
    pub elapsed: f64,
}

impl FeedbackSample {
    pub fn new(goal_id: Uuid, joint_names: Vec<String>, desired: TrajectoryPoint, actual: Vec<f64>, elapsed: f64) -> Self {
        let error = desired
            .positions
            .iter()
            .zip(&actual)
            .map(|(d, a)| d - a)
            .collect();
        Self {
            goal_id,
            joint_names,
            desired,
            actual: TrajectoryPoint::new(elapsed, actual),
            error: TrajectoryPoint::new(elapsed, error),
            elapsed,
        }
    }

    pub fn max_abs_error(&self) -> f64 {
        self.error.positions.iter().fold(0.0, |acc: f64, e| acc.max(e.abs()))
    }
}

#[derive(Debug, Error)]
#[error("Arm controller is not running")]
pub struct ControllerStopped;

/// A goal on its way to the control loop.
#[derive(Debug)]
pub struct GoalSubmission {
    pub id: Uuid,
    pub request: GoalRequest,
    pub cancel: Arc<AtomicBool>,
    pub feedback: mpsc::Sender<FeedbackSample>,
    pub respond_to: oneshot::Sender<GoalResult>,
}

/// The submitter's side of an in-flight goal.
#[derive(Debug)]
pub struct GoalHandle {
    id: Uuid,
    cancel: Arc<AtomicBool>,
    feedback: mpsc::Receiver<FeedbackSample>,
    result: oneshot::Receiver<GoalResult>,
}

impl GoalHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Ask the control loop to preempt this goal at its next tick.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Next feedback sample, or None once the goal has finished.
    pub async fn next_feedback(&mut self) -> Option<FeedbackSample> {
        self.feedback.recv().await
    }

    /// Feedback already delivered, without waiting.
    pub fn drain_feedback(&mut self) -> Vec<FeedbackSample> {
        let mut samples = Vec::new();
        while let Ok(sample) = self.feedback.try_recv() {
            samples.push(sample);
        }
        samples
    }

    pub async fn result(self) -> Result<GoalResult, ControllerStopped> {
        self.result.await.map_err(|_| ControllerStopped)
    }
}

/// Submits goals to a running control loop.
#[derive(Debug, Clone)]
pub struct GoalClient {
    tx: mpsc::Sender<GoalSubmission>,
}

impl GoalClient {
    pub fn new(tx: mpsc::Sender<GoalSubmission>) -> Self {
        Self { tx }
    }

    pub async fn submit(&self, request: GoalRequest) -> Result<GoalHandle, ControllerStopped> {
        let id = Uuid::new_v4();
        let cancel = Arc::new(AtomicBool::new(false));
        let (feedback_tx, feedback_rx) = mpsc::channel(FEEDBACK_BUFFER);
        let (result_tx, result_rx) = oneshot::channel();
        let submission = GoalSubmission {
            id,
            request,
            cancel: cancel.clone(),
            feedback: feedback_tx,
            respond_to: result_tx,
        };
        self.tx.send(submission).await.map_err(|_| ControllerStopped)?;
        Ok(GoalHandle {
            id,
            cancel,
            feedback: feedback_rx,
            result: result_rx,
        })
    }
}
