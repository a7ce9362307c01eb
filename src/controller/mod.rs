// src/controller/mod.rs - Goal lifecycle controller driving the arm's control loop
pub mod execution;
pub mod goal;

pub use execution::{GoalExecution, TickOutcome};
pub use goal::{
    AbortReason, CommandError, ControllerStopped, FeedbackSample, GoalClient, GoalError, GoalHandle, GoalResult,
    GoalState, GoalSubmission,
};

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex, RwLock};
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::config::{rate_period, ArmConfig, ConfigError};
use crate::hardware::{read_positions, ActuatorInterface};
use crate::joints::JointSet;
use crate::time::TimeSource;
use crate::trajectory::{fit, GoalRequest, SchedulePhase, Trajectory, TrajectoryPoint};

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Prefix for log lines
    pub name: String,
    pub rate_hz: f64,
    /// When false, every goal is brought to rest at its last point
    pub continuous: bool,
    pub default_tolerance: f64,
}

impl ControllerSettings {
    pub fn from_config(arm: &ArmConfig) -> Self {
        Self {
            name: arm.name.clone(),
            rate_hz: arm.rate_hz,
            continuous: arm.continuous_trajectories,
            default_tolerance: arm.goal_time_tolerance,
        }
    }

    pub fn period(&self) -> Result<Duration, ConfigError> {
        rate_period(self.rate_hz)
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from_config(&ArmConfig::default())
    }
}

/// Observable state of the controller.
#[derive(Debug, Clone)]
pub struct ArmState {
    pub goal_state: GoalState,
    pub active_goal: Option<Uuid>,
    /// Most recent feedback of the current or last goal
    pub last_feedback: Option<FeedbackSample>,
}

impl Default for ArmState {
    fn default() -> Self {
        Self {
            goal_state: GoalState::Idle,
            active_goal: None,
            last_feedback: None,
        }
    }
}

enum Next {
    Goal(GoalSubmission),
    Idle,
    Shutdown,
}

/// Owns one goal at a time and is the only writer of goal positions.
pub struct ArmController {
    joints: JointSet,
    actuator: Arc<dyn ActuatorInterface>,
    time: Arc<dyn TimeSource>,
    settings: ControllerSettings,
    state: Arc<RwLock<ArmState>>,
    /// Held from the compliance check through the last goal write of a point
    actuator_lock: Arc<Mutex<()>>,
}

impl ArmController {
    pub fn new(
        joints: JointSet,
        actuator: Arc<dyn ActuatorInterface>,
        time: Arc<dyn TimeSource>,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            joints,
            actuator,
            time,
            settings,
            state: Arc::new(RwLock::new(ArmState::default())),
            actuator_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Share the lock compliance writers take, so torque cannot be dropped
    /// between the compliance check and the goal writes of one point.
    pub fn with_actuator_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.actuator_lock = lock;
        self
    }

    pub fn joints(&self) -> &JointSet {
        &self.joints
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn state(&self) -> Arc<RwLock<ArmState>> {
        self.state.clone()
    }

    /// Validate a goal and fit its curve. Nothing is commanded here.
    pub async fn prepare(&self, id: Uuid, request: &GoalRequest) -> Result<GoalExecution, GoalError> {
        if request.joint_names.is_empty() {
            return Err(GoalError::NoJoints);
        }
        if let Some(unknown) = self.joints.find_unknown(&request.joint_names) {
            return Err(GoalError::InvalidJoint(unknown.to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = request.joint_names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(GoalError::InvalidJoint(duplicate.clone()));
        }
        if request.points.is_empty() {
            return Err(GoalError::EmptyTrajectory);
        }

        let tolerance = match request.goal_time_tolerance {
            Some(tolerance) if tolerance > 0.0 => tolerance,
            _ => self.settings.default_tolerance,
        };
        let mut trajectory = Trajectory::new(request.joint_names.clone(), request.points.clone(), tolerance);
        if trajectory.needs_leading_point() {
            let current = read_positions(self.actuator.as_ref(), &trajectory.joint_names)
                .await
                .map_err(CommandError::from)?;
            trajectory.prepend_start(current);
        }
        if !self.settings.continuous {
            trajectory.bring_to_rest();
        }

        let curve = fit(&trajectory.joint_names, &trajectory.points, trajectory.dimensions)?;
        let start_time = match request.start_time {
            Some(start) if start > 0.0 => start,
            _ => self.time.now(),
        };
        Ok(GoalExecution::new(id, trajectory, curve, start_time))
    }

    /// One control cycle for `execution` at time `now`.
    ///
    /// A pending preemption wins over everything else: nothing is commanded and
    /// the goal ends as preempted.
    pub async fn tick(&self, execution: &GoalExecution, now: f64, preempt_requested: bool) -> TickOutcome {
        if preempt_requested {
            return TickOutcome::Finished(GoalResult::Preempted);
        }
        let elapsed = execution.elapsed(now);
        let phase = execution.phase_at(now);
        if phase == SchedulePhase::Done {
            return TickOutcome::Finished(GoalResult::Succeeded);
        }
        let Some(point) = execution.desired_point(phase, elapsed) else {
            return TickOutcome::Waiting;
        };

        if let Err(e) = self.command_joints(execution.joint_names(), &point).await {
            tracing::error!("{}: {}", self.settings.name, e);
            return TickOutcome::Finished(GoalResult::Aborted(AbortReason::CommandFailure));
        }
        let actual = match read_positions(self.actuator.as_ref(), execution.joint_names()).await {
            Ok(actual) => actual,
            Err(e) => {
                tracing::error!("{}: Failed to read present positions: {}", self.settings.name, e);
                return TickOutcome::Finished(GoalResult::Aborted(AbortReason::CommandFailure));
            }
        };
        tracing::trace!("Present positions: {:?}", actual);
        TickOutcome::Commanded(FeedbackSample::new(
            execution.id(),
            execution.joint_names().to_vec(),
            point,
            actual,
            elapsed,
        ))
    }

    /// Send one point to the actuators.
    ///
    /// Every joint is checked (known, torqued) before the first write, so a
    /// rejected point never produces partial motion. The actuator lock is held
    /// until the last write.
    pub async fn command_joints(&self, joint_names: &[String], point: &TrajectoryPoint) -> Result<(), CommandError> {
        tracing::debug!("Setting motors to {:?}", point.positions);
        if joint_names.len() != point.positions.len() {
            return Err(CommandError::LengthMismatch {
                names: joint_names.len(),
                positions: point.positions.len(),
            });
        }
        let _guard = self.actuator_lock.lock().await;
        for name in joint_names {
            if !self.joints.contains(name) {
                return Err(CommandError::UnknownJoint(name.clone()));
            }
            if self.actuator.compliance(name).await? {
                return Err(CommandError::Compliant(name.clone()));
            }
        }
        for (name, &position) in joint_names.iter().zip(&point.positions) {
            self.actuator.set_goal_position(name, position).await?;
        }
        Ok(())
    }

    /// Serve goals until shutdown, one at a time.
    pub async fn run(self, mut goals: mpsc::Receiver<GoalSubmission>, mut shutdown: broadcast::Receiver<()>) {
        let period = match self.settings.period() {
            Ok(period) => period,
            Err(e) => {
                tracing::error!("{}: Control loop not started: {}", self.settings.name, e);
                return;
            }
        };
        tracing::info!("{}: Control loop running at {} Hz", self.settings.name, self.settings.rate_hz);
        'serve: loop {
            let submission = tokio::select! {
                _ = shutdown.recv() => break,
                received = goals.recv() => match received {
                    Some(submission) => submission,
                    None => break,
                },
            };
            let mut pending = Some(submission);
            while let Some(submission) = pending.take() {
                match self.execute(submission, period, &mut goals, &mut shutdown).await {
                    Next::Goal(next) => pending = Some(next),
                    Next::Idle => {}
                    Next::Shutdown => break 'serve,
                }
            }
        }
        tracing::info!("{}: Control loop shutting down", self.settings.name);
    }

    async fn execute(
        &self,
        submission: GoalSubmission,
        period: Duration,
        goals: &mut mpsc::Receiver<GoalSubmission>,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Next {
        let GoalSubmission {
            id,
            request,
            cancel,
            feedback,
            respond_to,
        } = submission;
        let name = &self.settings.name;
        {
            let mut state = self.state.write().await;
            state.goal_state = GoalState::Validating;
            state.active_goal = Some(id);
            state.last_feedback = None;
        }

        let execution = match self.prepare(id, &request).await {
            Ok(execution) => execution,
            Err(e) => {
                tracing::error!("{}: Trajectory aborted - {}", name, e);
                self.finish(id, GoalResult::Aborted(e.abort_reason()), respond_to).await;
                return Next::Idle;
            }
        };
        tracing::warn!("{}: Executing requested joint trajectory {} sec", name, execution.end_time());
        self.set_goal_state(GoalState::Executing, Some(id)).await;

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            let shutting_down = tokio::select! {
                _ = shutdown.recv() => true,
                _ = interval.tick() => false,
            };
            if shutting_down {
                self.finish(id, GoalResult::Preempted, respond_to).await;
                return Next::Shutdown;
            }

            match goals.try_recv() {
                Ok(next) => {
                    tracing::info!("{}: Goal {} preempted by new goal {}", name, id, next.id);
                    self.finish(id, GoalResult::Preempted, respond_to).await;
                    return Next::Goal(next);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
            }

            let outcome = self.tick(&execution, self.time.now(), cancel.load(Ordering::Acquire)).await;
            match outcome {
                TickOutcome::Waiting => {}
                TickOutcome::Commanded(sample) => {
                    self.state.write().await.last_feedback = Some(sample.clone());
                    if feedback.try_send(sample).is_err() {
                        tracing::trace!("Feedback for goal {} dropped", id);
                    }
                }
                TickOutcome::Finished(result) => {
                    self.finish(id, result, respond_to).await;
                    return Next::Idle;
                }
            }
        }
    }

    async fn finish(&self, id: Uuid, result: GoalResult, respond_to: oneshot::Sender<GoalResult>) {
        let name = &self.settings.name;
        match result {
            GoalResult::Succeeded => tracing::info!("{}: Arm movement succeeded", name),
            GoalResult::Aborted(reason) => tracing::warn!("{}: Arm movement aborted ({:?})", name, reason),
            GoalResult::Preempted => tracing::info!("{}: Arm movement preempted", name),
        }
        tracing::debug!("{}: goal {} finished", name, id);
        self.set_goal_state(result.state(), None).await;
        let _ = respond_to.send(result);
    }

    async fn set_goal_state(&self, goal_state: GoalState, active_goal: Option<Uuid>) {
        let mut state = self.state.write().await;
        state.goal_state = goal_state;
        state.active_goal = active_goal;
    }
}
