// Tick-level tests of goal validation and execution against the simulated arm

use std::sync::Arc;

use reachy_arm_rs::config::JointConfig;
use reachy_arm_rs::controller::{
    AbortReason, ArmController, CommandError, ControllerSettings, GoalError, GoalResult, TickOutcome,
};
use reachy_arm_rs::hardware::{ActuatorInterface, SimulatedArm};
use reachy_arm_rs::joints::JointSet;
use reachy_arm_rs::time::{ManualTimeSource, TimeSource};
use reachy_arm_rs::trajectory::{FitError, GoalRequest, SchedulePhase, TrajectoryPoint};
use uuid::Uuid;

fn names() -> Vec<String> {
    vec!["shoulder".to_string(), "elbow".to_string()]
}

fn settings(continuous: bool) -> ControllerSettings {
    ControllerSettings {
        name: "test_arm".to_string(),
        rate_hz: 100.0,
        continuous,
        default_tolerance: 0.25,
    }
}

fn setup(continuous: bool, arm: SimulatedArm) -> (Arc<SimulatedArm>, ArmController, Arc<ManualTimeSource>) {
    let arm = Arc::new(arm);
    let clock = Arc::new(ManualTimeSource::new(50.0));
    let controller = ArmController::new(
        JointSet::new(names()).unwrap(),
        arm.clone(),
        clock.clone(),
        settings(continuous),
    );
    (arm, controller, clock)
}

fn simulated_arm() -> SimulatedArm {
    SimulatedArm::new(&[JointConfig::new("shoulder", 1), JointConfig::new("elbow", 2)])
}

async fn torque_on(arm: &SimulatedArm) {
    for name in names() {
        arm.set_compliance(&name, false).await.unwrap();
    }
}

fn ramp() -> GoalRequest {
    GoalRequest::new(
        names(),
        vec![
            TrajectoryPoint::new(0.0, vec![0.0, 0.0]),
            TrajectoryPoint::new(1.0, vec![1.0, 1.0]),
        ],
    )
}

fn commanded(outcome: TickOutcome) -> Vec<f64> {
    match outcome {
        TickOutcome::Commanded(sample) => sample.desired.positions,
        other => panic!("expected a commanded tick, got {:?}", other),
    }
}

#[tokio::test]
async fn test_two_joint_ramp_end_to_end() {
    let (arm, controller, _) = setup(false, simulated_arm());
    torque_on(&arm).await;
    let request = ramp().with_start_time(100.0).with_tolerance(0.1);
    let execution = controller.prepare(Uuid::new_v4(), &request).await.unwrap();
    assert_eq!(execution.start_time(), 100.0);
    assert_eq!(execution.end_time(), 1.0);

    assert_eq!(controller.tick(&execution, 99.5, false).await, TickOutcome::Waiting);
    assert_eq!(arm.goal_position_writes(), 0);

    let quarter = commanded(controller.tick(&execution, 100.25, false).await);
    let half = commanded(controller.tick(&execution, 100.5, false).await);
    for (q, h) in quarter.iter().zip(&half) {
        assert!(*h > 0.0 && *h < 1.0);
        assert!(h > q);
        assert!((h - 0.5).abs() < 1e-9);
    }
    assert_eq!(arm.goal_position_writes(), 4);

    assert_eq!(execution.phase_at(101.05), SchedulePhase::Tolerating);
    let held = commanded(controller.tick(&execution, 101.05, false).await);
    assert!(held.iter().all(|p| (p - 1.0).abs() < 1e-9));
    assert!((arm.position("elbow").await.unwrap() - 1.0).abs() < 1e-6);

    assert_eq!(
        controller.tick(&execution, 101.2, false).await,
        TickOutcome::Finished(GoalResult::Succeeded)
    );
}

#[tokio::test]
async fn test_feedback_reports_tracking_error() {
    // Barely moving motors so the actual position lags the target
    let (arm, controller, _) = setup(false, simulated_arm().with_max_speed(0.001));
    torque_on(&arm).await;
    let execution = controller.prepare(Uuid::new_v4(), &ramp().with_start_time(10.0)).await.unwrap();

    let TickOutcome::Commanded(sample) = controller.tick(&execution, 10.5, false).await else {
        panic!("expected a commanded tick");
    };
    assert_eq!(sample.goal_id, execution.id());
    assert_eq!(sample.joint_names, names());
    assert_eq!(sample.elapsed, 0.5);
    for i in 0..2 {
        let expected = sample.desired.positions[i] - sample.actual.positions[i];
        assert!((sample.error.positions[i] - expected).abs() < 1e-12);
        assert!(sample.error.positions[i] > 0.4);
    }
}

#[tokio::test]
async fn test_single_waypoint_starts_from_current_position() {
    let (arm, controller, clock) = setup(false, simulated_arm());
    arm.place("shoulder", 0.2).await.unwrap();
    torque_on(&arm).await;

    let request = GoalRequest::new(names(), vec![TrajectoryPoint::new(1.0, vec![1.0, -1.0])]);
    let execution = controller.prepare(Uuid::new_v4(), &request).await.unwrap();
    // No start time: the goal starts now
    assert_eq!(execution.start_time(), clock.now());

    let points = &execution.trajectory().points;
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].time_from_start, 0.0);
    assert!((points[0].positions[0] - 0.2).abs() < 1e-9);
    assert!(points[0].positions[1].abs() < 1e-9);

    let start = execution.curve().sample(0, 0.0);
    assert!((start.positions[0] - 0.2).abs() < 1e-9);
    assert_eq!(execution.trajectory().tolerance, 0.25);
}

#[tokio::test]
async fn test_discrete_mode_ends_at_rest() {
    let points = vec![
        TrajectoryPoint::new(0.0, vec![0.0, 0.0]).with_velocities(vec![0.0, 0.0]),
        TrajectoryPoint::new(1.0, vec![1.0, 0.5]).with_velocities(vec![2.0, -1.0]),
    ];
    let request = GoalRequest::new(names(), points).with_start_time(1.0);

    let (_, controller, _) = setup(false, simulated_arm());
    let execution = controller.prepare(Uuid::new_v4(), &request).await.unwrap();
    let end = execution.curve().sample(0, 1.0);
    assert!(end.velocities.iter().all(|v| v.abs() < 1e-9));
    let held = execution.desired_point(SchedulePhase::Tolerating, 1.05).unwrap();
    assert!(held.velocities.iter().all(|v| v.abs() < 1e-9));

    let (_, controller, _) = setup(true, simulated_arm());
    let execution = controller.prepare(Uuid::new_v4(), &request).await.unwrap();
    let end = execution.curve().sample(0, 1.0);
    assert!((end.velocities[0] - 2.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_cancel_wins_over_completion() {
    let (arm, controller, _) = setup(false, simulated_arm());
    torque_on(&arm).await;
    let execution = controller.prepare(Uuid::new_v4(), &ramp().with_start_time(5.0)).await.unwrap();
    commanded(controller.tick(&execution, 5.5, false).await);
    let writes = arm.goal_position_writes();

    // Past the tolerance window, but a cancellation is pending
    assert_eq!(
        controller.tick(&execution, 10.0, true).await,
        TickOutcome::Finished(GoalResult::Preempted)
    );
    assert_eq!(controller.tick(&execution, 5.6, true).await, TickOutcome::Finished(GoalResult::Preempted));
    assert_eq!(arm.goal_position_writes(), writes);
}

#[tokio::test]
async fn test_invalid_joints_are_rejected_before_any_write() {
    let (arm, controller, _) = setup(false, simulated_arm());
    torque_on(&arm).await;

    let mut request = ramp();
    request.joint_names = vec!["shoulder".to_string(), "wrist".to_string()];
    let err = controller.prepare(Uuid::new_v4(), &request).await.unwrap_err();
    assert_eq!(err, GoalError::InvalidJoint("wrist".to_string()));
    assert_eq!(err.abort_reason(), AbortReason::InvalidJoints);

    request.joint_names = vec!["elbow".to_string(), "elbow".to_string()];
    let err = controller.prepare(Uuid::new_v4(), &request).await.unwrap_err();
    assert_eq!(err.abort_reason(), AbortReason::InvalidJoints);

    request.joint_names.clear();
    let err = controller.prepare(Uuid::new_v4(), &request).await.unwrap_err();
    assert_eq!(err.abort_reason(), AbortReason::InvalidJoints);

    assert_eq!(arm.goal_position_writes(), 0);
}

#[tokio::test]
async fn test_empty_and_unfittable_trajectories() {
    let (arm, controller, _) = setup(false, simulated_arm());

    let empty = GoalRequest::new(names(), Vec::new());
    let err = controller.prepare(Uuid::new_v4(), &empty).await.unwrap_err();
    assert_eq!(err, GoalError::EmptyTrajectory);
    assert_eq!(err.abort_reason(), AbortReason::EmptyTrajectory);

    let short = GoalRequest::new(
        names(),
        vec![
            TrajectoryPoint::new(0.0, vec![0.0, 0.0]),
            TrajectoryPoint::new(1.0, vec![1.0]),
        ],
    );
    let err = controller.prepare(Uuid::new_v4(), &short).await.unwrap_err();
    assert!(matches!(err, GoalError::Fit(FitError::DimensionMismatch { index: 1, .. })));
    assert_eq!(err.abort_reason(), AbortReason::FitFailure);

    let nan = GoalRequest::new(
        names(),
        vec![
            TrajectoryPoint::new(0.0, vec![0.0, 0.0]),
            TrajectoryPoint::new(1.0, vec![f64::NAN, 1.0]),
        ],
    );
    let err = controller.prepare(Uuid::new_v4(), &nan).await.unwrap_err();
    assert_eq!(err.abort_reason(), AbortReason::FitFailure);
    assert_eq!(arm.goal_position_writes(), 0);
}

#[tokio::test]
async fn test_compliant_arm_aborts_without_writes() {
    let (arm, controller, _) = setup(false, simulated_arm());
    let execution = controller.prepare(Uuid::new_v4(), &ramp().with_start_time(1.0)).await.unwrap();
    assert_eq!(
        controller.tick(&execution, 1.5, false).await,
        TickOutcome::Finished(GoalResult::Aborted(AbortReason::CommandFailure))
    );
    assert_eq!(arm.goal_position_writes(), 0);
}

#[tokio::test]
async fn test_one_compliant_joint_blocks_the_whole_point() {
    let (arm, controller, _) = setup(false, simulated_arm());
    arm.set_compliance("shoulder", false).await.unwrap();

    let point = TrajectoryPoint::new(0.0, vec![0.3, 0.3]);
    let err = controller.command_joints(&names(), &point).await.unwrap_err();
    assert_eq!(err, CommandError::Compliant("elbow".to_string()));
    assert_eq!(arm.goal_position_writes(), 0);
}

#[tokio::test]
async fn test_malformed_points_are_refused() {
    let (arm, controller, _) = setup(false, simulated_arm());
    torque_on(&arm).await;

    let short = TrajectoryPoint::new(0.0, vec![0.3]);
    assert_eq!(
        controller.command_joints(&names(), &short).await.unwrap_err(),
        CommandError::LengthMismatch { names: 2, positions: 1 }
    );
    let unknown = vec!["shoulder".to_string(), "wrist".to_string()];
    assert_eq!(
        controller
            .command_joints(&unknown, &TrajectoryPoint::new(0.0, vec![0.1, 0.1]))
            .await
            .unwrap_err(),
        CommandError::UnknownJoint("wrist".to_string())
    );
    assert_eq!(arm.goal_position_writes(), 0);

    controller
        .command_joints(&names(), &TrajectoryPoint::new(0.0, vec![0.1, -0.1]))
        .await
        .unwrap();
    assert_eq!(arm.goal_position_writes(), 2);
    assert!((arm.goal_position("elbow").await.unwrap() + 0.1).abs() < 1e-9);
}
