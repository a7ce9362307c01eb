// Goal lifecycle through a running arm node: success, cancellation, preemption and shutdown

use std::sync::Arc;
use std::time::Duration;

use reachy_arm_rs::config::{ArmConfig, Config, JointConfig};
use reachy_arm_rs::controller::{
    AbortReason, ArmController, ControllerSettings, GoalHandle, GoalResult, GoalState,
};
use reachy_arm_rs::hardware::{ActuatorInterface, SimulatedArm};
use reachy_arm_rs::joints::JointSet;
use reachy_arm_rs::time::SystemTimeSource;
use reachy_arm_rs::trajectory::{GoalRequest, TrajectoryPoint};
use reachy_arm_rs::ArmNode;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn test_config() -> Config {
    Config {
        arm: ArmConfig {
            name: "test_arm".to_string(),
            rate_hz: 200.0,
            telemetry_rate_hz: 50.0,
            shutdown_grace_ms: 0,
            ..ArmConfig::default()
        },
        joints: vec![
            JointConfig::new("shoulder", 1),
            JointConfig::new("elbow", 2),
            JointConfig::new("gripper", 3),
        ],
    }
}

async fn started_node() -> (ArmNode, Arc<SimulatedArm>) {
    let config = test_config();
    let arm = Arc::new(SimulatedArm::new(&config.joints));
    let mut node = ArmNode::new(config, arm.clone()).await.unwrap();
    node.start().await.unwrap();
    (node, arm)
}

fn goal(duration: f64, target: f64) -> GoalRequest {
    GoalRequest::new(
        vec!["shoulder".to_string(), "elbow".to_string()],
        vec![
            TrajectoryPoint::new(0.0, vec![0.0, 0.0]),
            TrajectoryPoint::new(duration, vec![target, -target]),
        ],
    )
    .with_tolerance(0.05)
}

async fn first_feedback(handle: &mut GoalHandle) {
    timeout(WAIT, handle.next_feedback())
        .await
        .expect("no feedback in time")
        .expect("feedback channel closed");
}

async fn result_of(handle: GoalHandle) -> GoalResult {
    timeout(WAIT, handle.result()).await.expect("no result in time").unwrap()
}

#[tokio::test]
async fn test_goal_succeeds_with_feedback() {
    let (mut node, arm) = started_node().await;
    assert!(node.set_arm_compliance(false).await.success);

    let mut handle = node.submit(goal(0.2, 0.4)).await.unwrap();
    let mut samples = Vec::new();
    while let Ok(Some(sample)) = timeout(WAIT, handle.next_feedback()).await {
        samples.push(sample);
    }
    assert_eq!(result_of(handle).await, GoalResult::Succeeded);
    assert!(!samples.is_empty());
    assert!(samples.windows(2).all(|w| w[0].elapsed <= w[1].elapsed));

    let state = node.state().await;
    assert_eq!(state.goal_state, GoalState::Succeeded);
    assert_eq!(state.active_goal, None);
    assert!(state.last_feedback.is_some());
    assert!((arm.position("shoulder").await.unwrap() - 0.4).abs() < 1e-6);

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_cancel_preempts_running_goal() {
    let (mut node, arm) = started_node().await;
    node.set_arm_compliance(false).await;

    let mut handle = node.submit(goal(5.0, 1.0)).await.unwrap();
    first_feedback(&mut handle).await;
    handle.cancel();
    assert_eq!(result_of(handle).await, GoalResult::Preempted);

    // Nothing is commanded once the goal is preempted
    let writes = arm.goal_position_writes();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(arm.goal_position_writes(), writes);
    assert_eq!(node.state().await.goal_state, GoalState::Preempted);

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_new_goal_preempts_current_one() {
    let (mut node, _arm) = started_node().await;
    node.set_arm_compliance(false).await;

    let mut first = node.submit(goal(5.0, 1.0)).await.unwrap();
    first_feedback(&mut first).await;
    let second = node.submit(goal(0.1, 0.2)).await.unwrap();

    assert_eq!(result_of(first).await, GoalResult::Preempted);
    assert_eq!(result_of(second).await, GoalResult::Succeeded);

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_goal_aborts_without_motion() {
    let (mut node, arm) = started_node().await;
    node.set_arm_compliance(false).await;

    let request = GoalRequest::new(
        vec!["shoulder".to_string(), "wrist".to_string()],
        vec![TrajectoryPoint::new(1.0, vec![0.5, 0.5])],
    );
    let handle = node.submit(request).await.unwrap();
    assert_eq!(result_of(handle).await, GoalResult::Aborted(AbortReason::InvalidJoints));

    let handle = node.submit(GoalRequest::new(vec!["shoulder".to_string()], Vec::new())).await.unwrap();
    assert_eq!(result_of(handle).await, GoalResult::Aborted(AbortReason::EmptyTrajectory));
    assert_eq!(arm.goal_position_writes(), 0);

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_compliant_arm_aborts_goal() {
    let (mut node, arm) = started_node().await;

    let handle = node.submit(goal(0.5, 0.3)).await.unwrap();
    assert_eq!(result_of(handle).await, GoalResult::Aborted(AbortReason::CommandFailure));
    assert_eq!(arm.goal_position_writes(), 0);
    assert_eq!(node.state().await.goal_state, GoalState::Aborted);

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_enabling_compliance_mid_goal_aborts_it() {
    let (mut node, _arm) = started_node().await;
    node.set_arm_compliance(false).await;

    let mut handle = node.submit(goal(5.0, 1.0)).await.unwrap();
    first_feedback(&mut handle).await;
    assert!(node.set_arm_compliance(true).await.success);
    assert_eq!(result_of(handle).await, GoalResult::Aborted(AbortReason::CommandFailure));

    node.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_preempts_and_frees_the_arm() {
    let (mut node, arm) = started_node().await;
    node.set_arm_compliance(false).await;
    node.set_gripper_compliance(false).await;

    let mut handle = node.submit(goal(5.0, 1.0)).await.unwrap();
    first_feedback(&mut handle).await;
    node.shutdown().await.unwrap();

    assert_eq!(result_of(handle).await, GoalResult::Preempted);
    for joint in ["shoulder", "elbow", "gripper"] {
        assert!(arm.compliance(joint).await.unwrap());
    }
    assert!(node.submit(goal(0.1, 0.1)).await.is_err());
}

#[tokio::test]
async fn test_node_starts_compliant() {
    let config = test_config();
    let arm = Arc::new(SimulatedArm::new(&config.joints));
    arm.set_compliance("elbow", false).await.unwrap();

    let node = ArmNode::new(config, arm.clone()).await.unwrap();
    assert!(arm.compliance("elbow").await.unwrap());
    assert_eq!(node.joints().gripper(), "gripper");
    assert_eq!(node.state().await.goal_state, GoalState::Idle);
}

#[tokio::test]
async fn test_node_rejects_rate_without_tick_period() {
    let mut config = test_config();
    config.arm.rate_hz = 1e10;
    let arm = Arc::new(SimulatedArm::new(&config.joints));
    assert!(ArmNode::new(config, arm).await.is_err());
}

#[tokio::test]
async fn test_control_loop_with_unusable_rate_exits_cleanly() {
    let config = test_config();
    let arm = Arc::new(SimulatedArm::new(&config.joints));
    let joints = JointSet::new(config.joints.iter().map(|j| j.name.clone())).unwrap();
    let settings = ControllerSettings {
        rate_hz: 1e10,
        ..ControllerSettings::default()
    };
    let controller = ArmController::new(joints, arm, Arc::new(SystemTimeSource), settings);
    let (_goals_tx, goals_rx) = mpsc::channel(1);
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let task = tokio::spawn(controller.run(goals_rx, shutdown_rx));
    timeout(WAIT, task).await.expect("loop did not exit").unwrap();
}
