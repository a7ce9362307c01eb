//! Scripted goals against the simulated arm: smooth motion, single-waypoint
//! synthesis, preemption and the compliant-arm abort.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use reachy_arm_rs::config::{self, Config};
use reachy_arm_rs::{ArmNode, GoalRequest, GoalResult, NodeError, SimulatedArm, TrajectoryPoint};

/// Simulation Harness CLI
#[derive(Parser, Debug)]
#[command(name = "sim-harness", about = "Runs scripted trajectory goals against a simulated arm.")]
struct Cli {
    /// Path to a TOML config file (overrides defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Simulated motor speed limit (deg/s); instant tracking when omitted
    #[arg(long)]
    max_speed: Option<f64>,

    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

async fn run_goal(node: &ArmNode, label: &str, request: GoalRequest) -> Result<GoalResult, NodeError> {
    let mut handle = node.submit(request).await?;
    let mut samples = 0usize;
    let mut peak_error = 0.0f64;
    while let Some(sample) = handle.next_feedback().await {
        samples += 1;
        peak_error = peak_error.max(sample.max_abs_error());
    }
    let result = handle.result().await?;
    tracing::info!(
        "[{}] {:?} after {} feedback samples, peak tracking error {:.4} rad",
        label,
        result,
        samples,
        peak_error
    );
    Ok(result)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_max_level(cli.log_level).init();

    let config = match &cli.config {
        Some(path) => config::load_config(&path.to_string_lossy())?,
        None => Config::default(),
    };
    let mut arm = SimulatedArm::new(&config.joint_configs());
    if let Some(speed) = cli.max_speed {
        arm = arm.with_max_speed(speed);
    }

    let mut node = ArmNode::new(config, Arc::new(arm)).await?;
    node.start().await?;
    let response = node.set_arm_compliance(false).await;
    tracing::info!("{}", response.message);

    let joints: Vec<String> = node.joints().arm_joints().iter().take(3).cloned().collect();

    let smooth = GoalRequest::new(
        joints.clone(),
        vec![
            TrajectoryPoint::new(0.0, vec![0.0, 0.0, 0.0]),
            TrajectoryPoint::new(1.0, vec![0.5, -0.3, 0.2]),
            TrajectoryPoint::new(2.0, vec![0.0, 0.0, 0.0]),
        ],
    );
    run_goal(&node, "smooth", smooth).await?;

    let single = GoalRequest::new(joints.clone(), vec![TrajectoryPoint::new(1.0, vec![0.3, 0.3, 0.3])]);
    run_goal(&node, "single waypoint", single).await?;

    let long = GoalRequest::new(
        joints.clone(),
        vec![
            TrajectoryPoint::new(0.0, vec![0.3, 0.3, 0.3]),
            TrajectoryPoint::new(3.0, vec![-0.5, 0.5, -0.5]),
        ],
    );
    let mut preempted = node.submit(long).await?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    if let Some(sample) = preempted.drain_feedback().last() {
        tracing::info!("[long] {:.2}s in, max error {:.4} rad", sample.elapsed, sample.max_abs_error());
    }
    let replacement = GoalRequest::new(joints.clone(), vec![TrajectoryPoint::new(0.5, vec![0.0, 0.0, 0.0])]);
    let replacement_result = run_goal(&node, "replacement", replacement);
    let (first, second) = tokio::join!(preempted.result(), replacement_result);
    tracing::info!("[preempted] {:?}", first?);
    second?;

    let response = node.set_arm_compliance(true).await;
    tracing::info!("{}", response.message);
    let blocked = GoalRequest::new(joints, vec![TrajectoryPoint::new(0.5, vec![0.2, 0.2, 0.2])]);
    run_goal(&node, "compliant arm", blocked).await?;

    node.shutdown().await?;
    Ok(())
}
