// src/main.rs - Arm host: runs one arm node on the simulated arm
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use reachy_arm_rs::config::{self, Config};
use reachy_arm_rs::{ArmNode, GoalRequest, SimulatedArm};

/// Arm host CLI
#[derive(Parser, Debug)]
#[command(name = "arm-host", about = "Executes joint trajectories on a robotic arm.")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, default_value = "arm.toml")]
    config: PathBuf,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,

    /// JSON goal to execute once the node is running
    #[arg(long)]
    trajectory: Option<PathBuf>,

    /// Leave the arm joints compliant instead of enabling torque at startup
    #[arg(long)]
    compliant: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt().with_max_level(cli.log_level).init();

    tracing::info!("Starting arm host");
    let config = if cli.config.exists() {
        tracing::info!("Loading configuration from: {}", cli.config.display());
        config::load_config(&cli.config.to_string_lossy())?
    } else {
        tracing::warn!("{} not found, using default configuration", cli.config.display());
        Config::default()
    };
    tracing::info!(
        "Arm: {} ({:?} side) @ {} Hz, continuous trajectories: {}",
        config.arm.name,
        config.arm.side,
        config.arm.rate_hz,
        config.arm.continuous_trajectories
    );

    let actuator = Arc::new(SimulatedArm::new(&config.joint_configs()));
    let mut node = ArmNode::new(config, actuator).await?;
    node.start().await?;

    if !cli.compliant {
        let response = node.set_arm_compliance(false).await;
        if !response.success {
            tracing::error!("{}", response.message);
        }
    }

    if let Some(path) = &cli.trajectory {
        let contents = std::fs::read_to_string(path)?;
        let request: GoalRequest = serde_json::from_str(&contents)?;
        let handle = node.submit(request).await?;
        tracing::info!("Submitted goal {} from {}", handle.id(), path.display());
        tokio::spawn(async move {
            match handle.result().await {
                Ok(result) => tracing::info!("Goal finished: {:?}", result),
                Err(e) => tracing::error!("{}", e),
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    node.shutdown().await?;
    tracing::info!("Arm host stopped");
    Ok(())
}
