// src/node.rs - Wires the controller, compliance and telemetry around one actuator
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;

use crate::compliance::{ComplianceResponse, ComplianceService};
use crate::config::{Config, ConfigError};
use crate::controller::{
    ArmController, ArmState, ControllerSettings, ControllerStopped, GoalClient, GoalHandle, GoalSubmission,
};
use crate::hardware::{ActuatorInterface, HardwareError};
use crate::joints::{JointSet, JointSetError};
use crate::telemetry::{JointStateMessage, JointTemperaturesMessage, TelemetryPublisher};
use crate::time::{SystemTimeSource, TimeSource};
use crate::trajectory::GoalRequest;

const GOAL_QUEUE: usize = 8;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Joint table error: {0}")]
    Joints(#[from] JointSetError),
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),
    #[error(transparent)]
    ControllerStopped(#[from] ControllerStopped),
}

pub struct ArmNode {
    config: Config,
    joints: JointSet,
    controller: Option<ArmController>,
    goals_rx: Option<mpsc::Receiver<GoalSubmission>>,
    state: Arc<RwLock<ArmState>>,
    client: GoalClient,
    compliance: ComplianceService,
    telemetry: TelemetryPublisher,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl ArmNode {
    pub async fn new(config: Config, actuator: Arc<dyn ActuatorInterface>) -> Result<Self, NodeError> {
        Self::with_time_source(config, actuator, Arc::new(SystemTimeSource)).await
    }

    /// Build the node and free every joint; nothing moves until torque is
    /// explicitly enabled through the compliance service.
    pub async fn with_time_source(
        config: Config,
        actuator: Arc<dyn ActuatorInterface>,
        time: Arc<dyn TimeSource>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        let joints = JointSet::new(config.joint_configs().into_iter().map(|joint| joint.name))?;

        let compliance = ComplianceService::new(joints.clone(), actuator.clone());
        compliance.set_all_compliant().await?;

        let controller = ArmController::new(
            joints.clone(),
            actuator.clone(),
            time,
            ControllerSettings::from_config(&config.arm),
        )
        .with_actuator_lock(compliance.actuator_lock());
        let state = controller.state();
        let telemetry = TelemetryPublisher::new(&joints, actuator, config.arm.telemetry_rate_hz)?;
        let (goals_tx, goals_rx) = mpsc::channel(GOAL_QUEUE);
        let (shutdown_tx, _) = broadcast::channel(1);

        tracing::info!("{}: {} joints ready ({})", config.arm.name, joints.len(), joints.names().join(", "));
        Ok(Self {
            config,
            joints,
            controller: Some(controller),
            goals_rx: Some(goals_rx),
            state,
            client: GoalClient::new(goals_tx),
            compliance,
            telemetry,
            shutdown_tx,
            tasks: Vec::new(),
        })
    }

    /// Spawn the control and telemetry loops.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        let (Some(controller), Some(goals_rx)) = (self.controller.take(), self.goals_rx.take()) else {
            tracing::warn!("{}: node already started", self.config.arm.name);
            return Ok(());
        };
        let control_shutdown = self.shutdown_tx.subscribe();
        self.tasks
            .push(tokio::spawn(controller.run(goals_rx, control_shutdown)));

        let telemetry = self.telemetry.clone();
        let telemetry_shutdown = self.shutdown_tx.subscribe();
        self.tasks.push(tokio::spawn(telemetry.run(telemetry_shutdown)));

        tracing::info!("{}: arm node running", self.config.arm.name);
        Ok(())
    }

    /// Stop both loops, then leave every actuator compliant.
    pub async fn shutdown(&mut self) -> Result<(), NodeError> {
        tracing::info!("{}: shutting down", self.config.arm.name);
        let _ = self.shutdown_tx.send(());
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!("Task failed during shutdown: {}", e);
            }
        }
        self.compliance.set_all_compliant().await?;
        tokio::time::sleep(Duration::from_millis(self.config.arm.shutdown_grace_ms)).await;
        Ok(())
    }

    pub fn client(&self) -> GoalClient {
        self.client.clone()
    }

    pub async fn submit(&self, request: GoalRequest) -> Result<GoalHandle, NodeError> {
        Ok(self.client.submit(request).await?)
    }

    pub async fn state(&self) -> ArmState {
        self.state.read().await.clone()
    }

    pub fn subscribe_joint_states(&self) -> broadcast::Receiver<JointStateMessage> {
        self.telemetry.subscribe_joint_states()
    }

    pub fn subscribe_temperatures(&self) -> broadcast::Receiver<JointTemperaturesMessage> {
        self.telemetry.subscribe_temperatures()
    }

    pub async fn set_arm_compliance(&self, compliant: bool) -> ComplianceResponse {
        self.compliance.set_arm_compliance(compliant).await
    }

    pub async fn set_gripper_compliance(&self, compliant: bool) -> ComplianceResponse {
        self.compliance.set_gripper_compliance(compliant).await
    }

    pub fn compliance(&self) -> &ComplianceService {
        &self.compliance
    }

    pub fn joints(&self) -> &JointSet {
        &self.joints
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
