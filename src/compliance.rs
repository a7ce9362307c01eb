// src/compliance.rs - Torque on/off requests for the arm and gripper joints
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::hardware::{ActuatorInterface, HardwareError};
use crate::joints::JointSet;

/// Reply to a compliance request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceResponse {
    pub success: bool,
    pub message: String,
}

impl ComplianceResponse {
    fn from_result(result: Result<(), HardwareError>, part: &str, compliant: bool) -> Self {
        match result {
            Ok(()) => {
                let message = format!("{} compliance has been {}", part, if compliant { "enabled" } else { "disabled" });
                tracing::info!("{}", message);
                Self { success: true, message }
            }
            Err(e) => {
                let message = format!("Failed to set {} compliance: {}", part.to_lowercase(), e);
                tracing::warn!("{}", message);
                Self { success: false, message }
            }
        }
    }
}

/// Serializes compliance writes against each other and, through the shared
/// actuator lock, against the controller's per-point writes. The control loop
/// reads the flags fresh every tick, so turning compliance on mid-goal aborts
/// that goal at its next tick.
#[derive(Clone)]
pub struct ComplianceService {
    joints: JointSet,
    actuator: Arc<dyn ActuatorInterface>,
    actuator_lock: Arc<Mutex<()>>,
}

impl ComplianceService {
    pub fn new(joints: JointSet, actuator: Arc<dyn ActuatorInterface>) -> Self {
        Self {
            joints,
            actuator,
            actuator_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The lock to hand to `ArmController::with_actuator_lock`.
    pub fn actuator_lock(&self) -> Arc<Mutex<()>> {
        self.actuator_lock.clone()
    }

    /// Every joint except the gripper.
    pub async fn set_arm_compliance(&self, compliant: bool) -> ComplianceResponse {
        let result = self.apply(self.joints.arm_joints(), compliant).await;
        ComplianceResponse::from_result(result, "Arm", compliant)
    }

    pub async fn set_gripper_compliance(&self, compliant: bool) -> ComplianceResponse {
        let gripper = [self.joints.gripper().to_string()];
        let result = self.apply(&gripper, compliant).await;
        ComplianceResponse::from_result(result, "Gripper", compliant)
    }

    /// Free every joint. Used at startup and shutdown.
    pub async fn set_all_compliant(&self) -> Result<(), HardwareError> {
        self.apply(self.joints.names(), true).await
    }

    pub async fn is_compliant(&self, joint: &str) -> Result<bool, HardwareError> {
        self.actuator.compliance(joint).await
    }

    async fn apply(&self, joints: &[String], compliant: bool) -> Result<(), HardwareError> {
        let _guard = self.actuator_lock.lock().await;
        for joint in joints {
            self.actuator.set_compliance(joint, compliant).await?;
        }
        Ok(())
    }
}
