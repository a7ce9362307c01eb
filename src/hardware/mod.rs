// src/hardware/mod.rs - Actuator abstraction shared by the controller, telemetry and compliance
pub mod simulated;

pub use simulated::SimulatedArm;

use async_trait::async_trait;
use thiserror::Error;

/// Radians per motor degree, as used by the arm's servo firmware.
pub const DEG_TO_RAD: f64 = 0.0174527;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum HardwareError {
    #[error("Unknown joint: {0}")]
    UnknownJoint(String),
    #[error("Bus error on joint '{joint}': {message}")]
    Bus { joint: String, message: String },
}

/// Per-joint access to the arm's servos.
///
/// Reads may run concurrently with each other; goal-position writes come only
/// from the control loop, compliance writes only from the compliance service
/// and the node's startup/shutdown path.
#[async_trait]
pub trait ActuatorInterface: Send + Sync {
    /// Present position (radians)
    async fn position(&self, joint: &str) -> Result<f64, HardwareError>;
    /// Motor temperature (°C)
    async fn temperature(&self, joint: &str) -> Result<f64, HardwareError>;
    async fn set_goal_position(&self, joint: &str, radians: f64) -> Result<(), HardwareError>;
    /// True when the joint is free-moving (torque off)
    async fn compliance(&self, joint: &str) -> Result<bool, HardwareError>;
    async fn set_compliance(&self, joint: &str, compliant: bool) -> Result<(), HardwareError>;
}

pub async fn read_positions(
    actuator: &dyn ActuatorInterface,
    joints: &[String],
) -> Result<Vec<f64>, HardwareError> {
    let mut positions = Vec::with_capacity(joints.len());
    for joint in joints {
        positions.push(actuator.position(joint).await?);
    }
    Ok(positions)
}

pub async fn read_temperatures(
    actuator: &dyn ActuatorInterface,
    joints: &[String],
) -> Result<Vec<f64>, HardwareError> {
    let mut temperatures = Vec::with_capacity(joints.len());
    for joint in joints {
        temperatures.push(actuator.temperature(joint).await?);
    }
    Ok(temperatures)
}
