// src/lib.rs - Trajectory execution engine for a robotic arm
pub mod compliance;
pub mod config;
pub mod controller;
pub mod hardware;
pub mod joints;
pub mod node;
pub mod telemetry;
pub mod time;
pub mod trajectory;

pub use compliance::{ComplianceResponse, ComplianceService};
pub use config::{load_config, Config, ConfigError};
pub use controller::{
    AbortReason, ArmController, ArmState, ControllerSettings, FeedbackSample, GoalClient, GoalHandle, GoalResult,
    GoalState,
};
pub use hardware::{ActuatorInterface, HardwareError, SimulatedArm, DEG_TO_RAD};
pub use joints::JointSet;
pub use node::{ArmNode, NodeError};
pub use telemetry::{JointStateMessage, JointTemperaturesMessage, TelemetryPublisher};
pub use time::{ManualTimeSource, SystemTimeSource, TimeSource};
pub use trajectory::{GoalRequest, TrajectoryPoint};
