//! # Arm Node Configuration
//!
//! This module defines the TOML configuration for one arm node: control and
//! telemetry rates, the trajectory execution policy, and the explicit
//! per-joint actuator table.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [arm]
//! name = "reachy_arm"
//! side = "right"
//! rate_hz = 100.0
//! continuous_trajectories = false
//! goal_time_tolerance = 0.1
//!
//! [[joints]]
//! name = "r_shoulder_pitch"
//! id = 10
//! offset = 90.0
//! orientation = "indirect"
//! angle_limits = [-180.0, 60.0]
//! ```
//!
//! - When `[[joints]]` is omitted, the default Reachy arm joints are generated
//!   from `side`, the last one being the gripper.
//! - Angles in the joint table are motor degrees.

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main configuration struct for the arm node and its actuators.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub arm: ArmConfig,
    #[serde(default)]
    pub joints: Vec<JointConfig>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArmSide {
    Right,
    Left,
}

impl ArmSide {
    pub fn letter(self) -> char {
        match self {
            ArmSide::Right => 'r',
            ArmSide::Left => 'l',
        }
    }
}

/// Node-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArmConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_side")]
    pub side: ArmSide,
    /// Control loop rate (Hz)
    #[serde(default = "default_rate_hz")]
    pub rate_hz: f64,
    /// Joint state and temperature publication rate (Hz)
    #[serde(default = "default_telemetry_rate_hz")]
    pub telemetry_rate_hz: f64,
    /// When false, every goal ends at rest
    #[serde(default)]
    pub continuous_trajectories: bool,
    /// Tolerance (s) used when a goal does not carry one
    #[serde(default = "default_goal_time_tolerance")]
    pub goal_time_tolerance: f64,
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            side: default_side(),
            rate_hz: default_rate_hz(),
            telemetry_rate_hz: default_telemetry_rate_hz(),
            continuous_trajectories: false,
            goal_time_tolerance: default_goal_time_tolerance(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Direct,
    Indirect,
}

impl Orientation {
    pub fn sign(self) -> f64 {
        match self {
            Orientation::Direct => 1.0,
            Orientation::Indirect => -1.0,
        }
    }
}

/// One actuator of the arm.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JointConfig {
    pub name: String,
    #[serde(default)]
    pub id: u8,
    /// Motor zero offset (degrees)
    #[serde(default)]
    pub offset: f64,
    #[serde(default = "default_orientation")]
    pub orientation: Orientation,
    /// Allowed motor range (degrees)
    #[serde(default = "default_angle_limits")]
    pub angle_limits: (f64, f64),
}

impl JointConfig {
    pub fn new(name: &str, id: u8) -> Self {
        Self {
            name: name.to_string(),
            id,
            offset: 0.0,
            orientation: default_orientation(),
            angle_limits: default_angle_limits(),
        }
    }
}

impl Config {
    /// The actuator table, falling back to the default joints for `arm.side`.
    pub fn joint_configs(&self) -> Vec<JointConfig> {
        if !self.joints.is_empty() {
            return self.joints.clone();
        }
        let s = self.arm.side.letter();
        let base_id = match self.arm.side {
            ArmSide::Right => 10,
            ArmSide::Left => 20,
        };
        DEFAULT_JOINT_SUFFIXES
            .iter()
            .enumerate()
            .map(|(i, suffix)| JointConfig::new(&format!("{}_{}", s, suffix), base_id + i as u8))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        rate_period(self.arm.rate_hz)
            .map_err(|_| ConfigError::Invalid("arm.rate_hz must be > 0 with a non-zero period".to_string()))?;
        rate_period(self.arm.telemetry_rate_hz).map_err(|_| {
            ConfigError::Invalid("arm.telemetry_rate_hz must be > 0 with a non-zero period".to_string())
        })?;
        if !(self.arm.goal_time_tolerance >= 0.0) {
            return Err(ConfigError::Invalid("arm.goal_time_tolerance must be >= 0".to_string()));
        }
        let joints = self.joint_configs();
        if joints.is_empty() {
            return Err(ConfigError::Invalid("at least one joint is required".to_string()));
        }
        let mut seen = HashSet::new();
        for joint in &joints {
            if !seen.insert(joint.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate joint name '{}'", joint.name)));
            }
            if joint.angle_limits.0 > joint.angle_limits.1 {
                return Err(ConfigError::Invalid(format!(
                    "joint '{}' has inverted angle limits",
                    joint.name
                )));
            }
        }
        Ok(())
    }
}

const DEFAULT_JOINT_SUFFIXES: [&str; 8] = [
    "shoulder_pitch",
    "shoulder_roll",
    "arm_yaw",
    "elbow_pitch",
    "forearm_yaw",
    "wrist_pitch",
    "wrist_roll",
    "gripper",
];

/// Tick period of a loop running at `rate_hz`.
///
/// Fails for rates that are not positive, not finite, or so high that the
/// period rounds down to zero.
pub fn rate_period(rate_hz: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(1.0 / rate_hz)
        .ok()
        .filter(|period| !period.is_zero())
        .ok_or_else(|| ConfigError::Invalid(format!("{} Hz has no usable tick period", rate_hz)))
}

// Default value functions
fn default_name() -> String { "reachy_arm".to_string() }
fn default_side() -> ArmSide { ArmSide::Right }
fn default_rate_hz() -> f64 { 100.0 }
fn default_telemetry_rate_hz() -> f64 { 20.0 }
fn default_goal_time_tolerance() -> f64 { 0.1 }
fn default_shutdown_grace_ms() -> u64 { 200 }
fn default_orientation() -> Orientation { Orientation::Direct }
fn default_angle_limits() -> (f64, f64) { (-180.0, 180.0) }

/// Load and validate configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::error!("Failed to read config file '{}': {}", path, e);
            return Err(ConfigError::Io(e));
        }
    };
    let config: Config = match toml::from_str(&contents) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to parse config TOML: {}", e);
            return Err(ConfigError::Toml(e));
        }
    };
    config.validate()?;
    Ok(config)
}
