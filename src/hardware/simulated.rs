//! Simulated arm built from an explicit per-joint actuator table.
//!
//! Each motor keeps its goal and present position in motor degrees, converted
//! from joint radians through the joint's offset and orientation and clamped
//! to its angle limits. Torqued motors move toward their goal, either instantly
//! or at a bounded speed; compliant motors stay where they are.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ActuatorInterface, HardwareError, DEG_TO_RAD};
use crate::config::JointConfig;

const AMBIENT_TEMPERATURE: f64 = 32.0;
const TORQUE_HEATING: f64 = 6.0;

#[derive(Debug, Clone)]
struct MotorState {
    config: JointConfig,
    goal_deg: f64,
    present_deg: f64,
    compliant: bool,
    last_update: Instant,
}

impl MotorState {
    fn new(config: JointConfig) -> Self {
        let present_deg = config.offset.clamp(config.angle_limits.0, config.angle_limits.1);
        Self {
            config,
            goal_deg: present_deg,
            present_deg,
            compliant: true,
            last_update: Instant::now(),
        }
    }

    fn to_motor_deg(&self, radians: f64) -> f64 {
        let deg = self.config.orientation.sign() * radians / DEG_TO_RAD + self.config.offset;
        deg.clamp(self.config.angle_limits.0, self.config.angle_limits.1)
    }

    fn to_radians(&self, deg: f64) -> f64 {
        (deg - self.config.offset) * self.config.orientation.sign() * DEG_TO_RAD
    }

    fn advance(&mut self, max_speed_deg_s: Option<f64>) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        if self.compliant {
            return;
        }
        let delta = self.goal_deg - self.present_deg;
        self.present_deg = match max_speed_deg_s {
            Some(speed) => self.present_deg + delta.clamp(-speed * dt, speed * dt),
            None => self.goal_deg,
        };
    }
}

#[derive(Debug)]
pub struct SimulatedArm {
    motors: Mutex<HashMap<String, MotorState>>,
    max_speed_deg_s: Option<f64>,
    temperature_noise: f64,
    goal_writes: AtomicUsize,
}

impl SimulatedArm {
    /// All motors start compliant, resting at their zero offset.
    pub fn new(joints: &[JointConfig]) -> Self {
        let motors = joints
            .iter()
            .map(|config| (config.name.clone(), MotorState::new(config.clone())))
            .collect();
        Self {
            motors: Mutex::new(motors),
            max_speed_deg_s: None,
            temperature_noise: 0.5,
            goal_writes: AtomicUsize::new(0),
        }
    }

    /// Limit how fast torqued motors travel toward their goal.
    pub fn with_max_speed(mut self, deg_per_sec: f64) -> Self {
        self.max_speed_deg_s = Some(deg_per_sec);
        self
    }

    pub fn with_temperature_noise(mut self, amplitude: f64) -> Self {
        self.temperature_noise = amplitude;
        self
    }

    /// Number of goal-position writes received so far.
    pub fn goal_position_writes(&self) -> usize {
        self.goal_writes.load(Ordering::SeqCst)
    }

    /// Move a joint by hand, as if it were pushed while compliant.
    pub async fn place(&self, joint: &str, radians: f64) -> Result<(), HardwareError> {
        let mut motors = self.motors.lock().await;
        let motor = motors
            .get_mut(joint)
            .ok_or_else(|| HardwareError::UnknownJoint(joint.to_string()))?;
        let deg = motor.to_motor_deg(radians);
        motor.present_deg = deg;
        motor.goal_deg = deg;
        Ok(())
    }

    /// Last goal written to a joint (radians).
    pub async fn goal_position(&self, joint: &str) -> Result<f64, HardwareError> {
        let motors = self.motors.lock().await;
        let motor = motors
            .get(joint)
            .ok_or_else(|| HardwareError::UnknownJoint(joint.to_string()))?;
        Ok(motor.to_radians(motor.goal_deg))
    }
}

#[async_trait]
impl ActuatorInterface for SimulatedArm {
    async fn position(&self, joint: &str) -> Result<f64, HardwareError> {
        let mut motors = self.motors.lock().await;
        let motor = motors
            .get_mut(joint)
            .ok_or_else(|| HardwareError::UnknownJoint(joint.to_string()))?;
        motor.advance(self.max_speed_deg_s);
        Ok(motor.to_radians(motor.present_deg))
    }

    async fn temperature(&self, joint: &str) -> Result<f64, HardwareError> {
        let motors = self.motors.lock().await;
        let motor = motors
            .get(joint)
            .ok_or_else(|| HardwareError::UnknownJoint(joint.to_string()))?;
        let heating = if motor.compliant { 0.0 } else { TORQUE_HEATING };
        let noise = self.temperature_noise * (rand::random::<f64>() - 0.5);
        Ok(AMBIENT_TEMPERATURE + heating + noise)
    }

    async fn set_goal_position(&self, joint: &str, radians: f64) -> Result<(), HardwareError> {
        let mut motors = self.motors.lock().await;
        let motor = motors
            .get_mut(joint)
            .ok_or_else(|| HardwareError::UnknownJoint(joint.to_string()))?;
        motor.advance(self.max_speed_deg_s);
        motor.goal_deg = motor.to_motor_deg(radians);
        if self.max_speed_deg_s.is_none() && !motor.compliant {
            motor.present_deg = motor.goal_deg;
        }
        self.goal_writes.fetch_add(1, Ordering::SeqCst);
        tracing::trace!("{} goal -> {:.2} deg", joint, motor.goal_deg);
        Ok(())
    }

    async fn compliance(&self, joint: &str) -> Result<bool, HardwareError> {
        let motors = self.motors.lock().await;
        motors
            .get(joint)
            .map(|motor| motor.compliant)
            .ok_or_else(|| HardwareError::UnknownJoint(joint.to_string()))
    }

    async fn set_compliance(&self, joint: &str, compliant: bool) -> Result<(), HardwareError> {
        let mut motors = self.motors.lock().await;
        let motor = motors
            .get_mut(joint)
            .ok_or_else(|| HardwareError::UnknownJoint(joint.to_string()))?;
        motor.advance(self.max_speed_deg_s);
        if !compliant && motor.compliant {
            // Torque comes back on holding the current pose
            motor.goal_deg = motor.present_deg;
        }
        motor.compliant = compliant;
        Ok(())
    }
}
