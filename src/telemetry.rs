//! Periodic joint state and temperature publication.
//!
//! Readings are best effort: a failed read or a send with no subscriber only
//! skips that cycle. The publisher never writes to the actuators.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::config::{rate_period, ConfigError};
use crate::hardware::{read_positions, read_temperatures, ActuatorInterface};
use crate::joints::JointSet;

const CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointStateMessage {
    pub stamp: DateTime<Utc>,
    pub names: Vec<String>,
    /// Radians
    pub positions: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointTemperaturesMessage {
    pub stamp: DateTime<Utc>,
    pub names: Vec<String>,
    pub temperatures: Vec<f64>,
}

#[derive(Clone)]
pub struct TelemetryPublisher {
    names: Vec<String>,
    actuator: Arc<dyn ActuatorInterface>,
    period: Duration,
    joint_states: broadcast::Sender<JointStateMessage>,
    temperatures: broadcast::Sender<JointTemperaturesMessage>,
}

impl TelemetryPublisher {
    pub fn new(joints: &JointSet, actuator: Arc<dyn ActuatorInterface>, rate_hz: f64) -> Result<Self, ConfigError> {
        let period = rate_period(rate_hz)?;
        let (joint_states, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (temperatures, _) = broadcast::channel(CHANNEL_CAPACITY);
        Ok(Self {
            names: joints.names().to_vec(),
            actuator,
            period,
            joint_states,
            temperatures,
        })
    }

    pub fn subscribe_joint_states(&self) -> broadcast::Receiver<JointStateMessage> {
        self.joint_states.subscribe()
    }

    pub fn subscribe_temperatures(&self) -> broadcast::Receiver<JointTemperaturesMessage> {
        self.temperatures.subscribe()
    }

    /// Read and publish one sample of each message.
    pub async fn publish_once(&self) {
        match read_positions(self.actuator.as_ref(), &self.names).await {
            Ok(positions) => {
                let message = JointStateMessage {
                    stamp: Utc::now(),
                    names: self.names.clone(),
                    positions,
                };
                if self.joint_states.send(message).is_err() {
                    tracing::trace!("No joint state subscriber");
                }
            }
            Err(e) => tracing::debug!("Skipping joint state publication: {}", e),
        }

        match read_temperatures(self.actuator.as_ref(), &self.names).await {
            Ok(temperatures) => {
                let message = JointTemperaturesMessage {
                    stamp: Utc::now(),
                    names: self.names.clone(),
                    temperatures,
                };
                if self.temperatures.send(message).is_err() {
                    tracing::trace!("No temperature subscriber");
                }
            }
            Err(e) => tracing::debug!("Skipping temperature publication: {}", e),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Telemetry loop shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.publish_once().await;
                }
            }
        }
    }
}
