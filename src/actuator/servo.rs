use async_trait::async_trait;
use tracing::info;

use super::gpio::GpioBackend;
use super::ActuatorDriver;
use crate::config::{ActuatorKind, ServoConfig};
use crate::error::ActuatorError;

/// Moves a servo horn between two fixed angles. The move is a single write
/// with no intermediate state.
pub struct ServoDriver {
    gpio: Box<dyn GpioBackend>,
    config: ServoConfig,
}

impl ServoDriver {
    pub fn new(config: ServoConfig, gpio: Box<dyn GpioBackend>) -> Result<Self, ActuatorError> {
        if config.lock_angle > 180 || config.unlock_angle > 180 {
            return Err(ActuatorError::InvalidConfig(
                "servo angles must be within 0-180".into(),
            ));
        }
        Ok(Self { gpio, config })
    }
}

#[async_trait]
impl ActuatorDriver for ServoDriver {
    fn kind(&self) -> ActuatorKind {
        ActuatorKind::Servo
    }

    async fn unlock(&mut self) -> Result<(), ActuatorError> {
        info!("Servo moving to unlock angle {}", self.config.unlock_angle);
        self.gpio.write_servo_angle(self.config.pin, self.config.unlock_angle)
    }

    async fn lock(&mut self) -> Result<(), ActuatorError> {
        info!("Servo moving to lock angle {}", self.config.lock_angle);
        self.gpio.write_servo_angle(self.config.pin, self.config.lock_angle)
    }
}
