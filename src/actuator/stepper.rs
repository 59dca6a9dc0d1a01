use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use super::gpio::{GpioBackend, Level};
use super::ActuatorDriver;
use crate::config::{ActuatorKind, StepperConfig};
use crate::error::ActuatorError;

/// Step/direction driver (A4988, DRV8825). Unlock turns one way, lock turns
/// back. Net position is only tracked in memory and re-homed to zero after
/// every lock.
pub struct StepperDriver {
    gpio: Box<dyn GpioBackend>,
    config: StepperConfig,
    position: i64,
}

impl StepperDriver {
    pub fn new(config: StepperConfig, gpio: Box<dyn GpioBackend>) -> Result<Self, ActuatorError> {
        if config.unlock_steps == 0 || config.lock_steps == 0 {
            return Err(ActuatorError::InvalidConfig("stepper step counts must be positive".into()));
        }
        Ok(Self {
            gpio,
            config,
            position: 0,
        })
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    async fn run(&mut self, direction: Level, steps: u32) -> Result<(), ActuatorError> {
        let delay = Duration::from_micros(self.config.step_delay_us);

        // EN is active low on the common driver boards
        if let Some(enable) = self.config.enable_pin {
            self.gpio.write(enable, Level::Low)?;
        }
        self.gpio.write(self.config.dir_pin, direction)?;

        let result = self.pulse(direction, steps, delay).await;

        if let Some(enable) = self.config.enable_pin {
            self.gpio.write(enable, Level::High)?;
        }
        result
    }

    async fn pulse(&mut self, direction: Level, steps: u32, delay: Duration) -> Result<(), ActuatorError> {
        let delta = if direction == Level::High { 1 } else { -1 };
        for _ in 0..steps {
            self.gpio.write(self.config.step_pin, Level::High)?;
            tokio::time::sleep(delay).await;
            self.gpio.write(self.config.step_pin, Level::Low)?;
            tokio::time::sleep(delay).await;
            self.position += delta;
        }
        Ok(())
    }
}

#[async_trait]
impl ActuatorDriver for StepperDriver {
    fn kind(&self) -> ActuatorKind {
        ActuatorKind::Stepper
    }

    async fn unlock(&mut self) -> Result<(), ActuatorError> {
        info!("Stepper unlocking: {} steps", self.config.unlock_steps);
        self.run(Level::High, self.config.unlock_steps).await
    }

    async fn lock(&mut self) -> Result<(), ActuatorError> {
        info!("Stepper locking: {} steps", self.config.lock_steps);
        self.run(Level::Low, self.config.lock_steps).await?;
        self.position = 0;
        Ok(())
    }
}
