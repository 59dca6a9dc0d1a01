use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

use super::gpio::{GpioBackend, Level};
use super::ActuatorDriver;
use crate::config::{ActuatorKind, DcConfig};
use crate::error::ActuatorError;

/// H-bridge DC motor, open loop: energize one way for `run_ms`, then stop.
pub struct DcDriver {
    gpio: Box<dyn GpioBackend>,
    config: DcConfig,
}

impl DcDriver {
    pub fn new(config: DcConfig, gpio: Box<dyn GpioBackend>) -> Result<Self, ActuatorError> {
        if config.run_ms == 0 {
            return Err(ActuatorError::InvalidConfig("dc run_ms must be positive".into()));
        }
        if config.pin1 == config.pin2 {
            return Err(ActuatorError::InvalidConfig("dc pins must differ".into()));
        }
        Ok(Self { gpio, config })
    }

    async fn energize(&mut self, forward: bool) -> Result<(), ActuatorError> {
        let (a, b) = if forward {
            (Level::High, Level::Low)
        } else {
            (Level::Low, Level::High)
        };
        self.gpio.write(self.config.pin1, a)?;
        self.gpio.write(self.config.pin2, b)?;
        tokio::time::sleep(Duration::from_millis(self.config.run_ms)).await;
        self.stop()
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        self.gpio.write(self.config.pin1, Level::Low)?;
        self.gpio.write(self.config.pin2, Level::Low)
    }
}

#[async_trait]
impl ActuatorDriver for DcDriver {
    fn kind(&self) -> ActuatorKind {
        ActuatorKind::Dc
    }

    async fn unlock(&mut self) -> Result<(), ActuatorError> {
        info!("DC motor unlocking for {}ms", self.config.run_ms);
        self.energize(true).await
    }

    async fn lock(&mut self) -> Result<(), ActuatorError> {
        info!("DC motor locking for {}ms", self.config.run_ms);
        self.energize(false).await
    }
}
