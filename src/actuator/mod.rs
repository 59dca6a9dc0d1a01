//! Actuator drivers.
//!
//! One interface, three hardware variants. The variant is picked once from
//! configuration by [`build_driver`]; the lock controller only ever sees the
//! trait object.

mod dc;
mod gpio;
mod servo;
mod stepper;

use async_trait::async_trait;

use crate::config::{ActuatorConfig, ActuatorKind};
use crate::error::ActuatorError;

pub use dc::DcDriver;
pub use gpio::{GpioBackend, Level, LoggingGpio, PinWrite};
pub use servo::ServoDriver;
pub use stepper::StepperDriver;

/// Physical lock/unlock sequences. No variant reports position, so a
/// successful return only means the sequence was commanded.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActuatorDriver: Send {
    fn kind(&self) -> ActuatorKind;

    async fn unlock(&mut self) -> Result<(), ActuatorError>;

    async fn lock(&mut self) -> Result<(), ActuatorError>;
}

pub fn build_driver(
    config: &ActuatorConfig,
    gpio: Box<dyn GpioBackend>,
) -> Result<Box<dyn ActuatorDriver>, ActuatorError> {
    let driver: Box<dyn ActuatorDriver> = match config.kind {
        ActuatorKind::Servo => Box::new(ServoDriver::new(config.servo.clone(), gpio)?),
        ActuatorKind::Stepper => Box::new(StepperDriver::new(config.stepper.clone(), gpio)?),
        ActuatorKind::Dc => Box::new(DcDriver::new(config.dc.clone(), gpio)?),
    };
    Ok(driver)
}
