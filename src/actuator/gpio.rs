use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::error::ActuatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

/// Pin-level primitives the drivers are written against. Board support
/// crates implement this for real hardware.
#[cfg_attr(test, mockall::automock)]
pub trait GpioBackend: Send {
    fn write(&mut self, pin: u8, level: Level) -> Result<(), ActuatorError>;

    /// Positions a hobby servo on `pin`, 0-180 degrees.
    fn write_servo_angle(&mut self, pin: u8, angle: u8) -> Result<(), ActuatorError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinWrite {
    Level(u8, Level),
    Angle(u8, u8),
}

/// Simulated pins for hosts without hardware. Clones share the same pin
/// table so the last written values can be inspected.
#[derive(Debug, Clone, Default)]
pub struct LoggingGpio {
    inner: Arc<Mutex<SimulatedPins>>,
}

#[derive(Debug, Default)]
struct SimulatedPins {
    levels: HashMap<u8, Level>,
    angles: HashMap<u8, u8>,
    writes: usize,
    last: Option<PinWrite>,
}

impl LoggingGpio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn level(&self, pin: u8) -> Option<Level> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).levels.get(&pin).copied()
    }

    pub fn angle(&self, pin: u8) -> Option<u8> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).angles.get(&pin).copied()
    }

    pub fn write_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).writes
    }

    pub fn last_write(&self) -> Option<PinWrite> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).last
    }
}

impl GpioBackend for LoggingGpio {
    fn write(&mut self, pin: u8, level: Level) -> Result<(), ActuatorError> {
        debug!("gpio {} -> {:?}", pin, level);
        let mut pins = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        pins.levels.insert(pin, level);
        pins.writes += 1;
        pins.last = Some(PinWrite::Level(pin, level));
        Ok(())
    }

    fn write_servo_angle(&mut self, pin: u8, angle: u8) -> Result<(), ActuatorError> {
        if angle > 180 {
            return Err(ActuatorError::Gpio {
                pin,
                reason: format!("servo angle {} out of range", angle),
            });
        }
        debug!("servo {} -> {} deg", pin, angle);
        let mut pins = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        pins.angles.insert(pin, angle);
        pins.writes += 1;
        pins.last = Some(PinWrite::Angle(pin, angle));
        Ok(())
    }
}
