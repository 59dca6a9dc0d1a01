use std::sync::Arc;

use doorlock_server::{build_driver, AppState, LoggingGpio, ManualClock, Settings};

#[allow(dead_code)]
pub const PASSWORD: &str = "DoorUnlock2025!@#";

pub fn test_state() -> (AppState, ManualClock) {
    let config = Settings::new_for_test().expect("Failed to load test config");
    test_state_with(config)
}

pub fn test_state_with(config: Settings) -> (AppState, ManualClock) {
    let clock = ManualClock::default();
    let driver = build_driver(&config.actuator, Box::new(LoggingGpio::new()))
        .expect("Failed to build driver");
    let state = AppState::with_parts(config, driver, Arc::new(clock.clone()))
        .expect("Failed to build state");
    (state, clock)
}
