use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::actuator::ActuatorDriver;
use crate::clock::Clock;
use crate::config::LockConfig;
use crate::error::{ActuatorError, LockError};
use crate::events::{EventKind, EventSink, SecurityEvent};

const SYSTEM_IDENTITY: &str = "system";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    Locked,
    Unlocking,
    Unlocked,
    Locking,
    Fault,
}

impl LockState {
    /// Door state as reported to clients. Anything not known to be open is
    /// reported as locked.
    pub fn door_status(&self) -> &'static str {
        match self {
            LockState::Unlocking | LockState::Unlocked => "unlocked",
            LockState::Locked | LockState::Locking | LockState::Fault => "locked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AutoLockTimer {
    pub armed: bool,
    pub deadline: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockTiming {
    pub auto_lock_delay: Duration,
    pub max_unlock_duration: Duration,
}

impl Default for LockTiming {
    fn default() -> Self {
        Self {
            auto_lock_delay: Duration::milliseconds(5000),
            max_unlock_duration: Duration::milliseconds(10_000),
        }
    }
}

impl From<&LockConfig> for LockTiming {
    fn from(config: &LockConfig) -> Self {
        Self {
            auto_lock_delay: Duration::milliseconds(config.auto_lock_delay_ms),
            max_unlock_duration: Duration::milliseconds(config.max_unlock_duration_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The motor ran and the door is now unlocked.
    Actuated,
    /// The door was already unlocked; only the auto-lock deadline moved.
    Extended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlockReceipt {
    pub outcome: UnlockOutcome,
    pub auto_lock_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LockStatus {
    pub state: LockState,
    pub door_status: &'static str,
    pub auto_lock: Option<AutoLockTimer>,
}

#[derive(Debug)]
struct ControllerState {
    lock_state: LockState,
    timer: Option<AutoLockTimer>,
    unlocked_at: Option<DateTime<Utc>>,
    /// Bumped whenever an actuation sequence starts. A sequence whose
    /// generation is no longer current was overtaken by a safety interrupt.
    generation: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockTrigger {
    AutoLock,
    SafetyInterrupt,
    FaultClear,
    Startup,
}

/// Owns the lock state machine and the one actuator.
///
/// Every physical sequence runs on its own task holding a handle to the
/// shared state; request methods only wait for that task. A caller that
/// goes away mid-sequence (a dropped HTTP request) therefore never leaves
/// the controller stuck in `Unlocking` or `Locking`.
pub struct LockController {
    inner: Arc<Inner>,
}

/// Two mutexes: `state` is held only for bookkeeping, `driver` for the whole
/// physical sequence. `driver` may be taken before `state`, never the other
/// way round, so a slow motor never blocks status reads.
struct Inner {
    state: Mutex<ControllerState>,
    driver: Mutex<Box<dyn ActuatorDriver>>,
    timing: LockTiming,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
}

impl LockController {
    pub fn new(
        driver: Box<dyn ActuatorDriver>,
        timing: LockTiming,
        clock: Arc<dyn Clock>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ControllerState {
                    lock_state: LockState::Locked,
                    timer: None,
                    unlocked_at: None,
                    generation: 0,
                }),
                driver: Mutex::new(driver),
                timing,
                clock,
                events,
            }),
        }
    }

    pub async fn state(&self) -> LockState {
        self.inner.state.lock().await.lock_state
    }

    pub async fn status(&self) -> LockStatus {
        let state = self.inner.state.lock().await;
        LockStatus {
            state: state.lock_state,
            door_status: state.lock_state.door_status(),
            auto_lock: state.timer,
        }
    }

    pub async fn request_unlock(&self, identity: &str) -> Result<UnlockReceipt, LockError> {
        let inner = &self.inner;
        let generation = {
            let mut state = inner.state.lock().await;
            match state.lock_state {
                LockState::Fault => return Err(LockError::Fault),
                LockState::Unlocking | LockState::Locking => {
                    inner.emit(EventKind::UnlockRequested, identity, "rejected: busy");
                    return Err(LockError::Busy);
                }
                LockState::Unlocked => {
                    let now = inner.clock.now();
                    let deadline = inner.capped_deadline(now, state.unlocked_at);
                    state.timer = Some(AutoLockTimer { armed: true, deadline });
                    inner.emit(
                        EventKind::UnlockRequested,
                        identity,
                        format!("already unlocked, auto-lock moved to {}", deadline),
                    );
                    return Ok(UnlockReceipt {
                        outcome: UnlockOutcome::Extended,
                        auto_lock_at: deadline,
                    });
                }
                LockState::Locked => {
                    state.lock_state = LockState::Unlocking;
                    state.timer = None;
                    state.generation += 1;
                    state.generation
                }
            }
        };
        inner.emit(EventKind::UnlockRequested, identity, "unlocking");

        // No await between claiming `Unlocking` and handing the sequence off.
        let task = {
            let inner = inner.clone();
            let identity = identity.to_string();
            tokio::spawn(async move { inner.run_unlock(generation, &identity).await })
        };
        self.join(task, generation, identity).await
    }

    /// Time-check entry point for the periodic driver. Locks the door once
    /// the auto-lock deadline has passed; returns whether it did.
    pub async fn check_auto_lock(&self) -> Result<bool, LockError> {
        let now = self.inner.clock.now();
        let generation = {
            let mut state = self.inner.state.lock().await;
            let due = state.lock_state == LockState::Unlocked
                && state.timer.map_or(false, |t| t.armed && now >= t.deadline);
            if !due {
                return Ok(false);
            }
            state.begin_locking()
        };
        self.drive_lock(generation, LockTrigger::AutoLock).await?;
        Ok(true)
    }

    /// Safety interrupt from a tamper sensor, panic button or manual key
    /// detector: lock now, whatever the current state. An unlock sequence in
    /// flight finishes its current move first and is then reversed.
    pub async fn force_lock(&self, reason: &str) -> Result<(), LockError> {
        let generation = {
            let mut state = self.inner.state.lock().await;
            self.inner
                .emit(EventKind::SafetyInterrupt, SYSTEM_IDENTITY, reason.to_string());
            if state.lock_state == LockState::Fault {
                state.generation += 1;
                state.timer = None;
                state.generation
            } else {
                state.begin_locking()
            }
        };
        self.drive_lock(generation, LockTrigger::SafetyInterrupt).await
    }

    /// Administrative fault clear. Re-runs the lock sequence before the
    /// controller accepts requests again; never resumes into `Unlocked`.
    pub async fn clear_fault(&self) -> Result<(), LockError> {
        let generation = {
            let mut state = self.inner.state.lock().await;
            if state.lock_state != LockState::Fault {
                return Ok(());
            }
            state.begin_locking()
        };
        self.drive_lock(generation, LockTrigger::FaultClear).await
    }

    /// Drives the lock sequence once at startup so the physical state matches
    /// the initial `Locked`.
    pub async fn initialize(&self) -> Result<(), LockError> {
        let generation = {
            let mut state = self.inner.state.lock().await;
            match state.lock_state {
                LockState::Locked => state.begin_locking(),
                _ => return Ok(()),
            }
        };
        self.drive_lock(generation, LockTrigger::Startup).await
    }

    async fn drive_lock(&self, generation: u64, trigger: LockTrigger) -> Result<(), LockError> {
        let task = {
            let inner = self.inner.clone();
            tokio::spawn(async move { inner.run_lock(generation, trigger).await })
        };
        self.join(task, generation, SYSTEM_IDENTITY).await
    }

    /// Waits for a sequence task. A task that died without reporting leaves
    /// the motor position unknown, which is a fault.
    async fn join<T>(
        &self,
        task: JoinHandle<Result<T, LockError>>,
        generation: u64,
        identity: &str,
    ) -> Result<T, LockError> {
        match task.await {
            Ok(result) => result,
            Err(e) => {
                let error = ActuatorError::Aborted(e.to_string());
                let mut state = self.inner.state.lock().await;
                if state.generation == generation {
                    self.inner.enter_fault(&mut state, identity, &error);
                }
                Err(LockError::ActuationFailed(error))
            }
        }
    }
}

impl ControllerState {
    fn begin_locking(&mut self) -> u64 {
        self.lock_state = LockState::Locking;
        self.timer = None;
        self.unlocked_at = None;
        self.generation += 1;
        self.generation
    }
}

impl Inner {
    async fn run_unlock(&self, generation: u64, identity: &str) -> Result<UnlockReceipt, LockError> {
        let mut driver = self.driver.lock().await;
        if !self.is_current(generation).await {
            return Err(LockError::Interrupted);
        }
        let result = driver.unlock().await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            warn!("Unlock by {} overtaken by safety lock", identity);
            return Err(LockError::Interrupted);
        }
        match result {
            Ok(()) => {
                let now = self.clock.now();
                let deadline = now + self.timing.auto_lock_delay;
                state.lock_state = LockState::Unlocked;
                state.unlocked_at = Some(now);
                state.timer = Some(AutoLockTimer { armed: true, deadline });
                self.emit(EventKind::Unlocked, identity, format!("auto-lock at {}", deadline));
                Ok(UnlockReceipt {
                    outcome: UnlockOutcome::Actuated,
                    auto_lock_at: deadline,
                })
            }
            Err(e) => {
                self.enter_fault(&mut state, identity, &e);
                Err(LockError::ActuationFailed(e))
            }
        }
    }

    async fn run_lock(&self, generation: u64, trigger: LockTrigger) -> Result<(), LockError> {
        let mut driver = self.driver.lock().await;
        if !self.is_current(generation).await {
            // A later safety interrupt owns the lock sequence now.
            return Ok(());
        }
        let result = driver.lock().await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            return Ok(());
        }
        match result {
            Ok(()) => {
                if state.lock_state == LockState::Fault {
                    info!("Lock sequence re-asserted while in fault");
                    return Ok(());
                }
                state.lock_state = LockState::Locked;
                let (kind, outcome) = match trigger {
                    LockTrigger::AutoLock => (EventKind::AutoLocked, "auto-lock"),
                    LockTrigger::SafetyInterrupt => (EventKind::Locked, "safety interrupt"),
                    LockTrigger::FaultClear => (EventKind::FaultCleared, "fault cleared, locked"),
                    LockTrigger::Startup => (EventKind::Locked, "startup"),
                };
                self.emit(kind, SYSTEM_IDENTITY, outcome);
                Ok(())
            }
            Err(e) => {
                self.enter_fault(&mut state, SYSTEM_IDENTITY, &e);
                Err(LockError::ActuationFailed(e))
            }
        }
    }

    async fn is_current(&self, generation: u64) -> bool {
        self.state.lock().await.generation == generation
    }

    fn capped_deadline(&self, now: DateTime<Utc>, unlocked_at: Option<DateTime<Utc>>) -> DateTime<Utc> {
        let wanted = now + self.timing.auto_lock_delay;
        match unlocked_at {
            Some(at) => wanted.min(at + self.timing.max_unlock_duration),
            None => wanted,
        }
    }

    fn enter_fault(&self, state: &mut ControllerState, identity: &str, error: &ActuatorError) {
        state.lock_state = LockState::Fault;
        state.timer = None;
        state.unlocked_at = None;
        self.emit(EventKind::Fault, identity, error.to_string());
    }

    fn emit(&self, kind: EventKind, identity: &str, outcome: impl Into<String>) {
        self.events
            .record(SecurityEvent::new(self.clock.now(), kind, identity, outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::MockActuatorDriver;
    use crate::clock::ManualClock;
    use crate::config::ActuatorKind;
    use crate::events::ActivityLog;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{Notify, Semaphore};

    fn controller(driver: Box<dyn ActuatorDriver>) -> (Arc<LockController>, ManualClock, Arc<ActivityLog>) {
        let clock = ManualClock::default();
        let log = Arc::new(ActivityLog::new(100));
        let controller = LockController::new(
            driver,
            LockTiming::default(),
            Arc::new(clock.clone()),
            log.clone(),
        );
        (Arc::new(controller), clock, log)
    }

    fn ok_driver(unlocks: usize, locks: usize) -> Box<dyn ActuatorDriver> {
        let mut driver = MockActuatorDriver::new();
        driver.expect_kind().return_const(ActuatorKind::Servo);
        driver.expect_unlock().times(unlocks).returning(|| Ok(()));
        driver.expect_lock().times(locks).returning(|| Ok(()));
        Box::new(driver)
    }

    /// Each move blocks until the test hands out a permit for it.
    #[derive(Clone)]
    struct GatedDriver {
        unlock_gate: Arc<Semaphore>,
        lock_gate: Arc<Semaphore>,
        unlock_started: Arc<Notify>,
        lock_started: Arc<Notify>,
        unlocks: Arc<AtomicUsize>,
        locks: Arc<AtomicUsize>,
    }

    impl GatedDriver {
        fn new(unlock_permits: usize, lock_permits: usize) -> Self {
            Self {
                unlock_gate: Arc::new(Semaphore::new(unlock_permits)),
                lock_gate: Arc::new(Semaphore::new(lock_permits)),
                unlock_started: Arc::new(Notify::new()),
                lock_started: Arc::new(Notify::new()),
                unlocks: Arc::new(AtomicUsize::new(0)),
                locks: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    async fn pass(gate: &Semaphore) -> Result<(), ActuatorError> {
        let permit = gate.acquire().await.map_err(|_| ActuatorError::Gpio {
            pin: 0,
            reason: "gate closed".into(),
        })?;
        permit.forget();
        Ok(())
    }

    #[async_trait]
    impl ActuatorDriver for GatedDriver {
        fn kind(&self) -> ActuatorKind {
            ActuatorKind::Stepper
        }

        async fn unlock(&mut self) -> Result<(), ActuatorError> {
            self.unlocks.fetch_add(1, Ordering::SeqCst);
            self.unlock_started.notify_one();
            pass(&self.unlock_gate).await
        }

        async fn lock(&mut self) -> Result<(), ActuatorError> {
            self.locks.fetch_add(1, Ordering::SeqCst);
            self.lock_started.notify_one();
            pass(&self.lock_gate).await
        }
    }

    async fn wait_while(controller: &LockController, state: LockState) {
        while controller.state().await == state {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_unlock_arms_auto_lock() {
        let (controller, clock, log) = controller(ok_driver(1, 0));
        assert_eq!(controller.state().await, LockState::Locked);

        let receipt = controller.request_unlock("admin").await.unwrap();
        assert_eq!(receipt.outcome, UnlockOutcome::Actuated);
        assert_eq!(receipt.auto_lock_at, clock.now() + Duration::milliseconds(5000));

        let status = controller.status().await;
        assert_eq!(status.state, LockState::Unlocked);
        assert_eq!(status.door_status, "unlocked");
        assert_eq!(status.auto_lock.map(|t| t.armed), Some(true));
        assert!(log.recent().iter().any(|e| e.kind == EventKind::Unlocked && e.identity == "admin"));
    }

    #[tokio::test]
    async fn test_auto_lock_fires_at_deadline_and_not_before() {
        let (controller, clock, log) = controller(ok_driver(1, 1));
        controller.request_unlock("admin").await.unwrap();

        clock.advance(Duration::milliseconds(4999));
        assert!(!controller.check_auto_lock().await.unwrap());
        assert_eq!(controller.state().await, LockState::Unlocked);

        clock.advance(Duration::milliseconds(1));
        assert!(controller.check_auto_lock().await.unwrap());
        let status = controller.status().await;
        assert_eq!(status.state, LockState::Locked);
        assert!(status.auto_lock.is_none());
        assert!(log.recent().iter().any(|e| e.kind == EventKind::AutoLocked));

        // Nothing left to do
        assert!(!controller.check_auto_lock().await.unwrap());
    }

    #[tokio::test]
    async fn test_repeat_unlock_extends_without_driving() {
        // Mock enforces a single unlock call
        let (controller, clock, _) = controller(ok_driver(1, 0));
        let first = controller.request_unlock("admin").await.unwrap();

        clock.advance(Duration::milliseconds(2000));
        let second = controller.request_unlock("user").await.unwrap();
        assert_eq!(second.outcome, UnlockOutcome::Extended);
        assert_eq!(second.auto_lock_at, first.auto_lock_at + Duration::milliseconds(2000));

        // Refreshes stop at the maximum unlock duration
        clock.advance(Duration::milliseconds(6000));
        let third = controller.request_unlock("admin").await.unwrap();
        assert_eq!(third.auto_lock_at, first.auto_lock_at + Duration::milliseconds(5000));
    }

    #[tokio::test]
    async fn test_unlock_while_unlocking_is_busy() {
        let driver = GatedDriver::new(0, 10);
        let (controller, _, _) = controller(Box::new(driver.clone()));

        let first = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.request_unlock("admin").await })
        };
        driver.unlock_started.notified().await;
        assert_eq!(controller.state().await, LockState::Unlocking);
        assert_eq!(controller.status().await.door_status, "unlocked");

        assert_eq!(controller.request_unlock("admin").await, Err(LockError::Busy));
        assert_eq!(driver.unlocks.load(Ordering::SeqCst), 1);

        driver.unlock_gate.add_permits(1);
        let receipt = first.await.unwrap().unwrap();
        assert_eq!(receipt.outcome, UnlockOutcome::Actuated);
        assert_eq!(driver.unlocks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_safety_interrupt_overrides_unlock_in_flight() {
        let driver = GatedDriver::new(0, 10);
        let (controller, _, log) = controller(Box::new(driver.clone()));

        let unlock = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.request_unlock("admin").await })
        };
        driver.unlock_started.notified().await;

        let interrupt = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.force_lock("tamper sensor").await })
        };
        // Let the interrupt claim the state before the motor finishes
        while controller.state().await != LockState::Locking {
            tokio::task::yield_now().await;
        }
        driver.unlock_gate.add_permits(1);

        assert_eq!(unlock.await.unwrap(), Err(LockError::Interrupted));
        interrupt.await.unwrap().unwrap();
        assert_eq!(controller.state().await, LockState::Locked);
        assert_eq!(driver.locks.load(Ordering::SeqCst), 1);
        assert!(log.recent().iter().any(|e| e.kind == EventKind::SafetyInterrupt));
    }

    #[tokio::test]
    async fn test_abandoned_unlock_still_completes_and_auto_locks() {
        let driver = GatedDriver::new(0, 10);
        let (controller, clock, _) = controller(Box::new(driver.clone()));

        let request = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.request_unlock("admin").await })
        };
        driver.unlock_started.notified().await;

        // Caller disconnects while the motor is moving
        request.abort();
        assert!(request.await.unwrap_err().is_cancelled());
        assert_eq!(controller.state().await, LockState::Unlocking);

        driver.unlock_gate.add_permits(1);
        wait_while(&controller, LockState::Unlocking).await;
        assert_eq!(controller.state().await, LockState::Unlocked);

        clock.advance(Duration::milliseconds(5000));
        assert!(controller.check_auto_lock().await.unwrap());
        let status = controller.status().await;
        assert_eq!(status.state, LockState::Locked);
        assert_eq!(status.door_status, "locked");

        // Not wedged: the next unlock drives the motor again
        driver.unlock_gate.add_permits(1);
        let receipt = controller.request_unlock("admin").await.unwrap();
        assert_eq!(receipt.outcome, UnlockOutcome::Actuated);
        assert_eq!(driver.unlocks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_abandoned_safety_lock_still_locks() {
        let driver = GatedDriver::new(1, 0);
        let (controller, _, log) = controller(Box::new(driver.clone()));
        controller.request_unlock("admin").await.unwrap();

        let interrupt = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.force_lock("panic button").await })
        };
        driver.lock_started.notified().await;
        interrupt.abort();
        assert!(interrupt.await.unwrap_err().is_cancelled());
        assert_eq!(controller.state().await, LockState::Locking);

        driver.lock_gate.add_permits(1);
        wait_while(&controller, LockState::Locking).await;
        assert_eq!(controller.state().await, LockState::Locked);
        assert!(log
            .recent()
            .iter()
            .any(|e| e.kind == EventKind::Locked && e.outcome == "safety interrupt"));
    }

    #[tokio::test]
    async fn test_safety_interrupt_overtakes_auto_lock_in_progress() {
        let driver = GatedDriver::new(1, 0);
        let (controller, clock, log) = controller(Box::new(driver.clone()));
        controller.request_unlock("admin").await.unwrap();
        clock.advance(Duration::milliseconds(5000));

        let auto = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.check_auto_lock().await })
        };
        driver.lock_started.notified().await;
        assert_eq!(controller.state().await, LockState::Locking);

        let interrupt = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.force_lock("tamper sensor").await })
        };
        while !log.recent().iter().any(|e| e.kind == EventKind::SafetyInterrupt) {
            tokio::task::yield_now().await;
        }
        driver.lock_gate.add_permits(2);

        assert_eq!(auto.await.unwrap(), Ok(true));
        interrupt.await.unwrap().unwrap();
        assert_eq!(controller.state().await, LockState::Locked);
        // The interrupt re-ran the lock sequence and owns the outcome
        assert_eq!(driver.locks.load(Ordering::SeqCst), 2);
        let events = log.recent();
        assert!(!events.iter().any(|e| e.kind == EventKind::AutoLocked));
        assert!(events
            .iter()
            .any(|e| e.kind == EventKind::Locked && e.outcome == "safety interrupt"));
    }

    #[tokio::test]
    async fn test_driver_failure_faults_and_blocks_unlock() {
        let mut driver = MockActuatorDriver::new();
        driver.expect_unlock().times(1).returning(|| {
            Err(ActuatorError::Gpio { pin: 19, reason: "stalled".into() })
        });
        driver.expect_lock().times(1).returning(|| Ok(()));
        let (controller, _, log) = controller(Box::new(driver));

        assert!(matches!(
            controller.request_unlock("admin").await,
            Err(LockError::ActuationFailed(_))
        ));
        let status = controller.status().await;
        assert_eq!(status.state, LockState::Fault);
        assert_eq!(status.door_status, "locked");
        assert_eq!(controller.request_unlock("admin").await, Err(LockError::Fault));
        assert!(!controller.check_auto_lock().await.unwrap());
        assert!(log.recent().iter().any(|e| e.kind == EventKind::Fault));

        // Clearing re-runs the lock sequence and lands in Locked
        controller.clear_fault().await.unwrap();
        assert_eq!(controller.state().await, LockState::Locked);
    }

    #[tokio::test]
    async fn test_failed_auto_lock_faults() {
        let mut driver = MockActuatorDriver::new();
        driver.expect_unlock().times(1).returning(|| Ok(()));
        driver.expect_lock().times(1).returning(|| {
            Err(ActuatorError::Gpio { pin: 16, reason: "no current".into() })
        });
        let (controller, clock, _) = controller(Box::new(driver));

        controller.request_unlock("admin").await.unwrap();
        clock.advance(Duration::seconds(6));
        assert!(controller.check_auto_lock().await.is_err());
        assert_eq!(controller.state().await, LockState::Fault);
    }

    #[tokio::test]
    async fn test_clear_fault_is_noop_when_healthy() {
        let (controller, _, _) = controller(ok_driver(0, 0));
        controller.clear_fault().await.unwrap();
        assert_eq!(controller.state().await, LockState::Locked);
    }

    #[tokio::test]
    async fn test_force_lock_in_fault_stays_faulted() {
        let mut driver = MockActuatorDriver::new();
        driver.expect_unlock().times(1).returning(|| {
            Err(ActuatorError::Gpio { pin: 19, reason: "stalled".into() })
        });
        driver.expect_lock().times(1).returning(|| Ok(()));
        let (controller, _, _) = controller(Box::new(driver));

        let _ = controller.request_unlock("admin").await;
        controller.force_lock("panic button").await.unwrap();
        assert_eq!(controller.state().await, LockState::Fault);
    }

    #[tokio::test]
    async fn test_initialize_drives_lock() {
        let (controller, _, _) = controller(ok_driver(0, 1));
        controller.initialize().await.unwrap();
        assert_eq!(controller.state().await, LockState::Locked);
    }
}
