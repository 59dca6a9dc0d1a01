//! Lock module for the door lock server
//!
//! The lock controller state machine and its HTTP handlers.

pub mod handlers;
mod controller;

pub use controller::{
    AutoLockTimer, LockController, LockState, LockStatus, LockTiming, UnlockOutcome, UnlockReceipt,
};
