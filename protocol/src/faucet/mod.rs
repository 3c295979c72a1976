//! # Faucet Module
//!
//! Who gets paid, and when.
//!
//! ```text
//! cooldown.rs    - per-requester slots with atomic check-and-insert
//! dispatcher.rs  - accept, spawn, submit, track, settle; event broadcast
//! ```

pub mod cooldown;
pub mod dispatcher;

pub use cooldown::{Admission, CooldownRegistry, PendingRequest};
pub use dispatcher::{
    unix_now, Dispatch, DispenseReport, Dispensed, Faucet, FaucetEvent,
};
