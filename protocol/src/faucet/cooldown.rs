//! Per-requester cooldowns.
//!
//! One request per requester per window. The slot is taken the moment a
//! request is accepted, before any RPC call, so two messages arriving
//! together cannot both see an empty slot and both get paid.
//!
//! ## Design
//!
//! - A single `parking_lot::Mutex<HashMap>` is the only synchronization.
//!   Check-and-insert happens under one lock acquisition; contention is
//!   per faucet, not per transfer, and the critical section is one map lookup.
//! - Time is passed in as unix seconds. The registry never reads a clock,
//!   which keeps the boundary tests exact.
//! - Expired entries are dropped lazily when the same requester asks again,
//!   or in bulk via [`CooldownRegistry::purge_expired`].
//!
//! Release policy lives with the caller: a transfer the node evicted frees
//! the slot at once, while a confirmed or timed-out transfer keeps it until
//! it expires.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::identity::address::Address;

/// A requester's current slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingRequest {
    pub requester: String,
    pub address: Address,
    /// Unix seconds at which the requester may ask again.
    pub next_eligible: u64,
}

/// Answer to [`CooldownRegistry::try_accept`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Slot taken. `next_eligible` identifies it for [`CooldownRegistry::release_slot`].
    Accepted { next_eligible: u64 },
    Rejected { wait_secs: u64 },
}

impl Admission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Tracks who may ask for funds and when.
#[derive(Debug)]
pub struct CooldownRegistry {
    cooldown_secs: u64,
    entries: Mutex<HashMap<String, PendingRequest>>,
}

impl CooldownRegistry {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown_secs: cooldown.as_secs(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    /// Takes the requester's slot, or says how long until it frees up.
    pub fn try_accept(&self, requester: &str, address: Address, now: u64) -> Admission {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get(requester) {
            if entry.next_eligible > now {
                return Admission::Rejected {
                    wait_secs: entry.next_eligible - now,
                };
            }
        }

        let next_eligible = now.saturating_add(self.cooldown_secs);
        entries.insert(
            requester.to_string(),
            PendingRequest {
                requester: requester.to_string(),
                address,
                next_eligible,
            },
        );
        Admission::Accepted { next_eligible }
    }

    /// Frees the requester's slot immediately, whichever request took it.
    pub fn release(&self, requester: &str) -> Option<PendingRequest> {
        self.entries.lock().remove(requester)
    }

    /// Frees the slot only if it is still the one accepted with
    /// `next_eligible`. A later request that took a fresh slot after this
    /// one expired keeps it.
    pub fn release_slot(&self, requester: &str, next_eligible: u64) -> Option<PendingRequest> {
        let mut entries = self.entries.lock();
        match entries.get(requester) {
            Some(entry) if entry.next_eligible == next_eligible => entries.remove(requester),
            _ => None,
        }
    }

    pub fn pending(&self, requester: &str) -> Option<PendingRequest> {
        self.entries.lock().get(requester).cloned()
    }

    /// Drops every entry whose window has passed. Returns how many went.
    pub fn purge_expired(&self, now: u64) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.next_eligible > now);
        before - entries.len()
    }

    /// Number of entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;

    const T: u64 = 10_800;

    fn addr() -> Address {
        "0xc964073a0ee172f3daa62325af021a68f707511a".parse().unwrap()
    }

    fn registry() -> CooldownRegistry {
        CooldownRegistry::new(Duration::from_secs(T))
    }

    #[test]
    fn first_request_is_accepted_and_recorded() {
        let reg = registry();
        assert_eq!(
            reg.try_accept("alice", addr(), 1_000),
            Admission::Accepted {
                next_eligible: 1_000 + T
            }
        );

        let entry = reg.pending("alice").unwrap();
        assert_eq!(entry.address, addr());
        assert_eq!(entry.next_eligible, 1_000 + T);
    }

    #[test]
    fn cooldown_boundary() {
        let reg = registry();
        let t0 = 5_000;
        assert!(reg.try_accept("alice", addr(), t0).is_accepted());
        assert_eq!(
            reg.try_accept("alice", addr(), t0 + 1),
            Admission::Rejected { wait_secs: T - 1 }
        );
        assert_eq!(
            reg.try_accept("alice", addr(), t0 + T - 1),
            Admission::Rejected { wait_secs: 1 }
        );
        assert!(reg.try_accept("alice", addr(), t0 + T + 1).is_accepted());
        assert_eq!(reg.pending("alice").unwrap().next_eligible, t0 + 2 * T + 1);
    }

    #[test]
    fn requesters_are_independent() {
        let reg = registry();
        assert!(reg.try_accept("alice", addr(), 0).is_accepted());
        assert!(reg.try_accept("bob", addr(), 0).is_accepted());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn release_allows_immediate_retry() {
        let reg = registry();
        reg.try_accept("alice", addr(), 100);
        let released = reg.release("alice").unwrap();
        assert_eq!(released.requester, "alice");
        assert!(reg.try_accept("alice", addr(), 101).is_accepted());
        assert!(reg.release("nobody").is_none());
    }

    #[test]
    fn release_slot_leaves_a_newer_slot_alone() {
        let reg = CooldownRegistry::new(Duration::from_secs(60));
        let first = match reg.try_accept("alice", addr(), 1_000) {
            Admission::Accepted { next_eligible } => next_eligible,
            other => panic!("first request: {:?}", other),
        };
        // First window over, second request takes a fresh slot.
        let second = match reg.try_accept("alice", addr(), 1_061) {
            Admission::Accepted { next_eligible } => next_eligible,
            other => panic!("second request: {:?}", other),
        };

        assert!(reg.release_slot("alice", first).is_none());
        assert_eq!(reg.pending("alice").unwrap().next_eligible, second);
        assert_eq!(
            reg.try_accept("alice", addr(), 1_062),
            Admission::Rejected { wait_secs: 59 }
        );

        assert!(reg.release_slot("alice", second).is_some());
        assert!(reg.pending("alice").is_none());
    }

    #[test]
    fn purge_drops_only_expired() {
        let reg = registry();
        reg.try_accept("old", addr(), 0);
        reg.try_accept("new", addr(), T);
        assert_eq!(reg.purge_expired(T), 1);
        assert!(reg.pending("old").is_none());
        assert!(reg.pending("new").is_some());
        assert!(!reg.is_empty());
    }

    #[test]
    fn simultaneous_requests_from_one_requester() {
        let reg = Arc::new(registry());
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let reg = Arc::clone(&reg);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    reg.try_accept("alice", addr(), 42)
                })
            })
            .collect();

        let results: Vec<Admission> = handles
            .into_iter()
            .map(|h| h.join().expect("thread panicked"))
            .collect();
        let accepted = results
            .iter()
            .filter(|a| a.is_accepted())
            .count();
        assert_eq!(accepted, 1);
        assert!(results.contains(&Admission::Rejected { wait_secs: T }));
    }

    #[test]
    fn many_threads_many_requesters() {
        let reg = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = Arc::clone(&reg);
                thread::spawn(move || {
                    (0..50)
                        .filter(|_| {
                            reg.try_accept(&format!("user-{}", i), addr(), 7).is_accepted()
                        })
                        .count()
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().expect("thread panicked"), 1);
        }
        assert_eq!(reg.len(), 8);
    }
}
