//! Per-item state machine and the process-wide in-flight guard.
//!
//! [`ItemTable`] tracks the display state of each detected hash through
//! `idle -> pending -> {success, error}`. Time-driven transitions (clearing
//! a success badge, re-arming after an error) are applied by [`ItemTable::tick`]
//! against a caller-supplied clock, keeping the table rendering-agnostic and
//! deterministic under test.
//!
//! [`InflightSet`] is the concurrency guard: a hash can be in flight at most
//! once across the process, and the RAII token guarantees removal on every
//! exit path, panics included.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use dashmap::DashSet;
use thiserror::Error;
use tracing::trace;

use crate::magnet::InfoHash;

/// How long a success badge stays before the item is removed.
pub const SUCCESS_CLEAR_DELAY: Duration = Duration::from_secs(2);

/// How long an error badge stays before the item re-arms to idle.
pub const ERROR_REARM_DELAY: Duration = Duration::from_secs(3);

/// Display state of one detected item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Detected, actionable.
    Idle,
    /// Submission in progress.
    Pending,
    /// Submitted; the entry leaves the table after [`SUCCESS_CLEAR_DELAY`].
    Success { since: Instant },
    /// Failed; re-arms to idle after [`ERROR_REARM_DELAY`].
    Error { since: Instant },
}

/// State-machine errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum StateError {
    /// The hash already has a submission in progress.
    #[error("item is already being processed")]
    AlreadyPending,
}

/// A time-driven transition reported by [`ItemTable::tick`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// A success badge expired; the item left the table.
    Cleared(InfoHash),
    /// An error badge expired; the item is actionable again.
    Rearmed(InfoHash),
}

/// Pure transition table keyed by info-hash.
#[derive(Debug, Default)]
pub struct ItemTable {
    items: HashMap<InfoHash, ItemState>,
}

impl ItemTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of a hash; unknown hashes read as idle.
    #[must_use]
    pub fn state(&self, hash: &InfoHash) -> ItemState {
        self.items.get(hash).copied().unwrap_or(ItemState::Idle)
    }

    /// Moves a hash into `pending`.
    ///
    /// # Errors
    ///
    /// Returns `StateError::AlreadyPending` when a submission for this hash
    /// is already in progress. Settled items may be re-entered; idle is the
    /// normal entry.
    pub fn begin(&mut self, hash: &InfoHash) -> Result<(), StateError> {
        if matches!(self.state(hash), ItemState::Pending) {
            return Err(StateError::AlreadyPending);
        }
        trace!(hash = %hash, "item pending");
        self.items.insert(hash.clone(), ItemState::Pending);
        Ok(())
    }

    /// Settles a pending hash into success or error at time `now`.
    ///
    /// Settling a non-pending hash is a no-op; the outcome of a stale
    /// submission must not clobber a newer cycle.
    pub fn settle(&mut self, hash: &InfoHash, success: bool, now: Instant) {
        if !matches!(self.state(hash), ItemState::Pending) {
            return;
        }
        let next = if success {
            ItemState::Success { since: now }
        } else {
            ItemState::Error { since: now }
        };
        trace!(hash = %hash, success, "item settled");
        self.items.insert(hash.clone(), next);
    }

    /// Applies all time-driven transitions due at `now`.
    ///
    /// Success badges older than [`SUCCESS_CLEAR_DELAY`] are dropped from
    /// the table, so long-running use stays bounded; error badges older
    /// than [`ERROR_REARM_DELAY`] become idle. Returns the transitions
    /// applied, in no particular order.
    pub fn tick(&mut self, now: Instant) -> Vec<Transition> {
        let mut transitions = Vec::new();

        self.items.retain(|hash, state| match *state {
            ItemState::Success { since } if now.duration_since(since) >= SUCCESS_CLEAR_DELAY => {
                transitions.push(Transition::Cleared(hash.clone()));
                false
            }
            ItemState::Error { since } if now.duration_since(since) >= ERROR_REARM_DELAY => {
                *state = ItemState::Idle;
                transitions.push(Transition::Rearmed(hash.clone()));
                true
            }
            _ => true,
        });

        transitions
    }

    /// Number of tracked items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Process-wide set of hashes with a submission in flight.
///
/// Acquisition hands out an [`InflightToken`]; dropping the token releases
/// the hash, so cleanup happens on success, failure, and unwind alike.
#[derive(Debug, Default)]
pub struct InflightSet {
    hashes: DashSet<InfoHash>,
}

impl InflightSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims a hash for processing.
    ///
    /// Returns `None` when the hash is already in flight.
    #[must_use]
    pub fn try_acquire(&self, hash: &InfoHash) -> Option<InflightToken<'_>> {
        if self.hashes.insert(hash.clone()) {
            Some(InflightToken {
                set: self,
                hash: hash.clone(),
            })
        } else {
            None
        }
    }

    /// Whether a hash is currently in flight.
    #[must_use]
    pub fn contains(&self, hash: &InfoHash) -> bool {
        self.hashes.contains(hash)
    }
}

/// RAII claim on an in-flight hash; releases on drop.
#[derive(Debug)]
pub struct InflightToken<'a> {
    set: &'a InflightSet,
    hash: InfoHash,
}

impl Drop for InflightToken<'_> {
    fn drop(&mut self) {
        self.set.hashes.remove(&self.hash);
    }
}
