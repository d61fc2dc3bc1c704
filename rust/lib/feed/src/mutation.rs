//! Optimistic mutation state machine and in-flight bookkeeping.
//!
//! ```text
//! Idle ──apply──▶ Applied(snapshot) ──confirm──▶ Confirmed
//!                        │
//!                        └──roll_back──▶ RolledBack(reason)
//! ```
//!
//! The snapshot only exists while the mutation is `Applied`; confirming
//! drops it and rolling back hands it to the caller exactly once.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use thiserror::Error;

use crate::error::FeedError;
use crate::model::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Reaction,
    Deletion,
    Reply,
}

/// Identifies what a mutation is about, for pending-state queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutationKey {
    pub target: Target,
    pub kind: MutationKind,
}

impl MutationKey {
    pub fn new(target: Target, kind: MutationKind) -> Self {
        Self { target, kind }
    }
}

impl fmt::Display for MutationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.target)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState<S> {
    Idle,
    Applied(S),
    Confirmed,
    RolledBack(FeedError),
}

impl<S> MutationState<S> {
    fn name(&self) -> &'static str {
        match self {
            MutationState::Idle => "Idle",
            MutationState::Applied(_) => "Applied",
            MutationState::Confirmed => "Confirmed",
            MutationState::RolledBack(_) => "RolledBack",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mutation {key}: cannot go from {from} to {to}")]
pub struct InvalidTransition {
    pub key: MutationKey,
    pub from: &'static str,
    pub to: &'static str,
}

/// One optimistic operation, tracked from prediction to outcome.
#[derive(Debug)]
pub struct Mutation<S> {
    key: MutationKey,
    state: MutationState<S>,
}

impl<S> Mutation<S> {
    pub fn new(key: MutationKey) -> Self {
        Self {
            key,
            state: MutationState::Idle,
        }
    }

    pub fn key(&self) -> MutationKey {
        self.key
    }

    pub fn state(&self) -> &MutationState<S> {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            MutationState::Confirmed | MutationState::RolledBack(_)
        )
    }

    /// `Idle → Applied`: the local prediction is in place.
    pub fn apply(&mut self, snapshot: S) -> Result<(), InvalidTransition> {
        match self.state {
            MutationState::Idle => {
                self.state = MutationState::Applied(snapshot);
                Ok(())
            }
            _ => Err(self.invalid("Applied")),
        }
    }

    /// `Applied → Confirmed`: the server agreed; the snapshot is dropped.
    pub fn confirm(&mut self) -> Result<(), InvalidTransition> {
        match self.state {
            MutationState::Applied(_) => {
                self.state = MutationState::Confirmed;
                Ok(())
            }
            _ => Err(self.invalid("Confirmed")),
        }
    }

    /// `Applied → RolledBack`: returns the snapshot to restore.
    pub fn roll_back(&mut self, reason: FeedError) -> Result<S, InvalidTransition> {
        match std::mem::replace(&mut self.state, MutationState::RolledBack(reason)) {
            MutationState::Applied(snapshot) => Ok(snapshot),
            other => {
                self.state = other;
                Err(self.invalid("RolledBack"))
            }
        }
    }

    fn invalid(&self, to: &'static str) -> InvalidTransition {
        InvalidTransition {
            key: self.key,
            from: self.state.name(),
            to,
        }
    }
}

// ── In-flight registry ──────────────────────────────────────────────

/// Counts in-flight operations per key so the view can show a pending
/// state. Overlapping operations on the same key are allowed; each one
/// holds its own guard.
#[derive(Debug, Default)]
pub struct InFlight {
    counts: Mutex<HashMap<MutationKey, usize>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an operation; it stays pending until the guard drops.
    pub fn begin(&self, key: MutationKey) -> InFlightGuard<'_> {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        *counts.entry(key).or_insert(0) += 1;
        InFlightGuard { registry: self, key }
    }

    pub fn count(&self, key: &MutationKey) -> usize {
        let counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        counts.get(key).copied().unwrap_or(0)
    }

    pub fn is_pending(&self, key: &MutationKey) -> bool {
        self.count(key) > 0
    }

    fn end(&self, key: &MutationKey) {
        let mut counts = self.counts.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(n) = counts.get_mut(key) {
            *n -= 1;
            if *n == 0 {
                counts.remove(key);
            }
        }
    }
}

pub struct InFlightGuard<'a> {
    registry: &'a InFlight,
    key: MutationKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.end(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PostId;

    fn key() -> MutationKey {
        MutationKey::new(Target::Post(PostId(1)), MutationKind::Reaction)
    }

    // ========================================================================
    // State machine
    // ========================================================================

    #[test]
    fn apply_then_confirm() {
        let mut m: Mutation<u32> = Mutation::new(key());
        assert_eq!(m.state(), &MutationState::Idle);

        m.apply(7).unwrap();
        assert_eq!(m.state(), &MutationState::Applied(7));
        assert!(!m.is_terminal());

        m.confirm().unwrap();
        assert_eq!(m.state(), &MutationState::Confirmed);
        assert!(m.is_terminal());
    }

    #[test]
    fn roll_back_yields_snapshot_once() {
        let mut m: Mutation<u32> = Mutation::new(key());
        m.apply(7).unwrap();

        let reason = FeedError::TransientNetworkFailure("timeout".into());
        assert_eq!(m.roll_back(reason.clone()).unwrap(), 7);
        assert_eq!(m.state(), &MutationState::RolledBack(reason.clone()));

        let err = m.roll_back(reason).unwrap_err();
        assert_eq!(err.from, "RolledBack");
    }

    #[test]
    fn second_apply_keeps_first_snapshot() {
        let mut m = Mutation::new(key());
        m.apply("snap").unwrap();
        let err = m.apply("again").unwrap_err();
        assert_eq!(err.from, "Applied");
        assert_eq!(m.roll_back(FeedError::Decode("x".into())).unwrap(), "snap");
    }

    #[test]
    fn terminal_states_reject_transitions() {
        let mut m: Mutation<u32> = Mutation::new(key());
        assert!(m.confirm().is_err());
        assert!(m.roll_back(FeedError::Decode("x".into())).is_err());

        m.apply(1).unwrap();
        assert!(m.apply(2).is_err());
        m.confirm().unwrap();
        assert!(m.confirm().is_err());
        assert!(m.apply(3).is_err());
    }

    // ========================================================================
    // In-flight registry
    // ========================================================================

    #[test]
    fn guards_track_overlapping_operations() {
        let registry = InFlight::new();
        let k = key();
        assert!(!registry.is_pending(&k));

        let first = registry.begin(k);
        let second = registry.begin(k);
        assert_eq!(registry.count(&k), 2);

        drop(first);
        assert!(registry.is_pending(&k));
        drop(second);
        assert!(!registry.is_pending(&k));
    }

    #[test]
    fn keys_are_independent() {
        let registry = InFlight::new();
        let reaction = key();
        let deletion = MutationKey::new(Target::Post(PostId(1)), MutationKind::Deletion);

        let _g = registry.begin(reaction);
        assert!(registry.is_pending(&reaction));
        assert!(!registry.is_pending(&deletion));
    }
}
