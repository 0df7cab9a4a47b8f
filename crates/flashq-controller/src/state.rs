//! Replica states, the legal transition table, and the in-memory state table.

use crate::types::ReplicaId;
use std::collections::{HashMap, HashSet};

/// The seven states a replica can be in. See the module-level transition
/// table (`valid_previous_states`) for the legal edges between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicaState {
    /// No such replica known; also the implicit state of any replica absent
    /// from the state table.
    NonExistent,
    /// Announced during a reassignment; not yet counted in the partition's
    /// assignment.
    New,
    /// Part of the partition's assignment; expected to be serving as leader
    /// or follower.
    Online,
    /// Hosting broker is down, or the replica has been removed from ISR.
    Offline,
    /// A delete-replica command has been issued.
    DeletionStarted,
    /// Broker acknowledged deletion with no error.
    DeletionSuccessful,
    /// Broker reported a failure to delete, or deletion was attempted
    /// against an unreachable replica.
    DeletionIneligible,
}

impl ReplicaState {
    /// The compile-time-known set of states a replica may be transitioning
    /// *from* to reach `self`. Encoded as a static table per the design
    /// notes, not as virtual dispatch.
    pub fn valid_previous_states(self) -> &'static [ReplicaState] {
        use ReplicaState::*;
        match self {
            NonExistent => &[DeletionSuccessful],
            New => &[NonExistent],
            Online => &[New, Online, Offline, DeletionIneligible],
            Offline => &[New, Online, Offline, DeletionIneligible],
            DeletionStarted => &[Offline],
            DeletionSuccessful => &[DeletionStarted],
            DeletionIneligible => &[DeletionStarted],
        }
    }

    /// Pure predicate: is `current -> self` a legal edge?
    pub fn is_valid_previous(self, current: ReplicaState) -> bool {
        self.valid_previous_states().contains(&current)
    }
}

/// In-memory mapping from replica identity to current state.
///
/// A replica absent from the table is treated as `NonExistent` for the
/// purposes of transition validation, but is only *materialized* as an
/// entry once something actually looks it up via [`StateTable::current`],
/// matching the source's get-or-insert semantics (see the open-question
/// ledger in DESIGN.md).
#[derive(Debug, Default)]
pub struct StateTable {
    states: HashMap<ReplicaId, ReplicaState>,
}

impl StateTable {
    pub fn new() -> Self {
        Self {
            states: HashMap::new(),
        }
    }

    /// Current state of `replica`, defaulting to and materializing
    /// `NonExistent` if it has never been seen.
    pub fn current(&mut self, replica: &ReplicaId) -> ReplicaState {
        *self
            .states
            .entry(replica.clone())
            .or_insert(ReplicaState::NonExistent)
    }

    /// Current state without materializing a default entry; used by the
    /// read-only query surface.
    pub fn peek(&self, replica: &ReplicaId) -> ReplicaState {
        self.states
            .get(replica)
            .copied()
            .unwrap_or(ReplicaState::NonExistent)
    }

    pub fn set(&mut self, replica: ReplicaId, state: ReplicaState) {
        self.states.insert(replica, state);
    }

    /// Removes the entry entirely (used for the `-> NonExistent` transition;
    /// per invariant 2, the table never carries explicit `NonExistent`
    /// entries once one is reached).
    pub fn remove(&mut self, replica: &ReplicaId) {
        self.states.remove(replica);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn clear(&mut self) {
        self.states.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ReplicaId, &ReplicaState)> {
        self.states.iter()
    }

    // ===========================
    // Query surface
    // ===========================

    pub fn replicas_in_state(&self, topic: &str, state: ReplicaState) -> HashSet<ReplicaId> {
        self.states
            .iter()
            .filter(|(r, s)| r.topic == topic && **s == state)
            .map(|(r, _)| r.clone())
            .collect()
    }

    pub fn any_replica_in_state(&self, topic: &str, state: ReplicaState) -> bool {
        self.states
            .iter()
            .any(|(r, s)| r.topic == topic && *s == state)
    }

    pub fn all_replicas_for_topic_are(&self, topic: &str, state: ReplicaState) -> bool {
        self.states
            .iter()
            .filter(|(r, _)| r.topic == topic)
            .all(|(_, s)| *s == state)
    }

    pub fn exists_replica_in_state(&self, topic: &str, state: ReplicaState) -> bool {
        self.any_replica_in_state(topic, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BrokerId, PartitionId};

    fn rid(broker: u32) -> ReplicaId {
        ReplicaId::new("orders", PartitionId::new(0), BrokerId(broker))
    }

    #[test]
    fn legal_edges_match_spec_table() {
        use ReplicaState::*;
        assert!(New.is_valid_previous(NonExistent));
        assert!(Online.is_valid_previous(New));
        assert!(Online.is_valid_previous(Online));
        assert!(Online.is_valid_previous(Offline));
        assert!(Online.is_valid_previous(DeletionIneligible));
        assert!(Offline.is_valid_previous(New));
        assert!(DeletionStarted.is_valid_previous(Offline));
        assert!(DeletionSuccessful.is_valid_previous(DeletionStarted));
        assert!(DeletionIneligible.is_valid_previous(DeletionStarted));
        assert!(NonExistent.is_valid_previous(DeletionSuccessful));
    }

    #[test]
    fn illegal_edges_rejected() {
        use ReplicaState::*;
        assert!(!DeletionStarted.is_valid_previous(New));
        assert!(!New.is_valid_previous(Online));
        assert!(!NonExistent.is_valid_previous(Offline));
        assert!(!Online.is_valid_previous(DeletionStarted));
    }

    #[test]
    fn absent_replica_defaults_to_non_existent() {
        let table = StateTable::new();
        assert_eq!(table.peek(&rid(1)), ReplicaState::NonExistent);
    }

    #[test]
    fn current_materializes_default_entry() {
        let mut table = StateTable::new();
        assert_eq!(table.len(), 0);
        assert_eq!(table.current(&rid(1)), ReplicaState::NonExistent);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn set_and_remove() {
        let mut table = StateTable::new();
        table.set(rid(1), ReplicaState::Online);
        assert_eq!(table.peek(&rid(1)), ReplicaState::Online);
        table.remove(&rid(1));
        assert_eq!(table.peek(&rid(1)), ReplicaState::NonExistent);
        assert!(table.is_empty());
    }

    #[test]
    fn query_surface() {
        let mut table = StateTable::new();
        table.set(rid(1), ReplicaState::Online);
        table.set(rid(2), ReplicaState::Online);
        table.set(rid(3), ReplicaState::Offline);

        assert_eq!(
            table.replicas_in_state("orders", ReplicaState::Online).len(),
            2
        );
        assert!(table.any_replica_in_state("orders", ReplicaState::Offline));
        assert!(!table.all_replicas_for_topic_are("orders", ReplicaState::Online));

        table.set(rid(3), ReplicaState::Online);
        assert!(table.all_replicas_for_topic_are("orders", ReplicaState::Online));
    }

    #[test]
    fn clear_drops_everything() {
        let mut table = StateTable::new();
        table.set(rid(1), ReplicaState::Online);
        table.clear();
        assert!(table.is_empty());
    }
}
