//! Core identifiers and value types shared across the replica state machine.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Unique identifier for a broker in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BrokerId(pub u32);

impl From<u32> for BrokerId {
    fn from(id: u32) -> Self {
        BrokerId(id)
    }
}

impl From<BrokerId> for u32 {
    fn from(broker_id: BrokerId) -> Self {
        broker_id.0
    }
}

impl fmt::Display for BrokerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "broker-{}", self.0)
    }
}

/// Identifies a partition within a topic. Topic strings live alongside this on
/// every call site rather than inside the type, matching the rest of the
/// project's `(topic: &str, partition: PartitionId)` calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PartitionId(pub u32);

impl PartitionId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl From<u32> for PartitionId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<PartitionId> for u32 {
    fn from(partition_id: PartitionId) -> u32 {
        partition_id.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully-qualified (topic, partition) key, used everywhere the controller
/// needs to address a partition rather than a single replica.
pub type TopicPartition = (String, PartitionId);

/// Identifies a single replica: one broker's copy of one partition of one topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReplicaId {
    pub topic: String,
    pub partition: PartitionId,
    pub broker: BrokerId,
}

impl ReplicaId {
    pub fn new(topic: impl Into<String>, partition: PartitionId, broker: BrokerId) -> Self {
        Self {
            topic: topic.into(),
            partition,
            broker,
        }
    }

    pub fn topic_partition(&self) -> TopicPartition {
        (self.topic.clone(), self.partition)
    }
}

impl fmt::Display for ReplicaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}:{}]", self.topic, self.partition, self.broker)
    }
}

/// Monotonically increasing leader/partition epoch. Bumped every time the
/// leader or ISR of a partition changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Epoch(pub u64);

impl Epoch {
    pub fn next(self) -> Self {
        Epoch(self.0 + 1)
    }
}

impl From<u64> for Epoch {
    fn from(epoch: u64) -> Self {
        Epoch(epoch)
    }
}

impl From<Epoch> for u64 {
    fn from(epoch: Epoch) -> Self {
        epoch.0
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch-{}", self.0)
    }
}

/// Fencing token for controller writes to the coordination store. A store
/// write tagged with a controller epoch older than what it already holds is
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ControllerEpoch(pub u64);

impl From<u64> for ControllerEpoch {
    fn from(epoch: u64) -> Self {
        ControllerEpoch(epoch)
    }
}

impl From<ControllerEpoch> for u64 {
    fn from(epoch: ControllerEpoch) -> Self {
        epoch.0
    }
}

impl fmt::Display for ControllerEpoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "controller-epoch-{}", self.0)
    }
}

/// The authoritative leader/ISR tuple for a partition, as cached by the
/// controller and as stored in the coordination store.
///
/// `leader: None` is the **NoLeader** sentinel: the partition
/// currently has no assigned leader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderAndIsr {
    pub leader: Option<BrokerId>,
    pub isr: Vec<BrokerId>,
    pub leader_epoch: Epoch,
    pub controller_epoch: ControllerEpoch,
}

impl LeaderAndIsr {
    pub fn isr_set(&self) -> HashSet<BrokerId> {
        self.isr.iter().copied().collect()
    }

    pub fn contains(&self, broker: BrokerId) -> bool {
        self.isr.contains(&broker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_id_conversions_and_display() {
        let id: BrokerId = 7u32.into();
        assert_eq!(id, BrokerId(7));
        assert_eq!(u32::from(id), 7);
        assert_eq!(id.to_string(), "broker-7");
    }

    #[test]
    fn partition_id_conversions_and_display() {
        let pid = PartitionId::new(3);
        assert_eq!(pid.as_u32(), 3);
        assert_eq!(pid.to_string(), "3");
        let pid2: PartitionId = 9u32.into();
        assert_eq!(u32::from(pid2), 9);
    }

    #[test]
    fn epoch_ordering_and_next() {
        let e1 = Epoch(1);
        let e2 = e1.next();
        assert_eq!(e2, Epoch(2));
        assert!(e1 < e2);
    }

    #[test]
    fn replica_id_topic_partition() {
        let rid = ReplicaId::new("orders", PartitionId::new(0), BrokerId(1));
        assert_eq!(rid.topic_partition(), ("orders".to_string(), PartitionId::new(0)));
        assert_eq!(rid.to_string(), "[orders-0:broker-1]");
    }

    #[test]
    fn leader_and_isr_helpers() {
        let lai = LeaderAndIsr {
            leader: Some(BrokerId(1)),
            isr: vec![BrokerId(1), BrokerId(2)],
            leader_epoch: Epoch(5),
            controller_epoch: ControllerEpoch(1),
        };
        assert!(lai.contains(BrokerId(2)));
        assert!(!lai.contains(BrokerId(3)));
        assert_eq!(lai.isr_set().len(), 2);
    }

    #[test]
    fn serde_roundtrip() {
        let id = BrokerId(42);
        let json = serde_json::to_string(&id).unwrap();
        let back: BrokerId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
