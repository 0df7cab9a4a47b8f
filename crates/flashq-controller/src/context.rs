//! Controller-wide shared state the replica state machine borrows from.

use crate::error::ControllerError;
use crate::types::{BrokerId, ControllerEpoch, LeaderAndIsr, PartitionId, TopicPartition};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Shared controller state: the cluster assignment, the cached authoritative
/// leadership for each partition, cluster membership, and the controller's
/// own fencing epoch.
///
/// This is owned by the surrounding controller and borrowed by the replica
/// state machine for the duration of one call (no ownership cycle, no
/// stashed global).
#[derive(Debug)]
pub struct ControllerContext {
    assignment: HashMap<TopicPartition, Vec<BrokerId>>,
    leadership: HashMap<TopicPartition, LeaderAndIsr>,
    live_brokers: HashSet<BrokerId>,
    epoch: ControllerEpoch,
}

impl ControllerContext {
    pub fn new(epoch: ControllerEpoch) -> Self {
        Self {
            assignment: HashMap::new(),
            leadership: HashMap::new(),
            live_brokers: HashSet::new(),
            epoch,
        }
    }

    pub fn epoch(&self) -> ControllerEpoch {
        self.epoch
    }

    pub fn set_epoch(&mut self, epoch: ControllerEpoch) {
        self.epoch = epoch;
    }

    // ===========================
    // Assignment
    // ===========================

    pub fn assignment(&self, topic: &str, partition: PartitionId) -> Option<&[BrokerId]> {
        self.assignment
            .get(&(topic.to_string(), partition))
            .map(Vec::as_slice)
    }

    pub fn set_assignment(&mut self, topic: impl Into<String>, partition: PartitionId, replicas: Vec<BrokerId>) {
        self.assignment.insert((topic.into(), partition), replicas);
    }

    /// Appends `broker` to the assignment for `(topic, partition)` if it is
    /// not already present. This is the `New -> Online` transition's commit
    /// point.
    pub fn append_to_assignment(&mut self, topic: &str, partition: PartitionId, broker: BrokerId) {
        let key = (topic.to_string(), partition);
        let entry = self.assignment.entry(key).or_default();
        if !entry.contains(&broker) {
            entry.push(broker);
        }
    }

    /// Removes `broker` from the assignment for `(topic, partition)`. Used by
    /// the `-> NonExistent` transition.
    pub fn remove_from_assignment(&mut self, topic: &str, partition: PartitionId, broker: BrokerId) {
        if let Some(replicas) = self.assignment.get_mut(&(topic.to_string(), partition)) {
            replicas.retain(|&b| b != broker);
        }
    }

    pub fn partitions(&self) -> impl Iterator<Item = &TopicPartition> {
        self.assignment.keys()
    }

    // ===========================
    // Leadership cache
    // ===========================

    pub fn leadership(&self, topic: &str, partition: PartitionId) -> Option<&LeaderAndIsr> {
        self.leadership.get(&(topic.to_string(), partition))
    }

    pub fn set_leadership(&mut self, topic: &str, partition: PartitionId, state: LeaderAndIsr) {
        self.leadership.insert((topic.to_string(), partition), state);
    }

    pub fn clear_leadership(&mut self, topic: &str, partition: PartitionId) {
        self.leadership.remove(&(topic.to_string(), partition));
    }

    // ===========================
    // Cluster membership
    // ===========================

    pub fn is_broker_live(&self, broker: BrokerId) -> bool {
        self.live_brokers.contains(&broker)
    }

    pub fn live_brokers(&self) -> &HashSet<BrokerId> {
        &self.live_brokers
    }

    pub fn set_broker_live(&mut self, broker: BrokerId, live: bool) {
        if live {
            self.live_brokers.insert(broker);
        } else {
            self.live_brokers.remove(&broker);
        }
    }

    /// True if `broker` both hosts `partition` in the current assignment and
    /// is currently live.
    pub fn online_replicas(&self, topic: &str, partition: PartitionId, broker: BrokerId) -> bool {
        self.is_broker_live(broker)
            && self
                .assignment(topic, partition)
                .is_some_and(|replicas| replicas.contains(&broker))
    }

    /// Every other live broker currently hosting `partition`, excluding
    /// `exclude`. Used by `-> Offline` to notify followers of a fresh ISR.
    pub fn other_live_replicas(
        &self,
        topic: &str,
        partition: PartitionId,
        exclude: BrokerId,
    ) -> Vec<BrokerId> {
        self.assignment(topic, partition)
            .map(|replicas| {
                replicas
                    .iter()
                    .copied()
                    .filter(|&b| b != exclude && self.is_broker_live(b))
                    .collect()
            })
            .unwrap_or_default()
    }

    // ===========================
    // Bootstrap from a manifest
    // ===========================

    /// Replaces the assignment and broker-liveness view with the contents of
    /// `manifest`. Does not touch `leadership`, which is always sourced live
    /// from the coordination store.
    pub fn load_manifest(&mut self, manifest: AssignmentManifest) {
        self.assignment.clear();
        self.live_brokers.clear();

        for broker in manifest.brokers {
            if broker.live {
                self.live_brokers.insert(broker.id);
            }
        }
        for (topic, topic_manifest) in manifest.topics {
            for (partition, replicas) in topic_manifest.replicas {
                self.assignment.insert((topic.clone(), partition), replicas);
            }
        }
    }
}

/// On-disk assignment manifest: the bootstrap input that seeds a fresh
/// [`ControllerContext`]'s assignment and broker roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentManifest {
    pub brokers: Vec<BrokerManifestEntry>,
    pub topics: HashMap<String, TopicManifest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerManifestEntry {
    pub id: BrokerId,
    pub live: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicManifest {
    pub replicas: HashMap<PartitionId, Vec<BrokerId>>,
}

impl AssignmentManifest {
    /// Loads a manifest from a JSON or YAML file, selected by extension with
    /// a JSON-then-YAML fallback when the extension is absent or unrecognized.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ControllerError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ControllerError::from_io_error(e, "assignment manifest loading"))?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension.to_lowercase().as_str() {
            "json" => serde_json::from_str(&content)
                .map_err(|e| ControllerError::from_parse_error(e, "JSON manifest parsing")),
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| ControllerError::from_parse_error(e, "YAML manifest parsing")),
            _ => serde_json::from_str(&content).or_else(|_| serde_yaml::from_str(&content)).map_err(
                |e| ControllerError::from_parse_error(e, "manifest parsing (tried both JSON and YAML)"),
            ),
        }
    }
}
