//! An in-process, in-memory coordination store (the bundled collaborator
//! double, not a production implementation).

use crate::collaborators::{CasOutcome, CoordinationStoreClient, PartitionStateResponse, PartitionStateResult};
use crate::error::ControllerError;
use crate::types::{ControllerEpoch, LeaderAndIsr, PartitionId, TopicPartition};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Stands in for a ZooKeeper/etcd-style metadata store: a znode per
/// partition, read and CAS-written under a single lock. Concurrent writers
/// racing on the same partition always linearize here rather than actually
/// conflicting (there is only one mutex, not a version vector contended by
/// two processes), so `CasOutcome::Retry` never occurs on this
/// implementation in practice. Tests that need to exercise the retry path
/// use a scripted double instead (see the ISR updater's unit tests).
#[derive(Debug, Default)]
pub struct InMemoryCoordinationStore {
    partitions: RwLock<HashMap<TopicPartition, LeaderAndIsr>>,
}

impl InMemoryCoordinationStore {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }

    /// Seeds a partition's leadership state directly, bypassing CAS. Used by
    /// tests and by startup-time bootstrap.
    pub fn seed(&self, topic: impl Into<String>, partition: PartitionId, state: LeaderAndIsr) {
        self.partitions.write().insert((topic.into(), partition), state);
    }

    pub fn get(&self, topic: &str, partition: PartitionId) -> Option<LeaderAndIsr> {
        self.partitions.read().get(&(topic.to_string(), partition)).cloned()
    }
}

#[async_trait]
impl CoordinationStoreClient for InMemoryCoordinationStore {
    async fn get_partition_states(
        &self,
        partitions: &[(String, PartitionId)],
    ) -> Vec<PartitionStateResponse> {
        let stored = self.partitions.read();
        partitions
            .iter()
            .map(|(topic, partition)| {
                let key = (topic.clone(), *partition);
                let result = match stored.get(&key) {
                    Some(state) => Ok(PartitionStateResult::Found(state.clone())),
                    None => Ok(PartitionStateResult::Missing),
                };
                PartitionStateResponse {
                    topic: topic.clone(),
                    partition: *partition,
                    result,
                }
            })
            .collect()
    }

    async fn update_leader_and_isr(
        &self,
        topic: &str,
        partition: PartitionId,
        new_state: LeaderAndIsr,
        our_epoch: ControllerEpoch,
    ) -> CasOutcome {
        let key = (topic.to_string(), partition);
        let mut stored = self.partitions.write();

        if let Some(existing) = stored.get(&key) {
            if existing.controller_epoch > our_epoch {
                return CasOutcome::Failed(ControllerError::FencedController {
                    topic: topic.to_string(),
                    partition: partition.as_u32(),
                    our_epoch: our_epoch.into(),
                    store_epoch: existing.controller_epoch.into(),
                });
            }
        }

        stored.insert(key, new_state);
        CasOutcome::Successful
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BrokerId, Epoch};

    fn lai(controller_epoch: u64) -> LeaderAndIsr {
        LeaderAndIsr {
            leader: Some(BrokerId(1)),
            isr: vec![BrokerId(1), BrokerId(2)],
            leader_epoch: Epoch(1),
            controller_epoch: ControllerEpoch(controller_epoch),
        }
    }

    #[tokio::test]
    async fn read_missing_partition() {
        let store = InMemoryCoordinationStore::new();
        let responses = store
            .get_partition_states(&[("orders".to_string(), PartitionId::new(0))])
            .await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].result, Ok(PartitionStateResult::Missing));
    }

    #[tokio::test]
    async fn write_then_read() {
        let store = InMemoryCoordinationStore::new();
        let outcome = store
            .update_leader_and_isr("orders", PartitionId::new(0), lai(1), ControllerEpoch(1))
            .await;
        assert_eq!(outcome, CasOutcome::Successful);

        let state = store.get("orders", PartitionId::new(0)).unwrap();
        assert_eq!(state.controller_epoch, ControllerEpoch(1));
    }

    #[tokio::test]
    async fn fences_write_from_stale_controller() {
        let store = InMemoryCoordinationStore::new();
        store.seed("orders", PartitionId::new(0), lai(5));

        let outcome = store
            .update_leader_and_isr("orders", PartitionId::new(0), lai(3), ControllerEpoch(3))
            .await;

        match outcome {
            CasOutcome::Failed(err) => assert!(err.is_fenced()),
            other => panic!("expected fenced failure, got {other:?}"),
        }
    }
}
