//! An in-memory broker-request batch double. Records what would have
//! been sent instead of sending it, so tests can assert on dispatch without a
//! running broker.

use crate::collaborators::{
    BrokerRequestBatch, LeaderAndIsrInstruction, StopReplicaCallback, StopReplicaInstruction,
};
use crate::error::ControllerError;
use crate::types::{BrokerId, ControllerEpoch, PartitionId, ReplicaId};
use async_trait::async_trait;
use std::collections::HashMap;

/// One flushed batch, kept around after `send_to_brokers` so tests can
/// inspect exactly what was dispatched and to whom.
#[derive(Debug, Clone, Default)]
pub struct FlushedBatch {
    pub controller_epoch: u64,
    pub leader_and_isr: HashMap<BrokerId, Vec<LeaderAndIsrInstruction>>,
    pub stop_replica_topics: HashMap<BrokerId, Vec<(String, PartitionId, bool)>>,
}

#[derive(Default)]
pub struct RecordingBrokerBatch {
    pending_leader_and_isr: HashMap<BrokerId, Vec<LeaderAndIsrInstruction>>,
    pending_stop_replica: HashMap<BrokerId, Vec<StopReplicaInstruction>>,
    callbacks: HashMap<(String, PartitionId, BrokerId), StopReplicaCallback>,
    pub flushed: Vec<FlushedBatch>,
}

impl RecordingBrokerBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a broker acknowledging a pending `StopReplica` for
    /// `replica`, invoking whatever callback was attached when it was
    /// enqueued. Matches the bundled collaborator's documented behavior of
    /// invoking the callback synchronously rather than from a real
    /// I/O-completion context.
    pub fn simulate_stop_replica_response(&self, replica: &ReplicaId, result: Result<(), ControllerError>) {
        if let Some(cb) = self
            .callbacks
            .get(&(replica.topic.clone(), replica.partition, replica.broker))
        {
            cb(replica.clone(), result);
        }
    }
}

#[async_trait]
impl BrokerRequestBatch for RecordingBrokerBatch {
    fn add_leader_and_isr(&mut self, broker: BrokerId, instruction: LeaderAndIsrInstruction) {
        self.pending_leader_and_isr.entry(broker).or_default().push(instruction);
    }

    fn add_stop_replica(&mut self, broker: BrokerId, instruction: StopReplicaInstruction) {
        self.pending_stop_replica.entry(broker).or_default().push(instruction);
    }

    async fn send_to_brokers(
        &mut self,
        controller_epoch: ControllerEpoch,
    ) -> Vec<(BrokerId, Result<(), ControllerError>)> {
        let mut brokers: std::collections::HashSet<BrokerId> =
            self.pending_leader_and_isr.keys().copied().collect();
        brokers.extend(self.pending_stop_replica.keys().copied());

        let mut stop_replica_topics = HashMap::new();
        for (broker, instructions) in &self.pending_stop_replica {
            stop_replica_topics.insert(
                *broker,
                instructions
                    .iter()
                    .map(|i| (i.topic.clone(), i.partition, i.delete_partition))
                    .collect(),
            );
            for instruction in instructions {
                if let Some(cb) = &instruction.response_callback {
                    self.callbacks.insert(
                        (instruction.topic.clone(), instruction.partition, *broker),
                        cb.clone(),
                    );
                }
            }
        }

        self.flushed.push(FlushedBatch {
            controller_epoch: controller_epoch.into(),
            leader_and_isr: self.pending_leader_and_isr.clone(),
            stop_replica_topics,
        });

        self.pending_leader_and_isr.clear();
        self.pending_stop_replica.clear();

        brokers.into_iter().map(|b| (b, Ok(()))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Epoch, LeaderAndIsr};

    #[tokio::test]
    async fn records_and_flushes_leader_and_isr() {
        let mut batch = RecordingBrokerBatch::new();
        batch.add_leader_and_isr(
            BrokerId(1),
            LeaderAndIsrInstruction {
                topic: "orders".into(),
                partition: PartitionId::new(0),
                state: LeaderAndIsr {
                    leader: Some(BrokerId(1)),
                    isr: vec![BrokerId(1)],
                    leader_epoch: Epoch(1),
                    controller_epoch: ControllerEpoch(1),
                },
                assignment: vec![BrokerId(1)],
                is_new_replica: true,
            },
        );

        let results = batch.send_to_brokers(ControllerEpoch(1)).await;
        assert_eq!(results, vec![(BrokerId(1), Ok(()))]);
        assert_eq!(batch.flushed.len(), 1);
        assert_eq!(batch.flushed[0].leader_and_isr.len(), 1);
    }

    #[tokio::test]
    async fn stop_replica_callback_fires_on_simulated_response() {
        let mut batch = RecordingBrokerBatch::new();
        let fired = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let fired_clone = fired.clone();

        let replica = ReplicaId::new("orders", PartitionId::new(0), BrokerId(1));
        batch.add_stop_replica(
            BrokerId(1),
            StopReplicaInstruction {
                topic: "orders".into(),
                partition: PartitionId::new(0),
                delete_partition: true,
                response_callback: Some(std::sync::Arc::new(move |_replica, _result| {
                    fired_clone.store(true, std::sync::atomic::Ordering::SeqCst);
                })),
            },
        );
        batch.send_to_brokers(ControllerEpoch(1)).await;

        batch.simulate_stop_replica_response(&replica, Ok(()));
        assert!(fired.load(std::sync::atomic::Ordering::SeqCst));
    }
}
