//! Contracts the replica state machine talks to, but does not own.
//!
//! Each trait here corresponds to a collaborator the controller depends on
//! and that is free to be backed by a real distributed system: the
//! coordination store (ZooKeeper/etcd-like), the per-broker control RPCs, and
//! whatever decides a topic is mid-deletion. This module defines the
//! contract; `store` and `batch` hold the concrete implementations shipped
//! with this crate.

use crate::error::ControllerError;
use crate::types::{BrokerId, LeaderAndIsr, PartitionId, ReplicaId};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Outcome of a single partition lookup against the coordination store.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionStateResult {
    /// The store holds state for this partition.
    Found(LeaderAndIsr),
    /// No z-node/record exists yet for this partition.
    Missing,
}

/// Per-partition outcome bundled with the key it was read for, so a batched
/// read can report a mix of found/missing/failed results.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionStateResponse {
    pub topic: String,
    pub partition: PartitionId,
    pub result: Result<PartitionStateResult, ControllerError>,
}

/// Outcome of a compare-and-swap write against the coordination store.
#[derive(Debug, Clone, PartialEq)]
pub enum CasOutcome {
    /// The write landed.
    Successful,
    /// A version conflict: somebody else wrote first. Callers should re-read
    /// and retry.
    Retry,
    /// Any other failure (fenced controller, transport error, ...).
    Failed(ControllerError),
}

/// The external system of record for partition leader/ISR state.
///
/// Grounded on the same CAS discipline a ZooKeeper- or etcd-backed metadata
/// store uses: reads return the current value (or absence), writes are
/// conditional on having observed the current version first.
#[async_trait]
pub trait CoordinationStoreClient: Send + Sync {
    /// Reads the current leader/ISR state for a set of partitions in one
    /// round trip. Each requested key gets exactly one response entry.
    async fn get_partition_states(
        &self,
        partitions: &[(String, PartitionId)],
    ) -> Vec<PartitionStateResponse>;

    /// Attempts to write `new_state` for `(topic, partition)`, conditioned on
    /// the store still holding whatever version was last read. `our_epoch` is
    /// compared against the store's recorded controller epoch: a store epoch
    /// strictly greater than `our_epoch` fails the write with
    /// [`ControllerError::FencedController`] rather than retrying.
    async fn update_leader_and_isr(
        &self,
        topic: &str,
        partition: PartitionId,
        new_state: LeaderAndIsr,
        our_epoch: crate::types::ControllerEpoch,
    ) -> CasOutcome;
}

/// One control-plane request destined for a single broker, accumulated by a
/// [`BrokerRequestBatch`] before being flushed.
#[derive(Debug, Clone, PartialEq)]
pub struct LeaderAndIsrInstruction {
    pub topic: String,
    pub partition: PartitionId,
    pub state: LeaderAndIsr,
    pub assignment: Vec<BrokerId>,
    pub is_new_replica: bool,
}

/// Invoked when a broker responds to a `StopReplica(delete=true)` request.
/// Implements the asynchronous edge `DeletionStarted -> {Successful |
/// Ineligible}`: the RSM itself never calls this, a collaborator does,
/// from whatever I/O-completion context it runs in.
pub type StopReplicaCallback = Arc<dyn Fn(ReplicaId, Result<(), ControllerError>) + Send + Sync>;

#[derive(Clone)]
pub struct StopReplicaInstruction {
    pub topic: String,
    pub partition: PartitionId,
    pub delete_partition: bool,
    pub response_callback: Option<StopReplicaCallback>,
}

impl fmt::Debug for StopReplicaInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopReplicaInstruction")
            .field("topic", &self.topic)
            .field("partition", &self.partition)
            .field("delete_partition", &self.delete_partition)
            .field("response_callback", &self.response_callback.is_some())
            .finish()
    }
}

/// Accumulates per-broker control-plane instructions over the course of one
/// `handle_state_changes` call and flushes them in a single batch per
/// broker: every transition handler adds to the batch, nothing is
/// sent until `send_to_brokers` is called once at the end.
#[async_trait]
pub trait BrokerRequestBatch: Send + Sync {
    /// Queues a LeaderAndIsr instruction for `broker`.
    fn add_leader_and_isr(&mut self, broker: BrokerId, instruction: LeaderAndIsrInstruction);

    /// Queues a StopReplica instruction for `broker`.
    fn add_stop_replica(&mut self, broker: BrokerId, instruction: StopReplicaInstruction);

    /// Flushes everything queued so far to the brokers that own it, tagged
    /// with `controller_epoch`, and clears the batch. Failures for
    /// individual brokers are reported, not raised: a broker that is
    /// unreachable does not stop delivery to the others.
    async fn send_to_brokers(
        &mut self,
        controller_epoch: crate::types::ControllerEpoch,
    ) -> Vec<(BrokerId, Result<(), ControllerError>)>;
}

/// Answers whether a partition is currently part of a topic deletion in
/// progress. The replica state machine consults this before honoring certain
/// transitions but does not drive deletion itself.
#[async_trait]
pub trait TopicDeletionManager: Send + Sync {
    async fn is_partition_to_be_deleted(&self, topic: &str, partition: PartitionId) -> bool;
}
