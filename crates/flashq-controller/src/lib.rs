//! Replica state machine for a partitioned, replicated log controller.
//!
//! Tracks the lifecycle of every replica in the cluster, validates
//! transitions against a fixed state graph, and coordinates the side effects
//! of those transitions: broker control RPCs and writes to the coordination
//! store that holds the authoritative leader/ISR metadata.

pub mod batch;
pub mod collaborators;
pub mod context;
pub mod deletion;
pub mod error;
pub mod executor;
pub mod isr;
pub mod reader;
pub mod state;
pub mod store;
pub mod types;

pub mod proto {
    tonic::include_proto!("flashq.controller");
}

pub use collaborators::{
    BrokerRequestBatch, CasOutcome, CoordinationStoreClient, LeaderAndIsrInstruction,
    PartitionStateResponse, PartitionStateResult, StopReplicaCallback, StopReplicaInstruction,
    TopicDeletionManager,
};
pub use context::{AssignmentManifest, BrokerManifestEntry, ControllerContext, TopicManifest};
pub use error::ControllerError;
pub use executor::ReplicaStateMachine;
pub use reader::{read_states, ReadStatesResult};
pub use state::{ReplicaState, StateTable};
pub use types::{BrokerId, ControllerEpoch, Epoch, LeaderAndIsr, PartitionId, ReplicaId, TopicPartition};

// Re-export the bundled collaborator implementations for ergonomics.
pub use batch::{GrpcBrokerBatch, RecordingBrokerBatch};
pub use deletion::StaticTopicDeletionManager;
pub use store::InMemoryCoordinationStore;

// Re-export logging macros for consistent usage across the crate.
pub use log::{debug, error, info, trace, warn};
