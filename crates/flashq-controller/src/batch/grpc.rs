//! A `BrokerRequestBatch` backed by the generated `BrokerControl` gRPC client.

use crate::collaborators::{
    BrokerRequestBatch, LeaderAndIsrInstruction, StopReplicaCallback, StopReplicaInstruction,
};
use crate::error::ControllerError;
use crate::proto::broker_control_client::BrokerControlClient as TonicBrokerControlClient;
use crate::proto::{
    LeaderAndIsrRequest, ReplicaLeaderAndIsr, StopReplicaPartition, StopReplicaRequest,
};
use crate::types::{BrokerId, ControllerEpoch, ReplicaId};
use async_trait::async_trait;
use std::collections::HashMap;
use tonic::Request;
use tonic::transport::Channel;

/// One broker's accumulated instructions for the batch currently being built.
#[derive(Default)]
struct PendingBroker {
    leader_and_isr: Vec<LeaderAndIsrInstruction>,
    stop_replica: Vec<StopReplicaInstruction>,
}

/// Dispatches the batch over gRPC, one `LeaderAndIsr` call and one
/// `StopReplica` call per broker that has pending work. Connections are
/// supplied by the caller (keyed by broker id) rather than established here,
/// matching the surrounding project's convention of a thin client wrapper
/// around a pre-connected channel.
pub struct GrpcBrokerBatch {
    clients: HashMap<BrokerId, TonicBrokerControlClient<Channel>>,
    pending: HashMap<BrokerId, PendingBroker>,
}

impl GrpcBrokerBatch {
    pub fn new(clients: HashMap<BrokerId, TonicBrokerControlClient<Channel>>) -> Self {
        Self {
            clients,
            pending: HashMap::new(),
        }
    }
}

fn status_to_controller_error(status: tonic::Status, context: &str) -> ControllerError {
    ControllerError::from_transport_error(status.message(), context)
}

#[async_trait]
impl BrokerRequestBatch for GrpcBrokerBatch {
    fn add_leader_and_isr(&mut self, broker: BrokerId, instruction: LeaderAndIsrInstruction) {
        self.pending.entry(broker).or_default().leader_and_isr.push(instruction);
    }

    fn add_stop_replica(&mut self, broker: BrokerId, instruction: StopReplicaInstruction) {
        self.pending.entry(broker).or_default().stop_replica.push(instruction);
    }

    async fn send_to_brokers(
        &mut self,
        controller_epoch: ControllerEpoch,
    ) -> Vec<(BrokerId, Result<(), ControllerError>)> {
        let pending = std::mem::take(&mut self.pending);
        let mut results = Vec::with_capacity(pending.len());

        let mut stop_replica_callbacks: Vec<(ReplicaId, StopReplicaCallback, Result<(), ControllerError>)> =
            Vec::new();

        for (broker, broker_work) in pending {
            let Some(client) = self.clients.get_mut(&broker) else {
                results.push((
                    broker,
                    Err(ControllerError::BrokerNotFound {
                        broker_id: broker.into(),
                    }),
                ));
                continue;
            };

            let mut broker_result = Ok(());

            if !broker_work.leader_and_isr.is_empty() {
                let partition_states = broker_work
                    .leader_and_isr
                    .iter()
                    .map(|i| ReplicaLeaderAndIsr {
                        topic: i.topic.clone(),
                        partition: i.partition.as_u32(),
                        leader: i.state.leader.map(u32::from).unwrap_or(0),
                        in_sync_replicas: i.state.isr.iter().map(|&b| b.into()).collect(),
                        leader_epoch: i.state.leader_epoch.into(),
                        controller_epoch: i.state.controller_epoch.into(),
                        assignment: i.assignment.iter().map(|&b| b.into()).collect(),
                        is_new_replica: i.is_new_replica,
                    })
                    .collect();

                let request = Request::new(LeaderAndIsrRequest {
                    controller_epoch: controller_epoch.into(),
                    partition_states,
                });

                if let Err(status) = client.leader_and_isr(request).await {
                    broker_result = Err(status_to_controller_error(status, "LeaderAndIsr dispatch"));
                }
            }

            if broker_result.is_ok() && !broker_work.stop_replica.is_empty() {
                let partitions = broker_work
                    .stop_replica
                    .iter()
                    .map(|i| StopReplicaPartition {
                        topic: i.topic.clone(),
                        partition: i.partition.as_u32(),
                        delete_partition: i.delete_partition,
                    })
                    .collect();

                let request = Request::new(StopReplicaRequest {
                    controller_epoch: controller_epoch.into(),
                    partitions,
                });

                match client.stop_replica(request).await {
                    Ok(response) => {
                        let response = response.into_inner();
                        for (instruction, result) in
                            broker_work.stop_replica.iter().zip(response.results)
                        {
                            if let Some(cb) = instruction.response_callback.clone() {
                                let replica =
                                    ReplicaId::new(instruction.topic.clone(), instruction.partition, broker);
                                let outcome = if result.ok {
                                    Ok(())
                                } else {
                                    Err(ControllerError::Transport {
                                        context: "StopReplica".into(),
                                        reason: result.error,
                                    })
                                };
                                stop_replica_callbacks.push((replica, cb, outcome));
                            }
                        }
                    }
                    Err(status) => {
                        broker_result = Err(status_to_controller_error(status, "StopReplica dispatch"));
                    }
                }
            }

            results.push((broker, broker_result));
        }

        for (replica, cb, outcome) in stop_replica_callbacks {
            cb(replica, outcome);
        }

        results
    }
}

impl std::fmt::Debug for PendingBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingBroker")
            .field("leader_and_isr_count", &self.leader_and_isr.len())
            .field("stop_replica_count", &self.stop_replica.len())
            .finish()
    }
}
