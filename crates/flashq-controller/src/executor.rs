//! The transition executor: the per-target action table and lifecycle.

use crate::collaborators::{
    BrokerRequestBatch, CoordinationStoreClient, LeaderAndIsrInstruction, StopReplicaCallback,
    StopReplicaInstruction, TopicDeletionManager,
};
use crate::context::ControllerContext;
use crate::isr::remove_replica_from_isr;
use crate::state::{ReplicaState, StateTable};
use crate::types::{BrokerId, ReplicaId, TopicPartition};
use std::collections::HashMap;

/// Ties together the state table and the collaborators it drives. Owns no
/// part of `ControllerContext`: that is borrowed fresh on every call, per the
/// no-stashed-global guidance.
pub struct ReplicaStateMachine {
    states: StateTable,
    store: Box<dyn CoordinationStoreClient>,
    batch: Box<dyn BrokerRequestBatch>,
    deletion_manager: Box<dyn TopicDeletionManager>,
    max_isr_rounds: Option<u32>,
}

impl ReplicaStateMachine {
    pub fn new(
        store: Box<dyn CoordinationStoreClient>,
        batch: Box<dyn BrokerRequestBatch>,
        deletion_manager: Box<dyn TopicDeletionManager>,
    ) -> Self {
        Self {
            states: StateTable::new(),
            store,
            batch,
            deletion_manager,
            max_isr_rounds: None,
        }
    }

    /// Sets the round cap passed through to the ISR updater.
    pub fn with_max_isr_rounds(mut self, max_rounds: Option<u32>) -> Self {
        self.max_isr_rounds = max_rounds;
        self
    }

    // ===========================
    // Lifecycle
    // ===========================

    /// Seeds the state table from `context.assignment` and drives every live
    /// replica to `Online`. Idempotent: calling it again with unchanged
    /// assignment and liveness reproduces the same table.
    pub async fn startup(&mut self, context: &mut ControllerContext) {
        let partitions: Vec<TopicPartition> = context.partitions().cloned().collect();
        let mut live_replicas = Vec::new();

        for (topic, partition) in &partitions {
            let Some(brokers) = context.assignment(topic, *partition).map(<[BrokerId]>::to_vec) else {
                continue;
            };
            for broker in brokers {
                let replica = ReplicaId::new(topic.clone(), *partition, broker);
                let online = context.online_replicas(topic, *partition, broker);
                let seed = if online {
                    ReplicaState::Online
                } else {
                    ReplicaState::DeletionIneligible
                };
                self.states.set(replica.clone(), seed);
                if online {
                    live_replicas.push(replica);
                }
            }
        }

        tracing::info!(
            replica_count = self.states.len(),
            live_count = live_replicas.len(),
            "replica state machine startup"
        );

        self.handle_state_changes(context, &live_replicas, ReplicaState::Online, None)
            .await;
    }

    /// Drops the state table. Does not touch the store or send broker requests.
    pub fn shutdown(&mut self) {
        tracing::info!(replica_count = self.states.len(), "replica state machine shutdown");
        self.states.clear();
    }

    // ===========================
    // Query surface
    // ===========================

    pub fn replicas_in_state(&self, topic: &str, state: ReplicaState) -> std::collections::HashSet<ReplicaId> {
        self.states.replicas_in_state(topic, state)
    }

    pub fn any_replica_in_state(&self, topic: &str, state: ReplicaState) -> bool {
        self.states.any_replica_in_state(topic, state)
    }

    pub fn all_replicas_for_topic_are(&self, topic: &str, state: ReplicaState) -> bool {
        self.states.all_replicas_for_topic_are(topic, state)
    }

    pub fn exists_replica_in_state(&self, topic: &str, state: ReplicaState) -> bool {
        self.states.exists_replica_in_state(topic, state)
    }

    pub fn current_state(&mut self, replica: &ReplicaId) -> ReplicaState {
        self.states.current(replica)
    }

    // ===========================
    // Transition executor
    // ===========================

    /// Validates every `(replica, target)` pair, applies the target-specific
    /// action table, and flushes the broker batch exactly once, tagged with
    /// the controller epoch observed at entry. A no-op on an empty input: no
    /// batch is opened.
    pub async fn handle_state_changes(
        &mut self,
        context: &mut ControllerContext,
        replicas: &[ReplicaId],
        target: ReplicaState,
        on_stop_replica_response: Option<StopReplicaCallback>,
    ) {
        if replicas.is_empty() {
            return;
        }

        let epoch = context.epoch();

        let mut valid: Vec<(ReplicaId, ReplicaState)> = Vec::new();
        for replica in replicas {
            let current = self.states.current(replica);
            if target.is_valid_previous(current) {
                valid.push((replica.clone(), current));
            } else {
                tracing::error!(
                    topic = %replica.topic,
                    partition = %replica.partition,
                    broker_id = %replica.broker,
                    from = ?current,
                    to = ?target,
                    "invalid transition rejected"
                );
            }
        }

        match target {
            ReplicaState::New => self.handle_new(context, &valid).await,
            ReplicaState::Online => self.handle_online(context, &valid),
            ReplicaState::Offline => self.handle_offline(context, &valid, epoch).await,
            ReplicaState::DeletionStarted => {
                self.handle_deletion_started(&valid, on_stop_replica_response)
            }
            ReplicaState::DeletionIneligible | ReplicaState::DeletionSuccessful => {
                for (replica, _) in &valid {
                    self.states.set(replica.clone(), target);
                }
            }
            ReplicaState::NonExistent => self.handle_non_existent(context, &valid),
        }

        let results = self.batch.send_to_brokers(epoch).await;
        for (broker, result) in results {
            if let Err(err) = result {
                tracing::error!(broker_id = %broker, error = %err, "broker batch delivery failed");
            }
        }
    }

    async fn handle_new(&mut self, context: &ControllerContext, valid: &[(ReplicaId, ReplicaState)]) {
        for (replica, _) in valid {
            let leadership = context.leadership(&replica.topic, replica.partition);
            match leadership {
                Some(state) if state.leader == Some(replica.broker) => {
                    tracing::error!(
                        topic = %replica.topic,
                        partition = %replica.partition,
                        broker_id = %replica.broker,
                        "rejected New: target broker is already the partition leader"
                    );
                }
                Some(state) => {
                    let assignment = context
                        .assignment(&replica.topic, replica.partition)
                        .map(<[BrokerId]>::to_vec)
                        .unwrap_or_default();
                    self.batch.add_leader_and_isr(
                        replica.broker,
                        LeaderAndIsrInstruction {
                            topic: replica.topic.clone(),
                            partition: replica.partition,
                            state: state.clone(),
                            assignment,
                            is_new_replica: true,
                        },
                    );
                    self.states.set(replica.clone(), ReplicaState::New);
                }
                None => {
                    self.states.set(replica.clone(), ReplicaState::New);
                }
            }
        }
    }

    fn handle_online(&mut self, context: &mut ControllerContext, valid: &[(ReplicaId, ReplicaState)]) {
        for (replica, previous) in valid {
            if *previous == ReplicaState::New {
                context.append_to_assignment(&replica.topic, replica.partition, replica.broker);
            } else if let Some(state) = context.leadership(&replica.topic, replica.partition) {
                let assignment = context
                    .assignment(&replica.topic, replica.partition)
                    .map(<[BrokerId]>::to_vec)
                    .unwrap_or_default();
                self.batch.add_leader_and_isr(
                    replica.broker,
                    LeaderAndIsrInstruction {
                        topic: replica.topic.clone(),
                        partition: replica.partition,
                        state: state.clone(),
                        assignment,
                        is_new_replica: false,
                    },
                );
            }
            self.states.set(replica.clone(), ReplicaState::Online);
            tracing::trace!(
                topic = %replica.topic,
                partition = %replica.partition,
                broker_id = %replica.broker,
                from = ?previous,
                to = ?ReplicaState::Online,
                "transition applied"
            );
        }
    }

    async fn handle_offline(
        &mut self,
        context: &mut ControllerContext,
        valid: &[(ReplicaId, ReplicaState)],
        epoch: crate::types::ControllerEpoch,
    ) {
        for (replica, _) in valid {
            self.batch.add_stop_replica(
                replica.broker,
                StopReplicaInstruction {
                    topic: replica.topic.clone(),
                    partition: replica.partition,
                    delete_partition: false,
                    response_callback: None,
                },
            );
        }

        let mut by_broker: HashMap<BrokerId, Vec<TopicPartition>> = HashMap::new();
        let mut unknown_leadership: Vec<&ReplicaId> = Vec::new();

        for (replica, _) in valid {
            if context.leadership(&replica.topic, replica.partition).is_some() {
                by_broker
                    .entry(replica.broker)
                    .or_default()
                    .push(replica.topic_partition());
            } else {
                unknown_leadership.push(replica);
            }
        }

        for replica in unknown_leadership {
            self.states.set(replica.clone(), ReplicaState::Offline);
        }

        for (broker, partitions) in by_broker {
            let updated = remove_replica_from_isr(
                self.store.as_ref(),
                self.deletion_manager.as_ref(),
                broker,
                &partitions,
                epoch,
                self.max_isr_rounds,
            )
            .await;

            for (key, new_state) in &updated {
                context.set_leadership(&key.0, key.1, new_state.clone());

                if !self
                    .deletion_manager
                    .is_partition_to_be_deleted(&key.0, key.1)
                    .await
                {
                    let assignment = context
                        .assignment(&key.0, key.1)
                        .map(<[BrokerId]>::to_vec)
                        .unwrap_or_default();
                    for other in context.other_live_replicas(&key.0, key.1, broker) {
                        self.batch.add_leader_and_isr(
                            other,
                            LeaderAndIsrInstruction {
                                topic: key.0.clone(),
                                partition: key.1,
                                state: new_state.clone(),
                                assignment: assignment.clone(),
                                is_new_replica: false,
                            },
                        );
                    }
                }
            }

            for (replica, _) in valid.iter().filter(|(r, _)| r.broker == broker) {
                if updated.contains_key(&replica.topic_partition()) {
                    self.states.set(replica.clone(), ReplicaState::Offline);
                    tracing::trace!(
                        topic = %replica.topic,
                        partition = %replica.partition,
                        broker_id = %replica.broker,
                        to = ?ReplicaState::Offline,
                        "transition applied"
                    );
                }
            }
        }
    }

    fn handle_deletion_started(
        &mut self,
        valid: &[(ReplicaId, ReplicaState)],
        on_stop_replica_response: Option<StopReplicaCallback>,
    ) {
        for (replica, _) in valid {
            self.states.set(replica.clone(), ReplicaState::DeletionStarted);
            self.batch.add_stop_replica(
                replica.broker,
                StopReplicaInstruction {
                    topic: replica.topic.clone(),
                    partition: replica.partition,
                    delete_partition: true,
                    response_callback: on_stop_replica_response.clone(),
                },
            );
        }
    }

    fn handle_non_existent(&mut self, context: &mut ControllerContext, valid: &[(ReplicaId, ReplicaState)]) {
        for (replica, _) in valid {
            context.remove_from_assignment(&replica.topic, replica.partition, replica.broker);
            self.states.remove(replica);
            tracing::trace!(
                topic = %replica.topic,
                partition = %replica.partition,
                broker_id = %replica.broker,
                to = ?ReplicaState::NonExistent,
                "transition applied"
            );
        }
    }
}
