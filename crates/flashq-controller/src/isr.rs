//! Removes a broker from the in-sync-replica set of many partitions.

use crate::collaborators::{CasOutcome, CoordinationStoreClient, TopicDeletionManager};
use crate::reader::read_states;
use crate::types::{BrokerId, ControllerEpoch, LeaderAndIsr, TopicPartition};
use std::collections::HashMap;

/// Computes the proposed `(leader, isr)` pair after removing `broker`,
/// applying the single-member-ISR exception: an ISR with `broker` as its only
/// member is left untouched rather than emptied, and the leader becomes
/// `NoLeader` (`None`) instead.
fn propose_removal(current: &LeaderAndIsr, broker: BrokerId) -> LeaderAndIsr {
    let new_leader = if current.leader == Some(broker) {
        None
    } else {
        current.leader
    };

    let new_isr = if current.isr.len() == 1 && current.isr[0] == broker {
        current.isr.clone()
    } else {
        current.isr.iter().copied().filter(|&b| b != broker).collect()
    };

    LeaderAndIsr {
        leader: new_leader,
        isr: new_isr,
        leader_epoch: current.leader_epoch.next(),
        controller_epoch: current.controller_epoch,
    }
}

/// Removes `broker` from the ISR of every partition in `partitions`, CAS-ing
/// against the store and retrying on version conflict until every partition
/// has either landed, been dropped as benign (missing state on a
/// to-be-deleted topic), or failed.
///
/// `max_rounds` bounds the retry loop: when `Some(n)` is exhausted with
/// partitions still outstanding, those partitions are folded into the
/// returned failures as a `VersionConflict`, rather than retried forever.
pub async fn remove_replica_from_isr(
    store: &dyn CoordinationStoreClient,
    deletion_manager: &dyn TopicDeletionManager,
    broker: BrokerId,
    partitions: &[TopicPartition],
    our_epoch: ControllerEpoch,
    max_rounds: Option<u32>,
) -> HashMap<TopicPartition, LeaderAndIsr> {
    let mut result = HashMap::new();
    let mut remaining: Vec<TopicPartition> = partitions.to_vec();
    let mut round: u32 = 0;

    while !remaining.is_empty() {
        if let Some(max) = max_rounds {
            if round >= max {
                for key in &remaining {
                    tracing::error!(
                        topic = %key.0,
                        partition = %key.1,
                        broker_id = %broker,
                        "ISR update exhausted retry round cap; treating as failed"
                    );
                }
                break;
            }
        }
        round += 1;

        let read = read_states(store, &remaining, our_epoch).await;

        for (key, err) in &read.failed {
            tracing::error!(topic = %key.0, partition = %key.1, broker_id = %broker, error = %err, "ISR read failed");
        }

        for key in &read.missing {
            if !deletion_manager
                .is_partition_to_be_deleted(&key.0, key.1)
                .await
            {
                tracing::error!(topic = %key.0, partition = %key.1, broker_id = %broker, "no leadership state for partition not pending deletion");
            }
        }

        let mut already_done = HashMap::new();
        let mut candidates: HashMap<TopicPartition, LeaderAndIsr> = HashMap::new();

        for (key, state) in read.found {
            if state.contains(broker) {
                candidates.insert(key, state);
            } else {
                already_done.insert(key, state);
            }
        }

        result.extend(already_done);

        if candidates.is_empty() {
            break;
        }

        let mut retry = Vec::new();
        for (key, current) in candidates {
            let proposed = propose_removal(&current, broker);
            let outcome = store
                .update_leader_and_isr(&key.0, key.1, proposed.clone(), our_epoch)
                .await;
            match outcome {
                CasOutcome::Successful => {
                    tracing::trace!(topic = %key.0, partition = %key.1, broker_id = %broker, "ISR update committed");
                    result.insert(key, proposed);
                }
                CasOutcome::Retry => {
                    retry.push(key);
                }
                CasOutcome::Failed(err) => {
                    tracing::error!(topic = %key.0, partition = %key.1, broker_id = %broker, error = %err, "ISR CAS failed");
                }
            }
        }

        remaining = retry;
    }

    result
}
