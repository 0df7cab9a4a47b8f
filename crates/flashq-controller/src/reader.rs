//! Bulk partition-state reads against the coordination store.

use crate::collaborators::{CoordinationStoreClient, PartitionStateResult};
use crate::error::ControllerError;
use crate::types::{ControllerEpoch, LeaderAndIsr, PartitionId, TopicPartition};
use std::collections::HashMap;

/// Result of a bulk `read_states` call, partitioned by outcome.
#[derive(Debug, Default)]
pub struct ReadStatesResult {
    pub found: HashMap<TopicPartition, LeaderAndIsr>,
    pub missing: Vec<TopicPartition>,
    pub failed: HashMap<TopicPartition, ControllerError>,
}

/// Bulk-fetches the per-partition leadership state for `partitions` and
/// classifies each result: a payload carrying a
/// controller epoch newer than `our_epoch` means another controller has
/// superseded us, and is reported as a fenced failure rather than a found
/// value.
pub async fn read_states(
    store: &dyn CoordinationStoreClient,
    partitions: &[TopicPartition],
    our_epoch: ControllerEpoch,
) -> ReadStatesResult {
    let mut result = ReadStatesResult::default();
    if partitions.is_empty() {
        return result;
    }

    let keys: Vec<(String, PartitionId)> = partitions.to_vec();
    let responses = store.get_partition_states(&keys).await;

    for response in responses {
        let key = (response.topic.clone(), response.partition);
        match response.result {
            Ok(PartitionStateResult::Found(state)) => {
                if state.controller_epoch > our_epoch {
                    result.failed.insert(
                        key,
                        ControllerError::FencedController {
                            topic: response.topic,
                            partition: response.partition.as_u32(),
                            our_epoch: our_epoch.into(),
                            store_epoch: state.controller_epoch.into(),
                        },
                    );
                } else {
                    result.found.insert(key, state);
                }
            }
            Ok(PartitionStateResult::Missing) => {
                result.missing.push(key);
            }
            Err(err) => {
                result.failed.insert(key, err);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CasOutcome, PartitionStateResponse};
    use crate::types::{BrokerId, Epoch};
    use async_trait::async_trait;

    struct FixedStore {
        responses: Vec<PartitionStateResponse>,
    }

    #[async_trait]
    impl CoordinationStoreClient for FixedStore {
        async fn get_partition_states(
            &self,
            _partitions: &[(String, PartitionId)],
        ) -> Vec<PartitionStateResponse> {
            self.responses.clone()
        }

        async fn update_leader_and_isr(
            &self,
            _topic: &str,
            _partition: PartitionId,
            _new_state: LeaderAndIsr,
            _our_epoch: ControllerEpoch,
        ) -> CasOutcome {
            CasOutcome::Successful
        }
    }

    fn lai(controller_epoch: u64) -> LeaderAndIsr {
        LeaderAndIsr {
            leader: Some(BrokerId(1)),
            isr: vec![BrokerId(1), BrokerId(2)],
            leader_epoch: Epoch(1),
            controller_epoch: ControllerEpoch(controller_epoch),
        }
    }

    #[tokio::test]
    async fn classifies_found_missing_and_failed() {
        let store = FixedStore {
            responses: vec![
                PartitionStateResponse {
                    topic: "orders".into(),
                    partition: PartitionId::new(0),
                    result: Ok(PartitionStateResult::Found(lai(1))),
                },
                PartitionStateResponse {
                    topic: "orders".into(),
                    partition: PartitionId::new(1),
                    result: Ok(PartitionStateResult::Missing),
                },
                PartitionStateResponse {
                    topic: "orders".into(),
                    partition: PartitionId::new(2),
                    result: Err(ControllerError::Transport {
                        context: "test".into(),
                        reason: "boom".into(),
                    }),
                },
            ],
        };

        let result = read_states(
            &store,
            &[
                ("orders".into(), PartitionId::new(0)),
                ("orders".into(), PartitionId::new(1)),
                ("orders".into(), PartitionId::new(2)),
            ],
            ControllerEpoch(1),
        )
        .await;

        assert_eq!(result.found.len(), 1);
        assert_eq!(result.missing.len(), 1);
        assert_eq!(result.failed.len(), 1);
    }

    #[tokio::test]
    async fn newer_controller_epoch_is_fenced() {
        let store = FixedStore {
            responses: vec![PartitionStateResponse {
                topic: "orders".into(),
                partition: PartitionId::new(0),
                result: Ok(PartitionStateResult::Found(lai(5))),
            }],
        };

        let result = read_states(&store, &[("orders".into(), PartitionId::new(0))], ControllerEpoch(1))
            .await;

        assert!(result.found.is_empty());
        let err = result
            .failed
            .get(&("orders".to_string(), PartitionId::new(0)))
            .unwrap();
        assert!(err.is_fenced());
    }

    #[tokio::test]
    async fn empty_input_is_a_no_op() {
        let store = FixedStore { responses: vec![] };
        let result = read_states(&store, &[], ControllerEpoch(1)).await;
        assert!(result.found.is_empty() && result.missing.is_empty() && result.failed.is_empty());
    }
}
