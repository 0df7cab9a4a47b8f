//! A minimal topic-deletion-manager double.

use crate::collaborators::TopicDeletionManager;
use crate::types::PartitionId;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;

/// Tracks which topics are currently marked for deletion. Every partition of
/// a marked topic reports as pending deletion; nothing else does.
#[derive(Debug, Default)]
pub struct StaticTopicDeletionManager {
    deleting: RwLock<HashSet<String>>,
}

impl StaticTopicDeletionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_for_deletion(&self, topic: impl Into<String>) {
        self.deleting.write().insert(topic.into());
    }

    pub fn clear_deletion(&self, topic: &str) {
        self.deleting.write().remove(topic);
    }
}

#[async_trait]
impl TopicDeletionManager for StaticTopicDeletionManager {
    async fn is_partition_to_be_deleted(&self, topic: &str, _partition: PartitionId) -> bool {
        self.deleting.read().contains(topic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_deletion_only_for_marked_topics() {
        let manager = StaticTopicDeletionManager::new();
        assert!(!manager.is_partition_to_be_deleted("orders", PartitionId::new(0)).await);

        manager.mark_for_deletion("orders");
        assert!(manager.is_partition_to_be_deleted("orders", PartitionId::new(0)).await);
        assert!(!manager.is_partition_to_be_deleted("payments", PartitionId::new(0)).await);

        manager.clear_deletion("orders");
        assert!(!manager.is_partition_to_be_deleted("orders", PartitionId::new(0)).await);
    }
}
