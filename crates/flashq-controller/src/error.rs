//! Error taxonomy for the replica state machine and its collaborators.

use std::fmt;

/// Main error type produced by the controller's replica state machine and the
/// collaborator traits it talks to.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerError {
    /// No such topic is known to the controller context.
    TopicNotFound { topic: String },
    /// No such partition under an otherwise-known topic.
    PartitionNotFound { topic: String, partition: u32 },
    /// No such broker is known to the cluster.
    BrokerNotFound { broker_id: u32 },
    /// The coordination store holds a controller epoch newer than ours: we
    /// have been superseded by another controller.
    FencedController {
        topic: String,
        partition: u32,
        our_epoch: u64,
        store_epoch: u64,
    },
    /// A compare-and-swap against the coordination store lost a version race.
    /// Retried transparently by the ISR updater; surfaced here only when a
    /// caller exhausts the retry budget.
    VersionConflict { topic: String, partition: u32 },
    /// The coordination store rejected a write because the supplied epoch did
    /// not move forward.
    InvalidEpoch {
        topic: String,
        partition: u32,
        current_epoch: u64,
        new_epoch: u64,
    },
    /// Transport-level failure talking to an external collaborator (broker
    /// RPC, coordination store).
    Transport { context: String, reason: String },
    /// Malformed configuration (assignment manifest, stored z-node payload).
    InvalidManifest { context: String, reason: String },
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerError::TopicNotFound { topic } => {
                write!(f, "topic '{topic}' not found")
            }
            ControllerError::PartitionNotFound { topic, partition } => {
                write!(f, "partition {partition} not found for topic '{topic}'")
            }
            ControllerError::BrokerNotFound { broker_id } => {
                write!(f, "broker {broker_id} not found")
            }
            ControllerError::FencedController {
                topic,
                partition,
                our_epoch,
                store_epoch,
            } => write!(
                f,
                "fenced: store holds controller epoch {store_epoch} > our {our_epoch} for {topic}-{partition}"
            ),
            ControllerError::VersionConflict { topic, partition } => {
                write!(f, "version conflict updating {topic}-{partition}")
            }
            ControllerError::InvalidEpoch {
                topic,
                partition,
                current_epoch,
                new_epoch,
            } => write!(
                f,
                "invalid epoch for {topic}-{partition}: attempted {new_epoch}, current {current_epoch} (epochs must increase)"
            ),
            ControllerError::Transport { context, reason } => {
                write!(f, "transport error in {context}: {reason}")
            }
            ControllerError::InvalidManifest { context, reason } => {
                write!(f, "invalid manifest in {context}: {reason}")
            }
        }
    }
}

impl std::error::Error for ControllerError {}

impl ControllerError {
    /// True for the class of error raised when another controller has taken
    /// over. Callers are expected to resign, not retry.
    pub fn is_fenced(&self) -> bool {
        matches!(self, ControllerError::FencedController { .. })
    }

    /// True for errors the ISR updater retries transparently.
    pub fn is_retriable(&self) -> bool {
        matches!(self, ControllerError::VersionConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ControllerError::TopicNotFound { .. }
                | ControllerError::PartitionNotFound { .. }
                | ControllerError::BrokerNotFound { .. }
        )
    }

    pub fn from_io_error(e: std::io::Error, context: &str) -> Self {
        ControllerError::InvalidManifest {
            context: context.to_string(),
            reason: e.to_string(),
        }
    }

    pub fn from_parse_error(e: impl std::fmt::Display, context: &str) -> Self {
        ControllerError::InvalidManifest {
            context: context.to_string(),
            reason: e.to_string(),
        }
    }

    pub fn from_transport_error(e: impl std::fmt::Display, context: &str) -> Self {
        ControllerError::Transport {
            context: context.to_string(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        let e = ControllerError::TopicNotFound {
            topic: "orders".into(),
        };
        assert_eq!(e.to_string(), "topic 'orders' not found");

        let e = ControllerError::FencedController {
            topic: "orders".into(),
            partition: 0,
            our_epoch: 3,
            store_epoch: 4,
        };
        assert!(e.to_string().contains("fenced"));
    }

    #[test]
    fn classification_predicates() {
        let fenced = ControllerError::FencedController {
            topic: "t".into(),
            partition: 0,
            our_epoch: 1,
            store_epoch: 2,
        };
        assert!(fenced.is_fenced());
        assert!(!fenced.is_retriable());

        let conflict = ControllerError::VersionConflict {
            topic: "t".into(),
            partition: 0,
        };
        assert!(conflict.is_retriable());
        assert!(!conflict.is_fenced());

        let not_found = ControllerError::BrokerNotFound { broker_id: 1 };
        assert!(not_found.is_not_found());
    }
}
