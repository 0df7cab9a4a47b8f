//! Broker-request batch implementations.

mod grpc;
mod recording;

pub use grpc::GrpcBrokerBatch;
pub use recording::RecordingBrokerBatch;
