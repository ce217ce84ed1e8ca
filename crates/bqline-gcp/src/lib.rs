//! bqline GCP - thin REST clients for the managed services both pipelines use
//!
//! Each service sits behind a small trait ([`SecretStore`], [`MessageQueue`],
//! [`Warehouse`], [`ObjectStorage`]) so the pipelines take explicit client
//! handles and tests can substitute in-memory fakes.

pub mod auth;
pub mod bigquery;
pub mod pubsub;
pub mod rest;
pub mod secrets;
pub mod storage;

// Re-exports for convenience
pub use auth::{GoogleAuth, ServiceAccountKey};
pub use bigquery::{
    BigQueryClient, InsertError, Partitioning, RangePartitioning, TableMetadata, TableRef,
    TimePartitioning, Warehouse,
};
pub use pubsub::{MessageQueue, PubSubClient, ReceivedMessage};
pub use secrets::{SecretManagerClient, SecretStore};
pub use storage::{GcsClient, ObjectStorage};
