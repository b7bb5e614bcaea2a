//! Clients for the remote Redis API.
//!
//! - cloudmemorystore: the API surface and its gRPC implementation
//! - convert: translation between instance parameters and API messages
//! - fake: closure-driven client for tests

pub mod cloudmemorystore;
pub mod convert;
pub mod fake;

pub use cloudmemorystore::{BearerAuth, CallOptions, CloudMemorystoreClient, GrpcClient};
pub use convert::InstanceState;
pub use fake::MockClient;
