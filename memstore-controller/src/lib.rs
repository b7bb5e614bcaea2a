//! memstore-controller: converges declared Cloud Memorystore for Redis
//! instances with the remote API.
//!
//! A [`Reconciler`] connects to the provider through a [`Connector`],
//! observes the instance, and issues at most one create, update or delete.
//! The managed resource passed in carries all state between calls.

pub mod clients;
pub mod config;
pub mod connector;
pub mod context;
pub mod error;
pub mod proto;
pub mod reconciler;
pub mod resource;

pub use connector::{Connector, MemorystoreConnector};
pub use context::Context;
pub use error::{Error, Result};
pub use reconciler::{
    Action, ExternalClient, ExternalObservation, LifecycleState, ReconcileOutcome, Reconciler,
};
pub use resource::{CloudMemorystoreInstance, Managed};
