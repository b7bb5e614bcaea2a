//! Reconciliation of managed resources with their external counterparts.
//!
//! The reconciler connects to the provider, observes the external resource,
//! and then decides which single action moves live state toward desired
//! state. All state lives in the managed resource itself, so every call is
//! safe to repeat.

pub mod instance;

use std::fmt;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::connector::Connector;
use crate::context::Context;
use crate::error::Result;
use crate::resource::{ConditionReason, ConditionType, ConnectionDetails, Managed};

pub use instance::InstanceExternal;

// =============================================================================
// External Client
// =============================================================================

/// Result of observing an external resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalObservation {
    /// False means the resource has to be created.
    pub resource_exists: bool,
    /// False means the mutable parameters differ from the provider's.
    pub resource_up_to_date: bool,
    /// Unset spec fields were filled from the provider; the caller should
    /// persist the spec.
    pub resource_late_initialized: bool,
    pub connection_details: ConnectionDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalCreation {
    pub connection_details: ConnectionDetails,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalUpdate {
    pub connection_details: ConnectionDetails,
}

/// The four primitive operations on one kind of external resource.
///
/// Each operation rejects managed resources of the wrong kind with
/// [`crate::Error::NotInstance`] without touching them.
#[async_trait]
pub trait ExternalClient: Send + Sync {
    async fn observe(&self, ctx: &Context, mg: &mut dyn Managed) -> Result<ExternalObservation>;
    async fn create(&self, ctx: &Context, mg: &mut dyn Managed) -> Result<ExternalCreation>;
    async fn update(&self, ctx: &Context, mg: &mut dyn Managed) -> Result<ExternalUpdate>;
    async fn delete(&self, ctx: &Context, mg: &mut dyn Managed) -> Result<()>;
}

// =============================================================================
// Decision Core
// =============================================================================

/// Lifecycle of one external resource as seen through the last observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleState {
    NonExistent,
    Creating,
    Available,
    Deleting,
    /// Exists in a state the controller has no special handling for.
    Unknown(String),
}

impl LifecycleState {
    /// Derive the state from an observed managed resource.
    pub fn observed(mg: &dyn Managed, exists: bool) -> Self {
        if !exists {
            return LifecycleState::NonExistent;
        }
        match mg.conditions().get(ConditionType::Ready).map(|c| c.reason) {
            Some(ConditionReason::Available) => LifecycleState::Available,
            Some(ConditionReason::Creating) => LifecycleState::Creating,
            Some(ConditionReason::Deleting) => LifecycleState::Deleting,
            _ => LifecycleState::Unknown(mg.external_state().unwrap_or("UNKNOWN").to_string()),
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::NonExistent => f.write_str("NonExistent"),
            LifecycleState::Creating => f.write_str("Creating"),
            LifecycleState::Available => f.write_str("Available"),
            LifecycleState::Deleting => f.write_str("Deleting"),
            LifecycleState::Unknown(s) => write!(f, "Unknown({s})"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing to change; observing was enough.
    Observe,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Observe => "observe",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Pick the next action.
///
/// A delete already in flight is not issued again, and updates wait until
/// the resource is available since the provider rejects them while it is
/// transitioning.
pub fn decide(
    state: &LifecycleState,
    observation: &ExternalObservation,
    deletion_requested: bool,
) -> Action {
    match (deletion_requested, state) {
        (true, LifecycleState::NonExistent | LifecycleState::Deleting) => Action::Observe,
        (true, _) => Action::Delete,
        (false, LifecycleState::NonExistent) => Action::Create,
        (false, LifecycleState::Available) if !observation.resource_up_to_date => Action::Update,
        (false, _) => Action::Observe,
    }
}

/// What a reconcile did, for the caller to persist and act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub action: Action,
    /// State after the action, optimistic for create and delete.
    pub state: LifecycleState,
    pub connection_details: ConnectionDetails,
    pub late_initialized: bool,
}

impl ReconcileOutcome {
    /// Deletion was requested and the external resource is gone.
    pub fn finalized(&self, mg: &dyn Managed) -> bool {
        mg.meta().deletion_requested() && self.state == LifecycleState::NonExistent
    }
}

/// Drives one managed resource toward its desired state.
pub struct Reconciler<K> {
    connector: K,
}

impl<K: Connector> Reconciler<K> {
    pub fn new(connector: K) -> Self {
        Self { connector }
    }

    /// Run one connect, observe, act cycle.
    ///
    /// Errors from any step are returned as-is; conditions set optimistically
    /// before a failed create or delete are left in place for the next
    /// observation to correct.
    pub async fn reconcile(&self, ctx: &Context, mg: &mut dyn Managed) -> Result<ReconcileOutcome> {
        let name = mg.meta().name.clone();
        debug!(kind = mg.kind(), name = %name, "Reconciling");

        let external = self.connector.connect(ctx, mg).await?;
        let observation = external.observe(ctx, mg).await?;

        let state = LifecycleState::observed(mg, observation.resource_exists);
        let action = decide(&state, &observation, mg.meta().deletion_requested());
        info!(name = %name, state = %state, action = %action, "Observed external resource");

        let mut outcome = ReconcileOutcome {
            action,
            state,
            connection_details: observation.connection_details,
            late_initialized: observation.resource_late_initialized,
        };

        match action {
            Action::Observe => {}
            Action::Create => {
                if mg.meta().external_name().is_none() {
                    let external_name = mg.meta().name.clone();
                    mg.meta_mut().set_external_name(external_name);
                }
                let creation = external.create(ctx, mg).await?;
                outcome.connection_details.extend(creation.connection_details);
                outcome.state = LifecycleState::Creating;
            }
            Action::Update => {
                let update = external.update(ctx, mg).await?;
                outcome.connection_details.extend(update.connection_details);
            }
            Action::Delete => {
                external.delete(ctx, mg).await?;
                outcome.state = LifecycleState::Deleting;
            }
        }

        Ok(outcome)
    }
}
