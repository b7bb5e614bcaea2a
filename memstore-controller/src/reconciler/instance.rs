//! External client for Cloud Memorystore instances.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{ExternalClient, ExternalCreation, ExternalObservation, ExternalUpdate};
use crate::clients::convert::{self, InstanceState};
use crate::clients::{CallOptions, CloudMemorystoreClient};
use crate::context::Context;
use crate::error::{is_not_found, Error, Result};
use crate::proto::{
    CreateInstanceRequest, DeleteInstanceRequest, GetInstanceRequest, UpdateInstanceRequest,
};
use crate::resource::{CloudMemorystoreInstance, Condition, Managed};

/// Downcast to an instance or fail without touching the object.
pub(crate) fn as_instance(mg: &mut dyn Managed) -> Result<&mut CloudMemorystoreInstance> {
    mg.as_any_mut()
        .downcast_mut::<CloudMemorystoreInstance>()
        .ok_or(Error::NotInstance)
}

/// External name of the instance, falling back to the object name.
fn external_name(cr: &CloudMemorystoreInstance) -> &str {
    cr.metadata
        .external_name()
        .unwrap_or(cr.metadata.name.as_str())
}

/// Performs instance operations in one project with one set of credentials.
pub struct InstanceExternal {
    client: Arc<dyn CloudMemorystoreClient>,
    project_id: String,
    call_timeout: Option<Duration>,
}

impl InstanceExternal {
    pub fn new(client: Arc<dyn CloudMemorystoreClient>, project_id: impl Into<String>) -> Self {
        Self {
            client,
            project_id: project_id.into(),
            call_timeout: None,
        }
    }

    /// Deadline sent with every remote call unless the context expires sooner.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    fn call_options(&self, ctx: &Context) -> CallOptions {
        let timeout = match (ctx.remaining(), self.call_timeout) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        CallOptions {
            timeout,
            ..Default::default()
        }
    }

    fn qualified_name(&self, cr: &CloudMemorystoreInstance) -> String {
        convert::qualified_name(
            &self.project_id,
            &cr.spec.for_provider.region,
            external_name(cr),
        )
    }
}

#[async_trait]
impl ExternalClient for InstanceExternal {
    async fn observe(&self, ctx: &Context, mg: &mut dyn Managed) -> Result<ExternalObservation> {
        let cr = as_instance(mg)?;
        let name = self.qualified_name(cr);

        let req = GetInstanceRequest { name: name.clone() };
        let existing = match ctx
            .run(self.client.get_instance(req, self.call_options(ctx)))
            .await?
        {
            Ok(i) => i,
            Err(s) if is_not_found(&s) => {
                debug!(instance = %name, "Instance does not exist");
                return Ok(ExternalObservation::default());
            }
            Err(s) => return Err(Error::remote(s, Error::Observe)),
        };

        let late_initialized = convert::late_initialize(&mut cr.spec.for_provider, &existing);
        cr.status.at_provider = convert::generate_observation(&existing);

        let condition = match InstanceState::from_remote(existing.state) {
            InstanceState::Ready => Condition::available(),
            InstanceState::Creating => Condition::creating(),
            InstanceState::Deleting => Condition::deleting(),
            _ if existing.status_message.is_empty() => Condition::unavailable(),
            _ => Condition::unavailable().with_message(existing.status_message.clone()),
        };
        cr.status.conditioned.set_conditions([condition]);

        debug!(
            instance = %name,
            state = %cr.status.at_provider.state,
            late_initialized,
            "Observed instance"
        );

        Ok(ExternalObservation {
            resource_exists: true,
            resource_up_to_date: convert::is_up_to_date(&cr.spec.for_provider, &existing),
            resource_late_initialized: late_initialized,
            connection_details: convert::connection_details(&cr.status.at_provider),
        })
    }

    async fn create(&self, ctx: &Context, mg: &mut dyn Managed) -> Result<ExternalCreation> {
        let cr = as_instance(mg)?;
        cr.status.conditioned.set_conditions([Condition::creating()]);

        let name = self.qualified_name(cr);
        let req = CreateInstanceRequest {
            parent: convert::parent(&self.project_id, &cr.spec.for_provider.region),
            instance_id: external_name(cr).to_string(),
            instance: Some(convert::generate_instance(&name, &cr.spec.for_provider)),
        };

        let op = ctx
            .run(self.client.create_instance(req, self.call_options(ctx)))
            .await?
            .map_err(|s| Error::remote(s, Error::Create))?;
        info!(instance = %name, operation = %op.name, "Create requested");

        Ok(ExternalCreation::default())
    }

    async fn update(&self, ctx: &Context, mg: &mut dyn Managed) -> Result<ExternalUpdate> {
        let cr = as_instance(mg)?;

        let name = self.qualified_name(cr);
        let (instance, mask) = convert::generate_update(&name, &cr.spec.for_provider);
        let req = UpdateInstanceRequest {
            update_mask: Some(mask),
            instance: Some(instance),
        };

        let op = ctx
            .run(self.client.update_instance(req, self.call_options(ctx)))
            .await?
            .map_err(|s| Error::remote(s, Error::Update))?;
        info!(instance = %name, operation = %op.name, "Update requested");

        Ok(ExternalUpdate::default())
    }

    async fn delete(&self, ctx: &Context, mg: &mut dyn Managed) -> Result<()> {
        let cr = as_instance(mg)?;
        cr.status.conditioned.set_conditions([Condition::deleting()]);

        let name = self.qualified_name(cr);
        let req = DeleteInstanceRequest { name: name.clone() };

        match ctx
            .run(self.client.delete_instance(req, self.call_options(ctx)))
            .await?
        {
            Ok(op) => {
                info!(instance = %name, operation = %op.name, "Delete requested");
                Ok(())
            }
            Err(s) if is_not_found(&s) => {
                debug!(instance = %name, "Instance already gone");
                Ok(())
            }
            Err(s) => Err(Error::remote(s, Error::Delete)),
        }
    }
}
