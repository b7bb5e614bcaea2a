//! Connectors turn a managed resource into an external client scoped to the
//! resource's project and credentials.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::{ClientTlsConfig, Endpoint};
use tracing::debug;

use crate::clients::{BearerAuth, CloudMemorystoreClient, GrpcClient};
use crate::config::CredentialsSource;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::reconciler::{ExternalClient, InstanceExternal};
use crate::resource::{CloudMemorystoreInstance, Managed};

/// Produces an external client for a managed resource.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, ctx: &Context, mg: &dyn Managed) -> Result<Box<dyn ExternalClient>>;
}

/// Builds the transport for a resolved provider config.
pub trait ClientFactory: Send + Sync {
    fn build(&self, endpoint: &str, access_token: &str) -> Result<Arc<dyn CloudMemorystoreClient>>;
}

/// Lazily connected gRPC channels; no I/O happens until the first call.
#[derive(Debug, Clone)]
pub struct GrpcClientFactory {
    connect_timeout: Duration,
}

impl Default for GrpcClientFactory {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl GrpcClientFactory {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl ClientFactory for GrpcClientFactory {
    fn build(&self, endpoint: &str, access_token: &str) -> Result<Arc<dyn CloudMemorystoreClient>> {
        let mut ep = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| Error::Connect(format!("invalid endpoint {endpoint}: {e}")))?
            .connect_timeout(self.connect_timeout);

        if endpoint.starts_with("https://") {
            ep = ep
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(|e| Error::Connect(format!("cannot configure TLS: {e}")))?;
        }

        let auth = BearerAuth::new(access_token).map_err(Error::Connect)?;
        Ok(Arc::new(GrpcClient::new(ep.connect_lazy(), auth)))
    }
}

/// Connector for [`CloudMemorystoreInstance`] resources.
pub struct MemorystoreConnector<S, F = GrpcClientFactory> {
    credentials: S,
    factory: F,
    call_timeout: Option<Duration>,
}

impl<S: CredentialsSource> MemorystoreConnector<S, GrpcClientFactory> {
    pub fn new(credentials: S) -> Self {
        Self::with_factory(credentials, GrpcClientFactory::default())
    }
}

impl<S: CredentialsSource, F: ClientFactory> MemorystoreConnector<S, F> {
    pub fn with_factory(credentials: S, factory: F) -> Self {
        Self {
            credentials,
            factory,
            call_timeout: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl<S, F> Connector for MemorystoreConnector<S, F>
where
    S: CredentialsSource,
    F: ClientFactory,
{
    async fn connect(&self, ctx: &Context, mg: &dyn Managed) -> Result<Box<dyn ExternalClient>> {
        let cr = mg
            .as_any()
            .downcast_ref::<CloudMemorystoreInstance>()
            .ok_or(Error::NotInstance)?;

        let pc_name = cr.provider_config_name();
        let config = ctx.run(self.credentials.resolve(pc_name)).await??;
        debug!(
            provider_config = pc_name,
            project = %config.project_id,
            endpoint = config.endpoint(),
            "Resolved provider config"
        );

        let client = self.factory.build(config.endpoint(), &config.access_token)?;

        let mut external = InstanceExternal::new(client, config.project_id);
        if let Some(timeout) = self.call_timeout {
            external = external.with_call_timeout(timeout);
        }
        Ok(Box::new(external))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProviderConfig, StaticCredentials};
    use crate::resource::InstanceParameters;

    fn credentials() -> StaticCredentials {
        StaticCredentials::new().with(
            "default",
            ProviderConfig {
                project_id: "coolProject".to_string(),
                access_token: "ya29.token".to_string(),
                endpoint: Some("http://127.0.0.1:1".to_string()),
            },
        )
    }

    #[derive(Debug)]
    struct Strange(CloudMemorystoreInstance);

    impl Managed for Strange {
        fn kind(&self) -> &'static str {
            "Strange"
        }
        fn meta(&self) -> &crate::resource::ObjectMeta {
            &self.0.metadata
        }
        fn meta_mut(&mut self) -> &mut crate::resource::ObjectMeta {
            &mut self.0.metadata
        }
        fn conditions(&self) -> &crate::resource::ConditionedStatus {
            &self.0.status.conditioned
        }
        fn conditions_mut(&mut self) -> &mut crate::resource::ConditionedStatus {
            &mut self.0.status.conditioned
        }
        fn as_any(&self) -> &dyn std::any::Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    }

    #[tokio::test]
    async fn test_connect_builds_lazy_client() {
        let connector = MemorystoreConnector::new(credentials());
        let cr = CloudMemorystoreInstance::new("cache", InstanceParameters::default());

        // Nothing listens on the endpoint; connecting must not dial it.
        let res = connector.connect(&Context::new(), &cr).await;
        assert!(res.is_ok());
    }

    #[tokio::test]
    async fn test_connect_unknown_provider_config() {
        let connector = MemorystoreConnector::new(StaticCredentials::new());
        let cr = CloudMemorystoreInstance::new("cache", InstanceParameters::default());

        let res = connector.connect(&Context::new(), &cr).await;
        assert!(matches!(res, Err(Error::Connect(_))));
    }

    #[tokio::test]
    async fn test_connect_invalid_endpoint() {
        let creds = StaticCredentials::new().with(
            "default",
            ProviderConfig {
                project_id: "coolProject".to_string(),
                access_token: "t".to_string(),
                endpoint: Some("not a uri".to_string()),
            },
        );
        let connector = MemorystoreConnector::new(creds);
        let cr = CloudMemorystoreInstance::new("cache", InstanceParameters::default());

        let res = connector.connect(&Context::new(), &cr).await;
        assert!(matches!(res, Err(Error::Connect(_))));
    }

    #[tokio::test]
    async fn test_connect_wrong_kind() {
        let connector = MemorystoreConnector::new(credentials());
        let strange = Strange(CloudMemorystoreInstance::default());

        let res = connector.connect(&Context::new(), &strange).await;
        assert!(matches!(res, Err(Error::NotInstance)));
    }
}
