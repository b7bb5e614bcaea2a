//! Client for the Cloud Memorystore for Redis API.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use tonic::metadata::{Ascii, MetadataKey, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::Channel;
use tonic::{Request, Status};
use tracing::debug;

use crate::proto::{
    CloudRedisClient, CreateInstanceRequest, DeleteInstanceRequest, GetInstanceRequest, Instance,
    Operation, UpdateInstanceRequest,
};

/// Per-call options, passed through to the transport unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Sent to the server as the gRPC deadline.
    pub timeout: Option<Duration>,
    /// Extra request metadata.
    pub metadata: BTreeMap<String, String>,
}

impl CallOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn apply<T>(&self, req: &mut Request<T>) -> Result<(), Status> {
        if let Some(timeout) = self.timeout {
            req.set_timeout(timeout);
        }
        for (k, v) in &self.metadata {
            let key = MetadataKey::<Ascii>::from_bytes(k.as_bytes())
                .map_err(|_| Status::invalid_argument(format!("invalid metadata key {k}")))?;
            let value = v
                .parse::<MetadataValue<Ascii>>()
                .map_err(|_| Status::invalid_argument(format!("invalid metadata value for {k}")))?;
            req.metadata_mut().insert(key, value);
        }
        Ok(())
    }
}

/// The four primitive remote operations on Redis instances.
///
/// Create, update and delete start long-running operations on the provider
/// and return their handle without waiting for completion.
#[async_trait]
pub trait CloudMemorystoreClient: Send + Sync {
    async fn get_instance(
        &self,
        req: GetInstanceRequest,
        opts: CallOptions,
    ) -> Result<Instance, Status>;

    async fn create_instance(
        &self,
        req: CreateInstanceRequest,
        opts: CallOptions,
    ) -> Result<Operation, Status>;

    async fn update_instance(
        &self,
        req: UpdateInstanceRequest,
        opts: CallOptions,
    ) -> Result<Operation, Status>;

    async fn delete_instance(
        &self,
        req: DeleteInstanceRequest,
        opts: CallOptions,
    ) -> Result<Operation, Status>;
}

// =============================================================================
// gRPC Implementation
// =============================================================================

/// Attaches the OAuth bearer token to every request.
#[derive(Clone)]
pub struct BearerAuth {
    header: MetadataValue<Ascii>,
}

impl BearerAuth {
    pub fn new(access_token: &str) -> Result<Self, String> {
        let header = format!("Bearer {access_token}")
            .parse::<MetadataValue<Ascii>>()
            .map_err(|_| "access token is not a valid header value".to_string())?;
        Ok(Self { header })
    }
}

impl Interceptor for BearerAuth {
    fn call(&mut self, mut req: Request<()>) -> Result<Request<()>, Status> {
        req.metadata_mut().insert("authorization", self.header.clone());
        Ok(req)
    }
}

/// gRPC client for `google.cloud.redis.v1.CloudRedis`.
#[derive(Clone)]
pub struct GrpcClient {
    inner: CloudRedisClient<InterceptedService<Channel, BearerAuth>>,
}

impl GrpcClient {
    pub fn new(channel: Channel, auth: BearerAuth) -> Self {
        Self {
            inner: CloudRedisClient::with_interceptor(channel, auth),
        }
    }

    fn request<T>(msg: T, opts: &CallOptions) -> Result<Request<T>, Status> {
        let mut req = Request::new(msg);
        opts.apply(&mut req)?;
        Ok(req)
    }
}

#[async_trait]
impl CloudMemorystoreClient for GrpcClient {
    async fn get_instance(
        &self,
        req: GetInstanceRequest,
        opts: CallOptions,
    ) -> Result<Instance, Status> {
        debug!(name = %req.name, "GetInstance");
        let mut client = self.inner.clone();
        let res = client.get_instance(Self::request(req, &opts)?).await?;
        Ok(res.into_inner())
    }

    async fn create_instance(
        &self,
        req: CreateInstanceRequest,
        opts: CallOptions,
    ) -> Result<Operation, Status> {
        debug!(parent = %req.parent, instance_id = %req.instance_id, "CreateInstance");
        let mut client = self.inner.clone();
        let res = client.create_instance(Self::request(req, &opts)?).await?;
        Ok(res.into_inner())
    }

    async fn update_instance(
        &self,
        req: UpdateInstanceRequest,
        opts: CallOptions,
    ) -> Result<Operation, Status> {
        debug!("UpdateInstance");
        let mut client = self.inner.clone();
        let res = client.update_instance(Self::request(req, &opts)?).await?;
        Ok(res.into_inner())
    }

    async fn delete_instance(
        &self,
        req: DeleteInstanceRequest,
        opts: CallOptions,
    ) -> Result<Operation, Status> {
        debug!(name = %req.name, "DeleteInstance");
        let mut client = self.inner.clone();
        let res = client.delete_instance(Self::request(req, &opts)?).await?;
        Ok(res.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_options_apply() {
        let mut opts = CallOptions::default().with_timeout(Duration::from_secs(30));
        opts.metadata.insert("x-goog-user-project".to_string(), "coolProject".to_string());

        let mut req = Request::new(());
        opts.apply(&mut req).unwrap();

        assert_eq!(req.metadata().get("grpc-timeout").unwrap(), "30000000u");
        assert_eq!(req.metadata().get("x-goog-user-project").unwrap(), "coolProject");
    }

    #[test]
    fn test_call_options_reject_bad_key() {
        let mut opts = CallOptions::default();
        opts.metadata.insert("not a key".to_string(), "v".to_string());

        let mut req = Request::new(());
        let err = opts.apply(&mut req).unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }

    #[test]
    fn test_bearer_auth_sets_header() {
        let mut auth = BearerAuth::new("ya29.token").unwrap();
        let req = auth.call(Request::new(())).unwrap();
        assert_eq!(req.metadata().get("authorization").unwrap(), "Bearer ya29.token");
    }

    #[tokio::test]
    async fn test_grpc_client_reports_unreachable_endpoint() {
        let channel = tonic::transport::Endpoint::from_static("http://127.0.0.1:1").connect_lazy();
        let client = GrpcClient::new(channel, BearerAuth::new("ya29.token").unwrap());

        let req = GetInstanceRequest {
            name: "projects/p/locations/l/instances/n".to_string(),
        };
        let opts = CallOptions::default().with_timeout(Duration::from_secs(5));
        assert!(client.get_instance(req, opts).await.is_err());
    }

    #[test]
    fn test_bearer_auth_rejects_newline() {
        assert!(BearerAuth::new("bad\ntoken").is_err());
    }
}
