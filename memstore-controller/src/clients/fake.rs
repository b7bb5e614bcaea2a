//! Fake Redis API client for tests.
//!
//! Each operation is backed by an optional closure. Calling an operation
//! whose closure is unset fails with `UNIMPLEMENTED`, so a test only wires
//! up the calls it expects.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tonic::Status;

use super::cloudmemorystore::{CallOptions, CloudMemorystoreClient};
use crate::proto::{
    CreateInstanceRequest, DeleteInstanceRequest, GetInstanceRequest, Instance, Operation,
    UpdateInstanceRequest,
};

type MockFn<Req, Res> = Box<dyn Fn(&Req, &CallOptions) -> Result<Res, Status> + Send + Sync>;

/// Closure-driven [`CloudMemorystoreClient`].
#[derive(Default)]
pub struct MockClient {
    pub mock_get_instance: Option<MockFn<GetInstanceRequest, Instance>>,
    pub mock_create_instance: Option<MockFn<CreateInstanceRequest, Operation>>,
    pub mock_update_instance: Option<MockFn<UpdateInstanceRequest, Operation>>,
    pub mock_delete_instance: Option<MockFn<DeleteInstanceRequest, Operation>>,
    calls: AtomicUsize,
    last_create: Mutex<Option<CreateInstanceRequest>>,
    last_update: Mutex<Option<UpdateInstanceRequest>>,
}

impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_get<F>(mut self, f: F) -> Self
    where
        F: Fn(&GetInstanceRequest, &CallOptions) -> Result<Instance, Status> + Send + Sync + 'static,
    {
        self.mock_get_instance = Some(Box::new(f));
        self
    }

    pub fn with_create<F>(mut self, f: F) -> Self
    where
        F: Fn(&CreateInstanceRequest, &CallOptions) -> Result<Operation, Status>
            + Send
            + Sync
            + 'static,
    {
        self.mock_create_instance = Some(Box::new(f));
        self
    }

    pub fn with_update<F>(mut self, f: F) -> Self
    where
        F: Fn(&UpdateInstanceRequest, &CallOptions) -> Result<Operation, Status>
            + Send
            + Sync
            + 'static,
    {
        self.mock_update_instance = Some(Box::new(f));
        self
    }

    pub fn with_delete<F>(mut self, f: F) -> Self
    where
        F: Fn(&DeleteInstanceRequest, &CallOptions) -> Result<Operation, Status>
            + Send
            + Sync
            + 'static,
    {
        self.mock_delete_instance = Some(Box::new(f));
        self
    }

    /// Number of remote calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_create(&self) -> Option<CreateInstanceRequest> {
        self.last_create.lock().ok().and_then(|g| g.clone())
    }

    pub fn last_update(&self) -> Option<UpdateInstanceRequest> {
        self.last_update.lock().ok().and_then(|g| g.clone())
    }

    fn call<Req, Res>(
        &self,
        f: &Option<MockFn<Req, Res>>,
        req: &Req,
        opts: &CallOptions,
    ) -> Result<Res, Status> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match f {
            Some(f) => f(req, opts),
            None => Err(Status::unimplemented("no mock configured")),
        }
    }
}

#[async_trait]
impl CloudMemorystoreClient for MockClient {
    async fn get_instance(
        &self,
        req: GetInstanceRequest,
        opts: CallOptions,
    ) -> Result<Instance, Status> {
        self.call(&self.mock_get_instance, &req, &opts)
    }

    async fn create_instance(
        &self,
        req: CreateInstanceRequest,
        opts: CallOptions,
    ) -> Result<Operation, Status> {
        if let Ok(mut last) = self.last_create.lock() {
            *last = Some(req.clone());
        }
        self.call(&self.mock_create_instance, &req, &opts)
    }

    async fn update_instance(
        &self,
        req: UpdateInstanceRequest,
        opts: CallOptions,
    ) -> Result<Operation, Status> {
        if let Ok(mut last) = self.last_update.lock() {
            *last = Some(req.clone());
        }
        self.call(&self.mock_update_instance, &req, &opts)
    }

    async fn delete_instance(
        &self,
        req: DeleteInstanceRequest,
        opts: CallOptions,
    ) -> Result<Operation, Status> {
        self.call(&self.mock_delete_instance, &req, &opts)
    }
}
