//! Directory-backed driver: every `*.json` file in the objects directory is
//! one instance. Each tick reconciles all of them concurrently and writes
//! the resulting object back when it changed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use memstore_controller::resource::{CloudMemorystoreInstance, ConnectionDetails};
use memstore_controller::{Connector, Context, ReconcileOutcome, Reconciler};
use serde_json::{Map, Value};
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Subdirectory of the objects directory that receives connection details.
pub const SECRETS_DIR: &str = "secrets";

/// Counts from one pass over the objects directory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickSummary {
    pub reconciled: usize,
    pub failed: usize,
    pub finalized: usize,
}

pub struct Agent<K> {
    reconciler: Arc<Reconciler<K>>,
    objects_dir: PathBuf,
    interval: Duration,
    timeout: Duration,
}

impl<K: Connector + 'static> Agent<K> {
    pub fn new(
        reconciler: Reconciler<K>,
        objects_dir: impl Into<PathBuf>,
        interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            reconciler: Arc::new(reconciler),
            objects_dir: objects_dir.into(),
            interval,
            timeout,
        }
    }

    /// Tick until `token` is cancelled.
    pub async fn run(&self, token: CancellationToken) -> Result<()> {
        if self.interval.is_zero() {
            anyhow::bail!("reconcile interval must be greater than zero");
        }
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick(&token).await {
                        Ok(summary) => debug!(
                            reconciled = summary.reconciled,
                            failed = summary.failed,
                            finalized = summary.finalized,
                            "Tick complete"
                        ),
                        Err(e) => error!("Tick failed: {:#}", e),
                    }
                }
                _ = token.cancelled() => {
                    info!("Agent stopping");
                    return Ok(());
                }
            }
        }
    }

    /// Reconcile every object once, one task per object.
    pub async fn tick(&self, token: &CancellationToken) -> Result<TickSummary> {
        let paths = list_objects(&self.objects_dir).await?;
        let mut tasks = JoinSet::new();

        for path in paths {
            let reconciler = Arc::clone(&self.reconciler);
            let ctx = Context::with_token(token.child_token()).with_timeout(self.timeout);
            tasks.spawn(async move {
                let res = reconcile_file(&reconciler, &ctx, &path).await;
                (path, res)
            });
        }

        let mut summary = TickSummary::default();
        while let Some(joined) = tasks.join_next().await {
            let (path, res) = joined.context("reconcile task panicked")?;
            match res {
                Ok(true) => {
                    summary.reconciled += 1;
                    summary.finalized += 1;
                }
                Ok(false) => summary.reconciled += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(path = %path.display(), "Reconcile failed: {:#}", e);
                }
            }
        }
        Ok(summary)
    }
}

async fn list_objects(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("cannot read objects directory {}", dir.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "json") && entry.file_type().await?.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// Reconcile one object file. Returns true when the object was finalized and
/// its file removed.
async fn reconcile_file<K: Connector>(
    reconciler: &Reconciler<K>,
    ctx: &Context,
    path: &Path,
) -> Result<bool> {
    let raw = tokio::fs::read(path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))?;
    let mut cr: CloudMemorystoreInstance = serde_json::from_slice(&raw)
        .with_context(|| format!("cannot parse {}", path.display()))?;

    let res = reconciler.reconcile(ctx, &mut cr).await;

    // Conditions set before a failed call are persisted as well.
    let updated = serde_json::to_vec_pretty(&cr)?;
    if updated != raw {
        write_atomic(path, &updated).await?;
    }

    let outcome = res?;
    info!(
        name = %cr.metadata.name,
        action = %outcome.action,
        state = %outcome.state,
        "Reconciled"
    );

    publish_connection_details(path, &cr, &outcome).await?;

    if outcome.finalized(&cr) {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("cannot remove {}", path.display()))?;
        info!(name = %cr.metadata.name, "Finalized");
        return Ok(true);
    }
    Ok(false)
}

async fn publish_connection_details(
    path: &Path,
    cr: &CloudMemorystoreInstance,
    outcome: &ReconcileOutcome,
) -> Result<()> {
    let Some(secret) = &cr.spec.write_connection_secret_to_ref else {
        return Ok(());
    };
    if outcome.connection_details.is_empty() {
        return Ok(());
    }

    let dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(SECRETS_DIR);
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("cannot create {}", dir.display()))?;

    let target = dir.join(format!("{}.{}.json", secret.namespace, secret.name));
    let body = serde_json::to_vec_pretty(&secret_body(&outcome.connection_details))?;
    if tokio::fs::read(&target).await.ok().as_deref() == Some(body.as_slice()) {
        return Ok(());
    }
    write_atomic(&target, &body).await?;
    debug!(secret = %target.display(), "Wrote connection details");
    Ok(())
}

fn secret_body(details: &ConnectionDetails) -> Map<String, Value> {
    details
        .iter()
        .map(|(k, v)| {
            let value = match std::str::from_utf8(v) {
                Ok(s) => Value::String(s.to_string()),
                Err(_) => {
                    warn!(key = %k, "Connection detail is not UTF-8, storing lossily");
                    Value::String(String::from_utf8_lossy(v).into_owned())
                }
            };
            (k.clone(), value)
        })
        .collect()
}

async fn write_atomic(path: &Path, body: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .with_context(|| format!("cannot write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("cannot replace {}", path.display()))?;
    Ok(())
}
