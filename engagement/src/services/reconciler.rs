use crate::cache::{DirtyEntry, InteractionCache};
use crate::config::ReconcileCfg;
use crate::errors::EngagementError;
use crate::ledger::Ledger;
use crate::models::interaction::InteractionKind;
use crate::models::ledger_row::LedgerRow;
use crate::resources::resource_locker::DomainLock;
use chrono::Utc;
use futures::StreamExt;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::{self, Instant};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    /// Dirty keys taken by the snapshot.
    pub observed: usize,
    /// Persisted and cleared.
    pub persisted: usize,
    /// Persisted, but toggled again meanwhile, so left dirty for the next run.
    pub deferred: usize,
    /// Persistence failed, left dirty for the next run.
    pub failed: usize,
    /// The run hit its timeout; keys not reached are still dirty.
    pub timed_out: bool,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RunOutcome {
    /// Another instance holds the domain lock.
    Skipped,
    Completed(ReconcileReport),
}

enum KeyOutcome {
    Persisted,
    Deferred,
}

/// Drains the dirty set of a domain into the ledger.
///
/// A marker is cleared only when its generation is unchanged since the snapshot, so a
/// toggle that races the drain either made it into the persisted state or keeps the key
/// dirty for the next run.
pub struct Reconciler {
    cache: Arc<dyn InteractionCache>,
    ledger: Arc<dyn Ledger>,
    locker: Arc<dyn DomainLock>,
    cfg: ReconcileCfg,
}

impl Reconciler {
    pub fn new(
        cache: Arc<dyn InteractionCache>,
        ledger: Arc<dyn Ledger>,
        locker: Arc<dyn DomainLock>,
        cfg: ReconcileCfg,
    ) -> Self {
        Self {
            cache,
            ledger,
            locker,
            cfg,
        }
    }

    fn lock_resource(kind: InteractionKind) -> String {
        format!("reconcile:{}", kind)
    }

    /// Scheduler entry point: `like_reconcile`, `favorite_reconcile`, `follow_reconcile`.
    pub async fn handle(&self, handler: &str) -> Result<RunOutcome, EngagementError> {
        let kind = InteractionKind::from_handler_name(handler)
            .ok_or_else(|| EngagementError::NotFound(format!("No job handler named {}", handler)))?;

        self.run(kind).await
    }

    pub async fn run(&self, kind: InteractionKind) -> Result<RunOutcome, EngagementError> {
        let resource = Self::lock_resource(kind);

        let Some(token) = self
            .locker
            .acquire(&resource, self.cfg.lock_ttl(), self.cfg.lock_wait())
            .await?
        else {
            info!("[reconcile::{}] lock held by another instance, skipping run", kind);
            return Ok(RunOutcome::Skipped);
        };

        let res = self.drain(kind).await;

        match self.locker.release(&resource, &token).await {
            Ok(true) => {}
            Ok(false) => warn!("[reconcile::{}] lock expired before release", kind),
            Err(e) => warn!("[reconcile::{}] failed to release lock: {}", kind, e),
        }

        let report = res?;

        info!(
            "[reconcile::{}] observed: {}, persisted: {}, deferred: {}, failed: {}, timed out: {}",
            kind, report.observed, report.persisted, report.deferred, report.failed, report.timed_out
        );

        Ok(RunOutcome::Completed(report))
    }

    /// Snapshot and per-key work share one deadline, so the lock is never held longer than
    /// `run_timeout` plus the release round trip.
    async fn drain(&self, kind: InteractionKind) -> Result<ReconcileReport, EngagementError> {
        let deadline = Instant::now() + self.cfg.run_timeout();

        let snapshot = self.cache.dirty_snapshot(kind, self.cfg.batch_size);

        let snapshot = match time::timeout_at(deadline, snapshot).await {
            Ok(snapshot) => snapshot?,
            Err(_) => {
                return Err(EngagementError::Timeout(format!(
                    "dirty_snapshot exceeded {:?}",
                    self.cfg.run_timeout()
                )))
            }
        };

        let mut report = ReconcileReport {
            observed: snapshot.len(),
            ..Default::default()
        };

        let work = futures::stream::iter(snapshot)
            .map(|entry| async move {
                let res = self.reconcile_key(&entry).await;
                (entry, res)
            })
            .buffer_unordered(self.cfg.parallelism.max(1))
            .for_each(|(entry, res)| {
                match res {
                    Ok(KeyOutcome::Persisted) => report.persisted += 1,
                    Ok(KeyOutcome::Deferred) => {
                        debug!(
                            "[reconcile::{}] {}:{} toggled during drain, left dirty",
                            kind, entry.key.target_kind, entry.key.target_id
                        );
                        report.deferred += 1;
                    }
                    Err(e) => {
                        error!(
                            "[reconcile::{}] {}:{} failed, left dirty: {}",
                            kind, entry.key.target_kind, entry.key.target_id, e
                        );
                        report.failed += 1;
                    }
                }

                futures::future::ready(())
            });

        let timed_out = time::timeout_at(deadline, work).await.is_err();
        report.timed_out = timed_out;

        Ok(report)
    }

    async fn reconcile_key(&self, entry: &DirtyEntry) -> Result<KeyOutcome, EngagementError> {
        let members = self.cache.members(&entry.key).await?;
        let departed = self.cache.departed(&entry.key).await?;
        let previous = self.ledger.rows(&entry.key).await?;
        let changes = LedgerRow::reconcile(&entry.key, &members, &departed, previous, Utc::now());

        self.ledger.save(changes).await?;

        if self.cache.clear_dirty(entry).await? {
            Ok(KeyOutcome::Persisted)
        } else {
            Ok(KeyOutcome::Deferred)
        }
    }
}
