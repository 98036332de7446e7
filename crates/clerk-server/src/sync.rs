//! Reconciliation between live containers, the tracker and the registry.
//!
//! Events can be missed, so every pass re-derives services for the running
//! containers and registers the ones that are either unknown to the tracker or
//! tracked but missing from the registry. Registrations run concurrently, bounded
//! by a semaphore, and the pass waits for all of them.

use clerk_core::{ContainerId, RegistryError, Service, ServiceId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::registrar::{Outcome, Registrar};
use crate::telemetry;
use crate::tracker::TrackerError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Tracker unavailable: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Error getting services from registry: {0}")]
    Registry(#[from] RegistryError),
}

/// What one pass decided to do.
#[derive(Debug, Default)]
pub struct SyncPlan {
    /// Eligible services none of whose instances are tracked.
    pub unknown: Vec<Service>,
    /// Tracked services the registry no longer lists, one per container.
    pub drifted: Vec<Service>,
    /// Tracked service ID claimed by each known container.
    pub mapped: HashMap<ServiceId, ContainerId>,
}

impl SyncPlan {
    /// Splits derived services into unknown and drifted ones.
    ///
    /// A known container is mapped through the first of its tracked instances that
    /// no other container claimed yet, and scanning stops there. Its other instances
    /// are never checked against the registry on their own.
    pub fn build(
        services: Vec<Service>,
        tracked: &HashSet<ServiceId>,
        registered: &HashSet<ServiceId>,
    ) -> Self {
        let mut plan = SyncPlan::default();
        let mut known = Vec::new();

        for service in services {
            if !service.should_register() {
                continue;
            }

            let is_tracked = service.instances().iter().any(|i| tracked.contains(&i.id));
            if !is_tracked {
                plan.unknown.push(service);
                continue;
            }

            let claim = service
                .instances()
                .iter()
                .map(|i| &i.id)
                .find(|id| tracked.contains(*id) && !plan.mapped.contains_key(*id))
                .cloned();

            if let Some(id) = claim {
                plan.mapped.insert(id.clone(), service.container_id().clone());
                known.push((id, service));
            }
        }

        let mut repaired = HashSet::new();
        for (id, service) in known {
            if registered.contains(&id) {
                continue;
            }
            if repaired.insert(service.container_id().clone()) {
                debug!(service = %id, "tracked but missing from registry");
                plan.drifted.push(service);
            }
        }

        plan
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub live: usize,
    pub unknown: usize,
    pub drifted: usize,
    pub registered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct SyncEngine {
    registrar: Registrar,
    permits: Arc<Semaphore>,
}

impl SyncEngine {
    pub fn new(registrar: Registrar, max_concurrent: usize) -> Self {
        Self {
            registrar,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    pub async fn synchronise(&self, containers: &[ContainerId]) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport {
            live: containers.len(),
            ..SyncReport::default()
        };
        if containers.is_empty() {
            return Ok(report);
        }
        telemetry::increment(telemetry::SYNC_PASSES);

        let tracked: HashSet<ServiceId> = self
            .registrar
            .tracker()
            .list_all()
            .await?
            .into_iter()
            .collect();

        let registered: HashSet<ServiceId> = match self.registrar.registry().services().await {
            Ok(services) => services.into_iter().map(|s| s.id).collect(),
            Err(e) => {
                telemetry::increment(telemetry::SYNC_FAILURES);
                return Err(e.into());
            }
        };

        let mut services = Vec::with_capacity(containers.len());
        for id in containers {
            match self.registrar.derive(id).await {
                Ok(service) => services.push(service),
                Err(e) => warn!(container = %id, "skipping container: {}", e),
            }
        }

        let plan = SyncPlan::build(services, &tracked, &registered);
        report.unknown = plan.unknown.len();
        report.drifted = plan.drifted.len();

        let mut tasks = JoinSet::new();
        for service in plan.unknown.into_iter().chain(plan.drifted) {
            let Ok(permit) = self.permits.clone().acquire_owned().await else {
                break;
            };
            let registrar = self.registrar.clone();
            tasks.spawn(async move {
                let _permit = permit;
                registrar.register(&service).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(Outcome::Registered)) => report.registered += 1,
                Ok(Ok(Outcome::Ineligible)) => {}
                Ok(Ok(Outcome::RegistryFailed)) => report.failed += 1,
                Ok(Err(e)) => {
                    error!("error: {}", e);
                    report.failed += 1;
                }
                Err(e) => {
                    error!("registration task failed: {}", e);
                    report.failed += 1;
                }
            }
        }

        if report.unknown + report.drifted > 0 {
            info!(
                live = report.live,
                unknown = report.unknown,
                drifted = report.drifted,
                registered = report.registered,
                failed = report.failed,
                "synchronisation pass complete"
            );
        }

        Ok(report)
    }
}
