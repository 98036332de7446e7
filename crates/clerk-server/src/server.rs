//! The event loop: runtime events, runtime errors, the sync timer and shutdown.

use clerk_core::{
    ContainerEvent, ContainerRuntime, EventStream, LabelSchema, Lifecycle, Registry, RuntimeError,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::registrar::Registrar;
use crate::sync::SyncEngine;
use crate::tracker::{self, TrackerError, TrackerHandle};

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub schema: LabelSchema,
    pub sync_interval: Duration,
    pub max_concurrent_registrations: usize,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            schema: LabelSchema::default(),
            sync_interval: Duration::from_secs(2),
            max_concurrent_registrations: 8,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

pub struct Server {
    registrar: Registrar,
    sync: SyncEngine,
    events: EventStream,
    sync_interval: Duration,
    shutdown: CancellationToken,
    tracker_stop: CancellationToken,
    tracker_task: JoinHandle<()>,
}

impl Server {
    /// Subscribes to runtime events and starts the tracker.
    pub async fn new(
        runtime: Arc<dyn ContainerRuntime>,
        registry: Arc<dyn Registry>,
        options: ServerOptions,
        shutdown: CancellationToken,
    ) -> Result<Self, RuntimeError> {
        let events = runtime.events().await?;

        let tracker_stop = CancellationToken::new();
        let (tracker, tracker_task) = tracker::spawn(tracker_stop.clone());
        let registrar = Registrar::new(runtime, registry, tracker, options.schema);
        let sync = SyncEngine::new(registrar.clone(), options.max_concurrent_registrations);

        Ok(Self {
            registrar,
            sync,
            events,
            sync_interval: options.sync_interval,
            shutdown,
            tracker_stop,
            tracker_task,
        })
    }

    pub fn tracker(&self) -> TrackerHandle {
        self.registrar.tracker().clone()
    }

    /// Runs until the shutdown token is cancelled.
    pub async fn start(self) {
        let Server {
            registrar,
            sync,
            events,
            sync_interval,
            shutdown,
            tracker_stop,
            tracker_task,
        } = self;
        let EventStream {
            events: mut event_rx,
            errors: mut error_rx,
        } = events;
        let mut events_open = true;
        let mut errors_open = true;

        let mut timer = tokio::time::interval_at(Instant::now() + sync_interval, sync_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("clerk running, synchronising every {:?}", sync_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("tearing down service");
                    break;
                }
                event = event_rx.recv(), if events_open => match event {
                    Some(event) => {
                        if let Err(e) = handle_event(&registrar, &event).await {
                            error!(container = %event.actor.id, "error: {}", e);
                        }
                    }
                    None => {
                        warn!("runtime event stream closed");
                        events_open = false;
                    }
                },
                err = error_rx.recv(), if errors_open => match err {
                    Some(e) => error!("runtime error: {}", e),
                    None => errors_open = false,
                },
                _ = timer.tick() => {
                    debug!("timer tick, synchronising");
                    reconcile(&registrar, &sync).await;
                }
            }
        }

        drop(timer);
        tracker_stop.cancel();
        if let Err(e) = tracker_task.await {
            error!("tracker task failed: {}", e);
        }
    }
}

/// Applies one lifecycle event. Registry failures are absorbed; tracker failures are not.
pub async fn handle_event(registrar: &Registrar, event: &ContainerEvent) -> Result<(), ServerError> {
    match event.lifecycle() {
        Lifecycle::Start => {
            let service = registrar.derive(&event.container_id()).await?;
            registrar.register(&service).await?;
        }
        Lifecycle::Die => {
            let service = registrar.derive(&event.container_id()).await?;
            registrar.unregister(&service).await?;
        }
        Lifecycle::Other => {}
    }
    Ok(())
}

async fn reconcile(registrar: &Registrar, sync: &SyncEngine) {
    let containers = match registrar.runtime().list_containers().await {
        Ok(containers) => containers,
        Err(e) => {
            warn!("error listing containers: {}", e);
            return;
        }
    };

    if let Err(e) = sync.synchronise(&containers).await {
        warn!("synchronisation failed: {}", e);
    }
}
