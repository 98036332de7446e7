//! In-memory record of the service IDs this process has registered.
//!
//! The set is owned by a single task and only changes through [`TrackMessage`]s
//! received on its channel. Everyone else holds a [`TrackerHandle`].

use clerk_core::ServiceId;
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::telemetry;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug)]
pub enum TrackMessage {
    Register(ServiceId),
    Unregister(ServiceId),
    ListAll(oneshot::Sender<Vec<ServiceId>>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Tracker is not running")]
    Closed,

    #[error("Tracker dropped the reply")]
    ReplyDropped,
}

#[derive(Debug, Clone)]
pub struct TrackerHandle {
    tx: mpsc::Sender<TrackMessage>,
}

impl TrackerHandle {
    async fn send(&self, message: TrackMessage) -> Result<(), TrackerError> {
        self.tx.send(message).await.map_err(|_| TrackerError::Closed)
    }

    pub async fn register(&self, id: ServiceId) -> Result<(), TrackerError> {
        self.send(TrackMessage::Register(id)).await
    }

    pub async fn unregister(&self, id: ServiceId) -> Result<(), TrackerError> {
        self.send(TrackMessage::Unregister(id)).await
    }

    /// Snapshot of the tracked IDs, in no particular order.
    pub async fn list_all(&self) -> Result<Vec<ServiceId>, TrackerError> {
        let (reply, rx) = oneshot::channel();
        self.send(TrackMessage::ListAll(reply)).await?;
        rx.await.map_err(|_| TrackerError::ReplyDropped)
    }
}

struct Tracker {
    rx: mpsc::Receiver<TrackMessage>,
    stop: CancellationToken,
    store: HashSet<ServiceId>,
}

impl Tracker {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                _ = self.stop.cancelled() => {
                    info!("tracker stopping with {} tracked services", self.store.len());
                    return;
                }
                message = self.rx.recv() => match message {
                    Some(message) => self.apply(message),
                    None => {
                        debug!("tracker channel closed");
                        return;
                    }
                },
            }
        }
    }

    fn apply(&mut self, message: TrackMessage) {
        match message {
            TrackMessage::Register(id) => {
                debug!(service = %id, "tracking");
                self.store.insert(id);
            }
            TrackMessage::Unregister(id) => {
                debug!(service = %id, "untracking");
                self.store.remove(&id);
            }
            TrackMessage::ListAll(reply) => {
                let _ = reply.send(self.store.iter().cloned().collect());
                return;
            }
        }
        telemetry::tracked_services(self.store.len());
    }
}

/// Starts the tracker task. It runs until `stop` is cancelled or every handle is dropped.
pub fn spawn(stop: CancellationToken) -> (TrackerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let tracker = Tracker {
        rx,
        stop,
        store: HashSet::new(),
    };
    (TrackerHandle { tx }, tokio::spawn(tracker.run()))
}
