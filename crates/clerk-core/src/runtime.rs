//! Container runtime model and the seam clerk consumes it through.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::ids::ContainerId;

/// What an inspection of one container tells us.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: ContainerId,
    /// Runtime name, usually with a leading `/`.
    pub name: String,
    pub hostname: String,
    pub labels: HashMap<String, String>,
    /// Exposed ports in `port/proto` form, in a stable order.
    pub exposed_ports: Vec<String>,
    /// Attached networks by name. `None` means the runtime reported no endpoint settings.
    pub networks: BTreeMap<String, Option<NetworkEndpoint>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkEndpoint {
    pub ip_address: String,
}

impl NetworkEndpoint {
    pub fn new(ip_address: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventActor {
    pub id: String,
    pub attributes: HashMap<String, String>,
}

/// A lifecycle event as delivered by the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerEvent {
    pub id: String,
    pub status: String,
    pub kind: String,
    pub actor: EventActor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    Die,
    Other,
}

impl ContainerEvent {
    /// Only container-scoped `start` and `die` events matter; everything else is `Other`.
    pub fn lifecycle(&self) -> Lifecycle {
        if self.kind != "container" {
            return Lifecycle::Other;
        }

        match self.status.as_str() {
            "start" => Lifecycle::Start,
            "die" => Lifecycle::Die,
            _ => Lifecycle::Other,
        }
    }

    pub fn container_id(&self) -> ContainerId {
        ContainerId::new(self.actor.id.clone())
    }
}

/// Receiving halves of an event subscription.
///
/// `events` carries lifecycle events, `errors` carries failures of the subscription
/// itself. Both close when the subscription ends.
#[derive(Debug)]
pub struct EventStream {
    pub events: mpsc::Receiver<ContainerEvent>,
    pub errors: mpsc::Receiver<RuntimeError>,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Container not found: {0}")]
    ContainerNotFound(ContainerId),

    #[error("Runtime transport error: {0}")]
    Transport(String),

    #[error("Runtime timed out: {0}")]
    Timeout(String),

    #[error("Malformed runtime response: {0}")]
    Decode(String),

    #[error("Event stream failed: {0}")]
    EventStream(String),
}

/// Everything clerk needs from a container runtime.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Subscribes to container-scoped lifecycle events.
    async fn events(&self) -> Result<EventStream, RuntimeError>;

    /// IDs of the containers currently running.
    async fn list_containers(&self) -> Result<Vec<ContainerId>, RuntimeError>;

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerDetails, RuntimeError>;
}
