//! The register/unregister path shared by lifecycle events and reconciliation.

use clerk_core::{
    ContainerId, ContainerRuntime, LabelSchema, Registry, RuntimeError, Service,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::telemetry;
use crate::tracker::{TrackerError, TrackerHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Registry accepted the service and it is tracked.
    Registered,
    /// Registry call failed; the service is tracked anyway and the next pass repairs it.
    RegistryFailed,
    /// Not labelled for registration or no reachable instance.
    Ineligible,
}

#[derive(Clone)]
pub struct Registrar {
    runtime: Arc<dyn ContainerRuntime>,
    registry: Arc<dyn Registry>,
    tracker: TrackerHandle,
    schema: LabelSchema,
}

impl Registrar {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        registry: Arc<dyn Registry>,
        tracker: TrackerHandle,
        schema: LabelSchema,
    ) -> Self {
        Self {
            runtime,
            registry,
            tracker,
            schema,
        }
    }

    pub fn runtime(&self) -> &Arc<dyn ContainerRuntime> {
        &self.runtime
    }

    pub fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub fn tracker(&self) -> &TrackerHandle {
        &self.tracker
    }

    /// Inspects a container and derives its service.
    pub async fn derive(&self, id: &ContainerId) -> Result<Service, RuntimeError> {
        let details = self.runtime.inspect(id).await?;
        Ok(Service::derive(&details, &self.schema))
    }

    pub async fn register(&self, service: &Service) -> Result<Outcome, TrackerError> {
        let Some(id) = service.id().filter(|_| service.should_register()) else {
            debug!(container = %service.container_id(), "not eligible for registration");
            return Ok(Outcome::Ineligible);
        };

        let outcome = match self.registry.register(service).await {
            Ok(()) => {
                info!(service = %id, instances = service.instances().len(), "registered with {}", self.registry.id());
                telemetry::increment(telemetry::REGISTRATIONS);
                Outcome::Registered
            }
            Err(e) => {
                warn!(service = %id, "error registering service: {}", e);
                telemetry::increment(telemetry::REGISTRATION_FAILURES);
                Outcome::RegistryFailed
            }
        };

        self.tracker.register(id.clone()).await?;
        Ok(outcome)
    }

    pub async fn unregister(&self, service: &Service) -> Result<(), TrackerError> {
        let Some(id) = service.id() else {
            debug!(container = %service.container_id(), "no service to unregister");
            return Ok(());
        };

        match self.registry.unregister(service).await {
            Ok(()) => {
                info!(service = %id, "unregistered from {}", self.registry.id());
                telemetry::increment(telemetry::DEREGISTRATIONS);
            }
            Err(e) => warn!(service = %id, "error unregistering service: {}", e),
        }

        self.tracker.unregister(id.clone()).await
    }
}
