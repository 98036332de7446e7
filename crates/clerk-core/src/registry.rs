use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::ids::ServiceId;
use crate::service::Service;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Service has no instances")]
    NoInstances,

    #[error("Registry unreachable: {0}")]
    Transport(String),

    #[error("Registry rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Malformed registry response: {0}")]
    Decode(String),
}

/// A service as the registry reports it back.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisteredService {
    /// Registry specific service kind; empty for a plain service.
    pub kind: String,
    pub id: ServiceId,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub tags: Vec<String>,
    /// Metadata with key escaping reversed.
    pub config: BTreeMap<String, String>,
}

/// A service registry clerk keeps in sync.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Short backend name, for logs.
    fn id(&self) -> &'static str;

    /// Checks the registry is reachable; returns a human readable status.
    async fn ping(&self) -> Result<String, RegistryError>;

    /// Registers every instance of `service`. Stops at the first failure.
    async fn register(&self, service: &Service) -> Result<(), RegistryError>;

    /// Deregisters `service` by its own ID.
    async fn unregister(&self, service: &Service) -> Result<(), RegistryError>;

    async fn services(&self) -> Result<Vec<RegisteredService>, RegistryError>;
}
