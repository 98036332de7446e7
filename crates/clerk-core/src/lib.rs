pub mod ids;
pub mod labels;
pub mod protocol;
pub mod instance;
pub mod service;
pub mod runtime;
pub mod registry;
pub mod errors;

pub use ids::{ContainerId, ServiceId};
pub use labels::LabelSchema;
pub use protocol::Protocol;
pub use instance::Instance;
pub use service::{Service, ServiceConfig};
pub use runtime::{
    ContainerDetails, ContainerEvent, ContainerRuntime, EventActor, EventStream, Lifecycle,
    NetworkEndpoint, RuntimeError,
};
pub use registry::{RegisteredService, Registry, RegistryError};
pub use errors::DeriveError;
