//! Docker adapter for clerk, driving the engine through its CLI.

pub mod client;
pub mod error;
mod events;
mod inspect;

pub use client::{DockerCli, DockerConfig};
pub use error::DockerError;
