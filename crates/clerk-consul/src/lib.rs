//! Consul agent adapter for clerk.

pub mod check;
pub mod consul;
pub mod metadata;

pub use check::{AgentServiceCheck, service_check};
pub use consul::{AgentServiceRegistration, ConsulConfig, ConsulRegistry, registrations};
