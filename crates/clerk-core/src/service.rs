//! Service derivation: container metadata in, logical service out.

use std::collections::{BTreeMap, HashMap};
use tracing::warn;

use crate::errors::DeriveError;
use crate::ids::{ContainerId, ServiceId};
use crate::instance::Instance;
use crate::labels::{LabelSchema, is_true, normalize_key};
use crate::protocol::split_proto_port;
use crate::runtime::ContainerDetails;

/// Prefixed labels of one container, keys normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    schema: LabelSchema,
    entries: BTreeMap<String, String>,
}

impl ServiceConfig {
    pub fn from_labels(labels: &HashMap<String, String>, schema: &LabelSchema) -> Self {
        let entries = labels
            .iter()
            .map(|(key, value)| (normalize_key(key), value.clone()))
            .filter(|(key, _)| schema.owns(key))
            .collect();

        Self {
            schema: schema.clone(),
            entries,
        }
    }

    /// Looks up `suffix` (or an already prefixed key).
    pub fn get(&self, suffix: &str) -> Option<&str> {
        self.entries.get(&self.schema.key(suffix)).map(String::as_str)
    }

    pub fn contains(&self, suffix: &str) -> bool {
        self.get(suffix).is_some()
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

/// A logical service derived from a single container.
///
/// The service ID is `name:proto:port:hostname` of the first valid port. It does not
/// depend on any address, so a stopped container whose endpoints are already released
/// still resolves to the ID it was registered under. Eligibility needs at least one
/// addressed instance on top of that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    id: Option<ServiceId>,
    container_id: ContainerId,
    name: String,
    tags: Vec<String>,
    attributes: BTreeMap<String, String>,
    config: ServiceConfig,
    instances: Vec<Instance>,
    skipped: Vec<DeriveError>,
}

impl Service {
    pub fn derive(container: &ContainerDetails, schema: &LabelSchema) -> Self {
        let config = ServiceConfig::from_labels(&container.labels, schema);
        let name = resolve_name(&config, &container.name);
        let tags = resolve_tags(&config);
        let attributes = resolve_attributes(&config);

        let mut service = Self {
            id: None,
            container_id: container.id.clone(),
            name,
            tags,
            attributes,
            config,
            instances: Vec::new(),
            skipped: Vec::new(),
        };

        for raw in service.port_specs(container) {
            service.add_instances(&raw, container);
        }

        service
    }

    /// Explicit `ports` label when non-empty, else what the container exposes.
    fn port_specs(&self, container: &ContainerDetails) -> Vec<String> {
        match self.config.get(LabelSchema::PORTS) {
            Some(ports) if !ports.trim().is_empty() => ports
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect(),
            _ => container.exposed_ports.clone(),
        }
    }

    fn add_instances(&mut self, raw: &str, container: &ContainerDetails) {
        let (port_text, protocol) = split_proto_port(raw);
        let port: u16 = match port_text.parse() {
            Ok(port) => port,
            Err(_) => {
                let err = DeriveError::InvalidPort {
                    raw: raw.to_string(),
                };
                warn!(container = %container.id, "skipping port: {}", err);
                self.skipped.push(err);
                return;
            }
        };

        let base_id = format!("{}:{}:{}:{}", self.name, protocol, port, container.hostname);
        if self.id.is_none() {
            self.id = Some(ServiceId::new(base_id.clone()));
        }

        let mut first_network = true;
        for (network, endpoint) in &container.networks {
            let Some(endpoint) = endpoint else {
                let err = DeriveError::MissingNetworkSettings {
                    network: network.clone(),
                };
                warn!(container = %container.id, "skipping network: {}", err);
                self.skipped.push(err);
                continue;
            };

            if endpoint.ip_address.is_empty() {
                continue;
            }

            // Extra networks get the address appended so every endpoint keeps its own ID.
            let id = if first_network {
                ServiceId::new(base_id.clone())
            } else {
                ServiceId::new(format!("{}:{}", base_id, endpoint.ip_address))
            };
            first_network = false;

            self.insert(Instance::new(id, &endpoint.ip_address, port, protocol.clone()));
        }
    }

    fn insert(&mut self, instance: Instance) {
        match self.instances.iter_mut().find(|i| i.id == instance.id) {
            Some(existing) => *existing = instance,
            None => self.instances.push(instance),
        }
    }

    pub fn id(&self) -> Option<&ServiceId> {
        self.id.as_ref()
    }

    pub fn container_id(&self) -> &ContainerId {
        &self.container_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Instances in discovery order; IDs are unique.
    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn instance(&self, id: &ServiceId) -> Option<&Instance> {
        self.instances.iter().find(|i| &i.id == id)
    }

    /// The instance whose ID is the service ID, else the first one discovered.
    pub fn primary(&self) -> Option<&Instance> {
        self.id
            .as_ref()
            .and_then(|id| self.instance(id))
            .or_else(|| self.instances.first())
    }

    pub fn ip_address(&self) -> Option<&str> {
        self.primary().map(|i| i.ip.as_str())
    }

    pub fn port(&self) -> Option<u16> {
        self.primary().map(|i| i.port)
    }

    /// Entries dropped during derivation.
    pub fn skipped(&self) -> &[DeriveError] {
        &self.skipped
    }

    /// Eligible when labelled `register=true` and reachable on at least one endpoint.
    pub fn should_register(&self) -> bool {
        if self.instances.is_empty() {
            return false;
        }

        self.config
            .get(LabelSchema::REGISTER)
            .is_some_and(is_true)
    }
}

fn resolve_name(config: &ServiceConfig, container_name: &str) -> String {
    let name = config.get(LabelSchema::NAME).unwrap_or(container_name);
    name.trim_start_matches('/').to_string()
}

fn resolve_tags(config: &ServiceConfig) -> Vec<String> {
    config
        .get(LabelSchema::TAGS)
        .map(|tags| {
            tags.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// `"a:1,b:2"` and `"a:1:b:2"` both give `{a: 1, b: 2}`; a dangling key is dropped.
fn resolve_attributes(config: &ServiceConfig) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    let Some(raw) = config.get(LabelSchema::ATTRIBUTES) else {
        return attributes;
    };

    for group in raw.split(',') {
        let tokens: Vec<&str> = group.split(':').map(str::trim).collect();
        for pair in tokens.chunks_exact(2) {
            if pair[0].is_empty() {
                continue;
            }
            attributes.insert(pair[0].to_string(), pair[1].to_string());
        }
    }

    attributes
}
