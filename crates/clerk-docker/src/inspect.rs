//! `docker inspect` output, reduced to what service derivation reads.

use clerk_core::{ContainerDetails, ContainerId, NetworkEndpoint};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct InspectedContainer {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    config: Option<InspectedConfig>,
    #[serde(default)]
    network_settings: Option<InspectedNetworkSettings>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedConfig {
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    labels: Option<HashMap<String, String>>,
    #[serde(default)]
    exposed_ports: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedNetworkSettings {
    #[serde(default)]
    networks: Option<BTreeMap<String, Option<InspectedEndpoint>>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectedEndpoint {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

impl From<InspectedContainer> for ContainerDetails {
    fn from(inspected: InspectedContainer) -> Self {
        let config = inspected.config.unwrap_or_default();
        let networks = inspected
            .network_settings
            .and_then(|settings| settings.networks)
            .unwrap_or_default()
            .into_iter()
            .map(|(name, endpoint)| (name, endpoint.map(|e| NetworkEndpoint::new(e.ip_address))))
            .collect();

        ContainerDetails {
            id: ContainerId::new(inspected.id),
            name: inspected.name,
            hostname: config.hostname,
            labels: config.labels.unwrap_or_default(),
            exposed_ports: config
                .exposed_ports
                .map(|ports| ports.into_keys().collect())
                .unwrap_or_default(),
            networks,
        }
    }
}

/// Parses the JSON array `docker inspect` prints and returns its first entry.
pub(crate) fn parse_inspect(raw: &str) -> Result<Option<ContainerDetails>, serde_json::Error> {
    let mut containers: Vec<InspectedContainer> = serde_json::from_str(raw)?;
    if containers.is_empty() {
        return Ok(None);
    }
    Ok(Some(containers.swap_remove(0).into()))
}
