use async_trait::async_trait;
use clerk_core::{RegisteredService, Registry, RegistryError, Service, ServiceId};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::check::{AgentServiceCheck, service_check};
use crate::metadata::{sanitize, unsanitize};

pub const CONSUL_ID: &str = "consul";
pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8500";
/// Kind of a plain service. Consul leaves `Kind` out for it.
pub const SERVICE_KIND_TYPICAL: &str = "";

#[derive(Debug, Clone)]
pub struct ConsulConfig {
    /// Agent address, with or without scheme.
    pub address: String,
    /// ACL token sent as `X-Consul-Token`.
    pub token: Option<String>,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            token: None,
        }
    }
}

/// Body of `PUT /v1/agent/service/register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AgentServiceRegistration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub tags: Vec<String>,
    pub address: String,
    pub port: u16,
    pub meta: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<AgentServiceCheck>,
}

/// One entry of `GET /v1/agent/services`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AgentService {
    #[serde(default)]
    kind: String,
    #[serde(rename = "ID")]
    id: String,
    service: String,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    meta: Option<HashMap<String, String>>,
    #[serde(default)]
    port: u16,
    #[serde(default)]
    address: String,
}

/// One registration per instance; name, tags and metadata are shared.
pub fn registrations(service: &Service) -> Vec<AgentServiceRegistration> {
    let meta = sanitize(service.config().entries());
    service
        .instances()
        .iter()
        .map(|instance| AgentServiceRegistration {
            kind: SERVICE_KIND_TYPICAL.to_string(),
            id: instance.id.to_string(),
            name: service.name().to_string(),
            tags: service.tags().to_vec(),
            address: instance.ip.clone(),
            port: instance.port,
            meta: meta.clone(),
            check: service_check(service.config(), instance),
        })
        .collect()
}

/// Registry backed by a local Consul agent.
#[derive(Debug, Clone)]
pub struct ConsulRegistry {
    client: Client,
    base: Url,
    token: Option<String>,
}

impl ConsulRegistry {
    pub fn new(config: ConsulConfig) -> Result<Self, RegistryError> {
        let address = config.address.trim().trim_end_matches('/');
        let address = if address.starts_with("http://") || address.starts_with("https://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };

        let base = Url::parse(&address)
            .map_err(|e| RegistryError::Transport(format!("invalid consul address {}: {}", address, e)))?;
        if base.cannot_be_a_base() {
            return Err(RegistryError::Transport(format!(
                "invalid consul address {}",
                address
            )));
        }

        let client = Client::builder()
            .build()
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base,
            token: config.token,
        })
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("v1").extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let builder = self.client.request(method, self.url(segments));
        match self.token {
            Some(ref token) => builder.header("X-Consul-Token", token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, RegistryError> {
        let res = builder
            .send()
            .await
            .map_err(|e| RegistryError::Transport(e.to_string()))?;

        if res.status().is_success() {
            Ok(res)
        } else {
            let status = res.status().as_u16();
            let message = res.text().await.unwrap_or_default();
            Err(RegistryError::Rejected {
                status,
                message: message.trim().to_string(),
            })
        }
    }

    pub async fn deregister_id(&self, id: &ServiceId) -> Result<(), RegistryError> {
        self.send(self.request(Method::PUT, &["agent", "service", "deregister", id.as_str()]))
            .await?;
        debug!(service = %id, "consul: deregistered");
        Ok(())
    }
}

#[async_trait]
impl Registry for ConsulRegistry {
    fn id(&self) -> &'static str {
        CONSUL_ID
    }

    async fn ping(&self) -> Result<String, RegistryError> {
        let res = self.send(self.request(Method::GET, &["status", "leader"])).await?;
        let leader: String = res
            .json()
            .await
            .map_err(|e| RegistryError::Decode(e.to_string()))?;
        info!("consul: current leader {}", leader);
        Ok(leader)
    }

    async fn register(&self, service: &Service) -> Result<(), RegistryError> {
        if service.instances().is_empty() {
            return Err(RegistryError::NoInstances);
        }

        for registration in registrations(service) {
            self.send(
                self.request(Method::PUT, &["agent", "service", "register"])
                    .json(&registration),
            )
            .await?;
            debug!(service = %registration.id, address = %registration.address, port = registration.port, "consul: registered");
        }

        Ok(())
    }

    async fn unregister(&self, service: &Service) -> Result<(), RegistryError> {
        let id = service.id().ok_or(RegistryError::NoInstances)?;
        self.deregister_id(id).await
    }

    async fn services(&self) -> Result<Vec<RegisteredService>, RegistryError> {
        let res = self.send(self.request(Method::GET, &["agent", "services"])).await?;
        let services: HashMap<String, AgentService> = res
            .json()
            .await
            .map_err(|e| RegistryError::Decode(e.to_string()))?;

        Ok(services
            .into_values()
            .map(|value| RegisteredService {
                kind: value.kind,
                id: ServiceId::new(value.id),
                name: value.service,
                address: value.address,
                port: value.port,
                tags: value.tags.unwrap_or_default(),
                config: value
                    .meta
                    .as_ref()
                    .map(unsanitize)
                    .unwrap_or_default(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clerk_core::{ContainerDetails, ContainerId, LabelSchema, NetworkEndpoint};
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(labels: &[(&str, &str)], networks: &[(&str, &str)]) -> Service {
        let schema = LabelSchema::default();
        let container = ContainerDetails {
            id: ContainerId::new("c1"),
            name: "/web1".to_string(),
            hostname: "h1".to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (schema.key(k), v.to_string()))
                .collect(),
            exposed_ports: vec!["80/tcp".to_string()],
            networks: networks
                .iter()
                .map(|(n, ip)| (n.to_string(), Some(NetworkEndpoint::new(*ip))))
                .collect(),
        };
        Service::derive(&container, &schema)
    }

    fn registry(server: &MockServer, token: Option<&str>) -> ConsulRegistry {
        ConsulRegistry::new(ConsulConfig {
            address: server.uri(),
            token: token.map(str::to_string),
        })
        .unwrap()
    }

    #[test]
    fn address_without_scheme() {
        let registry = ConsulRegistry::new(ConsulConfig {
            address: "consul.local:8500/".to_string(),
            token: None,
        })
        .unwrap();
        assert_eq!(
            registry.url(&["agent", "services"]).as_str(),
            "http://consul.local:8500/v1/agent/services"
        );
    }

    #[test]
    fn registration_body() {
        let svc = service(
            &[("register", "true"), ("tags", "a,b"), ("consul.check.tcp", "")],
            &[("bridge", "10.0.0.5")],
        );
        let regs = registrations(&svc);
        assert_eq!(regs.len(), 1);

        let body = serde_json::to_value(&regs[0]).unwrap();
        assert!(body.get("Kind").is_none());
        assert_eq!(body["ID"], "web1:tcp:80:h1");
        assert_eq!(body["Name"], "web1");
        assert_eq!(body["Address"], "10.0.0.5");
        assert_eq!(body["Port"], 80);
        assert_eq!(body["Tags"], json!(["a", "b"]));
        assert_eq!(body["Meta"]["com_github_njasm_clerk_register"], "true");
        assert_eq!(body["Check"]["TCP"], "10.0.0.5:80");
    }

    #[tokio::test]
    async fn registers_each_instance() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/agent/service/register"))
            .and(header("X-Consul-Token", "secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&server)
            .await;

        let svc = service(
            &[("register", "true")],
            &[("backend", "10.0.1.5"), ("frontend", "10.0.0.5")],
        );
        registry(&server, Some("secret")).register(&svc).await.unwrap();
    }

    #[tokio::test]
    async fn register_stops_on_first_failure() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/agent/service/register"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(
            &[("register", "true")],
            &[("backend", "10.0.1.5"), ("frontend", "10.0.0.5")],
        );
        let err = registry(&server, None).register(&svc).await.unwrap_err();
        assert!(matches!(err, RegistryError::Rejected { status: 500, .. }));
    }

    #[tokio::test]
    async fn register_without_instances_is_rejected_locally() {
        let server = MockServer::start().await;
        let svc = service(&[("register", "true")], &[]);
        let err = registry(&server, None).register(&svc).await.unwrap_err();
        assert!(matches!(err, RegistryError::NoInstances));
    }

    #[tokio::test]
    async fn unregister_uses_service_id() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/agent/service/deregister/web1:tcp:80:h1"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let svc = service(&[], &[("bridge", "10.0.0.5")]);
        registry(&server, None).unregister(&svc).await.unwrap();
    }

    #[tokio::test]
    async fn services_reverse_metadata_keys() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/agent/services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "web1:tcp:80:h1": {
                    "ID": "web1:tcp:80:h1",
                    "Service": "web1",
                    "Tags": ["a"],
                    "Meta": { "com_github_njasm_clerk_register": "true" },
                    "Port": 80,
                    "Address": "10.0.0.5"
                },
                "web1-sidecar-proxy": {
                    "Kind": "connect-proxy",
                    "ID": "web1-sidecar-proxy",
                    "Service": "web1-sidecar-proxy",
                    "Tags": null,
                    "Meta": null,
                    "Port": 8300,
                    "Address": ""
                }
            })))
            .mount(&server)
            .await;

        let mut services = registry(&server, None).services().await.unwrap();
        services.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(services.len(), 2);

        let web = &services[1];
        assert_eq!(web.id, ServiceId::new("web1:tcp:80:h1"));
        assert_eq!(web.address, "10.0.0.5");
        assert_eq!(web.port, 80);
        assert_eq!(
            web.config.get("com.github.njasm.clerk.register").map(String::as_str),
            Some("true")
        );
        assert_eq!(web.kind, SERVICE_KIND_TYPICAL);
        assert_eq!(services[0].kind, "connect-proxy");
        assert!(services[0].config.is_empty());
    }

    #[tokio::test]
    async fn ping_returns_leader() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/status/leader"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!("10.0.0.1:8300")))
            .mount(&server)
            .await;

        let leader = registry(&server, None).ping().await.unwrap();
        assert_eq!(leader, "10.0.0.1:8300");
    }

    #[tokio::test]
    async fn register_body_matches_registration() {
        let server = MockServer::start().await;
        let svc = service(&[("register", "true")], &[("bridge", "10.0.0.5")]);
        let expected = serde_json::to_value(&registrations(&svc)[0]).unwrap();

        Mock::given(method("PUT"))
            .and(path("/v1/agent/service/register"))
            .and(body_json(expected))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        registry(&server, None).register(&svc).await.unwrap();
    }
}
