//! In-memory runtime and registry used by the engine tests.

use async_trait::async_trait;
use clerk_core::{
    ContainerDetails, ContainerEvent, ContainerId, ContainerRuntime, EventStream, LabelSchema,
    NetworkEndpoint, RegisteredService, Registry, RegistryError, RuntimeError, Service, ServiceId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// A running container labelled for registration, one port, one network.
pub fn container(id: &str, name: &str, ip: &str) -> ContainerDetails {
    let schema = LabelSchema::default();
    ContainerDetails {
        id: ContainerId::new(id),
        name: format!("/{}", name),
        hostname: "h1".to_string(),
        labels: HashMap::from([(schema.key(LabelSchema::REGISTER), "true".to_string())]),
        exposed_ports: vec!["80/tcp".to_string()],
        networks: BTreeMap::from([("bridge".to_string(), Some(NetworkEndpoint::new(ip)))]),
    }
}

pub struct FakeRuntime {
    containers: Mutex<HashMap<ContainerId, ContainerDetails>>,
    stream: Mutex<Option<EventStream>>,
    fail_list: AtomicBool,
}

pub struct RuntimeFeed {
    pub events: mpsc::Sender<ContainerEvent>,
    pub errors: mpsc::Sender<RuntimeError>,
}

impl FakeRuntime {
    pub fn new(containers: Vec<ContainerDetails>) -> (Self, RuntimeFeed) {
        let (events_tx, events) = mpsc::channel(16);
        let (errors_tx, errors) = mpsc::channel(16);
        let runtime = Self {
            containers: Mutex::new(containers.into_iter().map(|c| (c.id.clone(), c)).collect()),
            stream: Mutex::new(Some(EventStream { events, errors })),
            fail_list: AtomicBool::new(false),
        };
        (
            runtime,
            RuntimeFeed {
                events: events_tx,
                errors: errors_tx,
            },
        )
    }

    pub fn add(&self, container: ContainerDetails) {
        self.containers
            .lock()
            .unwrap()
            .insert(container.id.clone(), container);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn events(&self) -> Result<EventStream, RuntimeError> {
        self.stream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| RuntimeError::EventStream("already subscribed".to_string()))
    }

    async fn list_containers(&self) -> Result<Vec<ContainerId>, RuntimeError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(RuntimeError::Transport("daemon down".to_string()));
        }
        let mut ids: Vec<ContainerId> = self.containers.lock().unwrap().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn inspect(&self, id: &ContainerId) -> Result<ContainerDetails, RuntimeError> {
        self.containers
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| RuntimeError::ContainerNotFound(id.clone()))
    }
}

#[derive(Default)]
pub struct FakeRegistry {
    services: Mutex<BTreeMap<ServiceId, RegisteredService>>,
    registered: Mutex<Vec<ServiceId>>,
    unregistered: Mutex<Vec<ServiceId>>,
    fail_register: AtomicBool,
    fail_list: AtomicBool,
}

impl FakeRegistry {
    /// Pretends `id` is already registered.
    pub fn seed(&self, id: &str) {
        let id = ServiceId::new(id);
        self.services.lock().unwrap().insert(
            id.clone(),
            RegisteredService {
                id,
                ..RegisteredService::default()
            },
        );
    }

    /// Service IDs passed to `register`, in call order.
    pub fn register_calls(&self) -> Vec<ServiceId> {
        self.registered.lock().unwrap().clone()
    }

    pub fn unregister_calls(&self) -> Vec<ServiceId> {
        self.unregistered.lock().unwrap().clone()
    }

    pub fn listed(&self) -> Vec<RegisteredService> {
        self.services.lock().unwrap().values().cloned().collect()
    }

    pub fn fail_register(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    fn id(&self) -> &'static str {
        "fake"
    }

    async fn ping(&self) -> Result<String, RegistryError> {
        Ok("fake-leader".to_string())
    }

    async fn register(&self, service: &Service) -> Result<(), RegistryError> {
        if let Some(id) = service.id() {
            self.registered.lock().unwrap().push(id.clone());
        }
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(RegistryError::Transport("registry down".to_string()));
        }

        let mut services = self.services.lock().unwrap();
        for instance in service.instances() {
            services.insert(
                instance.id.clone(),
                RegisteredService {
                    kind: String::new(),
                    id: instance.id.clone(),
                    name: service.name().to_string(),
                    address: instance.ip.clone(),
                    port: instance.port,
                    tags: service.tags().to_vec(),
                    config: service.config().entries().clone(),
                },
            );
        }
        Ok(())
    }

    async fn unregister(&self, service: &Service) -> Result<(), RegistryError> {
        let id = service.id().ok_or(RegistryError::NoInstances)?;
        self.unregistered.lock().unwrap().push(id.clone());
        self.services.lock().unwrap().remove(id);
        Ok(())
    }

    async fn services(&self) -> Result<Vec<RegisteredService>, RegistryError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(RegistryError::Transport("registry down".to_string()));
        }
        Ok(self.listed())
    }
}
