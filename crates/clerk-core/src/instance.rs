use serde::{Deserialize, Serialize};

use crate::ids::ServiceId;
use crate::protocol::Protocol;

/// One network-reachable endpoint of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub id: ServiceId,
    pub ip: String,
    pub port: u16,
    pub protocol: Protocol,
}

impl Instance {
    pub fn new(id: ServiceId, ip: impl Into<String>, port: u16, protocol: Protocol) -> Self {
        Self {
            id,
            ip: ip.into(),
            port,
            protocol,
        }
    }

    /// `ip:port`, the target used by TCP and gRPC checks.
    pub fn socket_addr(&self) -> String {
        if self.ip.contains(':') {
            format!("[{}]:{}", self.ip, self.port)
        } else {
            format!("{}:{}", self.ip, self.port)
        }
    }
}
