use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport protocol of an exposed port.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
    Custom(String),
}

impl Protocol {
    pub fn parse(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "" | "tcp" => Protocol::Tcp,
            "udp" => Protocol::Udp,
            "sctp" => Protocol::Sctp,
            other => Protocol::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Sctp => "sctp",
            Protocol::Custom(other) => other,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Splits `"8080/udp"` into its port text and protocol. A bare port is TCP.
pub fn split_proto_port(raw: &str) -> (&str, Protocol) {
    let raw = raw.trim();
    match raw.split_once('/') {
        Some((port, proto)) => (port.trim(), Protocol::parse(proto.trim())),
        None => (raw, Protocol::Tcp),
    }
}
