//! Health check synthesis from `consul.check.*` labels.

use clerk_core::labels::is_true;
use clerk_core::{Instance, ServiceConfig};
use serde::{Deserialize, Serialize};

pub const CHECK_HTTP: &str = "consul.check.http";
pub const CHECK_HTTPS: &str = "consul.check.https";
pub const CHECK_METHOD: &str = "consul.check.method";
pub const CHECK_TCP: &str = "consul.check.tcp";
pub const CHECK_GRPC: &str = "consul.check.grpc";
pub const CHECK_GRPC_TLS: &str = "consul.check.grpc.tls";
pub const CHECK_TLS_SKIP_VERIFY: &str = "consul.check.tls.skip.verify";
pub const CHECK_TIMEOUT: &str = "consul.check.timeout";
pub const CHECK_INTERVAL: &str = "consul.check.interval";
pub const CHECK_DEREGISTER_AFTER: &str = "consul.check.deregister.after";

pub const DEFAULT_TIMEOUT: &str = "2s";
pub const DEFAULT_INTERVAL: &str = "10s";

/// Check definition in the shape the Consul agent API expects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AgentServiceCheck {
    #[serde(rename = "HTTP", skip_serializing_if = "Option::is_none")]
    pub http: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(rename = "TCP", skip_serializing_if = "Option::is_none")]
    pub tcp: Option<String>,
    #[serde(rename = "GRPC", skip_serializing_if = "Option::is_none")]
    pub grpc: Option<String>,
    #[serde(rename = "GRPCUseTLS", skip_serializing_if = "std::ops::Not::not")]
    pub grpc_use_tls: bool,
    #[serde(rename = "TLSSkipVerify", skip_serializing_if = "std::ops::Not::not")]
    pub tls_skip_verify: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deregister_critical_service_after: Option<String>,
}

impl AgentServiceCheck {
    pub fn has_probe(&self) -> bool {
        self.http.is_some() || self.tcp.is_some() || self.grpc.is_some()
    }

    /// Probe type for display; `none` when only deregistration is configured.
    pub fn kind(&self) -> &'static str {
        if self.http.is_some() {
            "http"
        } else if self.tcp.is_some() {
            "tcp"
        } else if self.grpc.is_some() {
            "grpc"
        } else {
            "none"
        }
    }

    fn is_empty(&self) -> bool {
        !self.has_probe() && self.deregister_critical_service_after.is_none()
    }
}

/// Builds the check for one instance, or `None` when no check label is set.
///
/// HTTP and HTTPS share one URL slot and HTTPS is evaluated last, so it wins when
/// both are present.
pub fn service_check(config: &ServiceConfig, instance: &Instance) -> Option<AgentServiceCheck> {
    let target = instance.socket_addr();
    let mut check = AgentServiceCheck::default();

    if let Some(path) = config.get(CHECK_HTTP) {
        check.http = Some(format!("http://{}{}", target, path));
    }

    if let Some(path) = config.get(CHECK_HTTPS) {
        check.http = Some(format!("https://{}{}", target, path));
    }

    if check.http.is_some() {
        check.method = config.get(CHECK_METHOD).map(str::to_string);
    }

    if config.contains(CHECK_TCP) {
        check.tcp = Some(target.clone());
    }

    if config.contains(CHECK_GRPC) {
        check.grpc = Some(target);
        if let Some(use_tls) = config.get(CHECK_GRPC_TLS) {
            if is_true(use_tls) {
                check.grpc_use_tls = true;
                if let Some(skip) = config.get(CHECK_TLS_SKIP_VERIFY) {
                    check.tls_skip_verify = is_true(skip);
                }
            } else {
                check.grpc_use_tls = false;
                check.tls_skip_verify = true;
            }
        }
    }

    if check.has_probe() {
        check.timeout = Some(
            config
                .get(CHECK_TIMEOUT)
                .unwrap_or(DEFAULT_TIMEOUT)
                .to_string(),
        );
        check.interval = Some(
            config
                .get(CHECK_INTERVAL)
                .unwrap_or(DEFAULT_INTERVAL)
                .to_string(),
        );
    }

    check.deregister_critical_service_after = config.get(CHECK_DEREGISTER_AFTER).map(str::to_string);

    if check.is_empty() { None } else { Some(check) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clerk_core::{LabelSchema, Protocol, ServiceId};
    use std::collections::HashMap;

    fn config(labels: &[(&str, &str)]) -> ServiceConfig {
        let schema = LabelSchema::default();
        let labels: HashMap<String, String> = labels
            .iter()
            .map(|(k, v)| (schema.key(k), v.to_string()))
            .collect();
        ServiceConfig::from_labels(&labels, &schema)
    }

    fn instance() -> Instance {
        Instance::new(ServiceId::new("web:tcp:80:h1"), "10.0.0.5", 80, Protocol::Tcp)
    }

    #[test]
    fn no_labels_no_check() {
        assert_eq!(service_check(&config(&[]), &instance()), None);
    }

    #[test]
    fn http_check_with_defaults() {
        let check = service_check(&config(&[(CHECK_HTTP, "/health")]), &instance()).unwrap();
        assert_eq!(check.http.as_deref(), Some("http://10.0.0.5:80/health"));
        assert_eq!(check.timeout.as_deref(), Some("2s"));
        assert_eq!(check.interval.as_deref(), Some("10s"));
        assert_eq!(check.method, None);
    }

    #[test]
    fn https_wins_over_http() {
        let check = service_check(
            &config(&[(CHECK_HTTP, "/a"), (CHECK_HTTPS, "/b"), (CHECK_METHOD, "HEAD")]),
            &instance(),
        )
        .unwrap();
        assert_eq!(check.http.as_deref(), Some("https://10.0.0.5:80/b"));
        assert_eq!(check.method.as_deref(), Some("HEAD"));
    }

    #[test]
    fn method_ignored_without_url() {
        let check = service_check(&config(&[(CHECK_TCP, ""), (CHECK_METHOD, "POST")]), &instance())
            .unwrap();
        assert_eq!(check.tcp.as_deref(), Some("10.0.0.5:80"));
        assert_eq!(check.method, None);
    }

    #[test]
    fn grpc_tls_flags() {
        let plain = service_check(&config(&[(CHECK_GRPC, "")]), &instance()).unwrap();
        assert_eq!(plain.grpc.as_deref(), Some("10.0.0.5:80"));
        assert!(!plain.grpc_use_tls);
        assert!(!plain.tls_skip_verify);

        let tls = service_check(
            &config(&[(CHECK_GRPC, ""), (CHECK_GRPC_TLS, "true"), (CHECK_TLS_SKIP_VERIFY, "TRUE")]),
            &instance(),
        )
        .unwrap();
        assert!(tls.grpc_use_tls);
        assert!(tls.tls_skip_verify);

        let verified = service_check(
            &config(&[(CHECK_GRPC, ""), (CHECK_GRPC_TLS, "true"), (CHECK_TLS_SKIP_VERIFY, "no")]),
            &instance(),
        )
        .unwrap();
        assert!(verified.grpc_use_tls);
        assert!(!verified.tls_skip_verify);

        let disabled = service_check(
            &config(&[(CHECK_GRPC, ""), (CHECK_GRPC_TLS, "false"), (CHECK_TLS_SKIP_VERIFY, "false")]),
            &instance(),
        )
        .unwrap();
        assert!(!disabled.grpc_use_tls);
        assert!(disabled.tls_skip_verify);
    }

    #[test]
    fn explicit_timing_and_deregister() {
        let check = service_check(
            &config(&[
                (CHECK_TCP, ""),
                (CHECK_TIMEOUT, "5s"),
                (CHECK_INTERVAL, "30s"),
                (CHECK_DEREGISTER_AFTER, "1m"),
            ]),
            &instance(),
        )
        .unwrap();
        assert_eq!(check.timeout.as_deref(), Some("5s"));
        assert_eq!(check.interval.as_deref(), Some("30s"));
        assert_eq!(check.deregister_critical_service_after.as_deref(), Some("1m"));
    }

    #[test]
    fn deregister_after_without_probe() {
        let check = service_check(&config(&[(CHECK_DEREGISTER_AFTER, "90s")]), &instance()).unwrap();
        assert!(!check.has_probe());
        assert_eq!(check.kind(), "none");
        assert_eq!(check.timeout, None);
        assert_eq!(check.deregister_critical_service_after.as_deref(), Some("90s"));
    }

    #[test]
    fn serializes_agent_field_names() {
        let check = service_check(&config(&[(CHECK_HTTP, "/h")]), &instance()).unwrap();
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json["HTTP"], "http://10.0.0.5:80/h");
        assert_eq!(json["Interval"], "10s");
        assert!(json.get("GRPCUseTLS").is_none());
    }
}
