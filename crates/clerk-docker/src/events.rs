//! `docker events --format '{{json .}}'` decoding and the reader task.

use clerk_core::{ContainerEvent, EventActor, RuntimeError};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::sync::mpsc;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(rename = "Action", default)]
    action: String,
    #[serde(rename = "Actor", default)]
    actor: RawActor,
}

#[derive(Debug, Default, Deserialize)]
struct RawActor {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Attributes", default)]
    attributes: Option<HashMap<String, String>>,
}

/// Decodes one line. Newer engines drop `status`/`id`; `Action` and `Actor.ID` cover for them.
pub(crate) fn parse_event(line: &str) -> Result<ContainerEvent, serde_json::Error> {
    let raw: RawEvent = serde_json::from_str(line)?;
    Ok(ContainerEvent {
        id: raw.id.unwrap_or_else(|| raw.actor.id.clone()),
        status: raw.status.unwrap_or(raw.action),
        kind: raw.kind,
        actor: EventActor {
            id: raw.actor.id,
            attributes: raw.actor.attributes.unwrap_or_default(),
        },
    })
}

/// Pumps the child's stdout into `events` until the process exits or the receiver goes away.
pub(crate) async fn pump(
    mut child: Child,
    stdout: ChildStdout,
    events: mpsc::Sender<ContainerEvent>,
    errors: mpsc::Sender<RuntimeError>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                let _ = errors.send(RuntimeError::EventStream(e.to_string())).await;
                break;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        match parse_event(&line) {
            Ok(event) => {
                debug!(container = %event.actor.id, status = %event.status, "docker event");
                if events.send(event).await.is_err() {
                    // Nobody listens anymore; the child is killed on drop.
                    return;
                }
            }
            Err(e) => {
                warn!("undecodable docker event: {}", e);
                if errors.send(RuntimeError::Decode(e.to_string())).await.is_err() {
                    return;
                }
            }
        }
    }

    let reason = match child.wait().await {
        Ok(status) => format!("docker events exited with {}", status),
        Err(e) => format!("docker events could not be awaited: {}", e),
    };
    let _ = errors.send(RuntimeError::EventStream(reason)).await;
}
