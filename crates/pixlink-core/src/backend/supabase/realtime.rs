//! Supabase realtime over the Phoenix channel protocol.
//!
//! Each subscription opens its own socket, joins one `postgres_changes`
//! channel and forwards matching row changes until the subscription is
//! dropped, at which point it leaves the channel and closes the socket.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::ApiContext;
use crate::backend::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, Subscription};
use crate::error::{Error, Result};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const SUBSCRIPTION_BUFFER: usize = 64;
const JOIN_REF: &str = "1";

#[derive(Clone)]
pub struct RealtimeFeed {
    api: ApiContext,
}

impl RealtimeFeed {
    pub const fn new(api: ApiContext) -> Self {
        Self { api }
    }

    fn socket_url(&self) -> Result<String> {
        let http = self.api.endpoint("realtime/v1/websocket");
        let ws = if let Some(rest) = http.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = http.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            return Err(Error::Realtime(format!("unsupported realtime URL '{http}'")));
        };
        Ok(format!(
            "{ws}?apikey={}&vsn=1.0.0",
            urlencoding::encode(self.api.anon_key())
        ))
    }
}

fn topic_for(filter: &ChangeFilter) -> String {
    format!("realtime:{}-{}", filter.table, uuid::Uuid::new_v4().simple())
}

/// The server applies the column filter; deleted rows may only carry their
/// primary key, so only table and kind are rechecked here.
fn accepts(filter: &ChangeFilter, event: &ChangeEvent) -> bool {
    event.table == filter.table && (filter.kind == ChangeKind::All || filter.kind == event.kind)
}

fn join_message(
    topic: &str,
    filter: &ChangeFilter,
    access_token: Option<&str>,
) -> serde_json::Value {
    let mut change = json!({
        "event": filter.kind.as_str(),
        "schema": "public",
        "table": filter.table.as_str(),
    });
    if let Some(expression) = filter.filter_expression() {
        change["filter"] = json!(expression);
    }

    let mut payload = json!({
        "config": {
            "broadcast": { "self": false },
            "presence": { "key": "" },
            "postgres_changes": [change],
        }
    });
    if let Some(token) = access_token {
        payload["access_token"] = json!(token);
    }

    json!({
        "topic": topic,
        "event": "phx_join",
        "payload": payload,
        "ref": JOIN_REF,
        "join_ref": JOIN_REF,
    })
}

fn control_message(topic: &str, event: &str, reference: u64) -> serde_json::Value {
    json!({
        "topic": topic,
        "event": event,
        "payload": {},
        "ref": reference.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: String,
    table: String,
    #[serde(default)]
    record: Option<serde_json::Value>,
    #[serde(default)]
    old_record: Option<serde_json::Value>,
}

/// Decode a `postgres_changes` frame into a change event.
fn parse_change(text: &str) -> Option<ChangeEvent> {
    let envelope: Envelope = serde_json::from_str(text).ok()?;
    match envelope.event.as_str() {
        "postgres_changes" => {}
        "phx_reply" => {
            let status = envelope.payload.get("status").and_then(serde_json::Value::as_str);
            if status != Some("ok") {
                tracing::warn!("Realtime join was rejected: {}", envelope.payload);
            }
            return None;
        }
        "phx_error" | "system" => {
            tracing::debug!("Realtime {}: {}", envelope.event, envelope.payload);
            return None;
        }
        _ => return None,
    }

    let data: ChangeData = serde_json::from_value(envelope.payload.get("data")?.clone()).ok()?;
    let kind = ChangeKind::parse(&data.kind)?;
    let table = data.table.parse().ok()?;
    let record = match kind {
        ChangeKind::Delete => data.old_record.or(data.record),
        _ => data.record.or(data.old_record),
    }
    .unwrap_or(serde_json::Value::Null);

    Some(ChangeEvent {
        table,
        kind,
        record,
    })
}

#[async_trait]
impl ChangeFeed for RealtimeFeed {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        let url = self.socket_url()?;
        let (socket, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|error| Error::Realtime(error.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let topic = topic_for(&filter);
        let join = join_message(&topic, &filter, self.api.access_token().as_deref());
        sink.send(WsMessage::Text(join.to_string().into()))
            .await
            .map_err(|error| Error::Realtime(error.to_string()))?;
        tracing::debug!(%topic, "joined realtime channel");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        tokio::spawn(async move {
            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await;
            let mut reference: u64 = 1;

            loop {
                tokio::select! {
                    () = tx.closed() => break,
                    _ = heartbeat.tick() => {
                        reference += 1;
                        let beat = control_message("phoenix", "heartbeat", reference);
                        if sink.send(WsMessage::Text(beat.to_string().into())).await.is_err() {
                            tracing::warn!(%topic, "realtime heartbeat failed");
                            return;
                        }
                    }
                    frame = stream.next() => match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            let Some(event) = parse_change(&text) else { continue };
                            if accepts(&filter, &event) && tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => {
                            tracing::warn!(%topic, "realtime socket closed");
                            return;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(error)) => {
                            tracing::warn!(%topic, "realtime socket error: {error}");
                            return;
                        }
                    }
                }
            }

            reference += 1;
            let leave = control_message(&topic, "phx_leave", reference);
            sink.send(WsMessage::Text(leave.to_string().into())).await.ok();
            sink.close().await.ok();
            tracing::debug!(%topic, "left realtime channel");
        });

        Ok(Subscription::from_receiver(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Table;
    use crate::session::SessionContext;

    #[test]
    fn socket_url_switches_scheme() {
        let feed = RealtimeFeed::new(
            ApiContext::new("https://demo.supabase.co", "anon key", SessionContext::new()).unwrap(),
        );
        assert_eq!(
            feed.socket_url().unwrap(),
            "wss://demo.supabase.co/realtime/v1/websocket?apikey=anon%20key&vsn=1.0.0"
        );
    }

    #[test]
    fn join_carries_postgres_changes_config() {
        let filter = ChangeFilter::table(Table::Messages)
            .kind(ChangeKind::Insert)
            .eq("chat_id", "c1");
        let message = join_message("realtime:chat", &filter, Some("token"));

        assert_eq!(message["event"], "phx_join");
        let change = &message["payload"]["config"]["postgres_changes"][0];
        assert_eq!(change["event"], "INSERT");
        assert_eq!(change["table"], "messages");
        assert_eq!(change["filter"], "chat_id=eq.c1");
        assert_eq!(message["payload"]["access_token"], "token");
    }

    #[test]
    fn parses_postgres_change_frames() {
        let frame = r#"{
            "topic": "realtime:likes",
            "event": "postgres_changes",
            "payload": {
                "data": {
                    "type": "DELETE",
                    "table": "likes",
                    "schema": "public",
                    "old_record": {"id": "l1", "image_id": "i1"}
                },
                "ids": [1]
            },
            "ref": null
        }"#;
        let event = parse_change(frame).unwrap();
        assert_eq!(event.table, Table::Likes);
        assert_eq!(event.kind, ChangeKind::Delete);
        assert_eq!(event.record["image_id"], "i1");
    }

    #[test]
    fn deletes_pass_without_filtered_column() {
        let filter = ChangeFilter::table(Table::Likes).eq("image_id", "i1");
        let event = ChangeEvent {
            table: Table::Likes,
            kind: ChangeKind::Delete,
            record: serde_json::json!({"id": "l1"}),
        };
        assert!(accepts(&filter, &event));
        assert!(!accepts(&ChangeFilter::table(Table::Images), &event));
    }

    #[test]
    fn ignores_replies_and_heartbeats() {
        let reply = r#"{"topic":"phoenix","event":"phx_reply","payload":{"status":"ok","response":{}},"ref":"2"}"#;
        assert!(parse_change(reply).is_none());
    }
}
