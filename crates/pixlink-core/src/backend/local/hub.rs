//! In-process change feed for the local backend.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use crate::backend::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, Subscription, Table};
use crate::error::Result;

const HUB_CAPACITY: usize = 256;
const SUBSCRIPTION_BUFFER: usize = 64;

/// Broadcasts every write made through the local store.
#[derive(Clone)]
pub struct ChangeHub {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeHub {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(HUB_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, table: Table, kind: ChangeKind, record: serde_json::Value) {
        let event = ChangeEvent {
            table,
            kind,
            record,
        };
        tracing::debug!(table = %event.table, kind = event.kind.as_str(), "change published");
        // Without subscribers there is nobody to tell.
        let _ = self.sender.send(event);
    }
}

#[async_trait]
impl ChangeFeed for ChangeHub {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription> {
        // Subscribe before spawning so nothing published after this call is missed.
        let mut events = self.sender.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);

        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if filter.matches(&event) && tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, table = %filter.table, "change subscriber lagged");
                        // Still wake the consumer so it re-fetches.
                        let resync = ChangeEvent {
                            table: filter.table,
                            kind: ChangeKind::All,
                            record: serde_json::Value::Null,
                        };
                        if tx.send(resync).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(rx, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn subscriber_receives_matching_events_only() {
        let hub = ChangeHub::new();
        let mut subscription = hub
            .subscribe(ChangeFilter::table(Table::Comments).eq("image_id", "a"))
            .await
            .unwrap();

        hub.publish(Table::Comments, ChangeKind::Insert, json!({"image_id": "b"}));
        hub.publish(Table::Likes, ChangeKind::Insert, json!({"image_id": "a"}));
        hub.publish(Table::Comments, ChangeKind::Insert, json!({"image_id": "a"}));

        let event = tokio::time::timeout(Duration::from_secs(1), subscription.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.table, Table::Comments);
        assert_eq!(event.record, json!({"image_id": "a"}));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_subscription_stops_forwarding() {
        let hub = ChangeHub::new();
        let subscription = hub.subscribe(ChangeFilter::table(Table::Images)).await.unwrap();
        drop(subscription);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(hub.sender.receiver_count(), 0);
    }
}
