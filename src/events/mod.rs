use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::MovementType;

/// Signals emitted after a ledger mutation has committed.
///
/// Delivery to people (mail, dashboards) belongs to the notification
/// collaborator; the ledger only publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    MovementRecorded {
        movement_id: Uuid,
        movement_type: MovementType,
        card_type_id: Uuid,
        location_id: Uuid,
        dest_location_id: Option<Uuid>,
        quantity: i64,
        user_id: Uuid,
    },
    /// A stock row crossed its alert threshold downwards.
    LowStockDetected {
        stock_id: Uuid,
        location_id: Uuid,
        card_type_id: Uuid,
        quantity: i64,
        alert_threshold: i64,
    },
    AlertThresholdChanged {
        stock_id: Uuid,
        alert_threshold: i64,
    },
    MovementCorrected {
        movement_id: Uuid,
    },
    MovementReversed {
        movement_id: Uuid,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Publishes events whose facts are already committed. Failures are
    /// logged and swallowed: the mutation they describe cannot be undone.
    pub async fn publish_all(&self, events: Vec<Event>) {
        for event in events {
            if let Err(e) = self.send(event).await {
                warn!(error = %e, "dropping event after commit");
            }
        }
    }
}

/// Consumer loop standing in for the notification collaborator.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::MovementRecorded {
                movement_id,
                movement_type,
                quantity,
                ..
            } => {
                info!(%movement_id, %movement_type, quantity, "movement recorded");
            }
            Event::LowStockDetected {
                stock_id,
                location_id,
                card_type_id,
                quantity,
                alert_threshold,
            } => {
                warn!(
                    %stock_id,
                    %location_id,
                    %card_type_id,
                    quantity,
                    alert_threshold,
                    "stock at or below alert threshold"
                );
            }
            Event::AlertThresholdChanged {
                stock_id,
                alert_threshold,
            } => {
                info!(%stock_id, alert_threshold, "alert threshold changed");
            }
            Event::MovementCorrected { movement_id } => {
                info!(%movement_id, "movement corrected");
            }
            Event::MovementReversed { movement_id } => {
                info!(%movement_id, "movement reversed");
            }
        }
    }

    info!("Event channel closed, stopping event processing loop");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_all_preserves_order() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        sender
            .publish_all(vec![
                Event::MovementCorrected { movement_id: first },
                Event::MovementReversed { movement_id: second },
            ])
            .await;

        assert_eq!(rx.recv().await, Some(Event::MovementCorrected { movement_id: first }));
        assert_eq!(rx.recv().await, Some(Event::MovementReversed { movement_id: second }));
    }

    #[tokio::test]
    async fn send_fails_once_consumer_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        let result = sender
            .send(Event::MovementReversed {
                movement_id: Uuid::new_v4(),
            })
            .await;
        assert!(result.is_err());

        // swallowed, not propagated
        sender
            .publish_all(vec![Event::MovementReversed {
                movement_id: Uuid::new_v4(),
            }])
            .await;
    }
}
