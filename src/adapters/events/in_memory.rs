//! In-memory event bus for testing.
//!
//! Records every published envelope so tests can assert on what the
//! coordinator emitted.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::EventPublisher;

/// Captures published events in publish order.
///
/// # Example
///
/// ```ignore
/// let bus = InMemoryEventBus::new();
/// bus.publish(envelope).await?;
/// assert!(bus.has_event("payment.transitioned.v1"));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEventBus {
    published: RwLock<Vec<EventEnvelope>>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// All published events.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.read().clone()
    }

    /// Events of a specific type, in publish order.
    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Events for a specific aggregate, in publish order.
    pub fn events_for_aggregate(&self, aggregate_id: &str) -> Vec<EventEnvelope> {
        self.read()
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.read().len()
    }

    pub fn has_event(&self, event_type: &str) -> bool {
        self.read().iter().any(|e| e.event_type == event_type)
    }

    pub fn clear(&self) {
        if let Ok(mut published) = self.published.write() {
            published.clear();
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<EventEnvelope>> {
        self.published.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        let mut published = self.published.write().map_err(|_| {
            DomainError::new(ErrorCode::InternalError, "event bus lock poisoned")
        })?;
        published.push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{EventId, Timestamp};

    fn envelope(event_type: &str, aggregate_id: &str) -> EventEnvelope {
        EventEnvelope {
            event_id: EventId::new(),
            event_type: event_type.to_string(),
            schema_version: 1,
            aggregate_id: aggregate_id.to_string(),
            aggregate_type: "Payment".to_string(),
            occurred_at: Timestamp::now(),
            payload: serde_json::json!({}),
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn captures_events_in_order() {
        let bus = InMemoryEventBus::new();
        bus.publish(envelope("payment.transitioned.v1", "p1")).await.unwrap();
        bus.publish(envelope("entitlement.granted.v1", "u1:c1")).await.unwrap();
        bus.publish(envelope("payment.transitioned.v1", "p2")).await.unwrap();

        assert_eq!(bus.event_count(), 3);
        assert_eq!(bus.events_of_type("payment.transitioned.v1").len(), 2);
        assert_eq!(bus.events_for_aggregate("p2").len(), 1);
        assert!(bus.has_event("entitlement.granted.v1"));
    }

    #[tokio::test]
    async fn clear_removes_everything() {
        let bus = InMemoryEventBus::new();
        bus.publish(envelope("payment.transitioned.v1", "p1")).await.unwrap();

        bus.clear();

        assert_eq!(bus.event_count(), 0);
        assert!(!bus.has_event("payment.transitioned.v1"));
    }
}
