//! Diagnostic events about trend usage.
//!
//! Recording is fire-and-forget: a failure is logged and never reaches the
//! caller.

use std::sync::Mutex;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use crate::models::Id;

#[async_trait::async_trait]
pub trait EventRecorder: Send + Sync {
    async fn record_event(
        &self,
        actor_id: &Id,
        event_name: &str,
        payload: serde_json::Value,
    ) -> Result<()>;
}

/// Record an event, logging instead of returning any error.
pub async fn record_best_effort(
    recorder: &dyn EventRecorder,
    actor_id: &Id,
    event_name: &str,
    payload: serde_json::Value,
) {
    if let Err(e) = recorder.record_event(actor_id, event_name, payload).await {
        warn!(actor = %actor_id, event = event_name, error = %e, "failed to record event");
    }
}

/// Writes events to the log only.
#[derive(Debug, Clone, Default)]
pub struct TracingEventRecorder;

#[async_trait::async_trait]
impl EventRecorder for TracingEventRecorder {
    async fn record_event(
        &self,
        actor_id: &Id,
        event_name: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        info!(actor = %actor_id, event = event_name, payload = %payload, "event");
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedEvent {
    pub actor_id: Id,
    pub event_name: String,
    pub payload: serde_json::Value,
}

/// Keeps events in memory for inspection in tests.
#[derive(Debug, Default)]
pub struct MemoryEventRecorder {
    events: Mutex<Vec<RecordedEvent>>,
}

impl MemoryEventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl EventRecorder for MemoryEventRecorder {
    async fn record_event(
        &self,
        actor_id: &Id,
        event_name: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| anyhow::anyhow!("event log lock poisoned"))?;
        events.push(RecordedEvent {
            actor_id: actor_id.clone(),
            event_name: event_name.to_string(),
            payload,
        });
        Ok(())
    }
}
