//! # TelemetryRelay — bridges cycle events to a telemetry sink.
//!
//! The runtime reports every finished cycle to an external persistence or
//! telemetry sink. That call is fire-and-forget: the cycle never waits on it,
//! never retries it, and a slow sink only ever costs the sink its own queued
//! events. [`TelemetryRelay`] realizes this by riding the subscriber fan-out:
//! it filters [`EventKind::CycleCompleted`] and forwards the attached
//! [`CycleRecord`](crate::orchestrator::CycleRecord) to the sink from its own
//! worker task.

use std::sync::Arc;

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::orchestrator::TelemetrySink;
use crate::subscribers::Subscribe;

/// Subscriber adapter that feeds an external [`TelemetrySink`].
pub struct TelemetryRelay {
    sink: Arc<dyn TelemetrySink>,
}

impl TelemetryRelay {
    /// Wraps a sink for registration with the runtime builder.
    pub fn new(sink: Arc<dyn TelemetrySink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl Subscribe for TelemetryRelay {
    async fn on_event(&self, event: &Event) {
        if event.kind != EventKind::CycleCompleted {
            return;
        }
        if let Some(record) = &event.record {
            self.sink.record(record.as_ref().clone()).await;
        }
    }

    fn name(&self) -> &'static str {
        "telemetry_relay"
    }

    // Telemetry backends are usually the slowest consumer.
    fn queue_capacity(&self) -> usize {
        4096
    }
}
