//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE implementations for Emotrack services.

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::events::{EventBus, MonitorEvent};

/// Heartbeat interval for idle SSE connections
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Render one monitor event as an SSE frame
pub fn to_sse_event(event: &MonitorEvent) -> Event {
    match serde_json::to_string(event) {
        Ok(data) => Event::default().event(event.event_type()).data(data),
        Err(e) => {
            warn!("SSE: failed to serialize {}: {}", event.event_type(), e);
            Event::default().comment("serialization error")
        }
    }
}

/// Create an SSE stream forwarding every EventBus event
///
/// Sends an initial `ConnectionStatus` frame, then one frame per event.
/// A lagging client skips the events it missed and keeps streaming.
///
/// # Example
/// ```rust,ignore
/// pub async fn event_stream(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     emotrack_common::sse::create_event_sse_stream("emotrack-ingest", &state.events)
/// }
/// ```
pub fn create_event_sse_stream(
    service_name: &'static str,
    bus: &EventBus,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} monitor events", service_name);

    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    debug!("SSE: forwarding {}", event.event_type());
                    yield Ok(to_sse_event(&event));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: {} client lagged, skipped {} events", service_name, skipped);
                }
                Err(RecvError::Closed) => {
                    info!("SSE: {} event bus closed", service_name);
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}
