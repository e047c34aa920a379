//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE stream construction for the receiving services.

use crate::events::EventBus;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Create an SSE stream that forwards all EventBus events
///
/// Each event is serialized as JSON with its type name as the SSE event
/// tag. A heartbeat comment is interleaved every 15 seconds so proxies
/// keep the connection open.
pub fn event_sse_stream(bus: &EventBus) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to engine events");

    let mut rx = bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(15)) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                Ok(event) = rx.recv() => {
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            yield Ok(Event::default().event(event_type).data(json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}
