//! SSE endpoint streaming engine events

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events
///
/// Streams every engine event (notices, supplier changes, ledger
/// updates, weight readings) to the connected UI.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    recv_common::sse::event_sse_stream(&state.event_bus)
}
