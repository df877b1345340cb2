//! Monitor event stream

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

use crate::AppState;

/// GET /events
///
/// Session lifecycle, trend and report events as they happen.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    emotrack_common::sse::create_event_sse_stream("emotrack-ingest", &state.services.events)
}
