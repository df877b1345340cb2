//! Video stream WebSocket endpoint

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    response::Response,
};
use serde::Deserialize;
use tracing::debug;

use crate::session::{run_session, WsTransport};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub token: Option<String>,
}

/// GET /ws/video?token=...
///
/// Always upgrades; a bad or missing token is answered with close code 1008.
/// Messages up to twice the frame limit are read so oversized frames get an
/// error event instead of a dropped connection.
pub async fn video_stream(
    ws: WebSocketUpgrade,
    Query(params): Query<StreamParams>,
    State(state): State<AppState>,
) -> Response {
    let read_limit = state.services.config.frames.max_bytes.saturating_mul(2);

    ws.max_message_size(read_limit)
        .max_frame_size(read_limit)
        .on_upgrade(move |socket| async move {
            let outcome = run_session(
                state.services,
                WsTransport::new(socket),
                params.token.as_deref(),
            )
            .await;

            if let Some(outcome) = outcome {
                debug!(
                    session_id = %outcome.session_id,
                    state = ?outcome.final_state,
                    "WebSocket session finished"
                );
            }
        })
}
