// rest/sse.rs — SSE push event bridge.
//
// GET /api/v1/events
//
// Streams topology diff notifications as Server-Sent Events. Each client
// subscribes to the daemon's broadcast channel and receives every diff. When
// a client lags far enough behind that the broadcast buffer overwrote its
// position, the stream is closed — on reconnect the client resyncs from
// GET /api/v1/topology, which is always the full current graph.

use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
};
use futures_util::stream;
use std::sync::Arc;
use std::time::Duration;

use crate::AppContext;

pub async fn topology_events_sse(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let rx = ctx.broadcaster.subscribe();

    let s = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    // Parse the JSON string emitted by EventBroadcaster
                    let value: serde_json::Value = match serde_json::from_str(&notification) {
                        Ok(v) => v,
                        Err(_) => continue,
                    };
                    let method = value
                        .get("method")
                        .and_then(|v| v.as_str())
                        .unwrap_or("event")
                        .to_string();
                    let sse_event = Event::default().data(notification).event(method);
                    return Some((Ok::<Event, std::convert::Infallible>(sse_event), rx));
                }
                Err(_) => return None,
            }
        }
    });

    Sse::new(s).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
