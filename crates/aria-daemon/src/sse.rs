//! Server-Sent Events stream of temperature alerts

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;

use crate::state::AppState;

/// Stream alerts to one client for the lifetime of the request
///
/// Dropping the stream on client disconnect drops the subscription, which
/// unregisters its queue from the broadcast.
pub async fn temperature_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.alerts.subscribe();
    info!("Telemetry stream client connected");

    let stream = futures_util::stream::unfold(subscription, |mut subscription| async move {
        let alert = subscription.recv().await?;
        let event = Event::default().json_data(&alert).ok()?;
        Some((Ok(event), subscription))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
