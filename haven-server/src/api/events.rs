use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use super::AppState;

/// GET /routes/events - every change event as it happens, named by kind
pub(super) async fn change_feed(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.service.subscribe();
    tracing::debug!(
        "Change feed subscriber joined, {} listening",
        state.service.notifier().subscriber_count()
    );

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => match Event::default().event(event.kind()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(err) => {
                tracing::warn!("Cannot encode {} event: {err}", event.kind());
                None
            }
        },
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!("Change feed subscriber lagged, {skipped} events lost");
            None
        }
    });

    // Open feeds would otherwise hold graceful shutdown forever
    let stream = futures::StreamExt::take_until(stream, state.shutdown_requested());

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
