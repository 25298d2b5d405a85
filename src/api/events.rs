use axum::{
    Router,
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::stream::{self, Stream};
use serde::Deserialize;
use std::{collections::HashSet, convert::Infallible, sync::Arc, time::Duration};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::api::AppState;
use crate::domain::events::NotificationEvent;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/events", get(sse_handler))
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// Comma separated event names, e.g. `JobProgress,JobFinished`.
    pub types: Option<String>,
}

fn parse_types(raw: Option<&str>) -> HashSet<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

struct Subscription {
    rx: broadcast::Receiver<NotificationEvent>,
    types: HashSet<String>,
}

impl Subscription {
    fn wants(&self, event: &NotificationEvent) -> bool {
        self.types.is_empty() || self.types.contains(event.name())
    }
}

fn to_sse(event: &NotificationEvent) -> Event {
    match Event::default().event(event.name()).json_data(event) {
        Ok(sse) => sse,
        Err(e) => Event::default().event("error").data(e.to_string()),
    }
}

/// `GET /api/events?types=`
///
/// Streams [`NotificationEvent`]s as JSON, named after their `type` tag.
/// A lagging subscriber gets a `lagged` event carrying the number of
/// events it missed.
async fn sse_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = Subscription {
        rx: state.event_bus().subscribe(),
        types: parse_types(query.types.as_deref()),
    };
    debug!(types = ?subscription.types, "SSE subscriber connected");

    let stream = stream::unfold(subscription, |mut sub| async move {
        loop {
            match sub.rx.recv().await {
                Ok(event) if sub.wants(&event) => return Some((Ok(to_sse(&event)), sub)),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!(missed = count, "SSE subscriber lagged");
                    let lagged = Event::default().event("lagged").data(count.to_string());
                    return Some((Ok(lagged), sub));
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobType;

    #[test]
    fn test_type_filter() {
        let (tx, rx) = broadcast::channel(4);
        drop(tx);
        let sub = Subscription {
            rx,
            types: parse_types(Some(" JobFinished, ,ListSyncFinished")),
        };
        assert_eq!(sub.types.len(), 2);

        let started = NotificationEvent::JobStarted {
            run_id: crate::domain::JobRunId::new(1),
            job_type: JobType::ListSync,
        };
        let finished = NotificationEvent::ListSyncFinished {
            name: "Mirror".into(),
            added: 1,
            removed: 0,
            unmatched: 0,
        };
        assert!(!sub.wants(&started));
        assert!(sub.wants(&finished));
    }

    #[test]
    fn test_no_filter_wants_everything() {
        assert!(parse_types(None).is_empty());
        assert!(parse_types(Some("")).is_empty());
    }
}
