//! Notification handlers and the SSE event stream

use std::convert::Infallible;
use std::time::Duration;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;
use crate::models::notification::{Notification, NotificationFilter, NotificationPreference, UpdatePreferencesRequest};
use crate::services::event_hub::SseMessage;
use crate::services::AuthContext;
use crate::state::AppState;
use crate::utils::errors::Result;
use crate::utils::helpers::Pagination;

pub const READY_EVENT: &str = "ready";

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

fn to_event(message: SseMessage) -> Event {
    Event::default().event(message.event).data(message.data)
}

pub async fn list(
    State(state): State<AppState>,
    ctx: AuthContext,
    Query(page): Query<Pagination>,
    Query(filter): Query<NotificationFilter>,
) -> Result<Json<Vec<Notification>>> {
    let unread_only = filter.unread_only.unwrap_or(false);
    Ok(Json(state.services.notifications.list(&ctx, unread_only, page.limit(), page.offset()).await?))
}

pub async fn unread_count(State(state): State<AppState>, ctx: AuthContext) -> Result<Json<UnreadCount>> {
    let count = state.services.notifications.unread_count(&ctx).await?;
    Ok(Json(UnreadCount { count }))
}

pub async fn mark_read(State(state): State<AppState>, ctx: AuthContext, Path(id): Path<Uuid>) -> Result<StatusCode> {
    state.services.notifications.mark_read(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn mark_all_read(State(state): State<AppState>, ctx: AuthContext) -> Result<Json<MarkedRead>> {
    let updated = state.services.notifications.mark_all_read(&ctx).await?;
    Ok(Json(MarkedRead { updated }))
}

pub async fn preferences(State(state): State<AppState>, ctx: AuthContext) -> Result<Json<NotificationPreference>> {
    Ok(Json(state.services.notifications.preferences(&ctx).await?))
}

pub async fn update_preferences(
    State(state): State<AppState>,
    ctx: AuthContext,
    Json(update): Json<UpdatePreferencesRequest>,
) -> Result<Json<NotificationPreference>> {
    Ok(Json(state.services.notifications.update_preferences(&ctx, update).await?))
}

/// `GET /api/notifications/events`
///
/// Sends a `ready` frame first, then every notification routed to the
/// caller. The hub entry is dropped with the stream when the client leaves.
pub async fn events(State(state): State<AppState>, ctx: AuthContext) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let subscription = state.services.notifications.subscribe(&ctx);
    let keep_alive = Duration::from_secs(state.settings.server.sse_keep_alive_seconds.max(1));
    let user_id = ctx.user_id;

    let stream = async_stream::stream! {
        let mut receiver = subscription.receiver;
        let _guard = subscription.guard;
        let ready = json!({ "connectionId": subscription.connection_id, "userId": user_id });

        yield Ok(Event::default().event(READY_EVENT).data(ready.to_string()));

        while let Some(message) = receiver.recv().await {
            yield Ok(to_event(message));
        }
        debug!(user_id = %user_id, "SSE stream ended");
    };

    Sse::new(stream).keep_alive(KeepAlive::new().interval(keep_alive).text("keep-alive"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::to_bytes;
    use axum::response::IntoResponse;

    #[tokio::test]
    async fn test_event_frame_carries_name_and_data() {
        let message = SseMessage::new("notification", r#"{"kind":"flash_deal.created"}"#);
        let events = futures::stream::iter(vec![Ok::<_, Infallible>(to_event(message))]);
        let response = Sse::new(events).into_response();

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let frame = String::from_utf8(bytes.to_vec()).unwrap();
        assert_eq!(frame, "event: notification\ndata: {\"kind\":\"flash_deal.created\"}\n\n");
    }
}
