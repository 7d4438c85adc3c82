//! Notification API endpoints
//!
//! Notifications replace UI toasts: services store them after a change is
//! committed and the stream pushes them to the caller's open sessions.

use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post, put},
    Json, Router,
};
use futures::stream::{Stream, StreamExt};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;

use crate::{
    middleware::AuthUser,
    models::{Action, MarkNotificationReadRequest, Notification, NotificationQuery, Resource},
    services::NotificationEvent,
    utils::AppError,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/stats", get(get_notification_stats))
        .route("/read-all", post(mark_all_read))
        .route("/{id}/read", put(mark_read))
        .route("/stream", get(notification_stream))
}

/// Notifications of the caller, newest first
async fn list_notifications(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require(Resource::Notifications, Action::Read)?;

    let notifications = state
        .notifications
        .list(&auth.id.to_string(), &query)
        .await?;

    Ok(Json(json!({ "notifications": notifications })))
}

async fn get_notification_stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require(Resource::Notifications, Action::Read)?;

    let stats = state.notifications.get_stats(&auth.id.to_string()).await?;

    Ok(Json(json!({ "stats": stats })))
}

/// Mark one of the caller's notifications as read or unread
async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Json(req): Json<MarkNotificationReadRequest>,
) -> Result<Json<Notification>, AppError> {
    auth.require(Resource::Notifications, Action::Read)?;

    let notification = state
        .notifications
        .mark_as_read(&id, &auth.id.to_string(), req.read)
        .await?;

    Ok(Json(notification))
}

async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require(Resource::Notifications, Action::Read)?;

    let count = state
        .notifications
        .mark_all_as_read(&auth.id.to_string())
        .await?;

    Ok(Json(json!({
        "success": true,
        "count": count,
        "message": format!("Marked {} notifications as read", count)
    })))
}

/// Server-Sent Events stream of the caller's notification events
///
/// EventSource cannot send headers, so the token may come as `?token=`.
async fn notification_stream(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    auth.require(Resource::Notifications, Action::Read)?;

    let user_id = auth.id.to_string();
    let receiver = state.notifications.subscribe();

    let stream = BroadcastStream::new(receiver).filter_map(move |result| {
        // Lagged receivers skip the missed events
        let event = result
            .ok()
            .filter(|event| event.user_id() == user_id)
            .and_then(|event| to_sse_event(&event));
        futures::future::ready(event.map(Ok))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &NotificationEvent) -> Option<Event> {
    let data = match event {
        NotificationEvent::New(notification) | NotificationEvent::Updated(notification) => {
            json!({ "notification": notification })
        }
        NotificationEvent::AllRead { user_id } => json!({ "user_id": user_id }),
    };

    Event::default().event(event.name()).json_data(data).ok()
}
