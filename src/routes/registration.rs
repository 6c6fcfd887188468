//! Registration API routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;

use crate::error::Result;
use crate::registration::{
    remove_participant, RegistrationOutcome, RegistrationService, UnregistrationOutcome,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:event_id/register", post(register))
        .route("/:event_id/unregister", post(unregister))
        .route(
            "/:event_id/participants/:participant_id",
            delete(remove_participant_handler),
        )
}

#[derive(Debug, Deserialize)]
struct AttendeeRequest {
    guardian_id: String,
    attendee_ids: Vec<String>,
}

async fn register(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(request): Json<AttendeeRequest>,
) -> Result<Json<RegistrationOutcome>> {
    let service = RegistrationService::new(state.db());
    let outcome = service
        .register(&event_id, &request.guardian_id, &request.attendee_ids)
        .await?;
    Ok(Json(outcome))
}

async fn unregister(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(request): Json<AttendeeRequest>,
) -> Result<Json<UnregistrationOutcome>> {
    let service = RegistrationService::new(state.db());
    let outcome = service
        .unregister(
            &event_id,
            &request.guardian_id,
            &request.attendee_ids,
            state.store(),
        )
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct RemoveParticipantQuery {
    #[serde(default)]
    child: bool,
}

/// Administrative removal: cascades waiver records and artifacts
async fn remove_participant_handler(
    State(state): State<AppState>,
    Path((event_id, participant_id)): Path<(String, String)>,
    Query(query): Query<RemoveParticipantQuery>,
) -> Result<StatusCode> {
    remove_participant(
        state.db(),
        state.store(),
        &event_id,
        &participant_id,
        query.child,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Request};
    use chrono::{Duration, Utc};
    use serde_json::{json, Value};
    use sqlx::SqlitePool;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::db::{test_pool, EventRepository, GuardianRepository};
    use crate::state::AppState;
    use crate::storage::memory::MemoryStore;

    use super::*;

    async fn test_app() -> (Router, SqlitePool) {
        let pool = test_pool().await;

        let guardians = GuardianRepository::new(&pool);
        guardians.create("g1", "Dana Smith", None).await.unwrap();
        guardians.add_child("c1", "g1", "Alex Smith").await.unwrap();

        let events = EventRepository::new(&pool);
        events
            .create(
                "ev1",
                "Spring Campout",
                10,
                Utc::now() + Duration::days(7),
                Utc::now() + Duration::days(8),
            )
            .await
            .unwrap();
        events
            .create(
                "ev2",
                "Tiny Campout",
                1,
                Utc::now() + Duration::days(7),
                Utc::now() + Duration::days(8),
            )
            .await
            .unwrap();

        let state = AppState::new(
            Config::default(),
            Arc::new(MemoryStore::new()),
            pool.clone(),
        );
        let app = Router::new()
            .nest("/api/v1/events", router())
            .with_state(state);
        (app, pool)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_register_endpoint_updates_roster() {
        let (app, pool) = test_app().await;

        let response = app
            .oneshot(post_json(
                "/api/v1/events/ev1/register",
                json!({"guardian_id": "g1", "attendee_ids": ["g1", "c1"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["registered_user_ids"], json!(["g1"]));
        assert_eq!(body["registered_child_ids"], json!(["c1"]));

        let events = EventRepository::new(&pool);
        assert_eq!(events.roster_size("ev1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_capacity_conflict_maps_to_409() {
        let (app, _pool) = test_app().await;

        let response = app
            .oneshot(post_json(
                "/api/v1/events/ev2/register",
                json!({"guardian_id": "g1", "attendee_ids": ["g1", "c1"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = body_json(response).await;
        assert_eq!(body["error"], "capacity_exceeded");
    }

    #[tokio::test]
    async fn test_unknown_event_maps_to_404() {
        let (app, _pool) = test_app().await;

        let response = app
            .oneshot(post_json(
                "/api/v1/events/nope/register",
                json!({"guardian_id": "g1", "attendee_ids": ["g1"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unregister_endpoint_round_trip() {
        let (app, pool) = test_app().await;

        let register = app
            .clone()
            .oneshot(post_json(
                "/api/v1/events/ev1/register",
                json!({"guardian_id": "g1", "attendee_ids": ["g1", "c1"]}),
            ))
            .await
            .unwrap();
        assert_eq!(register.status(), StatusCode::OK);

        let response = app
            .oneshot(post_json(
                "/api/v1/events/ev1/unregister",
                json!({"guardian_id": "g1", "attendee_ids": ["c1"]}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["removed_child_ids"], json!(["c1"]));

        let events = EventRepository::new(&pool);
        assert_eq!(events.roster_size("ev1").await.unwrap(), 1);
    }
}
