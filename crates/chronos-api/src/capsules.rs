use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};

use chronos_registry::CallContext;
use chronos_types::api::{
    CanRevealResponse, Claims, CreateCapsuleRequest, CreateCapsuleResponse, RevealCapsuleResponse,
    TotalCapsulesResponse, UserCapsulesResponse,
};
use chronos_types::models::{CapsuleId, Identity};

use crate::AppState;
use crate::error::{ApiError, blocking};
use crate::extract::{ApiJson, ApiPath};

fn caller_context(state: &AppState, claims: &Claims) -> CallContext {
    CallContext::at(state.clock.as_ref(), Identity::from(claims.sub))
}

/// POST /capsules
pub async fn create_capsule(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ApiJson(req): ApiJson<CreateCapsuleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = caller_context(&state, &claims);
    let id = blocking(move || {
        state
            .registry
            .create_capsule(&ctx, &req.message, req.unlock_time)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(CreateCapsuleResponse { id })))
}

/// POST /capsules/{id}/reveal
pub async fn reveal_capsule(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CapsuleId>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let ctx = caller_context(&state, &claims);
    let message = blocking(move || state.registry.reveal_capsule(&ctx, id)).await?;

    Ok(Json(RevealCapsuleResponse { id, message }))
}

/// GET /capsules/{id}
pub async fn get_capsule_info(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CapsuleId>,
) -> Result<impl IntoResponse, ApiError> {
    let now = state.clock.now();
    let info = blocking(move || state.registry.get_capsule_info(now, id)).await?;
    Ok(Json(info))
}

/// GET /capsules/{id}/revealable
pub async fn can_reveal_capsule(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CapsuleId>,
) -> Result<impl IntoResponse, ApiError> {
    let now = state.clock.now();
    let can_reveal = blocking(move || state.registry.can_reveal_capsule(now, id)).await?;
    Ok(Json(CanRevealResponse { id, can_reveal }))
}

/// GET /capsules/total
pub async fn get_total_capsules(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let total = blocking(move || state.registry.get_total_capsules()).await?;
    Ok(Json(TotalCapsulesResponse { total }))
}

/// GET /users/{owner}/capsules
pub async fn get_user_capsules(
    State(state): State<AppState>,
    ApiPath(owner): ApiPath<String>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = Identity::new(owner);
    let lookup = owner.clone();
    let capsule_ids = blocking(move || state.registry.get_user_capsules(&lookup)).await?;
    Ok(Json(UserCapsulesResponse { owner, capsule_ids }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Router,
        body::Body,
        http::{Request, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use chronos_db::Database;
    use chronos_gateway::dispatcher::Dispatcher;
    use chronos_registry::{Clock, ManualClock};
    use chronos_types::api::RegisterResponse;

    use super::*;

    const NOW: u64 = 1_700_000_000;

    struct TestApp {
        router: Router,
        clock: Arc<ManualClock>,
        dispatcher: Dispatcher,
    }

    fn app() -> TestApp {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let clock = Arc::new(ManualClock::new(NOW));
        let dispatcher = Dispatcher::new();
        let state =
            crate::build_state(db, dispatcher.clone(), clock.clone(), "test-secret".into());
        TestApp {
            router: crate::router(state),
            clock,
            dispatcher,
        }
    }

    async fn call(
        router: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(router: &Router, username: &str) -> RegisterResponse {
        let (status, body) = call(
            router,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": username, "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        serde_json::from_value(body).unwrap()
    }

    #[tokio::test]
    async fn capsule_lifecycle_over_http() {
        let app = app();
        let alice = register(&app.router, "alice").await;
        let mut live = app.dispatcher.subscribe();

        let (status, body) = call(
            &app.router,
            "POST",
            "/capsules",
            Some(alice.token.as_str()),
            Some(json!({ "message": "hi", "unlock_time": NOW + 100 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], 0);

        let (_, body) = call(&app.router, "GET", "/capsules/0/revealable", None, None).await;
        assert_eq!(body["can_reveal"], false);

        let (status, body) = call(
            &app.router,
            "POST",
            "/capsules/0/reveal",
            Some(alice.token.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "StillLocked");

        app.clock.advance(100);
        let (_, body) = call(&app.router, "GET", "/capsules/0/revealable", None, None).await;
        assert_eq!(body["can_reveal"], true);

        let (status, body) = call(
            &app.router,
            "POST",
            "/capsules/0/reveal",
            Some(alice.token.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "hi");

        let (status, body) = call(
            &app.router,
            "POST",
            "/capsules/0/reveal",
            Some(alice.token.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "AlreadyRevealed");

        let (status, body) = call(&app.router, "GET", "/capsules/0", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["owner"], alice.user_id.to_string());
        assert_eq!(body["is_revealed"], true);
        assert_eq!(body["can_be_revealed"], false);
        assert!(body.get("message").is_none());

        assert_eq!(live.recv().await.unwrap().event.kind(), "CapsuleCreated");
        assert_eq!(live.recv().await.unwrap().event.kind(), "CapsuleRevealed");
    }

    #[tokio::test]
    async fn mutations_require_a_token() {
        let app = app();
        let (status, body) = call(
            &app.router,
            "POST",
            "/capsules",
            None,
            Some(json!({ "message": "hi", "unlock_time": NOW + 100 })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "Unauthorized");

        let (status, _) =
            call(&app.router, "POST", "/capsules/0/reveal", Some("not-a-jwt"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn validation_errors_are_bad_requests() {
        let app = app();
        let alice = register(&app.router, "alice").await;

        for (message, unlock_time, code) in [
            ("hi".to_string(), NOW, "InvalidUnlockTime"),
            (String::new(), NOW + 1, "EmptyMessage"),
            ("x".repeat(1001), NOW + 1, "MessageTooLong"),
        ] {
            let (status, body) = call(
                &app.router,
                "POST",
                "/capsules",
                Some(alice.token.as_str()),
                Some(json!({ "message": message, "unlock_time": unlock_time })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["error"]["code"], code);
        }

        let (_, body) = call(&app.router, "GET", "/capsules/total", None, None).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test]
    async fn owners_see_only_their_capsules() {
        let app = app();
        let alice = register(&app.router, "alice").await;
        let bob = register(&app.router, "bob").await;

        for token in [alice.token.as_str(), bob.token.as_str()] {
            let (status, _) = call(
                &app.router,
                "POST",
                "/capsules",
                Some(token),
                Some(json!({ "message": "mine", "unlock_time": NOW + 5 })),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let uri = format!("/users/{}/capsules", alice.user_id);
        let (_, body) = call(&app.router, "GET", &uri, None, None).await;
        assert_eq!(body["capsule_ids"], json!([0]));

        let uri = format!("/users/{}/capsules", bob.user_id);
        let (_, body) = call(&app.router, "GET", &uri, None, None).await;
        assert_eq!(body["capsule_ids"], json!([1]));

        let (_, body) = call(&app.router, "GET", "/users/nobody/capsules", None, None).await;
        assert_eq!(body["capsule_ids"], json!([]));

        let (_, body) = call(&app.router, "GET", "/capsules/total", None, None).await;
        assert_eq!(body["total"], 2);

        app.clock.advance(5);
        let (status, body) = call(
            &app.router,
            "POST",
            "/capsules/0/reveal",
            Some(bob.token.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "NotOwner");
    }

    #[tokio::test]
    async fn unknown_capsule_is_not_found() {
        let app = app();
        let (status, body) = call(&app.router, "GET", "/capsules/42", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "CapsuleNotFound");

        let (status, _) = call(&app.router, "GET", "/capsules/42/revealable", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_requests_use_the_error_envelope() {
        let app = app();
        let alice = register(&app.router, "alice").await;

        let (status, body) = call(&app.router, "GET", "/capsules/abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "InvalidInput");

        let (status, body) = call(
            &app.router,
            "POST",
            "/capsules/-1/reveal",
            Some(alice.token.as_str()),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "InvalidInput");

        let (status, body) = call(
            &app.router,
            "POST",
            "/capsules",
            Some(alice.token.as_str()),
            Some(json!({ "message": "hi", "unlock_time": NOW + 1, "extra": true })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "InvalidInput");

        let (status, body) = call(
            &app.router,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "alice" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "InvalidInput");

        let (_, body) = call(&app.router, "GET", "/capsules/total", None, None).await;
        assert_eq!(body["total"], 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_duplicate_registrations_conflict() {
        let app = app();

        let attempts: Vec<_> = (0..4)
            .map(|_| {
                let router = app.router.clone();
                tokio::spawn(async move {
                    call(
                        &router,
                        "POST",
                        "/auth/register",
                        None,
                        Some(json!({ "username": "alice", "password": "correct horse" })),
                    )
                    .await
                })
            })
            .collect();

        let mut created = 0;
        for attempt in attempts {
            let (status, body) = attempt.await.unwrap();
            if status == StatusCode::CREATED {
                created += 1;
            } else {
                assert_eq!(status, StatusCode::CONFLICT);
                assert_eq!(body["error"]["code"], "UsernameTaken");
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn login_checks_password() {
        let app = app();
        let alice = register(&app.router, "alice").await;

        let (status, body) = call(
            &app.router,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "correct horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user_id"], alice.user_id.to_string());

        let (status, _) = call(
            &app.router,
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong horse" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = call(
            &app.router,
            "POST",
            "/auth/register",
            None,
            Some(json!({ "username": "alice", "password": "another one" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "UsernameTaken");

        // The clock handed to the app is the one the registry reads.
        assert_eq!(app.clock.now(), NOW);
    }
}
