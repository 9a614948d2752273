pub mod auth;
pub mod capsules;
pub mod error;
pub mod events;
pub mod extract;
pub mod middleware;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use chronos_db::Database;
use chronos_gateway::dispatcher::Dispatcher;
use chronos_registry::{Clock, Registry};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub registry: Arc<Registry>,
    pub dispatcher: Dispatcher,
    pub clock: Arc<dyn Clock>,
    pub jwt_secret: String,
}

/// Wire a registry over `db` that publishes every committed event to
/// `dispatcher`.
pub fn build_state(
    db: Arc<Database>,
    dispatcher: Dispatcher,
    clock: Arc<dyn Clock>,
    jwt_secret: String,
) -> AppState {
    let registry = Arc::new(Registry::new(db.clone(), Arc::new(dispatcher.clone())));
    Arc::new(AppStateInner {
        db,
        registry,
        dispatcher,
        clock,
        jwt_secret,
    })
}

/// All REST routes. The WebSocket gateway is mounted by the server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/capsules/total", get(capsules::get_total_capsules))
        .route("/capsules/{id}", get(capsules::get_capsule_info))
        .route("/capsules/{id}/revealable", get(capsules::can_reveal_capsule))
        .route("/users/{owner}/capsules", get(capsules::get_user_capsules))
        .route("/events", get(events::list_events))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/capsules", post(capsules::create_capsule))
        .route("/capsules/{id}/reveal", post(capsules::reveal_capsule))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
