use axum::{Json, extract::State, response::IntoResponse};
use serde::Deserialize;

use crate::AppState;
use crate::error::{ApiError, blocking};
use crate::extract::ApiQuery;

const MAX_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct EventQuery {
    /// Return events with a sequence number strictly greater than this.
    #[serde(default)]
    pub after: u64,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

/// GET /events: replay the durable event log, oldest first.
pub async fn list_events(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EventQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = query.limit.min(MAX_LIMIT);
    let events = blocking(move || state.registry.events_after(query.after, limit)).await?;
    Ok(Json(events))
}
