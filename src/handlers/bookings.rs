use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

/// GET /bookings/:id: snapshot of one saga, including its transition
/// history and any pending reconciliation entries.
pub async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let saga = state.coordinator.booking(id).await?;
    Ok(Json(saga))
}
