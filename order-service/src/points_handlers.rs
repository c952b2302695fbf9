use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use common_http_errors::{ApiError, ApiResult};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::{parse_body, AdminGuard, AppState};
use crate::loyalty::{SlabError, SlabTable};
use crate::models::{NewSlab, PointsSlab};

fn slab_rejection(err: SlabError) -> ApiError {
    match err {
        SlabError::Overlap { .. } => ApiError::conflict("slab_overlap", err.to_string()),
        SlabError::Inverted { .. } | SlabError::NegativePoints { .. } => {
            ApiError::bad_request("slab_invalid", err.to_string())
        }
    }
}

/// `GET /points`, ordered by lower bound.
pub async fn list_slabs(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let mut slabs = state.store.point_slabs().await?;
    slabs.sort_by_key(|s| (s.lower, s.upper));
    Ok(Json(json!({ "status": true, "data": slabs })))
}

/// `POST /points`
pub async fn create_slab(
    State(state): State<AppState>,
    _admin: AdminGuard,
    payload: Result<Json<NewSlab>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let new = parse_body(payload)?;
    let candidate = PointsSlab {
        id: Uuid::new_v4(),
        lower: new.lower,
        upper: new.upper,
        loyalty_points: new.loyalty_points,
    };
    let table = SlabTable::new(state.store.point_slabs().await?).map_err(|err| {
        warn!(error = %err, "stored slab table is inconsistent");
        ApiError::internal(err)
    })?;
    table.check_insert(&candidate).map_err(slab_rejection)?;

    let slab = state.store.insert_slab(candidate).await?;
    info!(id = %slab.id, lower = %slab.lower, upper = %slab.upper, points = slab.loyalty_points, "slab created");
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": true, "message": "Points slab created successfully", "data": slab })),
    ))
}

/// `DELETE /points/:id`
pub async fn delete_slab(
    State(state): State<AppState>,
    _admin: AdminGuard,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    if !state.store.delete_slab(id).await? {
        return Err(ApiError::not_found("slab_not_found", "Points slab not found"));
    }
    Ok(Json(json!({ "status": true, "message": "Points slab deleted successfully" })))
}
