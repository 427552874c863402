//! Object counting endpoints.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Query, State};
use common::{ObjectClass, ObjectCount};
use counter::CountResponse;
use serde::{Deserialize, Serialize};

use super::{AppState, ImageUpload};
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CountsQuery {
    /// Comma-separated object classes; all classes when absent.
    pub classes: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct CountObjectsResponse {
    pub current_objects: BTreeMap<String, u64>,
    pub total_objects: BTreeMap<String, u64>,
}

impl From<CountResponse> for CountObjectsResponse {
    fn from(response: CountResponse) -> Self {
        Self {
            current_objects: response
                .current_objects
                .iter()
                .map(|(class, count)| (class.to_string(), count))
                .collect(),
            total_objects: to_map(response.total_objects),
        }
    }
}

fn to_map(counts: Vec<ObjectCount>) -> BTreeMap<String, u64> {
    counts
        .into_iter()
        .map(|c| (c.object_class.into_inner(), c.count))
        .collect()
}

fn parse_classes(raw: &str) -> Result<BTreeSet<ObjectClass>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            ObjectClass::new(s).map_err(|e| ApiError::BadRequest(format!("Invalid class: {e}")))
        })
        .collect()
}

// -- Handlers --

/// POST /object-count — detect, count and persist the objects in an image.
#[tracing::instrument(skip(state, multipart))]
pub async fn count(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<CountObjectsResponse>, ApiError> {
    let upload = ImageUpload::from_multipart(multipart).await?;
    tracing::debug!(
        filename = upload.filename.as_deref(),
        bytes = upload.image.len(),
        threshold = upload.threshold,
        "image received"
    );

    let response = state
        .count_objects
        .execute(&upload.image, upload.threshold)
        .await?;

    Ok(Json(response.into()))
}

/// GET /object-count — read the cumulative counts, optionally filtered by
/// `?classes=cat,dog`. Classes never counted are omitted.
#[tracing::instrument(skip(state))]
pub async fn totals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CountsQuery>,
) -> Result<Json<BTreeMap<String, u64>>, ApiError> {
    let filter = query.classes.as_deref().map(parse_classes).transpose()?;

    let counts = state
        .count_objects
        .repository()
        .read_values(filter.as_ref())
        .await?;

    Ok(Json(to_map(counts)))
}
