use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use futures::future;
use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::{IntoParams, ToSchema};

use crate::errors::ServiceError;
use crate::handlers::AppState;

/// The scheduling API rejects availability windows longer than this.
const MAX_WINDOW_DAYS: i64 = 7;

/// The scheduling API also rejects start times in the past; clamped requests
/// begin this far in the future.
const PAST_START_GRACE_MINUTES: i64 = 5;

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    /// Range start, RFC 3339 or `YYYY-MM-DD`
    pub start_date: Option<String>,
    /// Range end, RFC 3339 or `YYYY-MM-DD`
    pub end_date: Option<String>,
    /// `free` selects the free-consultation event type; anything else the paid one
    #[serde(rename = "type")]
    pub consultation_type: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailabilityResponse {
    /// Slot payloads exactly as the scheduling service returned them
    #[schema(value_type = Vec<Object>)]
    pub collection: Vec<serde_json::Value>,
}

/// List available consultation slots in a date range.
///
/// The range is split into windows of at most seven days and the scheduling
/// service is queried for all windows in parallel. A window that fails is
/// logged and contributes no slots; the remaining windows still answer.
#[utoipa::path(
    get,
    path = "/availability",
    params(AvailabilityQuery),
    responses(
        (status = 200, description = "Available slots", body = AvailabilityResponse),
        (status = 400, description = "Missing or malformed date range", body = crate::errors::ErrorResponse),
        (status = 500, description = "Scheduling service unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "Availability"
)]
pub async fn get_availability(
    State(state): State<AppState>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<AvailabilityResponse>, ServiceError> {
    let (Some(raw_start), Some(raw_end)) = (query.start_date.as_deref(), query.end_date.as_deref())
    else {
        return Err(ServiceError::validation("startDate and endDate are required"));
    };

    let requested_start = parse_query_date(raw_start)
        .ok_or_else(|| ServiceError::validation("startDate must be an ISO date or datetime"))?;
    let end = parse_query_date(raw_end)
        .ok_or_else(|| ServiceError::validation("endDate must be an ISO date or datetime"))?;

    let start = effective_start(requested_start, Utc::now());

    let event_type = if query.consultation_type.as_deref() == Some("free") {
        &state.config.scheduling.free_event_type
    } else {
        &state.config.scheduling.paid_event_type
    };

    let user_uri = state.services.calendly.get_user_uri().await?;

    let windows = chunk_windows(start, end);
    let lookups = windows.iter().map(|&(window_start, window_end)| {
        let calendly = state.services.calendly.clone();
        let user_uri = user_uri.clone();
        let event_type = event_type.clone();
        async move {
            calendly
                .get_event_availability(&user_uri, &event_type, window_start, window_end)
                .await
        }
    });
    let results = future::join_all(lookups).await;

    let mut collection = Vec::new();
    for (&(window_start, window_end), result) in windows.iter().zip(results) {
        match result {
            Ok(mut slots) => collection.append(&mut slots),
            Err(error) => {
                warn!(
                    %error,
                    window_start = %window_start,
                    window_end = %window_end,
                    "availability window failed, dropping its slots"
                );
            }
        }
    }

    Ok(Json(AvailabilityResponse { collection }))
}

fn parse_query_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

fn effective_start(requested: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if requested < now {
        now + Duration::minutes(PAST_START_GRACE_MINUTES)
    } else {
        requested
    }
}

/// Splits `[start, end)` into contiguous, non-overlapping windows of at most
/// [`MAX_WINDOW_DAYS`] days, covering the range exactly.
fn chunk_windows(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let max_span = Duration::days(MAX_WINDOW_DAYS);
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let window_end = (cursor + max_span).min(end);
        windows.push((cursor, window_end));
        cursor = window_end;
    }
    windows
}
