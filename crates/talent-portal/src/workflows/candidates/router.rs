use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::checkin::{CheckinError, CheckinRejection, CheckinService};
use super::domain::{ApplicationPayload, CandidateId, GeoPoint, JobId, ScheduleValue};
use super::invites::{BulkInviteRequest, ExpiryPolicy, InviteError, InviteRejection, InviteService};

#[derive(Clone)]
pub(crate) struct CandidateState {
    invites: Arc<InviteService>,
    checkin: Arc<CheckinService>,
}

/// Router builder exposing the invite and check-in endpoints.
pub fn candidate_router(invites: Arc<InviteService>, checkin: Arc<CheckinService>) -> Router {
    Router::new()
        .route("/invites/bulk", post(bulk_invite_handler))
        .route("/invites/:token/validate", get(validate_handler))
        .route("/invites/:token/submit", post(submit_handler))
        .route("/checkin/send/:candidate_id", post(send_checkin_handler))
        .route("/checkin/confirm/:token", get(confirm_checkin_handler))
        .with_state(CandidateState { invites, checkin })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct BulkInviteBody {
    candidate_ids: Vec<CandidateId>,
    job_id: JobId,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    expiry_days: Option<u32>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    interview_date_time: Option<ScheduleValue>,
}

/// Raw coordinates as they appear in the confirmation link query string.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ConfirmQuery {
    lat: Option<String>,
    lng: Option<String>,
}

impl ConfirmQuery {
    /// Missing or blank values mean no position; values that are present but not numbers
    /// become NaN so coordinate validation rejects them.
    fn position(&self) -> Option<GeoPoint> {
        let lat = self.lat.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let lng = self.lng.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        Some(GeoPoint::new(
            lat.parse().unwrap_or(f64::NAN),
            lng.parse().unwrap_or(f64::NAN),
        ))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckinSuccess<T> {
    status_code: &'static str,
    #[serde(flatten)]
    body: T,
}

pub(crate) async fn bulk_invite_handler(
    State(state): State<CandidateState>,
    axum::Json(body): axum::Json<BulkInviteBody>,
) -> Response {
    if body.candidate_ids.is_empty() {
        let payload = json!({
            "code": "invalid_request",
            "error": "candidateIds must not be empty",
        });
        return (StatusCode::BAD_REQUEST, axum::Json(payload)).into_response();
    }

    let request = BulkInviteRequest {
        candidate_ids: body.candidate_ids,
        job_id: body.job_id,
        expiry: ExpiryPolicy::from_parts(body.expires_at, body.expiry_days),
        message: body.message,
        interview_date_time: body.interview_date_time,
    };
    match state.invites.issue_bulk(request) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(err) => invite_error_response(err),
    }
}

pub(crate) async fn validate_handler(
    State(state): State<CandidateState>,
    Path(token): Path<String>,
) -> Response {
    match state.invites.validate(&token) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => invite_error_response(err),
    }
}

pub(crate) async fn submit_handler(
    State(state): State<CandidateState>,
    Path(token): Path<String>,
    axum::Json(payload): axum::Json<ApplicationPayload>,
) -> Response {
    match state.invites.submit(&token, payload) {
        Ok(invite) => {
            let payload = json!({
                "code": "submitted",
                "inviteId": invite.id,
                "status": invite.status.label(),
                "submittedAt": invite.submitted_at,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => invite_error_response(err),
    }
}

pub(crate) async fn send_checkin_handler(
    State(state): State<CandidateState>,
    Path(candidate_id): Path<String>,
) -> Response {
    match state.checkin.dispatch(&CandidateId(candidate_id)) {
        Ok(dispatched) => {
            let payload = CheckinSuccess {
                status_code: "success",
                body: dispatched,
            };
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => checkin_error_response(err),
    }
}

pub(crate) async fn confirm_checkin_handler(
    State(state): State<CandidateState>,
    Path(token): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> Response {
    match state.checkin.confirm(&token, query.position()) {
        Ok(confirmation) => {
            let payload = CheckinSuccess {
                status_code: "success",
                body: confirmation,
            };
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(err) => checkin_error_response(err),
    }
}

fn invite_error_response(err: InviteError) -> Response {
    let status = match err.rejection() {
        Some(InviteRejection::NotFound) => StatusCode::NOT_FOUND,
        Some(InviteRejection::Expired) => StatusCode::GONE,
        Some(InviteRejection::AlreadySubmitted) => StatusCode::CONFLICT,
        Some(InviteRejection::InvalidExpiry) => StatusCode::BAD_REQUEST,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let payload = match err.rejection() {
        Some(rejection) => json!({
            "code": rejection.code(),
            "error": rejection.to_string(),
        }),
        None => json!({
            "code": "server_error",
            "error": "invite store unavailable",
        }),
    };
    (status, axum::Json(payload)).into_response()
}

pub(crate) fn checkin_status(err: &CheckinError) -> StatusCode {
    match err {
        CheckinError::Rejected(rejection) => match rejection {
            CheckinRejection::NoInvite
            | CheckinRejection::CandidateNotFound
            | CheckinRejection::NotFound => StatusCode::NOT_FOUND,
            CheckinRejection::NoInterviewTime | CheckinRejection::BadSchedule(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CheckinRejection::AlreadyCheckedIn => StatusCode::CONFLICT,
            CheckinRejection::TooEarly { .. }
            | CheckinRejection::TooLate { .. }
            | CheckinRejection::WrongLocation(_) => StatusCode::FORBIDDEN,
            CheckinRejection::LocationRequired | CheckinRejection::InvalidLocation => {
                StatusCode::BAD_REQUEST
            }
        },
        CheckinError::ScheduleUnparseable(_) | CheckinError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn checkin_error_response(err: CheckinError) -> Response {
    let status = checkin_status(&err);
    let payload = match &err {
        CheckinError::Rejected(CheckinRejection::WrongLocation(check)) => json!({
            "statusCode": err.code(),
            "error": err.to_string(),
            "details": check,
        }),
        CheckinError::Rejected(
            CheckinRejection::TooEarly {
                scheduled,
                window_minutes,
                ..
            }
            | CheckinRejection::TooLate {
                scheduled,
                window_minutes,
                ..
            },
        ) => json!({
            "statusCode": err.code(),
            "error": err.to_string(),
            "details": {
                "scheduledTime": scheduled,
                "windowMinutes": window_minutes,
            },
        }),
        CheckinError::Rejected(_) => json!({
            "statusCode": err.code(),
            "error": err.to_string(),
        }),
        CheckinError::ScheduleUnparseable(_) | CheckinError::Repository(_) => json!({
            "statusCode": err.code(),
            "error": "check-in could not be processed",
        }),
    };
    (status, axum::Json(payload)).into_response()
}
