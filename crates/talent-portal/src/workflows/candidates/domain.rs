use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identifier wrapper for issued invites.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InviteId(pub String);

impl InviteId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

/// Reference to a candidate owned by the candidate directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(pub String);

/// Reference to the job posting an invite applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

/// Read-only candidate summary supplied by the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub email: String,
}

/// Application progress of an invite. Ordering follows the only permitted direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InviteStatus {
    Sent,
    Opened,
    Submitted,
}

impl InviteStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InviteStatus::Sent => "sent",
            InviteStatus::Opened => "opened",
            InviteStatus::Submitted => "submitted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckinStatus {
    Pending,
    Arrived,
}

impl CheckinStatus {
    pub const fn label(self) -> &'static str {
        match self {
            CheckinStatus::Pending => "pending",
            CheckinStatus::Arrived => "arrived",
        }
    }
}

/// Delivery state of the most recent check-in email.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailStatus {
    Unsent,
    Sent,
    Failed,
}

/// Interview time exactly as HR entered it: free text or an epoch number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleValue {
    Epoch(i64),
    Text(String),
}

impl From<&str> for ScheduleValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Free-form invite metadata. Fields this service does not know about are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interview_date_time: Option<ScheduleValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_via: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Check-in lifecycle fields. They share the invite row but are written only by the
/// check-in workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinRecord {
    pub checkin_token_hash: String,
    pub checkin_sent_at: DateTime<Utc>,
    pub checkin_mail_status: MailStatus,
    pub interview_start_time: DateTime<Utc>,
    pub checkin_status: CheckinStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
}

/// One offer, to one candidate, for one job. `token_hash` is the only trace of the bearer
/// token that is ever stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub id: InviteId,
    pub candidate_id: CandidateId,
    pub job_id: JobId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub status: InviteStatus,
    pub sent_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub metadata: InviteMetadata,
    pub checkin: Option<CheckinRecord>,
}

impl Invite {
    /// Expiry is strict: the invite is still usable at exactly `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn has_arrived(&self) -> bool {
        self.checkin
            .as_ref()
            .is_some_and(|record| record.checkin_status == CheckinStatus::Arrived)
    }
}

/// Application payload accepted on submission. Stored opaquely by the application store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationPayload(pub Value);

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}
