use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use super::domain::{CandidateId, InviteId};

/// Application invite ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InviteEmail {
    pub invite_id: InviteId,
    pub to: String,
    pub candidate_name: String,
    pub link: String,
    pub expires_at: DateTime<Utc>,
    pub message: Option<String>,
}

/// Check-in link for an interview that has a resolved start time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckinEmail {
    pub invite_id: InviteId,
    pub to: String,
    pub candidate_name: String,
    pub link: String,
    pub interview_start_time: DateTime<Utc>,
}

/// Outbound mail hook (SMTP relay, transactional mail API, ...).
pub trait InviteMailer: Send + Sync {
    fn send_invite(&self, email: &InviteEmail) -> Result<(), MailError>;
    fn send_checkin(&self, email: &CheckinEmail) -> Result<(), MailError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transport(String),
}

/// Emitted once per successful check-in, after the arrival has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalEvent {
    pub candidate_id: CandidateId,
    pub display_name: String,
    pub checked_in_at: String,
}

impl ArrivalEvent {
    pub fn new(candidate_id: CandidateId, display_name: String, at: DateTime<Utc>) -> Self {
        Self {
            candidate_id,
            display_name,
            checked_in_at: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Port for whoever wants to hear about arrivals (live dashboards, queues, logs).
pub trait ArrivalNotifier: Send + Sync {
    fn notify(&self, event: ArrivalEvent) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("arrival feed unavailable: {0}")]
    Unavailable(String),
}

/// Mailer that only writes a log line per message. Links are not logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingMailer;

impl InviteMailer for LoggingMailer {
    fn send_invite(&self, email: &InviteEmail) -> Result<(), MailError> {
        info!(
            invite_id = %email.invite_id.0,
            to = %email.to,
            expires_at = %email.expires_at,
            "invite email queued"
        );
        Ok(())
    }

    fn send_checkin(&self, email: &CheckinEmail) -> Result<(), MailError> {
        info!(
            invite_id = %email.invite_id.0,
            to = %email.to,
            interview = %email.interview_start_time,
            "check-in email queued"
        );
        Ok(())
    }
}

const ARRIVAL_CHANNEL_CAPACITY: usize = 64;

/// In-process fan-out over a tokio broadcast channel. Having no subscribers is not an error.
#[derive(Debug, Clone)]
pub struct BroadcastArrivalNotifier {
    sender: broadcast::Sender<ArrivalEvent>,
}

impl BroadcastArrivalNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(ARRIVAL_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArrivalEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastArrivalNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrivalNotifier for BroadcastArrivalNotifier {
    fn notify(&self, event: ArrivalEvent) -> Result<(), NotifyError> {
        // send only fails when nobody is listening
        let _ = self.sender.send(event);
        Ok(())
    }
}

/// Log sink adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingArrivalNotifier;

impl ArrivalNotifier for TracingArrivalNotifier {
    fn notify(&self, event: ArrivalEvent) -> Result<(), NotifyError> {
        info!(
            candidate_id = %event.candidate_id.0,
            name = %event.display_name,
            at = %event.checked_in_at,
            "candidate arrived"
        );
        Ok(())
    }
}
