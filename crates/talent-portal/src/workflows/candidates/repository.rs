use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationPayload, Candidate, CandidateId, Invite, InviteId, InviteStatus, MailStatus,
};

/// Fields written when a check-in link is dispatched.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckinDispatch {
    pub checkin_token_hash: String,
    pub checkin_sent_at: DateTime<Utc>,
    pub interview_start_time: DateTime<Utc>,
}

/// Storage abstraction for invite rows.
///
/// `advance_status`, `withdraw_submission`, `record_checkin_dispatch` and `mark_arrived` are
/// conditional updates:
/// each must check the current state and write the new one as a single atomic step, and
/// report whether the write happened.
pub trait InviteRepository: Send + Sync {
    fn insert(&self, invite: Invite) -> Result<Invite, RepositoryError>;
    fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Invite>, RepositoryError>;
    fn find_by_checkin_token_hash(
        &self,
        checkin_token_hash: &str,
    ) -> Result<Option<Invite>, RepositoryError>;
    /// Most recently sent invite for the candidate.
    fn latest_for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Option<Invite>, RepositoryError>;
    /// Move `status` to `next` only if the stored status precedes it, stamping the matching
    /// timestamp with `at`.
    fn advance_status(
        &self,
        id: &InviteId,
        next: InviteStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
    /// Roll a `submitted` invite back to `restore` with the given open stamp, clearing
    /// `submitted_at`. Used when the application payload could not be stored; `false` if the
    /// invite is not currently submitted.
    fn withdraw_submission(
        &self,
        id: &InviteId,
        restore: InviteStatus,
        opened_at: Option<DateTime<Utc>>,
    ) -> Result<bool, RepositoryError>;
    /// Replace the check-in token and schedule, leaving the record `pending` with mail
    /// `unsent`. Refused (returns `false`) once the candidate has arrived.
    fn record_checkin_dispatch(
        &self,
        id: &InviteId,
        dispatch: CheckinDispatch,
    ) -> Result<bool, RepositoryError>;
    fn set_checkin_mail_status(
        &self,
        id: &InviteId,
        status: MailStatus,
    ) -> Result<(), RepositoryError>;
    /// Flip the check-in from `pending` to `arrived`; `false` if it was not pending.
    fn mark_arrived(&self, id: &InviteId, at: DateTime<Utc>) -> Result<bool, RepositoryError>;
}

/// Read-only view over the candidate records owned elsewhere in the portal.
pub trait CandidateDirectory: Send + Sync {
    fn fetch(&self, id: &CandidateId) -> Result<Option<Candidate>, RepositoryError>;
}

/// Destination for accepted application payloads. `save` is insert-only per invite.
pub trait ApplicationStore: Send + Sync {
    fn save(&self, invite_id: &InviteId, payload: ApplicationPayload)
        -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
