//! Mutex-backed adapters for single-process deployments, the CLI demo, and tests.
//!
//! Each conditional update holds the map lock across its read-check-write sequence, which is
//! what gives concurrent confirmations of one token a single winner.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationPayload, Candidate, CandidateId, CheckinRecord, CheckinStatus, Invite, InviteId,
    InviteStatus, MailStatus,
};
use super::repository::{
    ApplicationStore, CandidateDirectory, CheckinDispatch, InviteRepository, RepositoryError,
};

#[derive(Debug, Default, Clone)]
pub struct InMemoryInviteRepository {
    invites: Arc<Mutex<BTreeMap<InviteId, Invite>>>,
}

impl InMemoryInviteRepository {
    pub fn snapshot(&self) -> Vec<Invite> {
        let guard = self.invites.lock().expect("invite mutex poisoned");
        guard.values().cloned().collect()
    }

    pub fn get(&self, id: &InviteId) -> Option<Invite> {
        let guard = self.invites.lock().expect("invite mutex poisoned");
        guard.get(id).cloned()
    }

    /// Apply `edit` to a stored invite; test fixtures use this to age or corrupt records.
    pub fn modify<F>(&self, id: &InviteId, edit: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut Invite),
    {
        let mut guard = self.invites.lock().expect("invite mutex poisoned");
        let invite = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        edit(invite);
        Ok(())
    }
}

impl InviteRepository for InMemoryInviteRepository {
    fn insert(&self, invite: Invite) -> Result<Invite, RepositoryError> {
        let mut guard = self.invites.lock().expect("invite mutex poisoned");
        let duplicate = guard.contains_key(&invite.id)
            || guard
                .values()
                .any(|existing| existing.token_hash == invite.token_hash);
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(invite.id.clone(), invite.clone());
        Ok(invite)
    }

    fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Invite>, RepositoryError> {
        let guard = self.invites.lock().expect("invite mutex poisoned");
        Ok(guard
            .values()
            .find(|invite| invite.token_hash == token_hash)
            .cloned())
    }

    fn find_by_checkin_token_hash(
        &self,
        checkin_token_hash: &str,
    ) -> Result<Option<Invite>, RepositoryError> {
        let guard = self.invites.lock().expect("invite mutex poisoned");
        Ok(guard
            .values()
            .find(|invite| {
                invite
                    .checkin
                    .as_ref()
                    .is_some_and(|record| record.checkin_token_hash == checkin_token_hash)
            })
            .cloned())
    }

    fn latest_for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Option<Invite>, RepositoryError> {
        let guard = self.invites.lock().expect("invite mutex poisoned");
        Ok(guard
            .values()
            .filter(|invite| &invite.candidate_id == candidate_id)
            .max_by_key(|invite| invite.sent_at)
            .cloned())
    }

    fn advance_status(
        &self,
        id: &InviteId,
        next: InviteStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut guard = self.invites.lock().expect("invite mutex poisoned");
        let invite = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if invite.status >= next {
            return Ok(false);
        }

        invite.status = next;
        match next {
            InviteStatus::Sent => {}
            InviteStatus::Opened => invite.opened_at = Some(at),
            InviteStatus::Submitted => {
                invite.opened_at.get_or_insert(at);
                invite.submitted_at = Some(at);
            }
        }
        Ok(true)
    }

    fn withdraw_submission(
        &self,
        id: &InviteId,
        restore: InviteStatus,
        opened_at: Option<DateTime<Utc>>,
    ) -> Result<bool, RepositoryError> {
        let mut guard = self.invites.lock().expect("invite mutex poisoned");
        let invite = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if invite.status != InviteStatus::Submitted || restore >= InviteStatus::Submitted {
            return Ok(false);
        }

        invite.status = restore;
        invite.opened_at = opened_at;
        invite.submitted_at = None;
        Ok(true)
    }

    fn record_checkin_dispatch(
        &self,
        id: &InviteId,
        dispatch: CheckinDispatch,
    ) -> Result<bool, RepositoryError> {
        let mut guard = self.invites.lock().expect("invite mutex poisoned");
        let invite = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if invite.has_arrived() {
            return Ok(false);
        }

        invite.checkin = Some(CheckinRecord {
            checkin_token_hash: dispatch.checkin_token_hash,
            checkin_sent_at: dispatch.checkin_sent_at,
            checkin_mail_status: MailStatus::Unsent,
            interview_start_time: dispatch.interview_start_time,
            checkin_status: CheckinStatus::Pending,
            checked_in_at: None,
        });
        Ok(true)
    }

    fn set_checkin_mail_status(
        &self,
        id: &InviteId,
        status: MailStatus,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.invites.lock().expect("invite mutex poisoned");
        let record = guard
            .get_mut(id)
            .and_then(|invite| invite.checkin.as_mut())
            .ok_or(RepositoryError::NotFound)?;
        record.checkin_mail_status = status;
        Ok(())
    }

    fn mark_arrived(&self, id: &InviteId, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        let mut guard = self.invites.lock().expect("invite mutex poisoned");
        let record = guard
            .get_mut(id)
            .and_then(|invite| invite.checkin.as_mut())
            .ok_or(RepositoryError::NotFound)?;
        if record.checkin_status != CheckinStatus::Pending {
            return Ok(false);
        }

        record.checkin_status = CheckinStatus::Arrived;
        record.checked_in_at = Some(at);
        Ok(true)
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryCandidateDirectory {
    candidates: Arc<Mutex<HashMap<CandidateId, Candidate>>>,
}

impl InMemoryCandidateDirectory {
    pub fn with_candidates<I>(candidates: I) -> Self
    where
        I: IntoIterator<Item = Candidate>,
    {
        let directory = Self::default();
        for candidate in candidates {
            directory.upsert(candidate);
        }
        directory
    }

    pub fn upsert(&self, candidate: Candidate) {
        let mut guard = self.candidates.lock().expect("directory mutex poisoned");
        guard.insert(candidate.id.clone(), candidate);
    }
}

impl CandidateDirectory for InMemoryCandidateDirectory {
    fn fetch(&self, id: &CandidateId) -> Result<Option<Candidate>, RepositoryError> {
        let guard = self.candidates.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryApplicationStore {
    payloads: Arc<Mutex<HashMap<InviteId, ApplicationPayload>>>,
}

impl InMemoryApplicationStore {
    pub fn get(&self, invite_id: &InviteId) -> Option<ApplicationPayload> {
        let guard = self.payloads.lock().expect("application mutex poisoned");
        guard.get(invite_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.payloads.lock().expect("application mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ApplicationStore for InMemoryApplicationStore {
    fn save(
        &self,
        invite_id: &InviteId,
        payload: ApplicationPayload,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.payloads.lock().expect("application mutex poisoned");
        if guard.contains_key(invite_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(invite_id.clone(), payload);
        Ok(())
    }
}
