use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::domain::{
    ApplicationPayload, Candidate, CandidateId, Invite, InviteId, InviteMetadata, InviteStatus,
    JobId, ScheduleValue,
};
use super::links::LinkBuilder;
use super::notify::{InviteEmail, InviteMailer};
use super::repository::{ApplicationStore, CandidateDirectory, InviteRepository, RepositoryError};
use super::token::{hash_prefix, SecretTokenService};
use crate::config::InviteConfig;

/// How long a newly issued invite stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpiryPolicy {
    /// Use the configured default day count.
    #[default]
    Default,
    Days(u32),
    At(DateTime<Utc>),
}

impl ExpiryPolicy {
    /// Explicit instant wins over a day count; neither means the default.
    pub fn from_parts(expires_at: Option<DateTime<Utc>>, expiry_days: Option<u32>) -> Self {
        match (expires_at, expiry_days) {
            (Some(at), _) => Self::At(at),
            (None, Some(days)) => Self::Days(days),
            (None, None) => Self::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueInvite {
    pub candidate_id: CandidateId,
    pub job_id: JobId,
    pub expiry: ExpiryPolicy,
    pub metadata: InviteMetadata,
}

/// Result of issuing an invite. `token` exists only here; the repository never sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedInvite {
    pub invite: Invite,
    pub token: String,
    pub link: String,
}

/// Invite plus the candidate summary shown on the application landing page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InviteView {
    pub invite_id: InviteId,
    pub status: InviteStatus,
    pub expires_at: DateTime<Utc>,
    pub job_id: JobId,
    pub metadata: InviteMetadata,
    pub candidate: Option<Candidate>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkInviteRequest {
    pub candidate_ids: Vec<CandidateId>,
    pub job_id: JobId,
    pub expiry: ExpiryPolicy,
    pub message: Option<String>,
    pub interview_date_time: Option<ScheduleValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkInviteResult {
    pub candidate_id: CandidateId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_id: Option<InviteId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub email_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkInviteReport {
    pub success: bool,
    pub sent: usize,
    pub failed: usize,
    pub results: Vec<BulkInviteResult>,
}

/// Expected business outcomes that stop an invite operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InviteRejection {
    #[error("invite link is invalid")]
    NotFound,
    #[error("invite link has expired")]
    Expired,
    #[error("application has already been submitted")]
    AlreadySubmitted,
    #[error("invite expiry must be in the future")]
    InvalidExpiry,
}

impl InviteRejection {
    pub const fn code(&self) -> &'static str {
        match self {
            InviteRejection::NotFound => "not_found",
            InviteRejection::Expired => "expired",
            InviteRejection::AlreadySubmitted => "already_submitted",
            InviteRejection::InvalidExpiry => "invalid_expiry",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    #[error(transparent)]
    Rejected(#[from] InviteRejection),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl InviteError {
    pub fn rejection(&self) -> Option<&InviteRejection> {
        match self {
            InviteError::Rejected(rejection) => Some(rejection),
            InviteError::Repository(_) => None,
        }
    }
}

/// Owns the application-invite lifecycle: sent -> opened -> submitted, with expiry as an
/// orthogonal terminal condition.
pub struct InviteService {
    repository: Arc<dyn InviteRepository>,
    directory: Arc<dyn CandidateDirectory>,
    applications: Arc<dyn ApplicationStore>,
    mailer: Arc<dyn InviteMailer>,
    clock: Arc<dyn Clock>,
    tokens: SecretTokenService,
    links: LinkBuilder,
    default_expiry_days: u32,
}

impl InviteService {
    pub fn new(
        repository: Arc<dyn InviteRepository>,
        directory: Arc<dyn CandidateDirectory>,
        applications: Arc<dyn ApplicationStore>,
        mailer: Arc<dyn InviteMailer>,
        clock: Arc<dyn Clock>,
        config: &InviteConfig,
    ) -> Self {
        Self {
            repository,
            directory,
            applications,
            mailer,
            clock,
            tokens: SecretTokenService,
            links: LinkBuilder::new(config.public_base_url.clone()),
            default_expiry_days: config.default_expiry_days,
        }
    }

    /// Persist a new `sent` invite and hand back the raw token for the email link.
    pub fn issue(&self, request: IssueInvite) -> Result<IssuedInvite, InviteError> {
        let now = self.clock.now();
        let expires_at = self.resolve_expiry(request.expiry, now)?;
        let issued = self.tokens.issue();

        let invite = Invite {
            id: InviteId::generate(),
            candidate_id: request.candidate_id,
            job_id: request.job_id,
            token_hash: issued.token_hash,
            expires_at,
            status: InviteStatus::Sent,
            sent_at: now,
            opened_at: None,
            submitted_at: None,
            metadata: request.metadata,
            checkin: None,
        };

        let invite = self.repository.insert(invite).inspect_err(|err| {
            error!(error = %err, "failed to store invite");
        })?;
        info!(
            invite_id = %invite.id.0,
            candidate_id = %invite.candidate_id.0,
            token = hash_prefix(&invite.token_hash),
            %expires_at,
            "invite issued"
        );

        let link = self.links.application(&issued.token);
        Ok(IssuedInvite {
            invite,
            token: issued.token,
            link,
        })
    }

    /// Resolve a token to its invite, marking a `sent` invite as `opened`.
    pub fn validate(&self, token: &str) -> Result<InviteView, InviteError> {
        let now = self.clock.now();
        let mut invite = self.lookup(token)?;

        if invite.is_expired(now) {
            debug!(invite_id = %invite.id.0, "rejected expired invite");
            return Err(InviteRejection::Expired.into());
        }

        if invite.status == InviteStatus::Sent {
            if self
                .repository
                .advance_status(&invite.id, InviteStatus::Opened, now)?
            {
                info!(invite_id = %invite.id.0, "invite opened");
                invite.status = InviteStatus::Opened;
                invite.opened_at = Some(now);
            } else {
                // Another request moved it first.
                invite = self.lookup(token)?;
            }
        }

        let candidate = self.directory.fetch(&invite.candidate_id)?;
        Ok(InviteView {
            invite_id: invite.id,
            status: invite.status,
            expires_at: invite.expires_at,
            job_id: invite.job_id,
            metadata: invite.metadata,
            candidate,
        })
    }

    /// Accept the candidate's application. Checks run existence, then the submitted
    /// conflict, then expiry, so a candidate who already applied hears that even after the
    /// link expires. The status moves before the payload is stored and is withdrawn again if
    /// the store fails, so an invite is never submitted without its application.
    pub fn submit(&self, token: &str, payload: ApplicationPayload) -> Result<Invite, InviteError> {
        let now = self.clock.now();
        let invite = self.lookup(token)?;

        if invite.status == InviteStatus::Submitted {
            debug!(invite_id = %invite.id.0, "rejected repeat submission");
            return Err(InviteRejection::AlreadySubmitted.into());
        }
        if invite.is_expired(now) {
            debug!(invite_id = %invite.id.0, "rejected submission on expired invite");
            return Err(InviteRejection::Expired.into());
        }

        if !self
            .repository
            .advance_status(&invite.id, InviteStatus::Submitted, now)?
        {
            return Err(InviteRejection::AlreadySubmitted.into());
        }

        match self.applications.save(&invite.id, payload) {
            Ok(()) => {}
            Err(RepositoryError::Conflict) => return Err(InviteRejection::AlreadySubmitted.into()),
            Err(err) => {
                error!(invite_id = %invite.id.0, error = %err, "failed to store application");
                self.withdraw_submission(&invite);
                return Err(err.into());
            }
        }
        info!(
            invite_id = %invite.id.0,
            candidate_id = %invite.candidate_id.0,
            "application submitted"
        );

        Ok(Invite {
            status: InviteStatus::Submitted,
            opened_at: invite.opened_at.or(Some(now)),
            submitted_at: Some(now),
            ..invite
        })
    }

    /// Issue and email one invite per candidate. Failures are reported per candidate; an
    /// email failure leaves the issued invite in place. Every invite in the run shares one
    /// expiry instant.
    pub fn issue_bulk(&self, request: BulkInviteRequest) -> Result<BulkInviteReport, InviteError> {
        let BulkInviteRequest {
            candidate_ids,
            job_id,
            expiry,
            message,
            interview_date_time,
        } = request;
        let expiry = ExpiryPolicy::At(self.resolve_expiry(expiry, self.clock.now())?);

        let metadata = InviteMetadata {
            message: message.clone(),
            interview_date_time,
            sent_via: Some("bulk".to_string()),
            job_id: Some(job_id.clone()),
            ..InviteMetadata::default()
        };

        let results: Vec<BulkInviteResult> = candidate_ids
            .into_iter()
            .map(|candidate_id| {
                self.issue_and_mail(candidate_id, &job_id, expiry, &metadata, message.as_deref())
            })
            .collect();

        let sent = results.iter().filter(|result| result.email_success).count();
        let failed = results.len() - sent;
        let issued = results.iter().filter(|result| result.invite_id.is_some()).count();
        info!(issued, sent, failed, job_id = %job_id.0, "bulk invite run finished");

        Ok(BulkInviteReport {
            success: issued > 0,
            sent,
            failed,
            results,
        })
    }

    fn issue_and_mail(
        &self,
        candidate_id: CandidateId,
        job_id: &JobId,
        expiry: ExpiryPolicy,
        metadata: &InviteMetadata,
        message: Option<&str>,
    ) -> BulkInviteResult {
        let failure = |candidate_id: CandidateId, error: String| BulkInviteResult {
            candidate_id,
            invite_id: None,
            link: None,
            email_success: false,
            error: Some(error),
        };

        let candidate = match self.directory.fetch(&candidate_id) {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return failure(candidate_id, "candidate not found".to_string()),
            Err(err) => return failure(candidate_id, err.to_string()),
        };

        let issued = match self.issue(IssueInvite {
            candidate_id: candidate_id.clone(),
            job_id: job_id.clone(),
            expiry,
            metadata: metadata.clone(),
        }) {
            Ok(issued) => issued,
            Err(err) => return failure(candidate_id, err.to_string()),
        };

        let email = InviteEmail {
            invite_id: issued.invite.id.clone(),
            to: candidate.email,
            candidate_name: candidate.name,
            link: issued.link.clone(),
            expires_at: issued.invite.expires_at,
            message: message.map(str::to_string),
        };
        let mail_error = self.mailer.send_invite(&email).err().map(|err| {
            warn!(invite_id = %issued.invite.id.0, error = %err, "invite email failed");
            err.to_string()
        });

        BulkInviteResult {
            candidate_id,
            invite_id: Some(issued.invite.id),
            link: Some(issued.link),
            email_success: mail_error.is_none(),
            error: mail_error,
        }
    }

    /// Undo the `submitted` transition for an invite whose payload was not stored, so the
    /// candidate can retry.
    fn withdraw_submission(&self, invite: &Invite) {
        match self
            .repository
            .withdraw_submission(&invite.id, invite.status, invite.opened_at)
        {
            Ok(true) => debug!(invite_id = %invite.id.0, "submission withdrawn"),
            Ok(false) => warn!(invite_id = %invite.id.0, "submission was not withdrawn"),
            Err(err) => error!(
                invite_id = %invite.id.0,
                error = %err,
                "failed to withdraw submission; invite is submitted without an application"
            ),
        }
    }

    fn lookup(&self, token: &str) -> Result<Invite, InviteError> {
        let token_hash = self.tokens.hash(token.trim());
        self.repository
            .find_by_token_hash(&token_hash)?
            .ok_or_else(|| {
                debug!(token = hash_prefix(&token_hash), "unknown invite token");
                InviteRejection::NotFound.into()
            })
    }

    fn resolve_expiry(
        &self,
        policy: ExpiryPolicy,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, InviteRejection> {
        let after_days = |days: u32| {
            Duration::try_days(i64::from(days))
                .and_then(|span| now.checked_add_signed(span))
                .ok_or(InviteRejection::InvalidExpiry)
        };
        let expires_at = match policy {
            ExpiryPolicy::Default => after_days(self.default_expiry_days)?,
            ExpiryPolicy::Days(days) => after_days(days)?,
            ExpiryPolicy::At(at) => at,
        };

        if expires_at <= now {
            return Err(InviteRejection::InvalidExpiry);
        }
        Ok(expires_at)
    }
}
