use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::domain::{CandidateId, CheckinRecord, GeoPoint, Invite, InviteId, MailStatus};
use super::geofence::{GeofenceCheck, GeofenceValidator};
use super::links::LinkBuilder;
use super::notify::{ArrivalEvent, ArrivalNotifier, CheckinEmail, InviteMailer};
use super::repository::{CandidateDirectory, CheckinDispatch, InviteRepository, RepositoryError};
use super::schedule::{RawSchedule, ScheduleParseError, ScheduledTimeParser};
use super::token::{hash_prefix, SecretTokenService};
use crate::config::CheckinConfig;

/// Outcome of sending a check-in link. The raw token is returned once, for the link.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinDispatched {
    pub invite_id: InviteId,
    pub candidate_id: CandidateId,
    #[serde(skip)]
    pub token: String,
    pub link: String,
    pub interview_start_time: DateTime<Utc>,
    pub email_success: bool,
    pub mail_status: MailStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckinConfirmation {
    pub candidate_id: CandidateId,
    pub display_name: String,
    pub checked_in_at: DateTime<Utc>,
    pub distance_meters: f64,
    pub minutes_from_schedule: i64,
}

/// Expected business outcomes of dispatching or confirming a check-in.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckinRejection {
    #[error("candidate has no application invite")]
    NoInvite,
    #[error("invite has no interview time")]
    NoInterviewTime,
    #[error("interview time could not be read: {0}")]
    BadSchedule(ScheduleParseError),
    #[error("candidate record not found")]
    CandidateNotFound,
    #[error("check-in link is invalid")]
    NotFound,
    #[error("candidate has already checked in")]
    AlreadyCheckedIn,
    #[error(
        "check-in opens {window_minutes} minutes before the interview \
         ({minutes_early} minutes early)"
    )]
    TooEarly {
        scheduled: DateTime<Utc>,
        minutes_early: i64,
        window_minutes: i64,
    },
    #[error(
        "check-in closed {window_minutes} minutes after the interview start \
         ({minutes_late} minutes late)"
    )]
    TooLate {
        scheduled: DateTime<Utc>,
        minutes_late: i64,
        window_minutes: i64,
    },
    #[error("location is required to check in")]
    LocationRequired,
    #[error("reported location is not a valid coordinate")]
    InvalidLocation,
    #[error(
        "you are {:.0} meters from the office (allowed {:.0})",
        .0.distance_meters,
        .0.allowed_meters
    )]
    WrongLocation(GeofenceCheck),
}

impl CheckinRejection {
    pub const fn code(&self) -> &'static str {
        match self {
            CheckinRejection::NoInvite => "no_invite",
            CheckinRejection::NoInterviewTime => "no_interview_time",
            CheckinRejection::BadSchedule(_) => "bad_schedule",
            CheckinRejection::CandidateNotFound => "candidate_not_found",
            CheckinRejection::NotFound => "invalid_link",
            CheckinRejection::AlreadyCheckedIn => "already_checked_in",
            CheckinRejection::TooEarly { .. } => "too_early",
            CheckinRejection::TooLate { .. } => "too_late",
            CheckinRejection::LocationRequired => "location_required",
            CheckinRejection::InvalidLocation => "invalid_location",
            CheckinRejection::WrongLocation(_) => "wrong_location",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CheckinError {
    #[error(transparent)]
    Rejected(#[from] CheckinRejection),
    #[error("stored interview time is unusable: {0}")]
    ScheduleUnparseable(ScheduleParseError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl CheckinError {
    /// Stable discriminant for API clients; infrastructure failures collapse to `server_error`.
    pub fn code(&self) -> &'static str {
        match self {
            CheckinError::Rejected(rejection) => rejection.code(),
            CheckinError::ScheduleUnparseable(_) | CheckinError::Repository(_) => "server_error",
        }
    }
}

/// Owns the interview check-in lifecycle: pending -> arrived, gated by schedule, arrival
/// window, and office geofence.
pub struct CheckinService {
    repository: Arc<dyn InviteRepository>,
    directory: Arc<dyn CandidateDirectory>,
    mailer: Arc<dyn InviteMailer>,
    notifier: Arc<dyn ArrivalNotifier>,
    clock: Arc<dyn Clock>,
    tokens: SecretTokenService,
    parser: ScheduledTimeParser,
    geofence: GeofenceValidator,
    window: Duration,
    links: LinkBuilder,
}

impl CheckinService {
    pub fn new(
        repository: Arc<dyn InviteRepository>,
        directory: Arc<dyn CandidateDirectory>,
        mailer: Arc<dyn InviteMailer>,
        notifier: Arc<dyn ArrivalNotifier>,
        clock: Arc<dyn Clock>,
        config: &CheckinConfig,
        links: LinkBuilder,
    ) -> Self {
        Self {
            repository,
            directory,
            mailer,
            notifier,
            clock,
            tokens: SecretTokenService,
            parser: ScheduledTimeParser::local(),
            geofence: GeofenceValidator::from(config),
            window: Duration::try_minutes(config.window_minutes).unwrap_or(Duration::MAX),
            links,
        }
    }

    pub fn geofence(&self) -> &GeofenceValidator {
        &self.geofence
    }

    /// Issue a fresh check-in link for the candidate's latest invite and email it.
    pub fn dispatch(&self, candidate_id: &CandidateId) -> Result<CheckinDispatched, CheckinError> {
        let invite = self
            .repository
            .latest_for_candidate(candidate_id)?
            .ok_or(CheckinRejection::NoInvite)?;
        let raw_schedule = invite
            .metadata
            .interview_date_time
            .as_ref()
            .ok_or(CheckinRejection::NoInterviewTime)?;
        let interview_start_time = self
            .parser
            .parse(RawSchedule::from(raw_schedule))
            .map_err(CheckinRejection::BadSchedule)?;

        if invite.has_arrived() {
            return Err(CheckinRejection::AlreadyCheckedIn.into());
        }
        let candidate = self
            .directory
            .fetch(candidate_id)?
            .ok_or(CheckinRejection::CandidateNotFound)?;

        let now = self.clock.now();
        let issued = self.tokens.issue();
        let stored = self.repository.record_checkin_dispatch(
            &invite.id,
            CheckinDispatch {
                checkin_token_hash: issued.token_hash.clone(),
                checkin_sent_at: now,
                interview_start_time,
            },
        )?;
        if !stored {
            return Err(CheckinRejection::AlreadyCheckedIn.into());
        }

        let link = self.links.checkin(&issued.token);
        let email = CheckinEmail {
            invite_id: invite.id.clone(),
            to: candidate.email,
            candidate_name: candidate.name,
            link: link.clone(),
            interview_start_time,
        };
        let mail_status = match self.mailer.send_checkin(&email) {
            Ok(()) => MailStatus::Sent,
            Err(err) => {
                warn!(invite_id = %invite.id.0, error = %err, "check-in email failed");
                MailStatus::Failed
            }
        };
        if let Err(err) = self
            .repository
            .set_checkin_mail_status(&invite.id, mail_status)
        {
            error!(invite_id = %invite.id.0, error = %err, "failed to record check-in mail status");
        }

        info!(
            invite_id = %invite.id.0,
            candidate_id = %candidate_id.0,
            token = hash_prefix(&issued.token_hash),
            interview = %interview_start_time,
            ?mail_status,
            "check-in link dispatched"
        );

        Ok(CheckinDispatched {
            invite_id: invite.id,
            candidate_id: candidate_id.clone(),
            token: issued.token,
            link,
            interview_start_time,
            email_success: mail_status == MailStatus::Sent,
            mail_status,
        })
    }

    pub fn confirm(
        &self,
        token: &str,
        position: Option<GeoPoint>,
    ) -> Result<CheckinConfirmation, CheckinError> {
        self.confirm_at(token, position, self.clock.now())
    }

    /// Confirm arrival at `now`. Checks run schedule, then time window, then location, and
    /// nothing is written unless all of them pass.
    pub fn confirm_at(
        &self,
        token: &str,
        position: Option<GeoPoint>,
        now: DateTime<Utc>,
    ) -> Result<CheckinConfirmation, CheckinError> {
        let token_hash = self.tokens.hash(token.trim());
        let invite = self
            .repository
            .find_by_checkin_token_hash(&token_hash)?
            .ok_or_else(|| {
                debug!(token = hash_prefix(&token_hash), "unknown check-in token");
                CheckinRejection::NotFound
            })?;
        let record = invite.checkin.as_ref().ok_or(CheckinRejection::NotFound)?;

        if invite.has_arrived() {
            debug!(invite_id = %invite.id.0, "repeat check-in attempt");
            return Err(CheckinRejection::AlreadyCheckedIn.into());
        }

        let scheduled = self.resolve_schedule(&invite, record)?;
        let delta = now - scheduled;
        if delta > self.window {
            return Err(CheckinRejection::TooLate {
                scheduled,
                minutes_late: delta.num_minutes(),
                window_minutes: self.window.num_minutes(),
            }
            .into());
        }
        if delta < -self.window {
            return Err(CheckinRejection::TooEarly {
                scheduled,
                minutes_early: (-delta).num_minutes(),
                window_minutes: self.window.num_minutes(),
            }
            .into());
        }

        let position = position.ok_or(CheckinRejection::LocationRequired)?;
        if !position.is_valid() {
            return Err(CheckinRejection::InvalidLocation.into());
        }
        let check = self.geofence.evaluate(position);
        if !check.inside {
            debug!(
                invite_id = %invite.id.0,
                distance = check.distance_meters,
                allowed = check.allowed_meters,
                "check-in outside geofence"
            );
            return Err(CheckinRejection::WrongLocation(check).into());
        }

        if !self.repository.mark_arrived(&invite.id, now)? {
            return Err(CheckinRejection::AlreadyCheckedIn.into());
        }

        let display_name = self.display_name(&invite.candidate_id);
        info!(
            invite_id = %invite.id.0,
            candidate_id = %invite.candidate_id.0,
            distance = check.distance_meters,
            "candidate checked in"
        );
        let event = ArrivalEvent::new(invite.candidate_id.clone(), display_name.clone(), now);
        if let Err(err) = self.notifier.notify(event) {
            warn!(invite_id = %invite.id.0, error = %err, "arrival notification failed");
        }

        Ok(CheckinConfirmation {
            candidate_id: invite.candidate_id,
            display_name,
            checked_in_at: now,
            distance_meters: check.distance_meters,
            minutes_from_schedule: delta.num_minutes(),
        })
    }

    /// The human-entered metadata value wins over the stored derived instant.
    fn resolve_schedule(
        &self,
        invite: &Invite,
        record: &CheckinRecord,
    ) -> Result<DateTime<Utc>, CheckinError> {
        match invite.metadata.interview_date_time.as_ref() {
            Some(raw) => self.parser.parse(RawSchedule::from(raw)).map_err(|err| {
                warn!(
                    invite_id = %invite.id.0,
                    error = %err,
                    "interview time unparseable at check-in"
                );
                CheckinError::ScheduleUnparseable(err)
            }),
            None => Ok(record.interview_start_time),
        }
    }

    fn display_name(&self, candidate_id: &CandidateId) -> String {
        match self.directory.fetch(candidate_id) {
            Ok(Some(candidate)) => candidate.name,
            Ok(None) => candidate_id.0.clone(),
            Err(err) => {
                error!(
                    candidate_id = %candidate_id.0,
                    error = %err,
                    "candidate lookup failed after check-in"
                );
                candidate_id.0.clone()
            }
        }
    }
}
