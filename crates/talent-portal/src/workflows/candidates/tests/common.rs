use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::config::{CheckinConfig, InviteConfig};
use crate::workflows::candidates::geofence::EARTH_RADIUS_METERS;
use crate::workflows::candidates::{
    candidate_router, ApplicationPayload, ApplicationStore, ArrivalEvent, ArrivalNotifier,
    Candidate, CandidateId, CheckinDispatch,
    CheckinEmail, CheckinService, ExpiryPolicy, GeoPoint, InMemoryApplicationStore,
    InMemoryCandidateDirectory, InMemoryInviteRepository, Invite, InviteEmail, InviteId,
    InviteMailer, InviteMetadata, InviteRepository, InviteService, InviteStatus, IssueInvite,
    IssuedInvite, JobId, LinkBuilder, MailError, MailStatus, ManualClock, NotifyError,
    RepositoryError, ScheduleValue,
};

pub(super) const PUBLIC_URL: &str = "https://careers.example.com";

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0)
        .single()
        .expect("valid start")
}

/// 2025-03-10 09:00 UTC, the interview used throughout the check-in tests.
pub(super) fn interview() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0)
        .single()
        .expect("valid interview")
}

pub(super) fn interview_text() -> ScheduleValue {
    ScheduleValue::from("2025-03-10T09:00:00Z")
}

pub(super) fn office() -> GeoPoint {
    CheckinConfig::default().office
}

/// Point `meters` due north of `origin`; along a meridian the haversine distance is exact.
pub(super) fn north_of(origin: GeoPoint, meters: f64) -> GeoPoint {
    let delta = (meters / EARTH_RADIUS_METERS).to_degrees();
    GeoPoint::new(origin.latitude + delta, origin.longitude)
}

pub(super) fn ada() -> Candidate {
    Candidate {
        id: CandidateId("cand-ada".to_string()),
        name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
    }
}

pub(super) fn grace() -> Candidate {
    Candidate {
        id: CandidateId("cand-grace".to_string()),
        name: "Grace Hopper".to_string(),
        email: "grace@example.com".to_string(),
    }
}

pub(super) fn job() -> JobId {
    JobId("job-backend".to_string())
}

#[derive(Default)]
pub(super) struct RecordingMailer {
    fail: bool,
    invites: Mutex<Vec<InviteEmail>>,
    checkins: Mutex<Vec<CheckinEmail>>,
}

impl RecordingMailer {
    pub(super) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(super) fn invites(&self) -> Vec<InviteEmail> {
        self.invites.lock().expect("mailer mutex poisoned").clone()
    }

    pub(super) fn checkins(&self) -> Vec<CheckinEmail> {
        self.checkins.lock().expect("mailer mutex poisoned").clone()
    }
}

impl InviteMailer for RecordingMailer {
    fn send_invite(&self, email: &InviteEmail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport("smtp relay refused".to_string()));
        }
        self.invites
            .lock()
            .expect("mailer mutex poisoned")
            .push(email.clone());
        Ok(())
    }

    fn send_checkin(&self, email: &CheckinEmail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Transport("smtp relay refused".to_string()));
        }
        self.checkins
            .lock()
            .expect("mailer mutex poisoned")
            .push(email.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    fail: bool,
    events: Mutex<Vec<ArrivalEvent>>,
}

impl RecordingNotifier {
    pub(super) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(super) fn events(&self) -> Vec<ArrivalEvent> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl ArrivalNotifier for RecordingNotifier {
    fn notify(&self, event: ArrivalEvent) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(event);
        if self.fail {
            return Err(NotifyError::Unavailable("dashboard offline".to_string()));
        }
        Ok(())
    }
}

/// Both services wired to shared in-memory adapters and one manual clock.
pub(super) struct Harness {
    pub(super) invites: Arc<InviteService>,
    pub(super) checkin: Arc<CheckinService>,
    pub(super) repository: InMemoryInviteRepository,
    pub(super) applications: InMemoryApplicationStore,
    pub(super) mailer: Arc<RecordingMailer>,
    pub(super) notifier: Arc<RecordingNotifier>,
    pub(super) clock: Arc<ManualClock>,
}

pub(super) fn harness() -> Harness {
    build_harness(RecordingMailer::default(), RecordingNotifier::default())
}

pub(super) fn build_harness(mailer: RecordingMailer, notifier: RecordingNotifier) -> Harness {
    let repository = InMemoryInviteRepository::default();
    let directory = InMemoryCandidateDirectory::with_candidates([ada(), grace()]);
    let applications = InMemoryApplicationStore::default();
    let mailer = Arc::new(mailer);
    let notifier = Arc::new(notifier);
    let clock = Arc::new(ManualClock::new(start()));

    let invite_config = InviteConfig {
        default_expiry_days: 4,
        public_base_url: PUBLIC_URL.to_string(),
    };
    let invites = InviteService::new(
        Arc::new(repository.clone()),
        Arc::new(directory.clone()),
        Arc::new(applications.clone()),
        mailer.clone(),
        clock.clone(),
        &invite_config,
    );
    let checkin = CheckinService::new(
        Arc::new(repository.clone()),
        Arc::new(directory.clone()),
        mailer.clone(),
        notifier.clone(),
        clock.clone(),
        &CheckinConfig::default(),
        LinkBuilder::new(PUBLIC_URL),
    );

    Harness {
        invites: Arc::new(invites),
        checkin: Arc::new(checkin),
        repository,
        applications,
        mailer,
        notifier,
        clock,
    }
}

impl Harness {
    pub(super) fn issue(
        &self,
        candidate: &Candidate,
        interview: Option<ScheduleValue>,
    ) -> IssuedInvite {
        self.invites
            .issue(IssueInvite {
                candidate_id: candidate.id.clone(),
                job_id: job(),
                expiry: ExpiryPolicy::Default,
                metadata: InviteMetadata {
                    interview_date_time: interview,
                    ..InviteMetadata::default()
                },
            })
            .expect("invite issues")
    }

    /// Issue an invite with the standard interview and dispatch its check-in link.
    pub(super) fn dispatched(&self, candidate: &Candidate) -> String {
        self.issue(candidate, Some(interview_text()));
        self.checkin
            .dispatch(&candidate.id)
            .expect("check-in dispatches")
            .token
    }

    pub(super) fn at_interview(&self, offset: Duration) {
        self.clock.set(interview() + offset);
    }
}

impl Harness {
    pub(super) fn router(&self) -> axum::Router {
        candidate_router(self.invites.clone(), self.checkin.clone())
    }
}

pub(super) struct UnavailableRepository;

impl InviteRepository for UnavailableRepository {
    fn insert(&self, _invite: Invite) -> Result<Invite, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_token_hash(&self, _token_hash: &str) -> Result<Option<Invite>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_checkin_token_hash(
        &self,
        _checkin_token_hash: &str,
    ) -> Result<Option<Invite>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn latest_for_candidate(
        &self,
        _candidate_id: &CandidateId,
    ) -> Result<Option<Invite>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn advance_status(
        &self,
        _id: &InviteId,
        _next: InviteStatus,
        _at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn withdraw_submission(
        &self,
        _id: &InviteId,
        _restore: InviteStatus,
        _opened_at: Option<DateTime<Utc>>,
    ) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_checkin_dispatch(
        &self,
        _id: &InviteId,
        _dispatch: CheckinDispatch,
    ) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn set_checkin_mail_status(
        &self,
        _id: &InviteId,
        _status: MailStatus,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn mark_arrived(&self, _id: &InviteId, _at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// In-memory invite store with faults that can be switched on per test.
#[derive(Default)]
pub(super) struct FaultyInviteRepository {
    pub(super) inner: InMemoryInviteRepository,
    failed_submissions: Mutex<u32>,
    submit_before_open: bool,
    mail_status_fails: bool,
}

impl FaultyInviteRepository {
    /// The next `count` moves to `submitted` fail as if the store were offline.
    pub(super) fn failing_submissions(count: u32) -> Self {
        Self {
            failed_submissions: Mutex::new(count),
            ..Self::default()
        }
    }

    /// A concurrent submission lands just before any `opened` transition.
    pub(super) fn racing_submission() -> Self {
        Self {
            submit_before_open: true,
            ..Self::default()
        }
    }

    pub(super) fn failing_mail_status() -> Self {
        Self {
            mail_status_fails: true,
            ..Self::default()
        }
    }
}

impl InviteRepository for FaultyInviteRepository {
    fn insert(&self, invite: Invite) -> Result<Invite, RepositoryError> {
        self.inner.insert(invite)
    }

    fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<Invite>, RepositoryError> {
        self.inner.find_by_token_hash(token_hash)
    }

    fn find_by_checkin_token_hash(
        &self,
        checkin_token_hash: &str,
    ) -> Result<Option<Invite>, RepositoryError> {
        self.inner.find_by_checkin_token_hash(checkin_token_hash)
    }

    fn latest_for_candidate(
        &self,
        candidate_id: &CandidateId,
    ) -> Result<Option<Invite>, RepositoryError> {
        self.inner.latest_for_candidate(candidate_id)
    }

    fn advance_status(
        &self,
        id: &InviteId,
        next: InviteStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        if next == InviteStatus::Submitted {
            let mut remaining = self.failed_submissions.lock().expect("fault mutex poisoned");
            if *remaining > 0 {
                *remaining -= 1;
                return Err(RepositoryError::Unavailable("write timed out".to_string()));
            }
        }
        if next == InviteStatus::Opened && self.submit_before_open {
            self.inner.advance_status(id, InviteStatus::Submitted, at)?;
        }
        self.inner.advance_status(id, next, at)
    }

    fn withdraw_submission(
        &self,
        id: &InviteId,
        restore: InviteStatus,
        opened_at: Option<DateTime<Utc>>,
    ) -> Result<bool, RepositoryError> {
        self.inner.withdraw_submission(id, restore, opened_at)
    }

    fn record_checkin_dispatch(
        &self,
        id: &InviteId,
        dispatch: CheckinDispatch,
    ) -> Result<bool, RepositoryError> {
        self.inner.record_checkin_dispatch(id, dispatch)
    }

    fn set_checkin_mail_status(
        &self,
        id: &InviteId,
        status: MailStatus,
    ) -> Result<(), RepositoryError> {
        if self.mail_status_fails {
            return Err(RepositoryError::Unavailable("write timed out".to_string()));
        }
        self.inner.set_checkin_mail_status(id, status)
    }

    fn mark_arrived(&self, id: &InviteId, at: DateTime<Utc>) -> Result<bool, RepositoryError> {
        self.inner.mark_arrived(id, at)
    }
}

/// Application store whose first `failures` saves are refused.
#[derive(Default)]
pub(super) struct FlakyApplicationStore {
    pub(super) inner: InMemoryApplicationStore,
    failures: Mutex<u32>,
}

impl FlakyApplicationStore {
    pub(super) fn failing(failures: u32) -> Self {
        Self {
            failures: Mutex::new(failures),
            ..Self::default()
        }
    }
}

impl ApplicationStore for FlakyApplicationStore {
    fn save(
        &self,
        invite_id: &InviteId,
        payload: ApplicationPayload,
    ) -> Result<(), RepositoryError> {
        let mut remaining = self.failures.lock().expect("fault mutex poisoned");
        if *remaining > 0 {
            *remaining -= 1;
            return Err(RepositoryError::Unavailable("blob store offline".to_string()));
        }
        self.inner.save(invite_id, payload)
    }
}

/// Services over caller-supplied invite and application stores.
pub(super) struct FaultyHarness {
    pub(super) invites: InviteService,
    pub(super) checkin: CheckinService,
    pub(super) repository: Arc<FaultyInviteRepository>,
    pub(super) applications: Arc<FlakyApplicationStore>,
    pub(super) clock: Arc<ManualClock>,
}

pub(super) fn faulty_harness(
    repository: FaultyInviteRepository,
    applications: FlakyApplicationStore,
) -> FaultyHarness {
    let repository = Arc::new(repository);
    let applications = Arc::new(applications);
    let directory = Arc::new(InMemoryCandidateDirectory::with_candidates([ada(), grace()]));
    let mailer = Arc::new(RecordingMailer::default());
    let clock = Arc::new(ManualClock::new(start()));

    let invites = InviteService::new(
        repository.clone(),
        directory.clone(),
        applications.clone(),
        mailer.clone(),
        clock.clone(),
        &InviteConfig {
            default_expiry_days: 4,
            public_base_url: PUBLIC_URL.to_string(),
        },
    );
    let checkin = CheckinService::new(
        repository.clone(),
        directory,
        mailer,
        Arc::new(RecordingNotifier::default()),
        clock.clone(),
        &CheckinConfig::default(),
        LinkBuilder::new(PUBLIC_URL),
    );

    FaultyHarness {
        invites,
        checkin,
        repository,
        applications,
        clock,
    }
}

impl FaultyHarness {
    pub(super) fn issue(&self, candidate: &Candidate) -> IssuedInvite {
        self.invites
            .issue(IssueInvite {
                candidate_id: candidate.id.clone(),
                job_id: job(),
                expiry: ExpiryPolicy::Default,
                metadata: InviteMetadata {
                    interview_date_time: Some(interview_text()),
                    ..InviteMetadata::default()
                },
            })
            .expect("invite issues")
    }
}

/// Router whose invite and check-in services both sit on an unreachable store.
pub(super) fn offline_router() -> axum::Router {
    let clock = Arc::new(ManualClock::new(start()));
    let directory = Arc::new(InMemoryCandidateDirectory::with_candidates([ada()]));
    let mailer = Arc::new(RecordingMailer::default());
    let invites = InviteService::new(
        Arc::new(UnavailableRepository),
        directory.clone(),
        Arc::new(InMemoryApplicationStore::default()),
        mailer.clone(),
        clock.clone(),
        &InviteConfig::default(),
    );
    let checkin = CheckinService::new(
        Arc::new(UnavailableRepository),
        directory,
        mailer,
        Arc::new(RecordingNotifier::default()),
        clock,
        &CheckinConfig::default(),
        LinkBuilder::new(PUBLIC_URL),
    );
    candidate_router(Arc::new(invites), Arc::new(checkin))
}

pub(super) fn json_request(
    method: &str,
    uri: &str,
    body: Value,
) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .expect("request builds")
}

pub(super) fn empty_request(method: &str, uri: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
