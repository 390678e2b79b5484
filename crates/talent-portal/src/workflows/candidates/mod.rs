//! Candidate invites and interview check-in.
//!
//! An invite carries two independent lifecycles keyed by two bearer tokens: the
//! application link (sent, opened, submitted, bounded by expiry) and the interview
//! check-in link (pending, arrived, gated by the arrival window and the office geofence).
//! Only SHA-256 hashes of either token are persisted.

pub mod checkin;
pub mod clock;
pub mod domain;
pub mod geofence;
pub mod invites;
pub mod links;
pub mod memory;
pub mod notify;
pub mod repository;
pub mod router;
pub mod schedule;
pub mod token;

#[cfg(test)]
mod tests;

pub use checkin::{
    CheckinConfirmation, CheckinDispatched, CheckinError, CheckinRejection, CheckinService,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    ApplicationPayload, Candidate, CandidateId, CheckinRecord, CheckinStatus, GeoPoint, Invite,
    InviteId, InviteMetadata, InviteStatus, JobId, MailStatus, ScheduleValue,
};
pub use geofence::{distance_meters, is_within, GeofenceCheck, GeofenceValidator};
pub use invites::{
    BulkInviteReport, BulkInviteRequest, BulkInviteResult, ExpiryPolicy, InviteError,
    InviteRejection, InviteService, InviteView, IssueInvite, IssuedInvite,
};
pub use links::LinkBuilder;
pub use memory::{InMemoryApplicationStore, InMemoryCandidateDirectory, InMemoryInviteRepository};
pub use notify::{
    ArrivalEvent, ArrivalNotifier, BroadcastArrivalNotifier, CheckinEmail, InviteEmail,
    InviteMailer, LoggingMailer, MailError, NotifyError, TracingArrivalNotifier,
};
pub use repository::{
    ApplicationStore, CandidateDirectory, CheckinDispatch, InviteRepository, RepositoryError,
};
pub use router::candidate_router;
pub use schedule::{RawSchedule, ScheduleParseError, ScheduledTimeParser};
pub use token::{IssuedToken, SecretTokenService};
