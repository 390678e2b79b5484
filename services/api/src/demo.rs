use crate::infra::{build_services, sample_candidates, CandidateServices};
use chrono::{Duration, Utc};
use clap::Args;
use serde_json::json;
use std::sync::Arc;
use talent_portal::config::AppConfig;
use talent_portal::error::AppError;
use talent_portal::workflows::candidates::{
    ApplicationPayload, BroadcastArrivalNotifier, CheckinError, ExpiryPolicy, GeoPoint,
    InviteError, InviteMetadata, IssueInvite, JobId, LoggingMailer, ManualClock, ScheduleValue,
};

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Interview time as HR would type it. Values without an offset use the local zone.
    #[arg(long, default_value = "2025-03-10 09:00")]
    pub(crate) interview: String,
    /// Job the demo invites are issued for.
    #[arg(long, default_value = "job-platform-engineer")]
    pub(crate) job: String,
    /// Skip the interview check-in portion of the demo.
    #[arg(long)]
    pub(crate) skip_checkin: bool,
}

impl Default for DemoArgs {
    fn default() -> Self {
        Self {
            interview: "2025-03-10 09:00".to_string(),
            job: "job-platform-engineer".to_string(),
            skip_checkin: false,
        }
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    walk_lifecycles(&config, args)
}

fn walk_lifecycles(config: &AppConfig, args: DemoArgs) -> Result<(), AppError> {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let arrivals = BroadcastArrivalNotifier::new();
    let mut feed = arrivals.subscribe();
    let services = build_services(
        config,
        Arc::new(LoggingMailer),
        Arc::new(arrivals),
        clock.clone(),
    );
    let candidates = sample_candidates();
    for candidate in &candidates {
        services.directory.upsert(candidate.clone());
    }
    let (applicant, latecomer) = (&candidates[0], &candidates[1]);

    println!("Talent portal demo");
    println!("\nApplication invites");
    let issued = services.invites.issue(IssueInvite {
        candidate_id: applicant.id.clone(),
        job_id: JobId(args.job.clone()),
        expiry: ExpiryPolicy::Days(config.invites.default_expiry_days),
        metadata: InviteMetadata {
            interview_date_time: Some(ScheduleValue::Text(args.interview.clone())),
            ..InviteMetadata::default()
        },
    })?;
    println!(
        "- Issued invite {} to {} (expires {})",
        issued.invite.id.0, applicant.name, issued.invite.expires_at
    );
    println!("  Link: {}", issued.link);

    let view = services.invites.validate(&issued.token)?;
    println!("- Landing page opened -> status {}", view.status.label());

    clock.advance(Duration::minutes(20));
    let submitted = services.invites.submit(
        &issued.token,
        ApplicationPayload(json!({ "coverLetter": "Happy to talk about analytical engines." })),
    )?;
    println!(
        "- Application submitted -> status {}",
        submitted.status.label()
    );
    report_invite_outcome(
        "Second submission",
        services
            .invites
            .submit(&issued.token, ApplicationPayload(json!({}))),
    )?;

    let stale = services.invites.issue(IssueInvite {
        candidate_id: latecomer.id.clone(),
        job_id: JobId(args.job.clone()),
        expiry: ExpiryPolicy::Days(1),
        metadata: InviteMetadata::default(),
    })?;
    clock.advance(Duration::days(1) + Duration::seconds(1));
    report_invite_outcome(
        &format!("{} opens a day-old link", latecomer.name),
        services.invites.validate(&stale.token),
    )?;
    println!(
        "- Stored applications: {}",
        services.applications.len()
    );

    if args.skip_checkin {
        return Ok(());
    }

    println!("\nInterview check-in");
    let dispatched = services.checkin.dispatch(&applicant.id)?;
    println!(
        "- Check-in link sent to {} for {} (email {})",
        applicant.name,
        dispatched.interview_start_time,
        if dispatched.email_success { "sent" } else { "failed" }
    );

    let office = config.checkin.office;
    clock.set(dispatched.interview_start_time - Duration::minutes(30));
    report_checkin_outcome(
        "Half an hour early",
        services.checkin.confirm(&dispatched.token, Some(office)),
    )?;

    clock.set(dispatched.interview_start_time + Duration::minutes(5));
    let across_town = GeoPoint::new(office.latitude + 0.05, office.longitude);
    report_checkin_outcome(
        "On time but across town",
        services.checkin.confirm(&dispatched.token, Some(across_town)),
    )?;

    let confirmation = services.checkin.confirm(&dispatched.token, Some(office))?;
    println!(
        "- {} checked in at {} ({:.0} m from the office, {} min after the scheduled time)",
        confirmation.display_name,
        confirmation.checked_in_at,
        confirmation.distance_meters,
        confirmation.minutes_from_schedule
    );
    while let Ok(event) = feed.try_recv() {
        println!(
            "  Arrival feed: {} at {}",
            event.display_name, event.checked_in_at
        );
    }

    report_checkin_outcome(
        "Second check-in",
        services.checkin.confirm(&dispatched.token, Some(office)),
    )?;
    summarize(&services);

    Ok(())
}

fn report_invite_outcome<T>(label: &str, outcome: Result<T, InviteError>) -> Result<(), AppError> {
    match outcome {
        Ok(_) => println!("- {label}: accepted"),
        Err(InviteError::Rejected(rejection)) => {
            println!("- {label}: rejected with {} ({rejection})", rejection.code())
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

fn report_checkin_outcome<T>(
    label: &str,
    outcome: Result<T, CheckinError>,
) -> Result<(), AppError> {
    match outcome {
        Ok(_) => println!("- {label}: accepted"),
        Err(CheckinError::Rejected(rejection)) => {
            println!("- {label}: rejected with {} ({rejection})", rejection.code())
        }
        Err(err) => return Err(err.into()),
    }
    Ok(())
}

fn summarize(services: &CandidateServices) {
    println!("\nInvite store");
    for invite in services.repository.snapshot() {
        let checkin = invite
            .checkin
            .as_ref()
            .map(|record| record.checkin_status.label())
            .unwrap_or("none");
        println!(
            "- {} | {} | invite {} | check-in {}",
            invite.id.0,
            invite.candidate_id.0,
            invite.status.label(),
            checkin
        );
    }
}
