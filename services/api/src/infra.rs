use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use talent_portal::config::AppConfig;
use talent_portal::workflows::candidates::{
    ArrivalEvent, ArrivalNotifier, Candidate, CandidateId, CheckinService, Clock,
    InMemoryApplicationStore, InMemoryCandidateDirectory, InMemoryInviteRepository,
    InviteMailer, InviteService, LinkBuilder,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Both lifecycle services plus handles on the in-memory stores behind them.
pub(crate) struct CandidateServices {
    pub(crate) invites: Arc<InviteService>,
    pub(crate) checkin: Arc<CheckinService>,
    pub(crate) repository: InMemoryInviteRepository,
    pub(crate) directory: InMemoryCandidateDirectory,
    pub(crate) applications: InMemoryApplicationStore,
}

pub(crate) fn build_services(
    config: &AppConfig,
    mailer: Arc<dyn InviteMailer>,
    notifier: Arc<dyn ArrivalNotifier>,
    clock: Arc<dyn Clock>,
) -> CandidateServices {
    let repository = InMemoryInviteRepository::default();
    let directory = InMemoryCandidateDirectory::default();
    let applications = InMemoryApplicationStore::default();

    let invites = InviteService::new(
        Arc::new(repository.clone()),
        Arc::new(directory.clone()),
        Arc::new(applications.clone()),
        mailer.clone(),
        clock.clone(),
        &config.invites,
    );
    let checkin = CheckinService::new(
        Arc::new(repository.clone()),
        Arc::new(directory.clone()),
        mailer,
        notifier,
        clock,
        &config.checkin,
        LinkBuilder::new(config.invites.public_base_url.clone()),
    );

    CandidateServices {
        invites: Arc::new(invites),
        checkin: Arc::new(checkin),
        repository,
        directory,
        applications,
    }
}

/// Candidates loaded into non-production directories and used by the demo.
pub(crate) fn sample_candidates() -> Vec<Candidate> {
    vec![
        Candidate {
            id: CandidateId("cand-1001".to_string()),
            name: "Ada Lovelace".to_string(),
            email: "ada.lovelace@example.com".to_string(),
        },
        Candidate {
            id: CandidateId("cand-1002".to_string()),
            name: "Alan Turing".to_string(),
            email: "alan.turing@example.com".to_string(),
        },
    ]
}

/// Drain the arrival feed into the log until every sender is gone.
pub(crate) fn spawn_arrival_log(mut feed: broadcast::Receiver<ArrivalEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(event) => info!(
                    candidate_id = %event.candidate_id.0,
                    name = %event.display_name,
                    at = %event.checked_in_at,
                    "candidate arrived for interview"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "arrival feed lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}
