use crate::cli::ReplayArgs;
use crate::infra::{build_engine, parse_datetime, ReferenceData, TracingAudit, TracingPublisher};
use chrono::{Local, NaiveDateTime};
use incentives::config::{AppConfig, PolicyConfig};
use incentives::error::AppError;
use incentives::telemetry;
use incentives::workflows::reviews::{InboundEvent, Notifier, ReviewError, ReviewSummary};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Final state of one prisoner after a replay.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PrisonerOutcome {
    pub(crate) prisoner_number: String,
    pub(crate) history: ReviewSummary,
}

pub(crate) async fn run(args: ReplayArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;

    let now = match args.now.as_deref() {
        Some(raw) => parse_datetime(raw).map_err(AppError::InvalidArgument)?,
        None => Local::now().naive_local(),
    };
    let reference = ReferenceData::from_path(&args.reference_data)?;
    let events = std::fs::read_to_string(&args.events)?;

    for outcome in replay(reference, &events, config.policy, now).await? {
        println!("{}", serde_json::to_string(&outcome)?);
    }
    Ok(())
}

/// Applies every event in input order, each at its own occurrence time, then summarises
/// every prisoner holding reviews as of `now`.
pub(crate) async fn replay(
    reference: ReferenceData,
    events: &str,
    policy: PolicyConfig,
    now: NaiveDateTime,
) -> Result<Vec<PrisonerOutcome>, AppError> {
    let wiring = build_engine(reference, policy);
    let notifier = Notifier::new(Arc::new(TracingPublisher), Arc::new(TracingAudit));
    let (processor, service) = wiring.engine.audited(notifier);

    let mut failures = 0usize;
    for (index, line) in events.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let event: InboundEvent = serde_json::from_str(line).map_err(|err| {
            AppError::InvalidArgument(format!("event on line {} is malformed: {err}", index + 1))
        })?;

        if let Err(err) = processor.process(&event, event.local_time()).await {
            warn!(
                line = index + 1,
                prisoner_number = %event.prisoner_number,
                kind = err.kind().label(),
                error = %err,
                "event rejected during replay"
            );
            failures += 1;
        }
    }

    let prisoner_numbers: BTreeSet<String> = wiring
        .reviews
        .all()
        .map_err(ReviewError::from)?
        .into_iter()
        .map(|review| review.prisoner_number)
        .collect();

    let mut outcomes = Vec::with_capacity(prisoner_numbers.len());
    for prisoner_number in prisoner_numbers {
        let history = service
            .queries()
            .history_for_prisoner(&prisoner_number, now)
            .await?;
        outcomes.push(PrisonerOutcome {
            prisoner_number,
            history,
        });
    }

    info!(prisoners = outcomes.len(), failures, "replay finished");
    Ok(outcomes)
}
