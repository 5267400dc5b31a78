use async_trait::async_trait;
use chrono::NaiveDateTime;
use incentives::config::PolicyConfig;
use incentives::error::AppError;
use incentives::workflows::reviews::{
    AuditRecord, AuditSink, Collaborators, DomainEvent, DomainEventPublisher, IncentiveLevel,
    MemoryLevelCatalog, MemoryNextReviewDateRepository, MemoryPrisonerDirectory,
    MemoryReviewRepository, PrisonIncentiveLevel, PrisonerDetails, PublishError, ReviewEngine,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Fixture standing in for the level catalogue and prisoner search services.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReferenceData {
    #[serde(default)]
    pub(crate) levels: Vec<IncentiveLevel>,
    #[serde(default)]
    pub(crate) prison_levels: Vec<PrisonIncentiveLevel>,
    #[serde(default)]
    pub(crate) prisoners: Vec<PrisonerDetails>,
}

impl ReferenceData {
    pub(crate) fn from_path(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        let data: Self = serde_json::from_str(&raw)?;
        info!(
            path = %path.display(),
            levels = data.levels.len(),
            prison_levels = data.prison_levels.len(),
            prisoners = data.prisoners.len(),
            "reference data loaded"
        );
        Ok(data)
    }
}

/// Engine over in-memory stores, plus the review table for read-back.
pub(crate) struct Wiring {
    pub(crate) engine: ReviewEngine,
    pub(crate) reviews: Arc<MemoryReviewRepository>,
}

pub(crate) fn build_engine(data: ReferenceData, policy: PolicyConfig) -> Wiring {
    let ReferenceData {
        levels,
        prison_levels,
        prisoners,
    } = data;

    let reviews = Arc::new(MemoryReviewRepository::new());
    let engine = ReviewEngine::new(
        Collaborators {
            reviews: reviews.clone(),
            next_review_dates: Arc::new(MemoryNextReviewDateRepository::new()),
            catalog: Arc::new(MemoryLevelCatalog::new(levels, prison_levels)),
            directory: Arc::new(MemoryPrisonerDirectory::new(prisoners)),
        },
        policy,
    );

    Wiring { engine, reviews }
}

/// Emits outbound domain events as structured log lines.
#[derive(Debug, Default, Clone)]
pub(crate) struct TracingPublisher;

#[async_trait]
impl DomainEventPublisher for TracingPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(&event)
            .map_err(|err| PublishError::Transport(err.to_string()))?;
        info!(
            target: "incentives::outbound",
            event_type = event.event_type.topic(),
            %payload,
            "{}",
            event.event_type.description()
        );
        Ok(())
    }
}

/// Emits audit records as structured log lines.
#[derive(Debug, Default, Clone)]
pub(crate) struct TracingAudit;

#[async_trait]
impl AuditSink for TracingAudit {
    async fn record(&self, record: AuditRecord) -> Result<(), PublishError> {
        let details = serde_json::to_string(&record.details)
            .map_err(|err| PublishError::Transport(err.to_string()))?;
        info!(
            target: "incentives::audit",
            what = ?record.what,
            who = %record.who,
            when = %record.when,
            %details,
            "audit record"
        );
        Ok(())
    }
}

pub(crate) fn parse_datetime(raw: &str) -> Result<NaiveDateTime, String> {
    NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%dT%H:%M:%S")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DDTHH:MM:SS ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn reference_data_accepts_camel_case_fixture() {
        let data: ReferenceData = serde_json::from_str(
            r#"{
                "levels": [{"code": "STD", "name": "Standard", "sequence": 2, "active": true}],
                "prisonLevels": [{"prisonId": "MDI", "levelCode": "STD", "active": true, "defaultOnAdmission": true}],
                "prisoners": [{
                    "prisonerNumber": "A1234BC",
                    "bookingId": 100,
                    "prisonId": "MDI",
                    "dateOfBirth": "1990-01-01",
                    "receptionDate": "2024-01-10"
                }]
            }"#,
        )
        .expect("fixture parses");

        assert_eq!(data.levels[0].code, "STD");
        assert!(data.prison_levels[0].default_on_admission);
        assert_eq!(data.prisoners[0].location_id, None);
        assert!(!data.prisoners[0].has_open_safety_alert);
    }

    #[test]
    fn parse_datetime_requires_seconds() {
        let parsed = parse_datetime(" 2024-03-01T09:30:00 ").expect("parses");
        assert_eq!(
            parsed,
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .and_then(|day| day.and_hms_opt(9, 30, 0))
                .expect("valid datetime")
        );
        assert!(parse_datetime("2024-03-01").is_err());
    }
}
