use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};

use crate::config::PolicyConfig;
use crate::workflows::reviews::{
    AuditRecord, AuditSink, AuditedProcessor, AuditedReviewService, BookingId, Collaborators,
    DomainEvent, DomainEventPublisher, InboundEvent, IncentiveLevel, MemoryLevelCatalog,
    MemoryNextReviewDateRepository, MemoryPrisonerDirectory, MemoryReviewRepository, NewReview,
    Notifier, PrisonIncentiveLevel, PrisonerDetails, PublishError, ReasonCode, Review, ReviewEngine,
    ReviewId, ReviewRepository, ReviewType,
};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn at(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    date(year, month, day)
        .and_hms_opt(hour, 0, 0)
        .expect("valid time")
}

pub(super) fn occurred(year: i32, month: u32, day: u32, hour: u32) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(0)
        .expect("utc offset")
        .from_local_datetime(&at(year, month, day, hour))
        .single()
        .expect("unambiguous time")
}

pub(super) fn level(code: &str, name: &str, sequence: i32) -> IncentiveLevel {
    IncentiveLevel {
        code: code.to_string(),
        name: name.to_string(),
        sequence,
        active: true,
    }
}

pub(super) fn global_levels() -> Vec<IncentiveLevel> {
    vec![
        level("BAS", "Basic", 1),
        level("STD", "Standard", 2),
        level("ENH", "Enhanced", 3),
        level("EN2", "Enhanced 2", 4),
        level("EN3", "Enhanced 3", 5),
    ]
}

pub(super) fn prison_level(prison_id: &str, level_code: &str, default: bool) -> PrisonIncentiveLevel {
    PrisonIncentiveLevel {
        prison_id: prison_id.to_string(),
        level_code: level_code.to_string(),
        active: true,
        default_on_admission: default,
        remand_transfer_limit_in_pence: 6_050,
        remand_spend_limit_in_pence: 60_500,
        convicted_transfer_limit_in_pence: 1_980,
        convicted_spend_limit_in_pence: 19_800,
        visit_orders: 2,
        privileged_visit_orders: 1,
    }
}

/// MDI offers BAS to EN2, BAI offers BAS to ENH; both admit on STD.
pub(super) fn prison_levels() -> Vec<PrisonIncentiveLevel> {
    vec![
        prison_level("MDI", "BAS", false),
        prison_level("MDI", "STD", true),
        prison_level("MDI", "ENH", false),
        prison_level("MDI", "EN2", false),
        prison_level("BAI", "BAS", false),
        prison_level("BAI", "STD", true),
        prison_level("BAI", "ENH", false),
    ]
}

pub(super) fn catalog() -> MemoryLevelCatalog {
    MemoryLevelCatalog::new(global_levels(), prison_levels())
}

pub(super) fn prisoner(
    prisoner_number: &str,
    booking_id: i64,
    prison_id: &str,
    date_of_birth: NaiveDate,
) -> PrisonerDetails {
    PrisonerDetails {
        prisoner_number: prisoner_number.to_string(),
        booking_id: BookingId(booking_id),
        prison_id: prison_id.to_string(),
        location_id: Some(format!("{prison_id}-1-1-001")),
        date_of_birth,
        reception_date: date(2024, 1, 10),
        has_open_safety_alert: false,
    }
}

pub(super) fn new_review(
    prisoner: &PrisonerDetails,
    level_code: &str,
    review_type: ReviewType,
    review_time: NaiveDateTime,
    current: bool,
) -> NewReview {
    NewReview {
        booking_id: prisoner.booking_id,
        prisoner_number: prisoner.prisoner_number.clone(),
        prison_id: prisoner.prison_id.clone(),
        location_id: prisoner.location_id.clone(),
        level_code: level_code.to_string(),
        review_type,
        reviewed_by: "USER_GEN".to_string(),
        review_time,
        comment_text: Some("Behaviour review".to_string()),
        current,
    }
}

/// Review value for pure scheduler tests, ids ascending with time.
pub(super) fn stored(id: i64, level_code: &str, review_type: ReviewType, review_time: NaiveDateTime) -> Review {
    let subject = prisoner("A1234BC", 100, "MDI", date(1990, 1, 1));
    new_review(&subject, level_code, review_type, review_time, false).with_id(ReviewId(id))
}

pub(super) fn event(reason_code: ReasonCode, prisoner_number: &str, occurred_at: DateTime<FixedOffset>) -> InboundEvent {
    InboundEvent {
        reason_code,
        prisoner_number: prisoner_number.to_string(),
        booking_id: None,
        removed_prisoner_number: None,
        moved_from_prisoner_number: None,
        occurred_at,
        alert_codes: Vec::new(),
        description: None,
    }
}

#[derive(Default)]
pub(super) struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
    failing: bool,
}

impl RecordingPublisher {
    pub(super) fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    pub(super) fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().expect("publisher mutex poisoned").clone()
    }
}

#[async_trait]
impl DomainEventPublisher for RecordingPublisher {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError> {
        if self.failing {
            return Err(PublishError::Transport("topic unavailable".to_string()));
        }
        self.events
            .lock()
            .expect("publisher mutex poisoned")
            .push(event);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingAudit {
    records: Mutex<Vec<AuditRecord>>,
}

impl RecordingAudit {
    pub(super) fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().expect("audit mutex poisoned").clone()
    }
}

#[async_trait]
impl AuditSink for RecordingAudit {
    async fn record(&self, record: AuditRecord) -> Result<(), PublishError> {
        self.records
            .lock()
            .expect("audit mutex poisoned")
            .push(record);
        Ok(())
    }
}

/// Engine over in-memory collaborators with recording sinks.
pub(super) struct Harness {
    pub(super) reviews: Arc<MemoryReviewRepository>,
    pub(super) dates: Arc<MemoryNextReviewDateRepository>,
    pub(super) directory: Arc<MemoryPrisonerDirectory>,
    pub(super) engine: ReviewEngine,
    pub(super) events: Arc<RecordingPublisher>,
    pub(super) audit: Arc<RecordingAudit>,
}

impl Harness {
    pub(super) fn new(prisoners: Vec<PrisonerDetails>) -> Self {
        Self::with_publisher(prisoners, RecordingPublisher::default())
    }

    pub(super) fn with_publisher(prisoners: Vec<PrisonerDetails>, publisher: RecordingPublisher) -> Self {
        let reviews = Arc::new(MemoryReviewRepository::new());
        let dates = Arc::new(MemoryNextReviewDateRepository::new());
        let directory = Arc::new(MemoryPrisonerDirectory::new(prisoners));
        let engine = ReviewEngine::new(
            Collaborators {
                reviews: reviews.clone(),
                next_review_dates: dates.clone(),
                catalog: Arc::new(catalog()),
                directory: directory.clone(),
            },
            PolicyConfig::default(),
        );

        Self {
            reviews,
            dates,
            directory,
            engine,
            events: Arc::new(publisher),
            audit: Arc::new(RecordingAudit::default()),
        }
    }

    pub(super) fn audited(&self) -> (AuditedProcessor, AuditedReviewService) {
        self.engine
            .audited(Notifier::new(self.events.clone(), self.audit.clone()))
    }

    pub(super) async fn seed(&self, review: NewReview) -> Review {
        self.reviews.insert(review).await.expect("seed review")
    }

    pub(super) fn current_count(&self, booking_id: BookingId) -> usize {
        self.reviews
            .all()
            .expect("reviews readable")
            .iter()
            .filter(|review| review.booking_id == booking_id && review.current)
            .count()
    }
}
