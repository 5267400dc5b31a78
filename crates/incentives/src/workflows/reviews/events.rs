//! Inbound life-cycle events and the outbound domain events and audit records.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{BookingId, ReviewId};

/// Why the prisoner directory raised an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    Admission,
    Readmission,
    Transfer,
    Merge,
    BookingMoved,
    AlertAdded,
    AlertRemoved,
    #[serde(other)]
    Unrecognized,
}

/// Prisoner life-cycle event as received from the inbound queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    pub reason_code: ReasonCode,
    pub prisoner_number: String,
    #[serde(default)]
    pub booking_id: Option<BookingId>,
    #[serde(default)]
    pub removed_prisoner_number: Option<String>,
    #[serde(default)]
    pub moved_from_prisoner_number: Option<String>,
    pub occurred_at: DateTime<FixedOffset>,
    #[serde(default)]
    pub alert_codes: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl InboundEvent {
    /// Local wall-clock time of the event, used as the review time of generated reviews.
    pub fn local_time(&self) -> NaiveDateTime {
        self.occurred_at.naive_local()
    }
}

/// Kind of outbound domain event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainEventType {
    ReviewAdded,
    ReviewUpdated,
    ReviewDeleted,
    ScheduleChanged,
}

impl DomainEventType {
    pub fn topic(self) -> &'static str {
        match self {
            DomainEventType::ReviewAdded => "incentives.iep-review.inserted",
            DomainEventType::ReviewUpdated => "incentives.iep-review.updated",
            DomainEventType::ReviewDeleted => "incentives.iep-review.deleted",
            DomainEventType::ScheduleChanged => "incentives.prisoner.next-review-date-changed",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            DomainEventType::ReviewAdded => "An IEP review has been added",
            DomainEventType::ReviewUpdated => "An IEP review has been updated",
            DomainEventType::ReviewDeleted => "An IEP review has been deleted",
            DomainEventType::ScheduleChanged => "A prisoner's next review date has changed",
        }
    }
}

impl Serialize for DomainEventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.topic())
    }
}

/// Payload-specific part of a domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DomainEventDetail {
    #[serde(rename_all = "camelCase")]
    Review {
        review_id: ReviewId,
        prisoner_number: String,
    },
    #[serde(rename_all = "camelCase")]
    Schedule {
        booking_id: BookingId,
        prisoner_number: String,
        new_next_review_date: NaiveDate,
    },
}

/// Event published for other services after a review or schedule change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEvent {
    pub event_type: DomainEventType,
    #[serde(flatten)]
    pub detail: DomainEventDetail,
    pub occurred_at: NaiveDateTime,
}

impl DomainEvent {
    pub fn review(
        event_type: DomainEventType,
        review_id: ReviewId,
        prisoner_number: impl Into<String>,
        occurred_at: NaiveDateTime,
    ) -> Self {
        Self {
            event_type,
            detail: DomainEventDetail::Review {
                review_id,
                prisoner_number: prisoner_number.into(),
            },
            occurred_at,
        }
    }

    pub fn schedule_changed(
        booking_id: BookingId,
        prisoner_number: impl Into<String>,
        new_next_review_date: NaiveDate,
        occurred_at: NaiveDateTime,
    ) -> Self {
        Self {
            event_type: DomainEventType::ScheduleChanged,
            detail: DomainEventDetail::Schedule {
                booking_id,
                prisoner_number: prisoner_number.into(),
                new_next_review_date,
            },
            occurred_at,
        }
    }
}

/// What an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditType {
    IepReviewAdded,
    IepReviewUpdated,
    IepReviewDeleted,
    PrisonerNumberMerge,
    BookingMoved,
}

/// Audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub what: AuditType,
    pub who: String,
    pub when: NaiveDateTime,
    pub details: Value,
}

/// Sink for outbound domain events.
#[async_trait]
pub trait DomainEventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<(), PublishError>;
}

/// Sink for audit records.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, record: AuditRecord) -> Result<(), PublishError>;
}

/// Failure to hand an event or audit record to its transport.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publish transport failed: {0}")]
    Transport(String),
}
