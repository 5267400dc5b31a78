//! Notification decorators: outbound events and audit records follow each committed transition.

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::json;
use tracing::warn;

use super::domain::{BookingId, Review, ReviewId};
use super::error::ReviewError;
use super::events::{
    AuditRecord, AuditSink, AuditType, DomainEvent, DomainEventPublisher, DomainEventType,
    InboundEvent,
};
use super::history::HistoryWrite;
use super::processor::{ReviewLifecycleProcessor, Transition};
use super::service::{ReviewPatch, ReviewRequest, ReviewService};

/// Turns transitions into domain events and audit records.
///
/// Publication failures are logged and swallowed: the write they describe has already
/// been committed.
#[derive(Clone)]
pub struct Notifier {
    events: Arc<dyn DomainEventPublisher>,
    audit: Arc<dyn AuditSink>,
}

impl Notifier {
    pub fn new(events: Arc<dyn DomainEventPublisher>, audit: Arc<dyn AuditSink>) -> Self {
        Self { events, audit }
    }

    pub async fn announce(&self, transition: &Transition, who: &str, now: NaiveDateTime) {
        match transition {
            Transition::ReviewAdded(write) => {
                self.review(DomainEventType::ReviewAdded, AuditType::IepReviewAdded, &write.outcome, who, now)
                    .await
            }
            Transition::ReviewUpdated(write) => {
                self.review(DomainEventType::ReviewUpdated, AuditType::IepReviewUpdated, &write.outcome, who, now)
                    .await
            }
            Transition::ReviewDeleted(write) => {
                self.review(DomainEventType::ReviewDeleted, AuditType::IepReviewDeleted, &write.outcome, who, now)
                    .await
            }
            Transition::Merged {
                prisoner_number,
                removed_prisoner_number,
                booking_id,
                write,
            } => {
                let message = format!(
                    "{} incentive records updated from merge {removed_prisoner_number} -> {prisoner_number}. Updated to booking ID {booking_id}",
                    write.outcome.len()
                );
                self.record(AuditRecord {
                    what: AuditType::PrisonerNumberMerge,
                    who: who.to_string(),
                    when: now,
                    details: json!({
                        "prisonerNumber": prisoner_number,
                        "removedPrisonerNumber": removed_prisoner_number,
                        "bookingId": booking_id,
                        "reviewIds": review_ids(&write.outcome),
                        "message": message,
                    }),
                })
                .await
            }
            Transition::BookingMoved {
                prisoner_number,
                moved_from_prisoner_number,
                booking_id,
                write,
            } => {
                self.record(AuditRecord {
                    what: AuditType::BookingMoved,
                    who: who.to_string(),
                    when: now,
                    details: json!({
                        "prisonerNumber": prisoner_number,
                        "movedFromPrisonerNumber": moved_from_prisoner_number,
                        "bookingId": booking_id,
                        "reviewIds": review_ids(&write.outcome),
                    }),
                })
                .await
            }
            Transition::ScheduleRecomputed { .. } | Transition::Ignored(_) => {}
        }

        if let Some(schedule) = transition.schedule() {
            for change in &schedule.changes {
                self.publish(DomainEvent::schedule_changed(
                    change.booking_id,
                    change.prisoner_number.clone(),
                    change.next_review_date,
                    now,
                ))
                .await;
            }
        }
    }

    async fn review(
        &self,
        event_type: DomainEventType,
        audit_type: AuditType,
        review: &Review,
        who: &str,
        now: NaiveDateTime,
    ) {
        self.publish(DomainEvent::review(
            event_type,
            review.id,
            review.prisoner_number.clone(),
            now,
        ))
        .await;
        self.record(AuditRecord {
            what: audit_type,
            who: who.to_string(),
            when: now,
            details: json!({
                "id": review.id,
                "bookingId": review.booking_id,
                "prisonerNumber": review.prisoner_number,
                "prisonId": review.prison_id,
                "levelCode": review.level_code,
                "reviewType": review.review_type,
                "reviewTime": review.review_time,
                "current": review.current,
            }),
        })
        .await;
    }

    async fn publish(&self, event: DomainEvent) {
        let topic = event.event_type.topic();
        if let Err(error) = self.events.publish(event).await {
            warn!(%error, topic, "failed to publish domain event");
        }
    }

    async fn record(&self, record: AuditRecord) {
        let what = record.what;
        if let Err(error) = self.audit.record(record).await {
            warn!(%error, ?what, "failed to record audit entry");
        }
    }
}

fn review_ids(reviews: &[Review]) -> Vec<ReviewId> {
    reviews.iter().map(|review| review.id).collect()
}

/// Event processor that announces every transition it commits.
pub struct AuditedProcessor {
    inner: Arc<ReviewLifecycleProcessor>,
    notifier: Notifier,
}

impl AuditedProcessor {
    pub fn new(inner: Arc<ReviewLifecycleProcessor>, notifier: Notifier) -> Self {
        Self { inner, notifier }
    }

    pub async fn process(
        &self,
        event: &InboundEvent,
        now: NaiveDateTime,
    ) -> Result<Transition, ReviewError> {
        let transition = self.inner.process(event, now).await?;
        self.notifier
            .announce(&transition, &self.inner.policy().system_username, now)
            .await;
        Ok(transition)
    }
}

/// Review service whose mutations are announced.
pub struct AuditedReviewService {
    inner: Arc<ReviewService>,
    notifier: Notifier,
    system_username: String,
}

impl AuditedReviewService {
    pub fn new(inner: Arc<ReviewService>, notifier: Notifier, system_username: impl Into<String>) -> Self {
        Self {
            inner,
            notifier,
            system_username: system_username.into(),
        }
    }

    /// Read side, which needs no announcements.
    pub fn queries(&self) -> &ReviewService {
        &self.inner
    }

    pub async fn add_review(
        &self,
        prisoner_number: &str,
        request: ReviewRequest,
        reviewer: &str,
        now: NaiveDateTime,
    ) -> Result<Review, ReviewError> {
        let write = self
            .inner
            .add_review(prisoner_number, request, reviewer, now)
            .await?;
        self.finish(Transition::ReviewAdded, write, reviewer, now).await
    }

    pub async fn update_review(
        &self,
        booking_id: BookingId,
        id: ReviewId,
        patch: ReviewPatch,
        now: NaiveDateTime,
    ) -> Result<Review, ReviewError> {
        let write = self.inner.update_review(booking_id, id, patch, now).await?;
        self.finish(Transition::ReviewUpdated, write, &self.system_username, now)
            .await
    }

    pub async fn delete_review(
        &self,
        booking_id: BookingId,
        id: ReviewId,
        now: NaiveDateTime,
    ) -> Result<Review, ReviewError> {
        let write = self.inner.delete_review(booking_id, id, now).await?;
        self.finish(Transition::ReviewDeleted, write, &self.system_username, now)
            .await
    }

    async fn finish(
        &self,
        wrap: fn(HistoryWrite<Review>) -> Transition,
        write: HistoryWrite<Review>,
        who: &str,
        now: NaiveDateTime,
    ) -> Result<Review, ReviewError> {
        let review = write.outcome.clone();
        self.notifier.announce(&wrap(write), who, now).await;
        Ok(review)
    }
}
