use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info};

use super::cache::ScheduleRecomputation;
use super::directory::{PrisonerDetails, PrisonerDirectory};
use super::domain::{BookingId, NewReview, Review, ReviewType};
use super::error::ReviewError;
use super::events::{InboundEvent, ReasonCode};
use super::history::{HistoryWrite, ReviewHistoryStore};
use super::levels::LevelCatalog;
use super::locks::BookingLocks;
use super::nearest::NearestLevelResolver;
use super::repository::MergeBatch;
use crate::config::PolicyConfig;

pub const ARRIVAL_COMMENT: &str = "Default level assigned on arrival";
pub const TRANSFER_COMMENT: &str = "Level transferred from previous establishment";

/// Why an event led to no state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    UnrecognizedReason,
    UntrackedAlert,
    NothingToMerge,
}

/// State change produced by an event or a manual operation, consumed by the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    ReviewAdded(HistoryWrite<Review>),
    ReviewUpdated(HistoryWrite<Review>),
    ReviewDeleted(HistoryWrite<Review>),
    Merged {
        prisoner_number: String,
        removed_prisoner_number: String,
        booking_id: BookingId,
        write: HistoryWrite<Vec<Review>>,
    },
    BookingMoved {
        prisoner_number: String,
        moved_from_prisoner_number: String,
        booking_id: BookingId,
        write: HistoryWrite<Vec<Review>>,
    },
    ScheduleRecomputed {
        prisoner_number: String,
        schedule: ScheduleRecomputation,
    },
    Ignored(IgnoreReason),
}

impl Transition {
    pub fn schedule(&self) -> Option<&ScheduleRecomputation> {
        match self {
            Transition::ReviewAdded(write)
            | Transition::ReviewUpdated(write)
            | Transition::ReviewDeleted(write) => Some(&write.schedule),
            Transition::Merged { write, .. } | Transition::BookingMoved { write, .. } => {
                Some(&write.schedule)
            }
            Transition::ScheduleRecomputed { schedule, .. } => Some(schedule),
            Transition::Ignored(_) => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Transition::ReviewAdded(_) => "review_added",
            Transition::ReviewUpdated(_) => "review_updated",
            Transition::ReviewDeleted(_) => "review_deleted",
            Transition::Merged { .. } => "merged",
            Transition::BookingMoved { .. } => "booking_moved",
            Transition::ScheduleRecomputed { .. } => "schedule_recomputed",
            Transition::Ignored(_) => "ignored",
        }
    }
}

/// Reacts to prisoner life-cycle events by writing reviews and reconciling history.
pub struct ReviewLifecycleProcessor {
    directory: Arc<dyn PrisonerDirectory>,
    catalog: Arc<dyn LevelCatalog>,
    resolver: NearestLevelResolver,
    history: Arc<ReviewHistoryStore>,
    locks: Arc<BookingLocks>,
    policy: PolicyConfig,
}

impl ReviewLifecycleProcessor {
    pub fn new(
        directory: Arc<dyn PrisonerDirectory>,
        catalog: Arc<dyn LevelCatalog>,
        history: Arc<ReviewHistoryStore>,
        locks: Arc<BookingLocks>,
        policy: PolicyConfig,
    ) -> Self {
        Self {
            directory,
            resolver: NearestLevelResolver::new(Arc::clone(&catalog)),
            catalog,
            history,
            locks,
            policy,
        }
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub async fn process(
        &self,
        event: &InboundEvent,
        now: NaiveDateTime,
    ) -> Result<Transition, ReviewError> {
        match event.reason_code {
            ReasonCode::Admission => self.receive(event, ReviewType::Initial, now).await,
            ReasonCode::Readmission => self.receive(event, ReviewType::Readmission, now).await,
            ReasonCode::Transfer => self.receive(event, ReviewType::Transfer, now).await,
            ReasonCode::Merge => self.merge(event, now).await,
            ReasonCode::BookingMoved => self.booking_moved(event, now).await,
            ReasonCode::AlertAdded | ReasonCode::AlertRemoved => {
                self.alerts_changed(event, now).await
            }
            ReasonCode::Unrecognized => {
                debug!(
                    prisoner_number = %event.prisoner_number,
                    description = event.description.as_deref().unwrap_or_default(),
                    "ignoring event with unrecognised reason"
                );
                Ok(Transition::Ignored(IgnoreReason::UnrecognizedReason))
            }
        }
    }

    /// Admission, readmission and transfer: record the level the prisoner arrives on.
    async fn receive(
        &self,
        event: &InboundEvent,
        review_type: ReviewType,
        now: NaiveDateTime,
    ) -> Result<Transition, ReviewError> {
        let prisoner = self.directory.by_number(&event.prisoner_number).await?;
        let _guard = self.locks.lock(prisoner.booking_id).await;

        let (level_code, comment) = match review_type {
            ReviewType::Transfer => (self.level_after_transfer(&prisoner).await?, TRANSFER_COMMENT),
            _ => (
                self.catalog.default_level(&prisoner.prison_id).await?,
                ARRIVAL_COMMENT,
            ),
        };

        let review = NewReview {
            booking_id: prisoner.booking_id,
            prisoner_number: prisoner.prisoner_number.clone(),
            prison_id: prisoner.prison_id.clone(),
            location_id: prisoner.location_id.clone(),
            level_code,
            review_type,
            reviewed_by: self.policy.system_username.clone(),
            review_time: event.local_time(),
            comment_text: Some(comment.to_string()),
            current: true,
        };

        let write = self.history.save(review, &prisoner, now).await?;
        Ok(Transition::ReviewAdded(write))
    }

    async fn level_after_transfer(&self, prisoner: &PrisonerDetails) -> Result<String, ReviewError> {
        let history = self
            .history
            .reviews()
            .for_booking(prisoner.booking_id)
            .await?;
        if history.is_empty() {
            return Ok(self.catalog.default_level(&prisoner.prison_id).await?);
        }

        let before_transfer = match history
            .iter()
            .find(|review| review.prison_id != prisoner.prison_id)
        {
            Some(review) => review.level_code.clone(),
            None => self.catalog.default_level(&prisoner.prison_id).await?,
        };

        Ok(self
            .resolver
            .resolve(&prisoner.prison_id, &before_transfer)
            .await?)
    }

    async fn merge(
        &self,
        event: &InboundEvent,
        now: NaiveDateTime,
    ) -> Result<Transition, ReviewError> {
        let removed_number = event
            .removed_prisoner_number
            .as_deref()
            .ok_or_else(|| ReviewError::Invalid("merge event without removedPrisonerNumber".into()))?;
        let surviving_number = event.prisoner_number.as_str();
        info!(
            removed = removed_number,
            surviving = surviving_number,
            "processing prisoner number merge"
        );

        let surviving = self.directory.by_number(surviving_number).await?;

        let _guard = loop {
            let mut lock_set: Vec<BookingId> = self
                .merge_bookings(removed_number, surviving_number)
                .await?
                .into_iter()
                .collect();
            lock_set.push(surviving.booking_id);
            let guard = self.locks.lock_all(&lock_set).await;

            let involved = self.merge_bookings(removed_number, surviving_number).await?;
            if involved
                .iter()
                .all(|booking_id| guard.bookings().contains(booking_id))
            {
                break guard;
            }
            debug!(
                removed = removed_number,
                surviving = surviving_number,
                "merge bookings changed while locking, retrying"
            );
        };

        // re-read under the locks
        let removed_reviews = self.history.reviews().for_prisoner(removed_number).await?;
        if removed_reviews.is_empty() {
            info!(
                removed = removed_number,
                "no incentive reviews recorded for removed prisoner number, nothing to merge"
            );
            return Ok(Transition::Ignored(IgnoreReason::NothingToMerge));
        }
        let surviving_reviews = self.history.reviews().for_prisoner(surviving_number).await?;

        let batch = MergeBatch {
            relabeled: removed_reviews
                .into_iter()
                .map(|mut review| {
                    review.prisoner_number = surviving_number.to_string();
                    review
                })
                .collect(),
            rebooked: surviving_reviews
                .into_iter()
                .filter(|review| review.booking_id != surviving.booking_id)
                .map(|review| {
                    let mut moved = review.to_new();
                    moved.booking_id = surviving.booking_id;
                    moved.current = false;
                    (review.id, moved)
                })
                .collect(),
        };

        let updated = batch.len();
        let write = self.history.save_merged_set(batch, &surviving, now).await?;
        info!(
            removed = removed_number,
            surviving = surviving_number,
            booking_id = %surviving.booking_id,
            updated,
            "incentive reviews merged"
        );

        Ok(Transition::Merged {
            prisoner_number: surviving_number.to_string(),
            removed_prisoner_number: removed_number.to_string(),
            booking_id: surviving.booking_id,
            write,
        })
    }

    async fn merge_bookings(
        &self,
        removed_number: &str,
        surviving_number: &str,
    ) -> Result<BTreeSet<BookingId>, ReviewError> {
        let mut bookings = BTreeSet::new();
        for number in [removed_number, surviving_number] {
            for review in self.history.reviews().for_prisoner(number).await? {
                bookings.insert(review.booking_id);
            }
        }
        Ok(bookings)
    }

    async fn booking_moved(
        &self,
        event: &InboundEvent,
        now: NaiveDateTime,
    ) -> Result<Transition, ReviewError> {
        let moved_from = event.moved_from_prisoner_number.as_deref().ok_or_else(|| {
            ReviewError::Invalid("booking moved event without movedFromPrisonerNumber".into())
        })?;
        let booking_id = event
            .booking_id
            .ok_or_else(|| ReviewError::Invalid("booking moved event without bookingId".into()))?;

        let mut subject = self.directory.by_number(&event.prisoner_number).await?;
        subject.booking_id = booking_id;

        let _guard = self.locks.lock(booking_id).await;
        let write = self
            .history
            .reassign_prisoner(&subject, moved_from, now)
            .await?;
        info!(
            booking_id = %booking_id,
            from = moved_from,
            to = %event.prisoner_number,
            moved = write.outcome.len(),
            "incentive reviews moved with booking"
        );

        Ok(Transition::BookingMoved {
            prisoner_number: event.prisoner_number.clone(),
            moved_from_prisoner_number: moved_from.to_string(),
            booking_id,
            write,
        })
    }

    async fn alerts_changed(
        &self,
        event: &InboundEvent,
        now: NaiveDateTime,
    ) -> Result<Transition, ReviewError> {
        let tracked = &self.policy.safety_alert_code;
        if !event.alert_codes.iter().any(|code| code == tracked) {
            debug!(
                prisoner_number = %event.prisoner_number,
                codes = ?event.alert_codes,
                "ignoring alert change without tracked alert code"
            );
            return Ok(Transition::Ignored(IgnoreReason::UntrackedAlert));
        }

        let mut subject = self.directory.by_number(&event.prisoner_number).await?;
        if let Some(booking_id) = event.booking_id {
            subject.booking_id = booking_id;
        }

        let _guard = self.locks.lock(subject.booking_id).await;
        let schedule = self
            .history
            .cache()
            .recompute_for(std::slice::from_ref(&subject), now)
            .await?;

        Ok(Transition::ScheduleRecomputed {
            prisoner_number: subject.prisoner_number,
            schedule,
        })
    }
}
