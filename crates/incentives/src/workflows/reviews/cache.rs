use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use super::directory::{PrisonerDetails, PrisonerDirectory};
use super::domain::{BookingId, NextReviewDate, Review};
use super::error::ReviewError;
use super::repository::{NextReviewDateRepository, ReviewRepository};
use super::schedule::{NextReviewDateInput, ReviewScheduler};

/// A cached next review date that moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleChange {
    pub booking_id: BookingId,
    pub prisoner_number: String,
    pub previous: NaiveDate,
    pub next_review_date: NaiveDate,
}

/// Result of recomputing the schedule of a set of bookings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleRecomputation {
    pub dates: BTreeMap<BookingId, NaiveDate>,
    /// Only bookings that already had a cached date which differs from the new one.
    pub changes: Vec<ScheduleChange>,
}

impl ScheduleRecomputation {
    pub fn date_for(&self, booking_id: BookingId) -> Option<NaiveDate> {
        self.dates.get(&booking_id).copied()
    }
}

/// Memoises scheduler output per booking.
pub struct ScheduleCache {
    reviews: Arc<dyn ReviewRepository>,
    dates: Arc<dyn NextReviewDateRepository>,
    directory: Arc<dyn PrisonerDirectory>,
    scheduler: ReviewScheduler,
}

impl ScheduleCache {
    pub fn new(
        reviews: Arc<dyn ReviewRepository>,
        dates: Arc<dyn NextReviewDateRepository>,
        directory: Arc<dyn PrisonerDirectory>,
        scheduler: ReviewScheduler,
    ) -> Self {
        Self {
            reviews,
            dates,
            directory,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> &ReviewScheduler {
        &self.scheduler
    }

    /// Cached date for a booking, computed and stored when absent.
    pub async fn get(
        &self,
        booking_id: BookingId,
        now: NaiveDateTime,
    ) -> Result<NaiveDate, ReviewError> {
        let dates = self.get_many(&[booking_id], now).await?;
        dates
            .get(&booking_id)
            .copied()
            .ok_or(ReviewError::NoReviewsForBooking(booking_id))
    }

    pub async fn get_many(
        &self,
        booking_ids: &[BookingId],
        now: NaiveDateTime,
    ) -> Result<BTreeMap<BookingId, NaiveDate>, ReviewError> {
        let mut dates: BTreeMap<BookingId, NaiveDate> = self
            .dates
            .fetch_many(booking_ids)
            .await?
            .into_iter()
            .map(|(booking_id, record)| (booking_id, record.next_review_date))
            .collect();

        let missing: Vec<BookingId> = booking_ids
            .iter()
            .copied()
            .filter(|booking_id| !dates.contains_key(booking_id))
            .collect();
        if !missing.is_empty() {
            debug!(bookings = missing.len(), "computing uncached next review dates");
            let computed = self.invalidate_and_recompute(&missing, now).await?;
            dates.extend(computed.dates);
        }
        Ok(dates)
    }

    /// Recomputes bookings whose prisoner details must be fetched from the directory.
    pub async fn invalidate_and_recompute(
        &self,
        booking_ids: &[BookingId],
        now: NaiveDateTime,
    ) -> Result<ScheduleRecomputation, ReviewError> {
        let mut prisoners = Vec::with_capacity(booking_ids.len());
        for booking_id in booking_ids {
            let mut prisoner = self.directory.by_booking(*booking_id).await?;
            prisoner.booking_id = *booking_id;
            prisoners.push(prisoner);
        }
        self.recompute_for(&prisoners, now).await
    }

    /// Drops cached dates of bookings that no longer hold any review.
    pub async fn forget(&self, booking_ids: &[BookingId]) -> Result<(), ReviewError> {
        if booking_ids.is_empty() {
            return Ok(());
        }
        debug!(bookings = ?booking_ids, "dropping next review dates of emptied bookings");
        self.dates.delete_many(booking_ids).await?;
        Ok(())
    }

    /// Recomputes the booking of each prisoner, persists the results and reports changes.
    pub async fn recompute_for(
        &self,
        prisoners: &[PrisonerDetails],
        now: NaiveDateTime,
    ) -> Result<ScheduleRecomputation, ReviewError> {
        let booking_ids: Vec<BookingId> =
            prisoners.iter().map(|prisoner| prisoner.booking_id).collect();
        let history = self.reviews.for_bookings(&booking_ids).await?;
        let previous = self.dates.fetch_many(&booking_ids).await?;

        let mut recomputation = ScheduleRecomputation::default();
        let mut records = Vec::with_capacity(prisoners.len());

        for prisoner in prisoners {
            let reviews: Vec<Review> = history
                .iter()
                .filter(|review| review.booking_id == prisoner.booking_id)
                .cloned()
                .collect();
            let next_review_date = self.scheduler.next_review_date(&NextReviewDateInput {
                date_of_birth: prisoner.date_of_birth,
                reception_date: prisoner.reception_date,
                has_open_safety_alert: prisoner.has_open_safety_alert,
                reviews: &reviews,
            });

            if let Some(old) = previous.get(&prisoner.booking_id) {
                if old.next_review_date != next_review_date {
                    recomputation.changes.push(ScheduleChange {
                        booking_id: prisoner.booking_id,
                        prisoner_number: prisoner.prisoner_number.clone(),
                        previous: old.next_review_date,
                        next_review_date,
                    });
                }
            }

            recomputation
                .dates
                .insert(prisoner.booking_id, next_review_date);
            records.push(NextReviewDate {
                booking_id: prisoner.booking_id,
                next_review_date,
                when_updated: now,
            });
        }

        self.dates.save_many(records).await?;
        Ok(recomputation)
    }
}
