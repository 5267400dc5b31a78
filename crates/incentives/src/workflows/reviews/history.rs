use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::info;

use super::cache::{ScheduleCache, ScheduleRecomputation};
use super::directory::PrisonerDetails;
use super::domain::{NewReview, Review, ReviewId};
use super::error::ReviewError;
use super::repository::{MergeBatch, MergeOutcome, ReviewRepository};

/// A history write together with the schedule recomputation it triggered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryWrite<T> {
    pub outcome: T,
    pub schedule: ScheduleRecomputation,
}

/// Owns the review history: every write goes through here so the schedule follows it.
///
/// Callers hold the booking lock for the bookings they write; `subject` describes the
/// booking whose schedule is recomputed afterwards.
pub struct ReviewHistoryStore {
    reviews: Arc<dyn ReviewRepository>,
    cache: Arc<ScheduleCache>,
}

impl ReviewHistoryStore {
    pub fn new(reviews: Arc<dyn ReviewRepository>, cache: Arc<ScheduleCache>) -> Self {
        Self { reviews, cache }
    }

    pub fn reviews(&self) -> &Arc<dyn ReviewRepository> {
        &self.reviews
    }

    pub fn cache(&self) -> &Arc<ScheduleCache> {
        &self.cache
    }

    pub async fn save(
        &self,
        review: NewReview,
        subject: &PrisonerDetails,
        now: NaiveDateTime,
    ) -> Result<HistoryWrite<Review>, ReviewError> {
        let stored = self.reviews.insert(review).await?;
        info!(
            review_id = %stored.id,
            booking_id = %stored.booking_id,
            prisoner_number = %stored.prisoner_number,
            level = %stored.level_code,
            review_type = stored.review_type.label(),
            "incentive review recorded"
        );
        let schedule = self.recompute(subject, now).await?;
        Ok(HistoryWrite {
            outcome: stored,
            schedule,
        })
    }

    /// Persists a merge batch, drops the cached dates of bookings it emptied and recomputes
    /// the surviving booking once.
    pub async fn save_merged_set(
        &self,
        batch: MergeBatch,
        surviving: &PrisonerDetails,
        now: NaiveDateTime,
    ) -> Result<HistoryWrite<Vec<Review>>, ReviewError> {
        let MergeOutcome { written, emptied } = self.reviews.apply_merge(batch).await?;
        self.cache.forget(&emptied).await?;
        let schedule = self.recompute(surviving, now).await?;
        Ok(HistoryWrite {
            outcome: written,
            schedule,
        })
    }

    pub async fn reassign_prisoner(
        &self,
        subject: &PrisonerDetails,
        from: &str,
        now: NaiveDateTime,
    ) -> Result<HistoryWrite<Vec<Review>>, ReviewError> {
        let rewritten = self
            .reviews
            .reassign_prisoner(subject.booking_id, from, &subject.prisoner_number)
            .await?;
        let schedule = self.recompute(subject, now).await?;
        Ok(HistoryWrite {
            outcome: rewritten,
            schedule,
        })
    }

    pub async fn update(
        &self,
        review: Review,
        subject: &PrisonerDetails,
        now: NaiveDateTime,
    ) -> Result<HistoryWrite<Review>, ReviewError> {
        let updated = self.reviews.update(review).await?;
        let schedule = self.recompute(subject, now).await?;
        Ok(HistoryWrite {
            outcome: updated,
            schedule,
        })
    }

    pub async fn delete(
        &self,
        id: ReviewId,
        subject: &PrisonerDetails,
        now: NaiveDateTime,
    ) -> Result<HistoryWrite<Review>, ReviewError> {
        let removed = self.reviews.delete(id).await?;
        let schedule = self.recompute(subject, now).await?;
        Ok(HistoryWrite {
            outcome: removed,
            schedule,
        })
    }

    async fn recompute(
        &self,
        subject: &PrisonerDetails,
        now: NaiveDateTime,
    ) -> Result<ScheduleRecomputation, ReviewError> {
        self.cache
            .recompute_for(std::slice::from_ref(subject), now)
            .await
    }
}
