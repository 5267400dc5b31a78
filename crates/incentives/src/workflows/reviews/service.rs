use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::directory::{PrisonerDetails, PrisonerDirectory};
use super::domain::{is_real_review_in, BookingId, NewReview, Review, ReviewId, ReviewType};
use super::error::ReviewError;
use super::history::{HistoryWrite, ReviewHistoryStore};
use super::levels::LevelCatalog;
use super::locks::BookingLocks;
use super::repository::RepositoryError;

const UNMAPPED_LEVEL: &str = "Unmapped";

/// One review as presented to readers, with the level name resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDetail {
    pub id: ReviewId,
    pub booking_id: BookingId,
    pub prisoner_number: String,
    pub prison_id: String,
    pub location_id: Option<String>,
    pub level_code: String,
    pub level_name: String,
    pub review_type: ReviewType,
    pub reviewed_by: String,
    pub review_date: NaiveDate,
    pub review_time: NaiveDateTime,
    pub comment_text: Option<String>,
    pub current: bool,
}

/// Summary of a review history headed by its most recent review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewSummary {
    pub id: ReviewId,
    pub booking_id: BookingId,
    pub prisoner_number: String,
    pub level_code: String,
    pub level_name: String,
    pub review_date: NaiveDate,
    pub review_time: NaiveDateTime,
    pub location_id: Option<String>,
    pub days_since_review: i64,
    pub last_real_review_date: Option<NaiveDate>,
    pub next_review_date: NaiveDate,
    /// Most recent first; empty when details were not requested.
    pub details: Vec<ReviewDetail>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentLevel {
    pub booking_id: BookingId,
    pub level_name: String,
}

/// Manually recorded review.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub level_code: String,
    pub comment: String,
    #[serde(default)]
    pub review_type: Option<ReviewType>,
}

/// Partial correction of a stored review.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPatch {
    #[serde(default)]
    pub review_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub current: Option<bool>,
}

impl ReviewPatch {
    pub fn is_empty(&self) -> bool {
        self.review_time.is_none() && self.comment.is_none() && self.current.is_none()
    }
}

/// Queries and manual corrections over the review history.
pub struct ReviewService {
    directory: Arc<dyn PrisonerDirectory>,
    catalog: Arc<dyn LevelCatalog>,
    history: Arc<ReviewHistoryStore>,
    locks: Arc<BookingLocks>,
}

impl ReviewService {
    pub fn new(
        directory: Arc<dyn PrisonerDirectory>,
        catalog: Arc<dyn LevelCatalog>,
        history: Arc<ReviewHistoryStore>,
        locks: Arc<BookingLocks>,
    ) -> Self {
        Self {
            directory,
            catalog,
            history,
            locks,
        }
    }

    pub async fn history_for_booking(
        &self,
        booking_id: BookingId,
        with_details: bool,
        now: NaiveDateTime,
    ) -> Result<ReviewSummary, ReviewError> {
        let reviews = self.history.reviews().for_booking(booking_id).await?;
        if reviews.is_empty() {
            return Err(ReviewError::NoReviewsForBooking(booking_id));
        }
        self.summarise(reviews, with_details, now).await
    }

    pub async fn history_for_prisoner(
        &self,
        prisoner_number: &str,
        now: NaiveDateTime,
    ) -> Result<ReviewSummary, ReviewError> {
        let reviews = self.history.reviews().for_prisoner(prisoner_number).await?;
        if reviews.is_empty() {
            return Err(ReviewError::NoReviewsForPrisoner(prisoner_number.to_string()));
        }
        self.summarise(reviews, true, now).await
    }

    pub async fn current_levels(
        &self,
        booking_ids: &[BookingId],
    ) -> Result<Vec<CurrentLevel>, ReviewError> {
        let names = self.level_names().await?;
        let current = self
            .history
            .reviews()
            .current_for_bookings(booking_ids)
            .await?;
        Ok(current
            .into_iter()
            .map(|review| CurrentLevel {
                booking_id: review.booking_id,
                level_name: level_name(&names, &review.level_code),
            })
            .collect())
    }

    pub async fn review_by_id(&self, id: ReviewId) -> Result<ReviewDetail, ReviewError> {
        let review = self
            .history
            .reviews()
            .fetch(id)
            .await?
            .ok_or(RepositoryError::ReviewNotFound(id))?;
        let names = self.level_names().await?;
        Ok(detail(&names, review))
    }

    pub async fn add_review(
        &self,
        prisoner_number: &str,
        request: ReviewRequest,
        reviewer: &str,
        now: NaiveDateTime,
    ) -> Result<HistoryWrite<Review>, ReviewError> {
        self.validate(&request).await?;
        let prisoner = self.directory.by_number(prisoner_number).await?;
        let _guard = self.locks.lock(prisoner.booking_id).await;

        let review = NewReview {
            booking_id: prisoner.booking_id,
            prisoner_number: prisoner.prisoner_number.clone(),
            prison_id: prisoner.prison_id.clone(),
            location_id: prisoner.location_id.clone(),
            level_code: request.level_code,
            review_type: request.review_type.unwrap_or(ReviewType::Review),
            reviewed_by: reviewer.to_string(),
            review_time: now,
            comment_text: Some(request.comment),
            current: true,
        };
        self.history.save(review, &prisoner, now).await
    }

    pub async fn update_review(
        &self,
        booking_id: BookingId,
        id: ReviewId,
        patch: ReviewPatch,
        now: NaiveDateTime,
    ) -> Result<HistoryWrite<Review>, ReviewError> {
        if patch.is_empty() {
            return Err(ReviewError::Invalid(
                "one of reviewTime, comment or current must be supplied".into(),
            ));
        }

        let _guard = self.locks.lock(booking_id).await;
        let mut review = self.owned_review(booking_id, id).await?;
        if let Some(review_time) = patch.review_time {
            review.review_time = review_time;
        }
        if let Some(comment) = patch.comment {
            review.comment_text = Some(comment);
        }
        if let Some(current) = patch.current {
            review.current = current;
        }

        let subject = self.subject(&review).await?;
        self.history.update(review, &subject, now).await
    }

    pub async fn delete_review(
        &self,
        booking_id: BookingId,
        id: ReviewId,
        now: NaiveDateTime,
    ) -> Result<HistoryWrite<Review>, ReviewError> {
        let _guard = self.locks.lock(booking_id).await;
        let review = self.owned_review(booking_id, id).await?;
        let subject = self.subject(&review).await?;
        self.history.delete(review.id, &subject, now).await
    }

    async fn validate(&self, request: &ReviewRequest) -> Result<(), ReviewError> {
        let code_length = request.level_code.chars().count();
        if !(2..=6).contains(&code_length) {
            return Err(ReviewError::Invalid(format!(
                "level code {:?} must be between 2 and 6 characters",
                request.level_code
            )));
        }
        if request.comment.trim().is_empty() {
            return Err(ReviewError::Invalid("comment must not be empty".into()));
        }
        let known = self
            .catalog
            .global_levels()
            .await?
            .iter()
            .any(|level| level.code == request.level_code);
        if !known {
            return Err(ReviewError::Invalid(format!(
                "unknown incentive level {}",
                request.level_code
            )));
        }
        Ok(())
    }

    async fn owned_review(&self, booking_id: BookingId, id: ReviewId) -> Result<Review, ReviewError> {
        self.history
            .reviews()
            .fetch(id)
            .await?
            .filter(|review| review.booking_id == booking_id)
            .ok_or(ReviewError::ReviewNotOnBooking {
                booking_id,
                review_id: id,
            })
    }

    /// Prisoner attributes for recomputing the schedule of the review's booking.
    async fn subject(&self, review: &Review) -> Result<PrisonerDetails, ReviewError> {
        let mut subject = self.directory.by_number(&review.prisoner_number).await?;
        subject.booking_id = review.booking_id;
        Ok(subject)
    }

    async fn level_names(&self) -> Result<BTreeMap<String, String>, ReviewError> {
        Ok(self
            .catalog
            .global_levels()
            .await?
            .into_iter()
            .map(|level| (level.code, level.name))
            .collect())
    }

    async fn summarise(
        &self,
        reviews: Vec<Review>,
        with_details: bool,
        now: NaiveDateTime,
    ) -> Result<ReviewSummary, ReviewError> {
        let names = self.level_names().await?;
        let last_real_review_date = reviews
            .iter()
            .find(|review| is_real_review_in(review, &reviews))
            .map(Review::review_date);

        let mut details: Vec<ReviewDetail> = reviews
            .into_iter()
            .map(|review| detail(&names, review))
            .collect();
        let head = details.remove(0);
        let next_review_date = self.history.cache().get(head.booking_id, now).await?;

        let summary = ReviewSummary {
            id: head.id,
            booking_id: head.booking_id,
            prisoner_number: head.prisoner_number.clone(),
            level_code: head.level_code.clone(),
            level_name: head.level_name.clone(),
            review_date: head.review_date,
            review_time: head.review_time,
            location_id: head.location_id.clone(),
            days_since_review: (now.date() - head.review_date).num_days(),
            last_real_review_date,
            next_review_date,
            details: if with_details {
                std::iter::once(head).chain(details).collect()
            } else {
                Vec::new()
            },
        };
        Ok(summary)
    }
}

fn level_name(names: &BTreeMap<String, String>, code: &str) -> String {
    names
        .get(code)
        .cloned()
        .unwrap_or_else(|| UNMAPPED_LEVEL.to_string())
}

fn detail(names: &BTreeMap<String, String>, review: Review) -> ReviewDetail {
    ReviewDetail {
        level_name: level_name(names, &review.level_code),
        review_date: review.review_date(),
        id: review.id,
        booking_id: review.booking_id,
        prisoner_number: review.prisoner_number,
        prison_id: review.prison_id,
        location_id: review.location_id,
        level_code: review.level_code,
        review_type: review.review_type,
        reviewed_by: review.reviewed_by,
        review_time: review.review_time,
        comment_text: review.comment_text,
        current: review.current,
    }
}
