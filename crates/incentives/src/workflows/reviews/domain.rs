use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Identifier of one continuous period in custody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub i64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-assigned identifier of a persisted review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub i64);

impl fmt::Display for ReviewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a review came to be recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewType {
    Initial,
    Review,
    Transfer,
    Readmission,
    Migrated,
}

impl ReviewType {
    /// Whether the scheduler treats a record of this type as a genuine behaviour review.
    ///
    /// Admission, transfer and readmission records only restate a level; migrated records
    /// cannot be told apart from those, so none of them count.
    pub fn counts_toward_schedule(self) -> bool {
        matches!(self, ReviewType::Review)
    }

    pub fn label(self) -> &'static str {
        match self {
            ReviewType::Initial => "INITIAL",
            ReviewType::Review => "REVIEW",
            ReviewType::Transfer => "TRANSFER",
            ReviewType::Readmission => "READMISSION",
            ReviewType::Migrated => "MIGRATED",
        }
    }
}

/// A persisted incentive level review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: ReviewId,
    pub booking_id: BookingId,
    pub prisoner_number: String,
    pub prison_id: String,
    pub location_id: Option<String>,
    pub level_code: String,
    pub review_type: ReviewType,
    pub reviewed_by: String,
    pub review_time: NaiveDateTime,
    pub comment_text: Option<String>,
    pub current: bool,
}

impl Review {
    pub fn review_date(&self) -> NaiveDate {
        self.review_time.date()
    }

    /// Copy of this review without its identity, ready to be inserted again.
    pub fn to_new(&self) -> NewReview {
        NewReview {
            booking_id: self.booking_id,
            prisoner_number: self.prisoner_number.clone(),
            prison_id: self.prison_id.clone(),
            location_id: self.location_id.clone(),
            level_code: self.level_code.clone(),
            review_type: self.review_type,
            reviewed_by: self.reviewed_by.clone(),
            review_time: self.review_time,
            comment_text: self.comment_text.clone(),
            current: self.current,
        }
    }
}

/// A review that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub booking_id: BookingId,
    pub prisoner_number: String,
    pub prison_id: String,
    pub location_id: Option<String>,
    pub level_code: String,
    pub review_type: ReviewType,
    pub reviewed_by: String,
    pub review_time: NaiveDateTime,
    pub comment_text: Option<String>,
    pub current: bool,
}

impl NewReview {
    pub fn with_id(self, id: ReviewId) -> Review {
        Review {
            id,
            booking_id: self.booking_id,
            prisoner_number: self.prisoner_number,
            prison_id: self.prison_id,
            location_id: self.location_id,
            level_code: self.level_code,
            review_type: self.review_type,
            reviewed_by: self.reviewed_by,
            review_time: self.review_time,
            comment_text: self.comment_text,
            current: self.current,
        }
    }
}

/// Orders reviews most recent first; ties on `review_time` fall back to the later insert.
pub fn sort_most_recent_first(reviews: &mut [Review]) {
    reviews.sort_by(|a, b| {
        b.review_time
            .cmp(&a.review_time)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// History-level "real review" predicate used by summaries.
///
/// Everything but `MIGRATED` is real, except that a lone `MIGRATED` record is the only
/// evidence of a level for the booking and therefore counts.
pub fn is_real_review_in(review: &Review, history: &[Review]) -> bool {
    if review.review_type != ReviewType::Migrated {
        return true;
    }
    let same_booking = history
        .iter()
        .filter(|other| other.booking_id == review.booking_id)
        .count();
    same_booking == 1
}

/// Cached next review date for a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextReviewDate {
    pub booking_id: BookingId,
    pub next_review_date: NaiveDate,
    pub when_updated: NaiveDateTime,
}
