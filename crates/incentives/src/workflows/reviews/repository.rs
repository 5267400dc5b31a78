use std::collections::BTreeMap;

use async_trait::async_trait;

use super::domain::{BookingId, NewReview, NextReviewDate, Review, ReviewId};

/// Persistence for review history.
///
/// Implementations must apply every method as one atomic unit; in particular writing a
/// current review clears the previous current review of the same booking in the same unit,
/// so no reader ever observes two current reviews (or none, mid-write) for a booking.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Inserts a review, assigning its id.
    async fn insert(&self, review: NewReview) -> Result<Review, RepositoryError>;

    /// Replaces a stored review by id.
    async fn update(&self, review: Review) -> Result<Review, RepositoryError>;

    /// Removes a review. When it was current, the latest remaining review of the booking
    /// becomes current. Returns the removed review.
    async fn delete(&self, id: ReviewId) -> Result<Review, RepositoryError>;

    async fn fetch(&self, id: ReviewId) -> Result<Option<Review>, RepositoryError>;

    /// Reviews of one booking, most recent first.
    async fn for_booking(&self, booking_id: BookingId) -> Result<Vec<Review>, RepositoryError>;

    /// Reviews of several bookings, most recent first.
    async fn for_bookings(&self, booking_ids: &[BookingId])
        -> Result<Vec<Review>, RepositoryError>;

    /// Reviews recorded against a prisoner number across bookings, most recent first.
    async fn for_prisoner(&self, prisoner_number: &str) -> Result<Vec<Review>, RepositoryError>;

    /// Current reviews of the given bookings.
    async fn current_for_bookings(
        &self,
        booking_ids: &[BookingId],
    ) -> Result<Vec<Review>, RepositoryError>;

    /// Applies a merge reconciliation batch.
    async fn apply_merge(&self, batch: MergeBatch) -> Result<MergeOutcome, RepositoryError>;

    /// Points reviews of `booking_id` recorded under `from` at prisoner number `to`.
    /// Returns the rewritten reviews.
    async fn reassign_prisoner(
        &self,
        booking_id: BookingId,
        from: &str,
        to: &str,
    ) -> Result<Vec<Review>, RepositoryError>;
}

/// Writes produced by reconciling an identity merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeBatch {
    /// Reviews rewritten in place, keeping their identity.
    pub relabeled: Vec<Review>,
    /// Reviews moved to another booking: the stored review is removed and the replacement
    /// is inserted with a fresh id.
    pub rebooked: Vec<(ReviewId, NewReview)>,
}

impl MergeBatch {
    pub fn is_empty(&self) -> bool {
        self.relabeled.is_empty() && self.rebooked.is_empty()
    }

    pub fn len(&self) -> usize {
        self.relabeled.len() + self.rebooked.len()
    }
}

/// What a merge batch wrote, and which bookings it left without any review.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub written: Vec<Review>,
    pub emptied: Vec<BookingId>,
}

/// Persistence for cached next review dates.
#[async_trait]
pub trait NextReviewDateRepository: Send + Sync {
    async fn fetch_many(
        &self,
        booking_ids: &[BookingId],
    ) -> Result<BTreeMap<BookingId, NextReviewDate>, RepositoryError>;

    async fn save_many(&self, records: Vec<NextReviewDate>) -> Result<(), RepositoryError>;

    /// Drops cached dates; unknown bookings are skipped.
    async fn delete_many(&self, booking_ids: &[BookingId]) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("incentive review {0} not found")]
    ReviewNotFound(ReviewId),
    #[error("conflicting write: {0}")]
    Conflict(String),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
