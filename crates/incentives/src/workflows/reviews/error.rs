use super::directory::DirectoryError;
use super::domain::{BookingId, ReviewId};
use super::levels::CatalogError;
use super::repository::RepositoryError;

/// Error raised by the review engine.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("no incentive reviews found for booking {0}")]
    NoReviewsForBooking(BookingId),
    #[error("no incentive reviews found for prisoner {0}")]
    NoReviewsForPrisoner(String),
    #[error("incentive review {review_id} not found for booking {booking_id}")]
    ReviewNotOnBooking {
        booking_id: BookingId,
        review_id: ReviewId,
    },
    #[error("invalid request: {0}")]
    Invalid(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// Classification the transport layer uses to choose between redelivery and dead-lettering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    DataIntegrity,
    Transient,
    Invalid,
}

impl ErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }

    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::DataIntegrity => "data_integrity",
            ErrorKind::Transient => "transient",
            ErrorKind::Invalid => "invalid",
        }
    }
}

impl ReviewError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReviewError::NoReviewsForBooking(_)
            | ReviewError::NoReviewsForPrisoner(_)
            | ReviewError::ReviewNotOnBooking { .. } => ErrorKind::NotFound,
            ReviewError::Invalid(_) => ErrorKind::Invalid,
            ReviewError::Catalog(CatalogError::NoDefaultLevel { .. }) => ErrorKind::DataIntegrity,
            ReviewError::Catalog(CatalogError::UnknownLevel { .. }) => ErrorKind::NotFound,
            ReviewError::Catalog(CatalogError::Unavailable(_)) => ErrorKind::Transient,
            ReviewError::Repository(RepositoryError::ReviewNotFound(_)) => ErrorKind::NotFound,
            ReviewError::Repository(
                RepositoryError::Conflict(_) | RepositoryError::Unavailable(_),
            ) => ErrorKind::Transient,
            ReviewError::Directory(
                DirectoryError::PrisonerNotFound(_) | DirectoryError::BookingNotFound(_),
            ) => ErrorKind::NotFound,
            ReviewError::Directory(DirectoryError::Unavailable(_)) => ErrorKind::Transient,
        }
    }
}
