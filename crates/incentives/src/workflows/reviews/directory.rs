use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::BookingId;

/// The slice of prisoner information the engine needs from the prisoner directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrisonerDetails {
    pub prisoner_number: String,
    pub booking_id: BookingId,
    pub prison_id: String,
    #[serde(default)]
    pub location_id: Option<String>,
    pub date_of_birth: NaiveDate,
    pub reception_date: NaiveDate,
    #[serde(default)]
    pub has_open_safety_alert: bool,
}

/// External prisoner search, looked up by prisoner number or by booking.
#[async_trait]
pub trait PrisonerDirectory: Send + Sync {
    async fn by_number(&self, prisoner_number: &str) -> Result<PrisonerDetails, DirectoryError>;
    async fn by_booking(&self, booking_id: BookingId) -> Result<PrisonerDetails, DirectoryError>;
}

/// Directory lookup failures.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("prisoner {0} not found")]
    PrisonerNotFound(String),
    #[error("no prisoner found for booking {0}")]
    BookingNotFound(BookingId),
    #[error("prisoner directory unavailable: {0}")]
    Unavailable(String),
}
