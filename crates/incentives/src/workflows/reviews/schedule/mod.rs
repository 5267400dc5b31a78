mod rules;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{Review, ReviewType};

pub use rules::{age_on, NextReviewRule};

/// Everything the scheduler needs to know about one booking.
#[derive(Debug, Clone, Copy)]
pub struct NextReviewDateInput<'a> {
    pub date_of_birth: NaiveDate,
    pub reception_date: NaiveDate,
    pub has_open_safety_alert: bool,
    /// Review history ordered most recent first.
    pub reviews: &'a [Review],
}

/// Outcome of a schedule computation, keeping the rule that fired for audit trails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledReview {
    pub next_review_date: NaiveDate,
    pub rule: NextReviewRule,
}

/// Stateless calculator applying the review frequency policy.
#[derive(Debug, Clone)]
pub struct ReviewScheduler {
    basic_level_code: String,
}

impl ReviewScheduler {
    pub fn new(basic_level_code: impl Into<String>) -> Self {
        Self {
            basic_level_code: basic_level_code.into(),
        }
    }

    pub fn basic_level_code(&self) -> &str {
        &self.basic_level_code
    }

    pub fn next_review_date(&self, input: &NextReviewDateInput<'_>) -> NaiveDate {
        self.schedule(input).next_review_date
    }

    pub fn schedule(&self, input: &NextReviewDateInput<'_>) -> ScheduledReview {
        let latest_real_or_readmission = input.reviews.iter().find(|review| {
            review.review_type.counts_toward_schedule()
                || review.review_type == ReviewType::Readmission
        });
        if let Some(readmission) =
            latest_real_or_readmission.filter(|review| review.review_type == ReviewType::Readmission)
        {
            return rules::new_arrival(
                input.date_of_birth,
                readmission.review_date(),
                NextReviewRule::Readmission,
            );
        }

        let mut real_reviews = input
            .reviews
            .iter()
            .filter(|review| review.review_type.counts_toward_schedule());

        let Some(last) = real_reviews.next() else {
            return rules::new_arrival(
                input.date_of_birth,
                input.reception_date,
                NextReviewRule::NewPrisoner,
            );
        };

        if last.level_code != self.basic_level_code {
            return rules::standard(last.review_date());
        }

        let previous_was_basic = real_reviews
            .next()
            .map(|previous| previous.level_code == self.basic_level_code)
            .unwrap_or(false);

        rules::basic(
            last.review_date(),
            previous_was_basic,
            input.has_open_safety_alert,
            input.date_of_birth,
        )
    }
}
