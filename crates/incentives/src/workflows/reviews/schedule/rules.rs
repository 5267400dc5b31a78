use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::ScheduledReview;

const ADULT_AGE: u32 = 18;

/// Which policy rule produced a next review date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextReviewRule {
    Readmission,
    NewPrisoner,
    FirstTimeOnBasic,
    ConfirmedBasic,
    ConfirmedBasicVulnerable,
    Standard,
}

/// Whole years between `date_of_birth` and `on`; zero when `on` precedes the birth date.
pub fn age_on(date_of_birth: NaiveDate, on: NaiveDate) -> u32 {
    on.years_since(date_of_birth).unwrap_or(0)
}

fn is_young_person(date_of_birth: NaiveDate, on: NaiveDate) -> bool {
    age_on(date_of_birth, on) < ADULT_AGE
}

fn plus_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}

fn plus_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(Days::new(days)).unwrap_or(NaiveDate::MAX)
}

// PF 5.18: new arrivals are reviewed within 3 months, young people within 1 month.
// Age is taken on the arrival date so later recalculation keeps the same rule.
pub(super) fn new_arrival(
    date_of_birth: NaiveDate,
    arrival: NaiveDate,
    rule: NextReviewRule,
) -> ScheduledReview {
    let months = if is_young_person(date_of_birth, arrival) {
        1
    } else {
        3
    };
    ScheduledReview {
        next_review_date: plus_months(arrival, months),
        rule,
    }
}

// PF 5.16: first placement on Basic is reviewed within 7 days, then every 28 days,
// or every 14 days for ACCT and young people.
pub(super) fn basic(
    last_review: NaiveDate,
    previous_was_basic: bool,
    has_open_safety_alert: bool,
    date_of_birth: NaiveDate,
) -> ScheduledReview {
    if !previous_was_basic {
        return ScheduledReview {
            next_review_date: plus_days(last_review, 7),
            rule: NextReviewRule::FirstTimeOnBasic,
        };
    }

    if has_open_safety_alert || is_young_person(date_of_birth, last_review) {
        ScheduledReview {
            next_review_date: plus_days(last_review, 14),
            rule: NextReviewRule::ConfirmedBasicVulnerable,
        }
    } else {
        ScheduledReview {
            next_review_date: plus_days(last_review, 28),
            rule: NextReviewRule::ConfirmedBasic,
        }
    }
}

pub(super) fn standard(last_review: NaiveDate) -> ScheduledReview {
    ScheduledReview {
        next_review_date: plus_months(last_review, 12),
        rule: NextReviewRule::Standard,
    }
}
