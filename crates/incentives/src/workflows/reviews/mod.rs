//! Incentive level review life-cycle: level resolution, review scheduling, history
//! reconciliation and the event processor driving them.

pub mod audited;
pub mod cache;
pub mod directory;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod history;
pub mod levels;
pub mod locks;
pub mod memory;
pub mod nearest;
pub mod processor;
pub mod repository;
pub mod schedule;
pub mod service;

#[cfg(test)]
mod tests;

pub use audited::{AuditedProcessor, AuditedReviewService, Notifier};
pub use cache::{ScheduleCache, ScheduleChange, ScheduleRecomputation};
pub use directory::{DirectoryError, PrisonerDetails, PrisonerDirectory};
pub use domain::{
    is_real_review_in, sort_most_recent_first, BookingId, NewReview, NextReviewDate, Review,
    ReviewId, ReviewType,
};
pub use engine::{Collaborators, ReviewEngine};
pub use error::{ErrorKind, ReviewError};
pub use events::{
    AuditRecord, AuditSink, AuditType, DomainEvent, DomainEventDetail, DomainEventPublisher,
    DomainEventType, InboundEvent, PublishError, ReasonCode,
};
pub use history::{HistoryWrite, ReviewHistoryStore};
pub use levels::{CatalogError, IncentiveLevel, LevelCatalog, PrisonIncentiveLevel};
pub use locks::{BookingGuard, BookingLocks};
pub use memory::{
    MemoryLevelCatalog, MemoryNextReviewDateRepository, MemoryPrisonerDirectory,
    MemoryReviewRepository,
};
pub use nearest::{nearest_available, NearestLevelResolver};
pub use processor::{IgnoreReason, ReviewLifecycleProcessor, Transition};
pub use repository::{
    MergeBatch, MergeOutcome, NextReviewDateRepository, RepositoryError, ReviewRepository,
};
pub use schedule::{age_on, NextReviewDateInput, NextReviewRule, ReviewScheduler, ScheduledReview};
pub use service::{
    CurrentLevel, ReviewDetail, ReviewPatch, ReviewRequest, ReviewService, ReviewSummary,
};
