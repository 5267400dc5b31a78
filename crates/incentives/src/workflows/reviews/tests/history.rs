use std::sync::Arc;
use std::time::Duration;

use super::common::*;
use crate::workflows::reviews::{
    BookingId, BookingLocks, MergeBatch, MemoryReviewRepository, RepositoryError, ReviewId,
    ReviewRepository, ReviewType,
};

#[tokio::test]
async fn inserting_current_review_clears_previous_current() {
    let repository = MemoryReviewRepository::new();
    let subject = prisoner("A1234BC", 100, "MDI", date(1990, 1, 1));

    let first = repository
        .insert(new_review(&subject, "STD", ReviewType::Initial, at(2024, 1, 10, 9), true))
        .await
        .expect("insert");
    let second = repository
        .insert(new_review(&subject, "ENH", ReviewType::Review, at(2024, 4, 1, 9), true))
        .await
        .expect("insert");

    let stored = repository.for_booking(BookingId(100)).await.expect("read");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].id, second.id);
    assert!(stored[0].current);
    assert_eq!(stored[1].id, first.id);
    assert!(!stored[1].current);
}

#[tokio::test]
async fn ties_on_review_time_favour_later_insert() {
    let repository = MemoryReviewRepository::new();
    let subject = prisoner("A1234BC", 100, "MDI", date(1990, 1, 1));
    let time = at(2024, 1, 10, 9);

    repository
        .insert(new_review(&subject, "STD", ReviewType::Initial, time, true))
        .await
        .expect("insert");
    let later = repository
        .insert(new_review(&subject, "STD", ReviewType::Initial, time, true))
        .await
        .expect("insert");

    let stored = repository.for_booking(BookingId(100)).await.expect("read");
    assert_eq!(stored[0].id, later.id);
}

#[tokio::test]
async fn at_most_one_current_review_after_any_write_sequence() {
    let repository = MemoryReviewRepository::new();
    let subjects = [
        prisoner("A1234BC", 100, "MDI", date(1990, 1, 1)),
        prisoner("B2345CD", 200, "BAI", date(1985, 5, 5)),
    ];

    let mut ids = Vec::new();
    for step in 0..24u32 {
        let subject = &subjects[(step % 2) as usize];
        let current = step % 3 != 0;
        let review = repository
            .insert(new_review(
                subject,
                if step % 4 == 0 { "BAS" } else { "STD" },
                ReviewType::Review,
                at(2024, 1 + step % 12, 1 + step % 27, 9),
                current,
            ))
            .await
            .expect("insert");
        ids.push(review.id);

        if step % 5 == 4 {
            let victim = ids.remove(0);
            repository.delete(victim).await.expect("delete");
        }
        if step % 7 == 6 {
            let mut promoted = repository
                .fetch(ids[0])
                .await
                .expect("fetch")
                .expect("present");
            promoted.current = true;
            repository.update(promoted).await.expect("update");
        }

        for booking in [BookingId(100), BookingId(200)] {
            let current = repository
                .current_for_bookings(&[booking])
                .await
                .expect("read");
            assert!(current.len() <= 1, "booking {booking} has {} current", current.len());
        }
    }
}

#[tokio::test]
async fn deleting_current_review_promotes_latest_remaining() {
    let repository = MemoryReviewRepository::new();
    let subject = prisoner("A1234BC", 100, "MDI", date(1990, 1, 1));

    let older = repository
        .insert(new_review(&subject, "STD", ReviewType::Initial, at(2024, 1, 10, 9), true))
        .await
        .expect("insert");
    let middle = repository
        .insert(new_review(&subject, "ENH", ReviewType::Review, at(2024, 3, 1, 9), true))
        .await
        .expect("insert");
    let latest = repository
        .insert(new_review(&subject, "BAS", ReviewType::Review, at(2024, 5, 1, 9), true))
        .await
        .expect("insert");

    let removed = repository.delete(latest.id).await.expect("delete");
    assert!(removed.current);

    let promoted = repository.fetch(middle.id).await.expect("fetch").expect("present");
    assert!(promoted.current);
    let untouched = repository.fetch(older.id).await.expect("fetch").expect("present");
    assert!(!untouched.current);
}

#[tokio::test]
async fn deleting_missing_review_is_not_found() {
    let repository = MemoryReviewRepository::new();

    match repository.delete(ReviewId(404)).await {
        Err(RepositoryError::ReviewNotFound(id)) => assert_eq!(id, ReviewId(404)),
        other => panic!("expected missing review, got {other:?}"),
    }
}

#[tokio::test]
async fn merge_batch_with_unknown_review_leaves_store_untouched() {
    let repository = MemoryReviewRepository::new();
    let subject = prisoner("A1234BC", 100, "MDI", date(1990, 1, 1));
    let stored = repository
        .insert(new_review(&subject, "STD", ReviewType::Initial, at(2024, 1, 10, 9), true))
        .await
        .expect("insert");

    let mut relabeled = stored.clone();
    relabeled.prisoner_number = "Z9999ZZ".to_string();
    let mut ghost = stored.to_new();
    ghost.booking_id = BookingId(300);

    let result = repository
        .apply_merge(MergeBatch {
            relabeled: vec![relabeled],
            rebooked: vec![(ReviewId(77), ghost)],
        })
        .await;

    assert!(matches!(result, Err(RepositoryError::ReviewNotFound(ReviewId(77)))));
    let unchanged = repository.fetch(stored.id).await.expect("fetch").expect("present");
    assert_eq!(unchanged.prisoner_number, "A1234BC");
}

#[tokio::test]
async fn reassign_only_touches_moving_prisoner_number() {
    let repository = MemoryReviewRepository::new();
    let from = prisoner("A1234BC", 100, "MDI", date(1990, 1, 1));
    let other = prisoner("C3456DE", 100, "MDI", date(1990, 1, 1));

    let moving = repository
        .insert(new_review(&from, "STD", ReviewType::Initial, at(2024, 1, 10, 9), true))
        .await
        .expect("insert");
    let already_moved = repository
        .insert(new_review(&other, "ENH", ReviewType::Review, at(2024, 2, 10, 9), false))
        .await
        .expect("insert");

    let rewritten = repository
        .reassign_prisoner(BookingId(100), "A1234BC", "B2345CD")
        .await
        .expect("reassign");

    assert_eq!(rewritten.len(), 1);
    assert_eq!(rewritten[0].id, moving.id);
    assert_eq!(rewritten[0].prisoner_number, "B2345CD");
    assert_eq!(rewritten[0].booking_id, BookingId(100));
    let untouched = repository
        .fetch(already_moved.id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(untouched.prisoner_number, "C3456DE");
}

#[tokio::test]
async fn history_store_recomputes_schedule_after_save() {
    let subject = prisoner("A1234BC", 100, "MDI", date(2000, 6, 1));
    let harness = Harness::new(vec![subject.clone()]);
    let history = harness.engine.history();

    let write = history
        .save(
            new_review(&subject, "BAS", ReviewType::Review, at(2024, 3, 1, 10), true),
            &subject,
            at(2024, 3, 1, 10),
        )
        .await
        .expect("save");

    assert!(write.outcome.current);
    assert_eq!(write.schedule.date_for(BookingId(100)), Some(date(2024, 3, 8)));
    assert!(write.schedule.changes.is_empty());
}

#[tokio::test]
async fn booking_locks_serialise_writers_per_booking() {
    let locks = Arc::new(BookingLocks::new());
    let guard = locks.lock(BookingId(100)).await;

    let contender = {
        let locks = locks.clone();
        tokio::spawn(async move {
            let _guard = locks.lock_all(&[BookingId(200), BookingId(100)]).await;
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!contender.is_finished());
    assert_eq!(guard.bookings(), &[BookingId(100)]);

    drop(guard);
    contender.await.expect("contender completes");
    assert_eq!(locks.active(), 0);
}

#[tokio::test]
async fn independent_bookings_do_not_block_each_other() {
    let locks = BookingLocks::new();
    let first = locks.lock(BookingId(100)).await;
    let second = tokio::time::timeout(Duration::from_millis(50), locks.lock(BookingId(200)))
        .await
        .expect("second booking is free");

    assert_eq!(first.bookings(), &[BookingId(100)]);
    assert_eq!(second.bookings(), &[BookingId(200)]);
}
