use super::*;
use crate::limits::*;
use crate::schedule::{parse_import_text, ImportRow};
use chrono::NaiveDate;

fn test_wal_path(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join("roomboard_test_engine");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    let _ = std::fs::remove_file(&path);
    path
}

fn new_engine(name: &str) -> Engine {
    Engine::new(test_wal_path(name), Arc::new(NotifyHub::new())).unwrap()
}

/// Path of an existing test journal, left as it is.
fn existing_wal_path(name: &str) -> PathBuf {
    std::env::temp_dir().join("roomboard_test_engine").join(name)
}

fn reopen(name: &str) -> Engine {
    Engine::new(existing_wal_path(name), Arc::new(NotifyHub::new())).unwrap()
}

fn p(n: u8) -> Period {
    Period::new(n).unwrap()
}

fn day(n: u8) -> DayOfWeek {
    DayOfWeek::new(n).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// 2024-05-13 is a Monday.
fn monday() -> NaiveDate {
    date(2024, 5, 13)
}

fn row(room: &str, start: &str, finish: &str) -> ImportRow {
    ImportRow {
        room: room.into(),
        start: start.into(),
        finish: finish.into(),
    }
}

fn submission(room: &str, occupancy: u32, noise: u8) -> ReportSubmission {
    ReportSubmission {
        student: "s1234567".into(),
        room: room.into(),
        period: p(2),
        occupancy,
        noise: NoiseLevel::new(noise).unwrap(),
    }
}

async fn seed_rooms(engine: &Engine, numbers: &[&str]) {
    for n in numbers {
        engine.create_room((*n).to_string(), 40).await.unwrap();
    }
}

// ── Room registry ────────────────────────────────────────

#[tokio::test]
async fn create_and_list_rooms_sorted() {
    let engine = new_engine("create_list.wal");
    seed_rooms(&engine, &["H201", "F301", "F601"]).await;

    let numbers: Vec<String> = engine.list_rooms().await.into_iter().map(|r| r.number).collect();
    assert_eq!(numbers, vec!["F301", "F601", "H201"]);
    assert_eq!(engine.room_count(), 3);
}

#[tokio::test]
async fn duplicate_room_rejected() {
    let engine = new_engine("dup_room.wal");
    engine.create_room("F301".into(), 40).await.unwrap();
    let result = engine.create_room("F301".into(), 20).await;
    assert!(matches!(result, Err(EngineError::AlreadyExists(_))));
}

#[tokio::test]
async fn room_number_length_enforced() {
    let engine = new_engine("room_number_len.wal");
    assert!(matches!(
        engine.create_room(String::new(), 10).await,
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.create_room("A-12345".into(), 10).await,
        Err(EngineError::InvalidInput(_))
    ));
    assert!(matches!(
        engine.create_room(" F301".into(), 10).await,
        Err(EngineError::InvalidInput(_))
    ));
    engine.create_room("A-1234".into(), 10).await.unwrap();
}

#[tokio::test]
async fn capacity_limit_enforced() {
    let engine = new_engine("capacity_limit.wal");
    let result = engine.create_room("F301".into(), MAX_ROOM_CAPACITY + 1).await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn update_room_capacity() {
    let engine = new_engine("update_room.wal");
    engine.create_room("F301".into(), 40).await.unwrap();
    engine.update_room("F301", 60).await.unwrap();
    assert_eq!(engine.room_info("F301").await.unwrap().capacity, 60);

    let missing = engine.update_room("F999", 10).await;
    assert!(matches!(missing, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn delete_room_drops_its_schedule() {
    let engine = new_engine("delete_room.wal");
    seed_rooms(&engine, &["F301", "F302"]).await;
    engine.set_recurring_comment(day(1), p(1), "F301", "Algebra").await.unwrap();
    engine.add_temporary_booking("F301", monday(), p(3), 0).await.unwrap();

    engine.delete_room("F301").await.unwrap();
    assert!(engine.room_info("F301").await.is_none());
    assert!(engine.recurring_slots(None).await.is_empty());
    assert!(engine.temporary_bookings(None, None).await.is_empty());

    // Re-created room starts clean.
    engine.create_room("F301".into(), 40).await.unwrap();
    assert!(engine.recurring_slots(None).await.is_empty());
}

#[tokio::test]
async fn delete_missing_room_fails() {
    let engine = new_engine("delete_missing.wal");
    assert!(matches!(
        engine.delete_room("F301").await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_of_one_number_admit_one() {
    let engine = Arc::new(new_engine("create_race.wal"));
    for _ in 0..20 {
        let a = tokio::spawn({
            let engine = engine.clone();
            async move { engine.create_room("F301".into(), 40).await }
        });
        let b = tokio::spawn({
            let engine = engine.clone();
            async move { engine.create_room("F301".into(), 20).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(EngineError::AlreadyExists(_)))));
        assert_eq!(engine.room_count(), 1);
        engine.delete_room("F301").await.unwrap();
    }
    engine.create_room("F301".into(), 40).await.unwrap();
    drop(engine);

    let engine = reopen("create_race.wal");
    assert_eq!(engine.room_count(), 1);
}

#[tokio::test]
async fn writer_queued_behind_delete_sees_missing_room() {
    let engine = Arc::new(new_engine("stale_handle.wal"));
    seed_rooms(&engine, &["F301"]).await;

    let held = engine.get_room("F301").unwrap().write_owned().await;
    let delete = tokio::spawn({
        let engine = engine.clone();
        async move { engine.delete_room("F301").await }
    });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let set = tokio::spawn({
        let engine = engine.clone();
        async move { engine.set_recurring_comment(day(1), p(1), "F301", "Algebra").await }
    });
    let book = tokio::spawn({
        let engine = engine.clone();
        async move { engine.add_temporary_booking("F301", monday(), p(2), 5).await }
    });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    drop(held);

    delete.await.unwrap().unwrap();
    assert!(matches!(set.await.unwrap(), Err(EngineError::NotFound(_))));
    assert!(matches!(book.await.unwrap(), Err(EngineError::NotFound(_))));

    engine.create_room("F301".into(), 40).await.unwrap();
    assert!(engine.recurring_slots(None).await.is_empty());
    assert!(engine.temporary_bookings(None, None).await.is_empty());
    drop(engine);

    let engine = reopen("stale_handle.wal");
    assert!(engine.recurring_slots(None).await.is_empty());
    assert!(engine.temporary_bookings(None, None).await.is_empty());
}

// ── Weekly schedule ──────────────────────────────────────

#[tokio::test]
async fn recurring_upsert_lifecycle() {
    let engine = new_engine("recurring_upsert.wal");
    seed_rooms(&engine, &["F301"]).await;

    let c = engine.set_recurring_comment(day(2), p(3), "F301", "Statistics").await.unwrap();
    assert_eq!(c, Change::Created);
    let c = engine.set_recurring_comment(day(2), p(3), "F301", "Statistics").await.unwrap();
    assert_eq!(c, Change::Unchanged);
    let c = engine.set_recurring_comment(day(2), p(3), "F301", "Statistics II").await.unwrap();
    assert_eq!(c, Change::Updated);
    let c = engine.set_recurring_comment(day(2), p(3), "F301", "").await.unwrap();
    assert_eq!(c, Change::Cleared);
    let c = engine.set_recurring_comment(day(2), p(3), "F301", "").await.unwrap();
    assert_eq!(c, Change::Unchanged);

    assert!(engine.recurring_slots(None).await.is_empty());
}

#[tokio::test]
async fn blank_comment_counts_as_empty() {
    let engine = new_engine("blank_comment.wal");
    seed_rooms(&engine, &["F301"]).await;
    engine.set_recurring_comment(day(1), p(1), "F301", "Seminar").await.unwrap();
    let c = engine.set_recurring_comment(day(1), p(1), "F301", "   ").await.unwrap();
    assert_eq!(c, Change::Cleared);
}

#[tokio::test]
async fn unchanged_comment_writes_nothing() {
    let engine = new_engine("unchanged_no_wal.wal");
    seed_rooms(&engine, &["F301"]).await;
    engine.set_recurring_comment(day(1), p(1), "F301", "Seminar").await.unwrap();
    let before = engine.wal_appends_since_compact().await;
    engine.set_recurring_comment(day(1), p(1), "F301", "Seminar").await.unwrap();
    engine.set_recurring_comment(day(1), p(2), "F301", "").await.unwrap();
    assert_eq!(engine.wal_appends_since_compact().await, before);
}

#[tokio::test]
async fn recurring_requires_known_room() {
    let engine = new_engine("recurring_unknown.wal");
    let result = engine.set_recurring_comment(day(1), p(1), "F301", "Seminar").await;
    assert!(matches!(result, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn comment_length_limit() {
    let engine = new_engine("comment_limit.wal");
    seed_rooms(&engine, &["F301"]).await;
    let long = "x".repeat(MAX_COMMENT_LEN + 1);
    let result = engine.set_recurring_comment(day(1), p(1), "F301", &long).await;
    assert!(matches!(result, Err(EngineError::LimitExceeded(_))));
}

#[tokio::test]
async fn grid_matrix_shape_and_content() {
    let engine = new_engine("grid_matrix.wal");
    seed_rooms(&engine, &["F302", "F301"]).await;
    engine.set_recurring_comment(day(3), p(5), "F302", "Chemistry").await.unwrap();

    let grid = engine.recurring_grid().await;
    assert_eq!(grid.len(), 2);
    assert_eq!(grid[0].room, "F301");
    assert_eq!(grid[1].room, "F302");
    assert_eq!(grid[1].capacity, 40);
    assert_eq!(grid[1].comments.len(), 7);
    assert!(grid[1].comments.iter().all(|d| d.len() == 6));
    assert_eq!(grid[1].comments[2][4], "Chemistry");
    assert_eq!(grid[0].comments[2][4], "");
}

#[tokio::test]
async fn grid_day_submission_aligns_with_room_order() {
    let engine = new_engine("grid_day.wal");
    seed_rooms(&engine, &["F303", "F301", "F302"]).await;
    engine.set_recurring_comment(day(1), p(1), "F302", "Old class").await.unwrap();

    // Rooms in number order: F301, F302, F303.
    let columns = vec![
        vec!["Math".to_string(), String::new(), "Art".to_string()],
        vec![String::new(), "Lab".to_string()],
    ];
    let summary = engine.submit_grid_day(day(1), &columns).await.unwrap();
    assert_eq!(summary.created, 3);
    assert_eq!(summary.cleared, 1);
    assert_eq!(summary.unchanged, 1);

    let monday_slots = engine.recurring_slots(Some(day(1))).await;
    let got: Vec<(u8, &str, &str)> = monday_slots
        .iter()
        .map(|s| (s.period.get(), s.room.as_str(), s.comment.as_str()))
        .collect();
    assert_eq!(
        got,
        vec![(1, "F301", "Math"), (1, "F303", "Art"), (2, "F302", "Lab")]
    );
}

#[tokio::test]
async fn grid_day_extra_comments_ignored() {
    let engine = new_engine("grid_extra.wal");
    seed_rooms(&engine, &["F301"]).await;
    let columns = vec![vec!["Math".to_string(), "Orphan".to_string()]];
    let summary = engine.submit_grid_day(day(4), &columns).await.unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(engine.recurring_slots(None).await.len(), 1);
}

#[tokio::test]
async fn grid_day_rejects_seven_columns() {
    let engine = new_engine("grid_seven.wal");
    seed_rooms(&engine, &["F301"]).await;
    let columns = vec![vec![String::new()]; 7];
    let result = engine.submit_grid_day(day(1), &columns).await;
    assert!(matches!(result, Err(EngineError::InvalidInput(_))));
}

// ── Availability ─────────────────────────────────────────

#[tokio::test]
async fn availability_excludes_both_sources() {
    let engine = new_engine("availability_union.wal");
    seed_rooms(&engine, &["F301", "F302", "F303", "H201"]).await;
    engine.set_recurring_comment(day(1), p(2), "F301", "Calculus").await.unwrap();
    engine.add_temporary_booking("F303", monday(), p(2), 5).await.unwrap();
    // Different period and different date do not interfere.
    engine.add_temporary_booking("F302", monday(), p(3), 0).await.unwrap();
    engine.add_temporary_booking("H201", date(2024, 5, 14), p(2), 0).await.unwrap();

    assert_eq!(engine.free_rooms(monday(), p(2)).await, vec!["F302", "H201"]);

    let statuses = engine.room_statuses(monday(), p(2)).await;
    assert_eq!(
        statuses[0].occupancy,
        Occupancy::Recurring {
            comment: "Calculus".into()
        }
    );
    assert_eq!(statuses[2].occupancy, Occupancy::Temporary { reserved_by: 5 });
}

#[tokio::test]
async fn weekly_slot_repeats_across_weeks() {
    let engine = new_engine("availability_weekly.wal");
    seed_rooms(&engine, &["F301"]).await;
    engine.set_recurring_comment(day(5), p(6), "F301", "Evening class").await.unwrap();

    let friday = date(2024, 5, 17);
    let next_friday = date(2024, 5, 24);
    assert!(engine.free_rooms(friday, p(6)).await.is_empty());
    assert!(engine.free_rooms(next_friday, p(6)).await.is_empty());
    assert_eq!(engine.free_rooms(friday, p(5)).await, vec!["F301"]);
}

#[tokio::test]
async fn board_groups_by_floor() {
    let engine = new_engine("board_floors.wal");
    seed_rooms(&engine, &["F601", "F301", "H101", "201"]).await;
    engine.add_temporary_booking("F601", monday(), p(1), 0).await.unwrap();

    let board = engine.availability_board(monday(), p(1)).await;
    let floors: Vec<u8> = board.iter().map(|g| g.floor).collect();
    assert_eq!(floors, vec![2, 3, 6]);
    assert_eq!(board[1].rooms.len(), 2);
    assert!(!board[2].rooms[0].occupancy.is_free());
}

#[tokio::test]
async fn day_board_covers_six_periods() {
    let engine = new_engine("day_board.wal");
    seed_rooms(&engine, &["F301"]).await;
    engine.add_temporary_booking("F301", monday(), p(4), 0).await.unwrap();

    let boards = engine.day_board(monday()).await;
    assert_eq!(boards.len(), 6);
    let busy: Vec<u8> = boards
        .iter()
        .filter(|b| !b.floors[0].rooms[0].occupancy.is_free())
        .map(|b| b.period.get())
        .collect();
    assert_eq!(busy, vec![4]);
}

// ── Temporary bookings ───────────────────────────────────

#[tokio::test]
async fn booking_upsert_and_cancel() {
    let engine = new_engine("booking_upsert.wal");
    seed_rooms(&engine, &["F301"]).await;

    assert_eq!(
        engine.add_temporary_booking("F301", monday(), p(1), 0).await.unwrap(),
        Change::Created
    );
    assert_eq!(
        engine.add_temporary_booking("F301", monday(), p(1), 0).await.unwrap(),
        Change::Unchanged
    );
    assert_eq!(
        engine.add_temporary_booking("F301", monday(), p(1), 8).await.unwrap(),
        Change::Updated
    );
    let bookings = engine.temporary_bookings(Some(monday()), None).await;
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0].reserved_by, 8);

    engine.cancel_temporary_booking("F301", monday(), p(1)).await.unwrap();
    assert!(engine.temporary_bookings(None, None).await.is_empty());

    let again = engine.cancel_temporary_booking("F301", monday(), p(1)).await;
    assert!(matches!(again, Err(EngineError::NotFound(_))));
}

#[tokio::test]
async fn booking_listing_order_and_filters() {
    let engine = new_engine("booking_listing.wal");
    seed_rooms(&engine, &["F302", "F301"]).await;
    engine.add_temporary_booking("F302", monday(), p(2), 0).await.unwrap();
    engine.add_temporary_booking("F301", monday(), p(2), 0).await.unwrap();
    engine.add_temporary_booking("F301", monday(), p(1), 0).await.unwrap();
    engine.add_temporary_booking("F301", date(2024, 5, 12), p(6), 0).await.unwrap();

    let all = engine.temporary_bookings(None, None).await;
    let keys: Vec<(NaiveDate, u8, &str)> = all
        .iter()
        .map(|b| (b.date, b.period.get(), b.room.as_str()))
        .collect();
    assert_eq!(
        keys,
        vec![
            (date(2024, 5, 12), 6, "F301"),
            (monday(), 1, "F301"),
            (monday(), 2, "F301"),
            (monday(), 2, "F302"),
        ]
    );

    assert_eq!(engine.temporary_bookings(Some(monday()), None).await.len(), 3);
    assert_eq!(engine.temporary_bookings(Some(monday()), Some("F302")).await.len(), 1);
    assert!(engine.temporary_bookings(None, Some("F999")).await.is_empty());
}

#[tokio::test]
async fn import_expands_period_ranges() {
    let engine = new_engine("import_ranges.wal");
    seed_rooms(&engine, &["F301", "H201"]).await;

    let rows = vec![
        row("Main Building F301", "2024/05/13 10:50", "2024/05/13 16:50"),
        row("Hall H201", "2024/05/14 9:00", "2024/05/14 10:40"),
    ];
    let report = engine.import_bookings(&rows).await.unwrap();
    assert_eq!(report.rows_read, 2);
    assert_eq!(report.created, 4);
    assert!(report.rejected.is_empty());

    let periods: Vec<u8> = engine
        .temporary_bookings(Some(monday()), Some("F301"))
        .await
        .iter()
        .map(|b| b.period.get())
        .collect();
    assert_eq!(periods, vec![2, 3, 4]);
    assert!(engine.free_rooms(date(2024, 5, 14), p(1)).await == vec!["F301"]);
}

#[tokio::test]
async fn import_leaves_existing_bookings_alone() {
    let engine = new_engine("import_existing.wal");
    seed_rooms(&engine, &["F301"]).await;
    engine.add_temporary_booking("F301", monday(), p(2), 7).await.unwrap();

    let rows = vec![row("F301", "2024/05/13 9:00", "2024/05/13 12:30")];
    let report = engine.import_bookings(&rows).await.unwrap();
    assert_eq!(report.created, 1);
    assert_eq!(report.already_present, 1);

    let bookings = engine.temporary_bookings(Some(monday()), None).await;
    assert_eq!(bookings[1].reserved_by, 7);

    // Importing the same export twice changes nothing.
    let again = engine.import_bookings(&rows).await.unwrap();
    assert_eq!(again.created, 0);
    assert_eq!(again.already_present, 2);
}

#[tokio::test]
async fn import_rejects_rows_individually() {
    let engine = new_engine("import_rejects.wal");
    seed_rooms(&engine, &["F301"]).await;

    let rows = vec![
        row("F302", "2024/05/13 9:00", "2024/05/13 10:40"),  // unknown room
        row("F301", "2024/05/13 9:30", "2024/05/13 10:40"),  // off-grid start
        row("F301", "2024/05/13 13:20", "2024/05/13 10:40"), // backwards
        row("F301", "2024/05/13 17:00", "2024/05/13 20:30"),
    ];
    let report = engine.import_bookings(&rows).await.unwrap();
    assert_eq!(report.rows_read, 4);
    assert_eq!(report.created, 2);
    let lines: Vec<usize> = report.rejected.iter().map(|r| r.line).collect();
    assert_eq!(lines, vec![1, 2, 3]);
    assert!(report.rejected[0].reason.contains("unknown room F302"));
}

#[tokio::test]
async fn import_stops_at_blank_room() {
    let engine = new_engine("import_blank.wal");
    seed_rooms(&engine, &["F301"]).await;
    let rows = vec![
        row("F301", "2024/05/13 9:00", "2024/05/13 10:40"),
        row("", "2024/05/13 9:00", "2024/05/13 10:40"),
        row("F301", "2024/05/13 10:50", "2024/05/13 12:30"),
    ];
    let report = engine.import_bookings(&rows).await.unwrap();
    assert_eq!(report.rows_read, 1);
    assert_eq!(report.created, 1);
}

#[tokio::test]
async fn import_requires_rows() {
    let engine = new_engine("import_empty.wal");
    assert!(matches!(
        engine.import_bookings(&[]).await,
        Err(EngineError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn pasted_import_keeps_good_lines_and_reports_bad_ones() {
    let engine = new_engine("import_pasted.wal");
    seed_rooms(&engine, &["F301"]).await;

    let text = "\nF301\t2024/05/13 9:00\t2024/05/13 10:40\nbroken line\n\n\
                F999\t2024/05/13 9:00\t2024/05/13 10:40\n\
                F301, 2024/05/13 13:20, 2024/05/13 15:00";
    let report = engine.import_pasted(parse_import_text(text)).await.unwrap();
    assert_eq!(report.rows_read, 4);
    assert_eq!(report.created, 2);
    let lines: Vec<usize> = report.rejected.iter().map(|r| r.line).collect();
    assert_eq!(lines, vec![3, 5]);
    assert_eq!(report.rejected[0].reason, "expected 3 fields, got 1");
    assert!(report.rejected[1].reason.contains("unknown room F999"));
    assert_eq!(engine.temporary_bookings(Some(monday()), None).await.len(), 2);
}

#[tokio::test]
async fn pasted_import_ignores_bad_lines_past_blank_room() {
    let engine = new_engine("import_pasted_blank.wal");
    seed_rooms(&engine, &["F301"]).await;

    let text = "F301\t2024/05/13 9:00\t2024/05/13 10:40\n\
                \t2024/05/13 9:00\t2024/05/13 10:40\n\
                broken line";
    let report = engine.import_pasted(parse_import_text(text)).await.unwrap();
    assert_eq!(report.rows_read, 1);
    assert_eq!(report.created, 1);
    assert!(report.rejected.is_empty());
}

#[tokio::test]
async fn purge_removes_only_old_bookings() {
    let engine = new_engine("purge.wal");
    seed_rooms(&engine, &["F301", "F302"]).await;
    engine.add_temporary_booking("F301", date(2024, 4, 1), p(1), 0).await.unwrap();
    engine.add_temporary_booking("F302", date(2024, 4, 30), p(6), 0).await.unwrap();
    engine.add_temporary_booking("F302", date(2024, 5, 1), p(1), 0).await.unwrap();

    let purged = engine.purge_bookings_before(date(2024, 5, 1)).await.unwrap();
    assert_eq!(purged, 2);
    let left = engine.temporary_bookings(None, None).await;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].date, date(2024, 5, 1));
}

// ── Usage log ────────────────────────────────────────────

#[tokio::test]
async fn reports_recorded_in_order() {
    let engine = new_engine("reports_order.wal");
    seed_rooms(&engine, &["F301", "F302"]).await;
    let r1 = engine.submit_report(submission("F301", 3, 2), monday()).await.unwrap();
    let r2 = engine.submit_report(submission("F302", 20, 6), monday()).await.unwrap();
    engine
        .submit_report(submission("F301", 0, 1), date(2024, 5, 14))
        .await
        .unwrap();

    let all = engine.usage_reports(None, None).await;
    assert_eq!(all.len(), 3);
    assert_eq!(all[0], r1);
    assert_eq!(all[1], r2);
    assert_eq!(engine.usage_reports(Some("F301"), None).await.len(), 2);
    assert_eq!(engine.usage_reports(Some("F301"), Some(monday())).await.len(), 1);
}

#[tokio::test]
async fn report_validation() {
    let engine = new_engine("report_validation.wal");
    seed_rooms(&engine, &["F301"]).await;

    let mut bad = submission("F301", 1, 1);
    bad.student = "123456789012".into();
    assert!(matches!(
        engine.submit_report(bad, monday()).await,
        Err(EngineError::InvalidInput(_))
    ));

    let mut blank = submission("F301", 1, 1);
    blank.student = "  ".into();
    assert!(matches!(
        engine.submit_report(blank, monday()).await,
        Err(EngineError::InvalidInput(_))
    ));

    assert!(matches!(
        engine.submit_report(submission("F301", MAX_OCCUPANCY + 1, 1), monday()).await,
        Err(EngineError::LimitExceeded(_))
    ));
    assert!(matches!(
        engine.submit_report(submission("F999", 1, 1), monday()).await,
        Err(EngineError::NotFound(_))
    ));
    assert!(engine.usage_reports(None, None).await.is_empty());
}

#[tokio::test]
async fn summary_means_per_room() {
    let engine = new_engine("summary.wal");
    seed_rooms(&engine, &["F301", "F302"]).await;
    engine.submit_report(submission("F301", 2, 2), monday()).await.unwrap();
    engine.submit_report(submission("F301", 4, 4), monday()).await.unwrap();
    engine.submit_report(submission("F302", 10, 6), monday()).await.unwrap();

    let summary = engine.usage_summary().await;
    assert_eq!(summary.len(), 2);
    assert_eq!(summary[0].room, "F301");
    assert_eq!(summary[0].reports, 2);
    assert!((summary[0].mean_occupancy - 3.0).abs() < f64::EPSILON);
    assert!((summary[0].mean_noise - 3.0).abs() < f64::EPSILON);
    assert!((summary[1].mean_noise - 6.0).abs() < f64::EPSILON);
    assert_eq!(summary[0].noise_label, "crowded, quiet");
    assert_eq!(summary[1].noise_label, "crowded, noisy");
}

#[tokio::test]
async fn reports_survive_room_deletion() {
    let engine = new_engine("reports_after_delete.wal");
    seed_rooms(&engine, &["F301"]).await;
    engine.submit_report(submission("F301", 2, 2), monday()).await.unwrap();
    engine.delete_room("F301").await.unwrap();
    assert_eq!(engine.usage_reports(Some("F301"), None).await.len(), 1);
}

// ── Persistence ──────────────────────────────────────────

#[tokio::test]
async fn state_rebuilt_from_journal() {
    let name = "replay_state.wal";
    let report_id = {
        let engine = new_engine(name);
        seed_rooms(&engine, &["F301", "F302", "F303"]).await;
        engine.update_room("F302", 12).await.unwrap();
        engine.delete_room("F303").await.unwrap();
        engine.set_recurring_comment(day(1), p(2), "F301", "Calculus").await.unwrap();
        engine.set_recurring_comment(day(2), p(2), "F301", "Temp").await.unwrap();
        engine.set_recurring_comment(day(2), p(2), "F301", "").await.unwrap();
        engine.add_temporary_booking("F302", monday(), p(2), 3).await.unwrap();
        let r = engine.submit_report(submission("F301", 5, 3), monday()).await.unwrap();
        r.id
    };

    let engine = reopen(name);
    let rooms = engine.list_rooms().await;
    assert_eq!(
        rooms,
        vec![
            RoomInfo { number: "F301".into(), capacity: 40 },
            RoomInfo { number: "F302".into(), capacity: 12 },
        ]
    );
    assert_eq!(engine.recurring_slots(None).await.len(), 1);
    assert!(engine.free_rooms(monday(), p(2)).await.is_empty());
    let reports = engine.usage_reports(None, None).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].id, report_id);
}

#[tokio::test]
async fn compaction_preserves_state() {
    let name = "compact_state.wal";
    {
        let engine = new_engine(name);
        seed_rooms(&engine, &["F301", "F302"]).await;
        for i in 0..10 {
            engine
                .set_recurring_comment(day(1), p(1), "F301", &format!("draft {i}"))
                .await
                .unwrap();
        }
        engine.delete_room("F302").await.unwrap();
        engine.add_temporary_booking("F301", monday(), p(5), 2).await.unwrap();
        engine.submit_report(submission("F301", 1, 1), monday()).await.unwrap();

        assert!(engine.wal_appends_since_compact().await >= 14);
        engine.compact_wal().await.unwrap();
        assert_eq!(engine.wal_appends_since_compact().await, 0);

        engine.add_temporary_booking("F301", monday(), p(6), 0).await.unwrap();
    }

    let events = crate::wal::Wal::replay(&existing_wal_path(name)).unwrap();
    // room + slot + booking + report, then the post-compaction booking
    assert_eq!(events.len(), 5);

    let engine = reopen(name);
    assert_eq!(engine.room_count(), 1);
    let grid = engine.recurring_grid().await;
    assert_eq!(grid[0].comments[0][0], "draft 9");
    assert_eq!(engine.temporary_bookings(Some(monday()), None).await.len(), 2);
    assert_eq!(engine.usage_reports(None, None).await.len(), 1);
}

#[tokio::test]
async fn mutations_are_broadcast() {
    let engine = new_engine("broadcast.wal");
    let mut rx = engine.notify.subscribe();
    engine.create_room("F301".into(), 40).await.unwrap();
    engine.add_temporary_booking("F301", monday(), p(1), 0).await.unwrap();

    assert!(matches!(rx.recv().await.unwrap(), Event::RoomCreated { .. }));
    assert_eq!(
        rx.recv().await.unwrap(),
        Event::BookingAdded {
            room: "F301".into(),
            date: monday(),
            period: p(1),
            reserved_by: 0,
        }
    );
}
