use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use feeder_core::mocks::MemoryScheduleStore;
use feeder_core::{
    Evaluation, FeedingScheduler, FileScheduleStore, IntervalKind, Miss, Schedule,
    SchedulerCfg, Urgency,
};

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

fn scheduler() -> (FeedingScheduler<MemoryScheduleStore>, MemoryScheduleStore) {
    let store = MemoryScheduleStore::default();
    (
        FeedingScheduler::load(store.clone(), SchedulerCfg::default()),
        store,
    )
}

#[test]
fn daily_at_eight_counts_down_then_feeds_once() {
    let (mut s, store) = scheduler();
    s.set_schedule(at("2026-10-17 08:00:00"), IntervalKind::Daily);

    assert_eq!(
        s.evaluate(at("2026-10-17 07:00:00")),
        Evaluation::TimeRemaining {
            remaining: TimeDelta::hours(1),
            urgency: Urgency::Normal,
        }
    );

    let Evaluation::DueNow(due) = s.evaluate(at("2026-10-17 08:00:01")) else {
        panic!("expected a due feeding");
    };
    assert!(due.should_feed());
    assert_eq!(due.miss, Miss::Recent);
    assert_eq!(due.next, at("2026-10-18 08:00:00"));
    assert_eq!(store.current().unwrap().next_feeding, Some(at("2026-10-18 08:00:00")));

    // Same tick again: the feeding does not fire twice.
    assert!(matches!(
        s.evaluate(at("2026-10-17 08:00:02")),
        Evaluation::TimeRemaining { .. }
    ));
}

#[test]
fn every3h_resumes_at_hour_ten_without_intermediate_feedings() {
    let (mut s, _) = scheduler();
    s.set_schedule(at("2026-10-17 00:00:00"), IntervalKind::Every3h);
    let Evaluation::DueNow(due) = s.evaluate(at("2026-10-17 10:00:00")) else {
        panic!("expected due");
    };
    assert_eq!(due.miss, Miss::Stale);
    assert!(!due.should_feed());
    assert_eq!(due.next, at("2026-10-17 12:00:00"));
    assert_eq!(s.schedule().next_feeding, Some(at("2026-10-17 12:00:00")));
}

#[test]
fn recent_window_is_inclusive_at_five_minutes() {
    let (mut s, _) = scheduler();
    s.set_schedule(at("2026-10-17 08:00:00"), IntervalKind::Every2h);
    let Evaluation::DueNow(due) = s.evaluate(at("2026-10-17 08:05:00")) else {
        panic!("expected due");
    };
    assert!(due.should_feed());

    s.set_schedule(at("2026-10-17 08:00:00"), IntervalKind::Every2h);
    let Evaluation::DueNow(due) = s.evaluate(at("2026-10-17 08:05:01")) else {
        panic!("expected due");
    };
    assert!(!due.should_feed());
}

#[test]
fn clear_returns_to_unset_daily() {
    let (mut s, store) = scheduler();
    s.set_schedule(at("2026-10-17 08:00:00"), IntervalKind::Thrice);
    s.clear();
    assert_eq!(s.schedule(), Schedule::default());
    assert_eq!(s.schedule().interval, IntervalKind::Daily);
    assert_eq!(s.evaluate(at("2026-10-17 09:00:00")), Evaluation::Idle);
    assert_eq!(store.current(), Some(Schedule::default()));
}

#[test]
fn set_daily_time_uses_first_occurrence() {
    let (mut s, _) = scheduler();
    let next = s.set_daily_time(
        NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        IntervalKind::Daily,
        at("2026-10-17 09:00:00"),
    );
    assert_eq!(next, at("2026-10-18 08:00:00"));
    assert_eq!(s.anchor_time(), NaiveTime::from_hms_opt(8, 0, 0));
}

#[test]
fn schedule_survives_restart_through_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feeder_schedule.toml");
    {
        let mut s = FeedingScheduler::load(FileScheduleStore::new(&path), SchedulerCfg::default());
        s.set_schedule(at("2026-10-17 20:00:00"), IntervalKind::Twice);
    }
    let s = FeedingScheduler::load(FileScheduleStore::new(&path), SchedulerCfg::default());
    assert_eq!(
        s.schedule(),
        Schedule::new(at("2026-10-17 20:00:00"), IntervalKind::Twice)
    );
}

#[test]
fn corrupt_file_falls_back_to_unset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feeder_schedule.toml");
    std::fs::write(&path, "next_feeding = 42\n").unwrap();
    let s = FeedingScheduler::load(FileScheduleStore::new(&path), SchedulerCfg::default());
    assert_eq!(s.schedule(), Schedule::default());
}
