//! End-to-end scenarios for the daily board.

use chrono::NaiveDate;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tiempo_justo::autosave::AutosaveConfig;
use tiempo_justo::clock::ManualClock;
use tiempo_justo::events::{self, Event, EventBus, handler};
use tiempo_justo::logbook::summarize_month;
use tiempo_justo::models::{DailyLog, NewTask, TaskPatch};
use tiempo_justo::providers::ProviderContext;
use tiempo_justo::storage::{KeyedStore, MemoryMedium};
use tiempo_justo::validation::validate_task;
use tiempo_justo::{Priority, ProjectStatus, Session, Task};

struct Harness {
    session: Session,
    clock: Rc<ManualClock>,
}

fn harness(max_active: usize) -> Harness {
    let clock = Rc::new(ManualClock::new(NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()));
    let ctx = ProviderContext {
        store: Rc::new(KeyedStore::new(MemoryMedium::new())),
        fallback: Rc::new(KeyedStore::new(MemoryMedium::new())),
        bus: Rc::new(EventBus::new()),
        clock: clock.clone(),
        autosave: AutosaveConfig::default(),
        session_id: "scenario".to_string(),
    };
    Harness {
        session: Session::with_context(ctx, max_active, Duration::ZERO),
        clock,
    }
}

#[test]
fn new_task_gets_defaults() {
    let mut h = harness(8);
    let task = h.session.tasks.add(NewTask::titled("Buy milk")).unwrap();
    assert_eq!(task.priority, Priority::C);
    assert!(!task.done);
    assert!(!task.id.is_empty());
    assert!(task.completed_at.is_none());
}

#[test]
fn valid_titles_pass_and_blank_titles_change_nothing() {
    for len in [1, 50, 200] {
        let mut task = Task::new("x".repeat(len));
        for priority in Priority::ALL {
            task.priority = priority;
            assert!(validate_task(&task).is_empty());
        }
    }

    let mut h = harness(8);
    let kept = h.session.tasks.add(NewTask::titled("Keep")).unwrap();
    for blank in ["", "   ", "\t\n"] {
        assert!(h.session.tasks.add(NewTask::titled(blank)).is_err());
        let patch = TaskPatch {
            title: Some(blank.to_string()),
            ..TaskPatch::default()
        };
        assert!(h.session.tasks.update(&kept.id, patch).is_err());
    }
    assert_eq!(h.session.tasks.list(), &[kept]);
}

#[test]
fn toggling_stamps_and_clears_completion_time() {
    let mut h = harness(8);
    let task = h.session.tasks.add(NewTask::titled("Stretch")).unwrap();
    assert!(h.session.tasks.toggle(&task.id).unwrap().completed_at.is_some());
    assert!(h.session.tasks.toggle(&task.id).unwrap().completed_at.is_none());
}

#[test]
fn board_caps_open_tasks_but_not_done_ones() {
    let mut h = harness(2);
    let first = h.session.tasks.add(NewTask::titled("One")).unwrap();
    h.session.tasks.add(NewTask::titled("Two")).unwrap();
    assert!(h.session.tasks.add(NewTask::titled("Three")).is_err());

    h.session.tasks.toggle(&first.id).unwrap();
    h.session.tasks.add(NewTask::titled("Three")).unwrap();
    // Reopening would exceed the cap
    assert!(h.session.tasks.toggle(&first.id).is_err());
    assert!(h.session.tasks.get(&first.id).unwrap().done);
}

#[test]
fn monthly_aggregation_rounds_completion_rate() {
    let logs = vec![DailyLog {
        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        total_tasks: 5,
        completed_tasks: 3,
    }];
    assert_eq!(summarize_month(&logs, 2024, 1).completion_rate, 60);
}

#[test]
fn day_rollover_feeds_the_monthly_summary() {
    let mut h = harness(8);
    let a = h.session.tasks.add(NewTask::titled("A")).unwrap();
    h.session.tasks.add(NewTask::titled("B")).unwrap();
    h.session.tasks.toggle(&a.id).unwrap();

    h.clock.set_today(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    let outcome = h.session.poll();
    assert_eq!(outcome.logged_day.map(|log| log.completed_tasks), Some(1));

    let january = h.session.logbook.monthly_summary(2024, 1);
    assert_eq!(january.completion_rate, 50);
    assert_eq!(january.days_logged, 1);
    assert_eq!(h.session.logbook.monthly_summary(2024, 2).days_logged, 0);
}

#[test]
fn failing_handler_does_not_starve_the_next_one() {
    let bus = EventBus::new();
    let received = Rc::new(RefCell::new(Vec::new()));
    let sink = received.clone();

    bus.on(events::TASK_ADDED, handler(|_event: &Event| Err("boom".into())));
    bus.on(
        events::TASK_ADDED,
        handler(move |event: &Event| {
            sink.borrow_mut().push(event.payload["title"].clone());
            Ok(())
        }),
    );

    bus.emit(events::TASK_ADDED, serde_json::json!({ "title": "Buy milk" }));
    assert_eq!(*received.borrow(), vec![serde_json::json!("Buy milk")]);
}

#[test]
fn completing_work_earns_points_through_the_bus() {
    let mut h = harness(8);
    let task = h.session.tasks.add(NewTask::titled("Ship it")).unwrap();
    h.session.tasks.toggle(&task.id).unwrap();
    let project = h.session.projects.add("Launch").unwrap();
    h.session
        .projects
        .set_status(&project.id, ProjectStatus::Completed)
        .unwrap();

    let state = h.session.gamification.state();
    assert_eq!(state.points, 60);
    assert_eq!(state.current_streak(h.session.today()), 1);
}

#[test]
fn pomodoro_focus_completes_on_the_session_clock() {
    let mut h = harness(8);
    h.session.pomodoro.start();
    h.clock.advance(Duration::from_secs(25 * 60));
    let outcome = h.session.poll();
    assert_eq!(outcome.finished_phase.map(|p| p.label()), Some("Focus"));
    assert_eq!(h.session.pomodoro.format_remaining(), "05:00");
}
