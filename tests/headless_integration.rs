use std::fs;
use std::sync::mpsc;
use std::time::Duration;

use tracepad::config::Config;
use tracepad::feedback::{PointVerdict, Signal};
use tracepad::mapper::{DisplayRect, GridSpec, LayoutSnapshot};
use tracepad::runtime::{
    FixedTicker, PointerInput, PointerKind, Runner, TestEventSource, TraceEvent,
};
use tracepad::{SessionConfig, TemplateState, TemplateStore, TracingSession};

// Sparse letter A: apex at the top, two feet
const LETTER_A: &str = r#"{ "paths": [ { "points": [[5,5],[10,0],[15,5]] } ] }"#;

fn store_with_a() -> (tempfile::TempDir, TemplateStore) {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("A.json"), LETTER_A).unwrap();
    let store = TemplateStore::from_dir_or_bundled(Some(dir.path()));
    (dir, store)
}

// Client position at the center of grid cell (gx, gy) for a canvas displayed
// at half size with its origin at (100, 50)
fn client(gx: i32, gy: i32) -> (f64, f64) {
    (100.0 + gx as f64 * 5.0 + 2.5, 50.0 + gy as f64 * 5.0 + 2.5)
}

fn half_size_layout() -> LayoutSnapshot {
    LayoutSnapshot::new(
        DisplayRect {
            left: 100.0,
            top: 50.0,
            width: 200.0,
            height: 200.0,
        },
        &GridSpec::default(),
    )
}

fn pointer(kind: PointerKind, cell: (i32, i32), time: u64) -> TraceEvent {
    let (x, y) = client(cell.0, cell.1);
    TraceEvent::Pointer(PointerInput::new(kind, x, y, time))
}

#[test]
fn headless_letter_a_trace_scores_full_alignment_and_coverage() {
    let (_dir, mut store) = store_with_a();
    let template = store.load("A");
    assert!(template.is_ready());

    let mut session = TracingSession::new(
        SessionConfig::from_config(&Config::default(), "A"),
        template,
    );
    let layout = half_size_layout();

    let (tx, rx) = mpsc::channel();
    tx.send(pointer(PointerKind::Down, (5, 5), 0)).unwrap();
    tx.send(pointer(PointerKind::Move, (10, 0), 100)).unwrap();
    tx.send(pointer(PointerKind::Move, (15, 5), 200)).unwrap();
    tx.send(pointer(PointerKind::Up, (15, 5), 250)).unwrap();
    drop(tx);

    let runner = Runner::new(
        TestEventSource::new(rx),
        FixedTicker::new(Duration::from_millis(5)),
    );

    let mut verdicts = Vec::new();
    for _ in 0..20u32 {
        match runner.step() {
            TraceEvent::Pointer(p) => {
                session.handle(&p, &layout);
                if let Some(Signal::Point(v)) = session.current_signal() {
                    verdicts.push(*v);
                }
            }
            TraceEvent::Tick => break,
            _ => {}
        }
    }

    let m = session.metrics();
    assert_eq!(m.alignment_score, 1.0);
    assert_eq!(m.coverage_score, 1.0);
    assert_eq!(m.direction_score, 1.0);
    assert_eq!(m.total_accuracy, 1.0);
    assert_eq!(m.stroke_count, 1);
    assert!((m.total_time - 0.25).abs() < 1e-9);
    assert!(session.can_submit());
    assert!(verdicts.iter().all(|v| *v == PointVerdict::Matched));

    // feedback expires on its own
    assert!(session.tick(200 + 3000));
    assert!(session.current_signal().is_none());
}

#[test]
fn headless_trace_far_from_template_is_blocked() {
    let (_dir, mut store) = store_with_a();
    let mut session = TracingSession::new(
        SessionConfig::from_config(&Config::default(), "A"),
        store.load("A"),
    );
    let layout = half_size_layout();

    for (i, cell) in [(30, 30), (31, 32), (33, 33)].into_iter().enumerate() {
        let kind = if i == 0 { PointerKind::Down } else { PointerKind::Move };
        let (x, y) = client(cell.0, cell.1);
        session.handle(&PointerInput::new(kind, x, y, i as u64 * 50), &layout);
    }
    session.pointer_up(150);

    let m = session.metrics();
    assert_eq!(m.alignment_score, 0.0);
    assert_eq!(m.coverage_score, 0.0);
    assert!(m.total_accuracy <= 0.3 * m.direction_score + 1e-12);
    assert!(!session.can_submit());
    assert!(session.can_try_again());
}

#[test]
fn headless_missing_template_still_allows_free_drawing() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = TemplateStore::from_dir_or_bundled(Some(dir.path()));
    let template = store.load("Q");
    assert!(matches!(template, TemplateState::Unavailable));

    let mut session = TracingSession::new(
        SessionConfig::from_config(&Config::default(), "Q"),
        template,
    );
    let layout = half_size_layout();
    let (x, y) = client(2, 2);
    session.handle(&PointerInput::touch(PointerKind::Down, x, y, 0), &layout);
    let (x, y) = client(3, 9);
    session.handle(&PointerInput::touch(PointerKind::Move, x, y, 40), &layout);
    session.handle(&PointerInput::touch(PointerKind::Leave, x, y, 60), &layout);

    assert!(session.current_signal().is_none());
    assert_eq!(session.metrics().total_accuracy, 1.0);
    assert!(session.can_submit());
}

#[test]
fn headless_out_of_bounds_points_are_recorded_not_matched() {
    let (_dir, mut store) = store_with_a();
    let mut session = TracingSession::new(
        SessionConfig::from_config(&Config::default(), "A"),
        store.load("A"),
    );
    let layout = half_size_layout();

    // left of and above the displayed canvas
    session.handle(&PointerInput::new(PointerKind::Down, 90.0, 40.0, 0), &layout);
    session.handle(&PointerInput::new(PointerKind::Move, 95.0, 45.0, 10), &layout);
    session.handle(&PointerInput::new(PointerKind::Up, 95.0, 45.0, 20), &layout);

    assert_eq!(session.points().len(), 2);
    assert!(session.points().iter().all(|p| p.grid_x < 0 && p.grid_y < 0));
    assert_eq!(session.metrics().alignment_score, 0.0);
    assert_eq!(session.record().map(|r| r.len()), Some(2));
}

#[test]
fn headless_move_far_off_the_canvas_is_scored_not_fatal() {
    let (_dir, mut store) = store_with_a();
    let grid = GridSpec::default();
    let mut session = TracingSession::new(
        SessionConfig::from_config(&Config::default(), "A"),
        store.load("A"),
    );
    let layout = LayoutSnapshot::unscaled(&grid);

    session.handle(&PointerInput::new(PointerKind::Down, 55.0, 55.0, 0), &layout);
    session.handle(&PointerInput::new(PointerKind::Move, -1.0e12, 55.0, 10), &layout);
    session.handle(&PointerInput::new(PointerKind::Move, 55.0, -1.0e12, 15), &layout);
    session.pointer_up(20);

    let m = session.metrics();
    assert_eq!(m.stroke_count, 1);
    assert!((m.alignment_score - 1.0 / 3.0).abs() < 1e-12);
    // the jump away from (5,5) is wrong, the pair starting off the grid is not judged
    assert_eq!(m.direction_score, 0.5);
    assert_eq!(session.record().map(|r| r.len()), Some(3));
    assert!(session.points()[1].grid_x < 0);
}

#[test]
fn headless_reset_clears_metrics_and_session() {
    let (_dir, mut store) = store_with_a();
    let mut session = TracingSession::new(
        SessionConfig::from_config(&Config::default(), "A"),
        store.load("A"),
    );
    let layout = half_size_layout();

    for (kind, cell, t) in [
        (PointerKind::Down, (5, 5), 0),
        (PointerKind::Move, (10, 0), 30),
        (PointerKind::Up, (10, 0), 40),
        (PointerKind::Down, (10, 0), 100),
        (PointerKind::Move, (12, 2), 120),
    ] {
        let (x, y) = client(cell.0, cell.1);
        session.handle(&PointerInput::new(kind, x, y, t), &layout);
    }
    assert!(session.is_drawing());

    session.reset();
    assert_eq!(*session.metrics(), Default::default());
    assert!(session.strokes().is_empty());
    assert!(session.record().is_none());
    assert!(!session.is_drawing());
    assert!(session.template().is_some());
}

#[test]
fn bundled_templates_load_for_every_default_letter() {
    let mut store = TemplateStore::from_dir_or_bundled(None);
    for letter in Config::default().letters {
        let state = store.load(&letter);
        let template = state.template().expect("bundled template");
        assert!(!template.distinct_cells().is_empty());
        assert!(template
            .cells()
            .all(|c| GridSpec::default().contains(c)));
    }
}
