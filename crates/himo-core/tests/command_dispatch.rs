#![forbid(unsafe_code)]

//! Integration tests: commands bound through a `Binder`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use himo_core::{Binder, BoundCommand, BoundValue, ExecutionMode};
use parking_lot::Mutex;

type Button = &'static str;
type Shown = Arc<Mutex<Vec<(Button, bool)>>>;

fn command_with_enabler(enabled: bool) -> (Arc<BoundCommand<Button>>, Shown) {
    let command = Arc::new(BoundCommand::new(enabled));
    let shown = Shown::default();
    let s = Arc::clone(&shown);
    command.attach_enabler(move |k, en| s.lock().push((*k, en)));
    (command, shown)
}

#[test]
fn back_to_back_triggers_run_sequentially() {
    let binder = Binder::new();
    let (command, _) = command_with_enabler(true);
    let spans = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&spans);
    command.attach_action(
        move |_| {
            let start = Instant::now();
            thread::sleep(Duration::from_millis(40));
            s.lock().push((start, Instant::now()));
        },
        ExecutionMode::Async,
    );
    binder.bind(&command, "append").unwrap();

    binder.on_command(&"append");
    binder.on_command(&"append");
    // The second trigger joined the first run before starting its own.
    assert!(!spans.lock().is_empty());

    command.wait_idle();
    let spans = spans.lock();
    assert_eq!(spans.len(), 2);
    assert!(spans[0].1 <= spans[1].0, "runs overlapped: {spans:?}");
}

#[test]
fn busy_command_is_drawn_disabled_everywhere() {
    let binder = Binder::new();
    let (command, shown) = command_with_enabler(true);
    let started = Arc::new(Barrier::new(2));
    let release = Arc::new(Barrier::new(2));
    let (st, rl) = (Arc::clone(&started), Arc::clone(&release));
    command.attach_action(
        move |_| {
            st.wait();
            rl.wait();
        },
        ExecutionMode::Async,
    );
    binder.bind(&command, "toolbar").unwrap();
    binder.bind(&command, "menu").unwrap();
    binder.on_draw();
    shown.lock().clear();

    binder.on_command(&"menu");
    started.wait();
    assert!(binder.is_dirty());
    binder.on_draw();
    assert_eq!(*shown.lock(), vec![("toolbar", false), ("menu", false)]);

    release.wait();
    command.wait_idle();
    shown.lock().clear();
    binder.on_draw();
    assert_eq!(*shown.lock(), vec![("toolbar", true), ("menu", true)]);
}

#[test]
fn worker_completion_requests_repaint() {
    let binder = Binder::new();
    let (command, _) = command_with_enabler(true);
    let release = Arc::new(Barrier::new(2));
    let rl = Arc::clone(&release);
    command.attach_action(
        move |_| {
            rl.wait();
        },
        ExecutionMode::Async,
    );
    let repaints = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&repaints);
    binder.attach_invalidator(move || {
        r.fetch_add(1, Ordering::SeqCst);
    });
    binder.bind(&command, "go").unwrap();
    binder.on_draw();

    binder.on_command(&"go");
    assert_eq!(repaints.load(Ordering::SeqCst), 1);
    binder.on_draw();

    release.wait();
    command.wait_idle();
    assert_eq!(repaints.load(Ordering::SeqCst), 2);
}

#[test]
fn notify_does_not_trigger_commands() {
    let binder = Binder::new();
    let (command, _) = command_with_enabler(true);
    let ran = Arc::new(AtomicBool::new(false));
    let r = Arc::clone(&ran);
    command.attach_action(move |_| r.store(true, Ordering::SeqCst), ExecutionMode::Sync);
    binder.bind(&command, "ok").unwrap();

    binder.on_notify(&"ok");
    assert!(!ran.load(Ordering::SeqCst));
    binder.on_command(&"ok");
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn sync_command_updates_value_for_next_draw() {
    let binder = Binder::new();
    let flag = Arc::new(BoundValue::new(true));
    let shown = Arc::new(Mutex::new(Vec::new()));
    let s = Arc::clone(&shown);
    flag.attach_setter(move |k: &Button, v| s.lock().push((*k, *v)));
    flag.attach_eq_comparator();

    let toggle = Arc::new(BoundCommand::new(true));
    let f = Arc::clone(&flag);
    toggle.attach_action(
        move |_| {
            f.set_value(!f.get());
        },
        ExecutionMode::Sync,
    );

    binder.bind(&flag, "edit").unwrap();
    binder.bind(&toggle, "toggle").unwrap();
    binder.on_draw();
    shown.lock().clear();

    binder.on_command(&"toggle");
    assert!(!flag.get());
    assert!(shown.lock().is_empty());
    binder.on_draw();
    assert_eq!(*shown.lock(), vec![("edit", false)]);
}

#[test]
fn disabling_stops_triggers_and_redraws() {
    let binder = Binder::new();
    let (command, shown) = command_with_enabler(true);
    let runs = Arc::new(AtomicUsize::new(0));
    let r = Arc::clone(&runs);
    command.attach_action(
        move |_| {
            r.fetch_add(1, Ordering::SeqCst);
        },
        ExecutionMode::Sync,
    );
    binder.bind(&command, "save").unwrap();
    binder.on_draw();
    shown.lock().clear();

    command.enable(false);
    binder.on_command(&"save");
    assert_eq!(runs.load(Ordering::SeqCst), 0);
    binder.on_draw();
    assert_eq!(*shown.lock(), vec![("save", false)]);
}

#[test]
fn dropping_binder_and_command_waits_for_worker() {
    let finished = Arc::new(AtomicBool::new(false));
    {
        let binder = Binder::new();
        let (command, _) = command_with_enabler(true);
        let f = Arc::clone(&finished);
        command.attach_action(
            move |_| {
                thread::sleep(Duration::from_millis(30));
                f.store(true, Ordering::SeqCst);
            },
            ExecutionMode::Async,
        );
        binder.bind(&command, "slow").unwrap();
        binder.on_command(&"slow");
    }
    assert!(finished.load(Ordering::SeqCst));
}
