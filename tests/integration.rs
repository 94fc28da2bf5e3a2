//! Integration tests for kbqueue
//!
//! These tests drive the full controller through a static device list,
//! pushing events the way a capture thread would.

use kbqueue::config::QueueConfig;
use kbqueue::device::{DeviceCategory, DeviceHandle, DeviceInfo, StaticBackend};
use kbqueue::keyboard::{KeyCode, RawEvent, Timestamp};
use kbqueue::queue::{KeyFilter, ScoredKeyState};
use kbqueue::report::CheckRecord;
use kbqueue::{QueueController, QueueError, QueueState};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn ts(us: u64) -> Timestamp {
    Timestamp::from_micros(us)
}

fn press(key: u16, us: u64) -> RawEvent {
    RawEvent::press(key, ts(us))
}

fn release(key: u16, us: u64) -> RawEvent {
    RawEvent::release(key, ts(us))
}

fn controller(categories: &[DeviceCategory], capacity: usize) -> QueueController {
    QueueController::new(
        Box::new(StaticBackend::new(categories)),
        QueueConfig { capacity },
    )
}

/// Controller plus a host handle that can plug and unplug devices
fn hot_plug(categories: &[DeviceCategory], capacity: usize) -> (QueueController, StaticBackend) {
    let backend = StaticBackend::new(categories);
    let host = backend.clone();
    (
        QueueController::new(Box::new(backend), QueueConfig { capacity }),
        host,
    )
}

/// Four keyboards so that index 3 is valid
fn four_keyboards() -> QueueController {
    controller(&[DeviceCategory::Keyboard; 4], 64)
}

/// Create and start the default device, returning its handle
fn running(ctl: &mut QueueController) -> DeviceHandle {
    let handle = ctl.create(None, None).expect("create failed");
    ctl.start(None).expect("start failed");
    handle
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[test]
fn scenario_press_release_then_empty() {
    let mut ctl = four_keyboards();
    let handle = ctl.create(Some(3), None).unwrap();
    assert_eq!(handle, DeviceHandle::new(3));
    ctl.start(Some(3)).unwrap();

    assert!(ctl.capture_push(handle, press(44, 10)));
    assert!(ctl.capture_push(handle, release(44, 20)));

    let report = ctl.check(Some(3)).unwrap();
    let mut expected = BTreeMap::new();
    expected.insert(
        KeyCode(44),
        ScoredKeyState {
            press_count: 1,
            release_count: 1,
            first_press_time: Some(ts(10)),
            last_press_time: Some(ts(10)),
            first_release_time: Some(ts(20)),
            last_release_time: Some(ts(20)),
        },
    );
    assert_eq!(report.keys, expected);
    assert!(!report.overflowed);

    let second = ctl.check(Some(3)).unwrap();
    assert!(second.is_empty());
}

#[test]
fn counts_and_times_match_pushed_events() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 100);
    let h = running(&mut ctl);

    let mut t = 0;
    for round in 0..5u16 {
        for key in [30u16, 31, 32] {
            if key == 32 && round % 2 == 1 {
                continue;
            }
            t += 10;
            ctl.capture_push(h, press(key, t));
            t += 10;
            ctl.capture_push(h, release(key, t));
        }
    }

    let report = ctl.check(None).unwrap();
    let a = report.get(KeyCode(30)).unwrap();
    let c = report.get(KeyCode(32)).unwrap();
    assert_eq!((a.press_count, a.release_count), (5, 5));
    assert_eq!((c.press_count, c.release_count), (3, 3));
    assert_eq!(a.first_press_time, Some(ts(10)));
    assert_eq!(a.first_release_time, Some(ts(20)));
    assert!(a.last_press_time < a.last_release_time);
    assert_eq!(c.last_release_time, Some(ts(t)));
}

#[test]
fn scores_accumulate_between_checks() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 16);
    let h = running(&mut ctl);

    ctl.capture_push(h, press(30, 1));
    ctl.capture_push(h, release(30, 2));
    ctl.capture_push(h, press(30, 3));

    let report = ctl.check(None).unwrap();
    let state = report.get(KeyCode(30)).unwrap();
    assert_eq!(state.press_count, 2);
    assert_eq!(state.first_press_time, Some(ts(1)));
    assert_eq!(state.last_press_time, Some(ts(3)));
    assert!(state.is_held());
}

#[test]
fn events_after_check_are_scored_next_time() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 16);
    let h = running(&mut ctl);

    ctl.capture_push(h, press(30, 1));
    assert_eq!(ctl.check(None).unwrap().keys.len(), 1);

    ctl.capture_push(h, release(30, 5));
    assert_eq!(ctl.pending(h), Some(1));
    let report = ctl.check(None).unwrap();
    let state = report.get(KeyCode(30)).unwrap();
    assert_eq!(state.press_count, 0);
    assert_eq!(state.release_count, 1);
    assert!(!report.pressed());
}

// ---------------------------------------------------------------------------
// Flush, filter, overflow
// ---------------------------------------------------------------------------

#[test]
fn flush_then_check_is_empty() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 16);
    let h = running(&mut ctl);

    ctl.capture_push(h, press(30, 1));
    ctl.capture_push(h, press(31, 2));
    ctl.flush(None).unwrap();

    assert_eq!(ctl.state(h), QueueState::Running);
    assert!(ctl.check(None).unwrap().is_empty());
}

#[test]
fn filter_limits_captured_keys() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 16);
    let h = ctl.create(None, Some(&[65][..])).unwrap();
    ctl.start(None).unwrap();

    ctl.capture_push(h, press(65, 1));
    ctl.capture_push(h, press(66, 2));
    ctl.capture_push(h, release(66, 3));
    ctl.capture_push(h, release(65, 4));

    let report = ctl.check(None).unwrap();
    let keys: Vec<KeyCode> = report.keys.keys().copied().collect();
    assert_eq!(keys, vec![KeyCode(65)]);
}

#[test]
fn flag_vector_filter() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 16);
    let mut flags = vec![0; 256];
    flags[44] = 1;
    let h = ctl.create_filtered(None, KeyFilter::from_flags(&flags)).unwrap();
    ctl.start(None).unwrap();

    ctl.capture_push(h, press(44, 1));
    ctl.capture_push(h, press(45, 2));
    let report = ctl.check(None).unwrap();
    assert_eq!(report.keys.len(), 1);
    assert!(report.get(KeyCode(44)).is_some());
}

#[test]
fn filtered_events_do_not_use_capacity() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 2);
    let h = ctl.create(None, Some(&[30][..])).unwrap();
    ctl.start(None).unwrap();

    ctl.capture_push(h, press(30, 1));
    for t in 2..50 {
        ctl.capture_push(h, press(31, t));
    }
    ctl.capture_push(h, release(30, 60));

    let report = ctl.check(None).unwrap();
    assert!(!report.overflowed);
    let state = report.get(KeyCode(30)).unwrap();
    assert_eq!((state.press_count, state.release_count), (1, 1));
}

#[test]
fn overflow_keeps_most_recent_events() {
    let capacity = 4;
    let mut ctl = controller(&[DeviceCategory::Keyboard], capacity);
    let h = running(&mut ctl);

    // Oldest event is the only one for key 29
    ctl.capture_push(h, press(29, 1));
    for t in 2..=(capacity as u64 + 1) {
        ctl.capture_push(h, press(30, t));
    }

    let report = ctl.check(None).unwrap();
    assert!(report.overflowed);
    assert_eq!(report.dropped, 1);
    assert!(report.get(KeyCode(29)).is_none());
    let state = report.get(KeyCode(30)).unwrap();
    assert_eq!(state.press_count, capacity as u32);
    assert_eq!(state.first_press_time, Some(ts(2)));

    // Flag is reported once
    ctl.capture_push(h, press(30, 100));
    assert!(!ctl.check(None).unwrap().overflowed);
}

#[test]
fn overflow_survives_flush() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 2);
    let h = running(&mut ctl);
    for t in 1..=5 {
        ctl.capture_push(h, press(30, t));
    }

    ctl.flush(None).unwrap();
    let report = ctl.check(None).unwrap();
    assert!(report.is_empty());
    assert!(report.overflowed);
    assert_eq!(report.dropped, 3);
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[test]
fn start_before_create_fails() {
    let mut ctl = four_keyboards();
    assert_eq!(
        ctl.start(Some(2)),
        Err(QueueError::NotCreated(DeviceHandle::new(2)))
    );
    assert!(matches!(ctl.start(None), Err(QueueError::NotCreated(_))));
}

#[test]
fn stop_twice_is_noop() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 16);
    let h = running(&mut ctl);
    assert_eq!(ctl.stop(None), Ok(()));
    assert_eq!(ctl.stop(None), Ok(()));
    assert_eq!(ctl.state(h), QueueState::Stopped);
}

#[test]
fn release_twice_is_noop() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 16);
    let h = running(&mut ctl);

    assert_eq!(ctl.release(None), Ok(()));
    assert_eq!(ctl.state(h), QueueState::Released);
    assert_eq!(ctl.release(None), Ok(()));
    assert_eq!(ctl.state(h), QueueState::Released);
}

#[test]
fn release_never_created_is_noop() {
    let mut ctl = four_keyboards();
    assert_eq!(ctl.release(Some(1)), Ok(()));
    assert_eq!(ctl.state(DeviceHandle::new(1)), QueueState::Uninitialized);
}

#[test]
fn released_queue_needs_create() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 16);
    let h = running(&mut ctl);
    ctl.release(None).unwrap();

    assert!(!ctl.capture_push(h, press(30, 1)));
    assert!(matches!(ctl.check(None), Err(QueueError::NotCreated(_))));
    assert!(matches!(ctl.flush(None), Err(QueueError::NotCreated(_))));

    ctl.create(None, None).unwrap();
    assert_eq!(ctl.state(h), QueueState::Created);
}

#[test]
fn default_device_prefers_keyboard() {
    let mut ctl = controller(
        &[DeviceCategory::Other, DeviceCategory::Keypad, DeviceCategory::Keyboard],
        16,
    );
    assert_eq!(ctl.create(None, None).unwrap(), DeviceHandle::new(2));
}

#[test]
fn default_device_fixed_at_create() {
    let (mut ctl, host) = hot_plug(&[DeviceCategory::Keypad], 16);
    let h = running(&mut ctl);
    assert_eq!(h, DeviceHandle::new(0));

    // Keypad re-enumerates behind a newly plugged keyboard
    host.set_devices(vec![
        DeviceInfo::new(0, DeviceCategory::Keypad, "keypad"),
        DeviceInfo::new(1, DeviceCategory::Keyboard, "keyboard"),
    ]);
    ctl.capture_push(h, press(79, 1));
    let report = ctl.check(None).unwrap();
    assert_eq!(report.device, h);
    assert!(report.get(KeyCode(79)).is_some());

    ctl.stop(None).unwrap();
    assert_eq!(ctl.state(h), QueueState::Stopped);
    assert_eq!(ctl.state(DeviceHandle::new(1)), QueueState::Uninitialized);
}

#[test]
fn unplugged_default_device_is_released_with_its_error() {
    let (mut ctl, host) = hot_plug(&[DeviceCategory::Keyboard], 16);
    let h = running(&mut ctl);
    let sink = ctl.sink(h).unwrap();
    sink.report_error("unplugged");
    host.set_devices(Vec::new());

    match ctl.release(None) {
        Err(QueueError::DeviceError { device, message }) => {
            assert_eq!(device, h);
            assert_eq!(message, "unplugged");
        }
        other => panic!("expected device error, got {:?}", other),
    }
    assert_eq!(ctl.state(h), QueueState::Released);
    assert!(!ctl.registry().is_held(h));
    assert!(!sink.is_open());
    assert_eq!(ctl.release(None), Ok(()));
}

#[test]
fn dropping_controller_releases_queues() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 16);
    let h = running(&mut ctl);
    let sink = ctl.sink(h).unwrap();
    drop(ctl);
    assert!(!sink.is_open());
    assert!(!sink.push(press(30, 1)).is_queued());
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn producer_thread_events_are_scored_exactly_once() {
    const EVENTS: u64 = 20_000;
    let mut ctl = controller(&[DeviceCategory::Keyboard], EVENTS as usize);
    let h = running(&mut ctl);
    let sink = ctl.sink(h).unwrap();

    let producer = thread::spawn(move || {
        for t in 0..EVENTS {
            let event = if t % 2 == 0 { press(30, t) } else { release(30, t) };
            assert!(sink.push(event).is_queued());
        }
    });

    let mut presses = 0u64;
    let mut releases = 0u64;
    let mut last_seen: Option<Timestamp> = None;
    loop {
        let done = producer.is_finished();
        let report = ctl.check(None).unwrap();
        assert!(!report.overflowed);
        if let Some(state) = report.get(KeyCode(30)) {
            presses += u64::from(state.press_count);
            releases += u64::from(state.release_count);
            let first = state.first_press_time.or(state.first_release_time);
            if let (Some(prev), Some(first)) = (last_seen, first) {
                assert!(first > prev, "batches must not overlap");
            }
            last_seen = [state.last_press_time, state.last_release_time]
                .into_iter()
                .flatten()
                .max();
        }
        if done {
            break;
        }
    }
    producer.join().unwrap();
    let report = ctl.check(None).unwrap();
    assert!(report.is_empty());

    assert_eq!(presses, EVENTS / 2);
    assert_eq!(releases, EVENTS / 2);
}

#[test]
fn no_pushes_land_after_stop_returns() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 1_000_000);
    let h = running(&mut ctl);
    let sink = ctl.sink(h).unwrap();
    let quit = Arc::new(AtomicBool::new(false));

    let producer = {
        let quit = Arc::clone(&quit);
        thread::spawn(move || {
            let mut t = 0;
            while !quit.load(Ordering::SeqCst) {
                sink.push(press(30, t));
                t += 1;
            }
        })
    };

    thread::sleep(std::time::Duration::from_millis(5));
    ctl.stop(None).unwrap();
    let pending_after_stop = ctl.pending(h).unwrap();
    thread::sleep(std::time::Duration::from_millis(5));
    assert_eq!(ctl.pending(h), Some(pending_after_stop));

    quit.store(true, Ordering::SeqCst);
    producer.join().unwrap();
}

// ---------------------------------------------------------------------------
// Device errors and export
// ---------------------------------------------------------------------------

#[test]
fn device_error_is_sticky_until_reported() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 16);
    let h = running(&mut ctl);
    ctl.capture_push(h, press(30, 1));
    ctl.sink(h).unwrap().report_error("device disconnected");

    assert!(!ctl.capture_push(h, press(31, 2)));
    match ctl.check(None) {
        Err(QueueError::DeviceError { device, message }) => {
            assert_eq!(device, h);
            assert_eq!(message, "device disconnected");
        }
        other => panic!("expected device error, got {:?}", other),
    }

    let report = ctl.check(None).unwrap();
    assert!(report.get(KeyCode(30)).is_some());
    assert!(report.get(KeyCode(31)).is_none());

    // The failed source is stopped; start reopens it
    assert_eq!(ctl.state(h), QueueState::Stopped);
    ctl.start(None).unwrap();
    assert!(ctl.capture_push(h, press(31, 3)));
}

#[test]
fn check_report_exports_as_json() {
    let mut ctl = controller(&[DeviceCategory::Keyboard], 16);
    let h = running(&mut ctl);
    ctl.capture_push(h, press(44, 10));
    ctl.capture_push(h, release(44, 20));

    let report = ctl.check(None).unwrap();
    let record = CheckRecord::from(&report);
    let json = record.to_json_line().expect("JSON serialization failed");
    assert!(json.contains("\"pressed\":true"));
    assert!(json.contains("\"press_count\":1"));
    assert!(json.contains("\"device\":0"));
}
