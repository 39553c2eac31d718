//! End-to-end planner scenarios: cold boot, command handling, backoff,
//! give-up, and reconnect, driven the way a transport loop would.

use printlink::buffer::SharedBuffer;
use printlink::connect::command::{Command, CommandData, GcodeData};
use printlink::connect::event::{Event, EventKind};
use printlink::connect::planner::{
    Action, ActionResult, BackgroundResult, Planner, COOLDOWN_BASE, GIVE_UP_AFTER_ATTEMPTS,
    TELEMETRY_INTERVAL_LONG, TELEMETRY_INTERVAL_SHORT,
};
use printlink::time::Timestamp;

use crate::mock_ports::{MockPrinter, MockTransfers};

fn expect_event(action: Action) -> Event {
    match action {
        Action::Event(event) => event,
        other => panic!("expected an event, got {:?}", other),
    }
}

/// Drive the fresh planner through its Info + first telemetry into the
/// steady idle state. Returns the time the last action completed at.
fn settle(planner: &mut Planner<'_>, printer: &MockPrinter, transfers: &MockTransfers) -> Timestamp {
    let info = expect_event(planner.next_action(0, printer, transfers));
    assert_eq!(info.kind, EventKind::Info);
    planner.action_done(ActionResult::Ok, 0);
    assert_eq!(
        planner.next_action(1, printer, transfers),
        Action::SendTelemetry
    );
    planner.action_done(ActionResult::Ok, 1);
    1
}

// ── Scenario: cold boot ───────────────────────────────────────

#[test]
fn cold_boot_introduces_then_settles_into_telemetry() {
    let printer = MockPrinter::new();
    let transfers = MockTransfers::new();
    let mut planner = Planner::new();

    let info = expect_event(planner.next_action(0, &printer, &transfers));
    assert_eq!(info.kind, EventKind::Info);
    assert!(info.info_rescan_files);
    planner.action_done(ActionResult::Ok, 0);

    assert_eq!(
        planner.next_action(0, &printer, &transfers),
        Action::SendTelemetry
    );
    planner.action_done(ActionResult::Ok, 0);

    match planner.next_action(0, &printer, &transfers) {
        Action::Sleep(sleep) => {
            assert_eq!(sleep.duration, TELEMETRY_INTERVAL_LONG);
            assert!(!sleep.background);
            assert!(!sleep.download);
        }
        other => panic!("expected idle sleep, got {:?}", other),
    }
}

// ── Scenario: telemetry → command → background ────────────────

#[test]
fn gcode_command_accepted_and_advanced_during_sleeps() {
    let scratch = SharedBuffer::new();
    let mut printer = MockPrinter::new();
    let mut transfers = MockTransfers::new();
    let mut planner = Planner::new();
    let now = settle(&mut planner, &printer, &transfers);

    // The telemetry response carried a command.
    let mut borrow = scratch.borrow().unwrap();
    borrow[..6].copy_from_slice(b"G1 X10");
    planner.command(
        Command {
            id: 7,
            data: CommandData::Gcode(GcodeData {
                data: borrow,
                size: 6,
            }),
        },
        &mut printer,
        &mut transfers,
    );

    let accepted = expect_event(planner.next_action(now, &printer, &transfers));
    assert_eq!(accepted.kind, EventKind::Accepted);
    assert_eq!(accepted.command_id, Some(7));
    planner.action_done(ActionResult::Ok, now);

    // Telemetry is forced after the event, and the cadence is short while
    // the background command runs.
    assert_eq!(
        planner.next_action(now, &printer, &transfers),
        Action::SendTelemetry
    );
    planner.action_done(ActionResult::Ok, now);
    match planner.next_action(now, &printer, &transfers) {
        Action::Sleep(sleep) => {
            assert_eq!(sleep.duration, TELEMETRY_INTERVAL_SHORT);
            assert!(sleep.background);
        }
        other => panic!("expected short sleep, got {:?}", other),
    }

    // The transport advances the G-code during the sleep.
    let gcode = planner.background_gcode().expect("gcode available");
    assert_eq!(gcode.remaining(), b"G1 X10");
    gcode.advance(6);
    assert!(gcode.is_done());
    planner.background_done(BackgroundResult::Success);

    let finished = expect_event(planner.next_action(now + 1, &printer, &transfers));
    assert_eq!(finished.kind, EventKind::Finished);
    assert_eq!(finished.command_id, Some(7));
    planner.action_done(ActionResult::Ok, now + 1);

    // Slot free again: the scratch buffer can be re-borrowed.
    assert!(scratch.borrow().is_some());
}

#[test]
fn cooldown_sleep_with_pending_event_excludes_background() {
    let scratch = SharedBuffer::new();
    let mut printer = MockPrinter::new();
    let mut transfers = MockTransfers::new();
    let mut planner = Planner::new();
    let now = settle(&mut planner, &printer, &transfers);

    planner.command(
        Command {
            id: 8,
            data: CommandData::Gcode(GcodeData {
                data: scratch.borrow().unwrap(),
                size: 0,
            }),
        },
        &mut printer,
        &mut transfers,
    );

    // The Accepted event fails to go out; the retry cooldown must not hand
    // the background command to the transport while the event is pending.
    let accepted = expect_event(planner.next_action(now, &printer, &transfers));
    assert_eq!(accepted.kind, EventKind::Accepted);
    planner.action_done(ActionResult::Failed, now);
    match planner.next_action(now, &printer, &transfers) {
        Action::Sleep(sleep) => assert!(!sleep.background),
        other => panic!("expected cooldown, got {:?}", other),
    }
    assert!(planner.background_gcode().is_none());

    // Once the event flushes, the background command flows again.
    let retried = expect_event(planner.next_action(now, &printer, &transfers));
    assert_eq!(retried, accepted);
    planner.action_done(ActionResult::Ok, now);
    assert!(planner.background_gcode().is_some());
}

// ── Scenario: backoff ─────────────────────────────────────────

#[test]
fn three_failures_back_off_then_success_resets() {
    let printer = MockPrinter::new();
    let transfers = MockTransfers::new();
    let mut planner = Planner::new();
    let now = settle(&mut planner, &printer, &transfers);

    let mut expected = COOLDOWN_BASE;
    for _ in 0..3 {
        assert_eq!(
            planner.next_action(now + 5000, &printer, &transfers),
            Action::SendTelemetry
        );
        planner.action_done(ActionResult::Failed, now + 5000);
        match planner.next_action(now + 5000, &printer, &transfers) {
            Action::Sleep(sleep) => assert_eq!(sleep.duration, expected),
            other => panic!("expected cooldown, got {:?}", other),
        }
        expected *= 2;
    }

    assert_eq!(
        planner.next_action(now + 5000, &printer, &transfers),
        Action::SendTelemetry
    );
    planner.action_done(ActionResult::Ok, now + 5000);

    // Cooldown is gone; the next failure starts over at the base.
    planner.next_action(now + 9000, &printer, &transfers);
    planner.action_done(ActionResult::Failed, now + 9000);
    match planner.next_action(now + 9000, &printer, &transfers) {
        Action::Sleep(sleep) => assert_eq!(sleep.duration, COOLDOWN_BASE),
        other => panic!("expected cooldown, got {:?}", other),
    }
}

// ── Scenario: give-up ─────────────────────────────────────────

#[test]
fn file_info_dropped_after_five_failures() {
    let mut printer = MockPrinter::new();
    let mut transfers = MockTransfers::new();
    let mut planner = Planner::new();
    let now = settle(&mut planner, &printer, &transfers);

    planner.command(
        Command {
            id: 42,
            data: CommandData::SendFileInfo {
                path: heapless::String::try_from("/usb/x.gco").unwrap(),
            },
        },
        &mut printer,
        &mut transfers,
    );

    for attempt in 0..GIVE_UP_AFTER_ATTEMPTS {
        let action = planner.next_action(now, &printer, &transfers);
        let event = expect_event(action);
        assert_eq!(event.kind, EventKind::FileInfo, "attempt {}", attempt);
        assert_eq!(event.command_id, Some(42));
        planner.action_done(ActionResult::Failed, now);
        // Swallow the cooldown sleep between attempts.
        match planner.next_action(now, &printer, &transfers) {
            Action::Sleep(_) => {}
            other => panic!("expected cooldown, got {:?}", other),
        }
    }

    // Sixth look: the event is gone, the link keeps running.
    match planner.next_action(now, &printer, &transfers) {
        Action::Event(event) => panic!("event should be dropped, got {:?}", event),
        Action::SendTelemetry | Action::Sleep(_) => {}
    }
}

#[test]
fn info_survives_any_number_of_failures() {
    let printer = MockPrinter::new();
    let transfers = MockTransfers::new();
    let mut planner = Planner::new();

    for _ in 0..(3 * GIVE_UP_AFTER_ATTEMPTS) {
        let event = expect_event(planner.next_action(0, &printer, &transfers));
        assert_eq!(event.kind, EventKind::Info);
        planner.action_done(ActionResult::Failed, 0);
        match planner.next_action(0, &printer, &transfers) {
            Action::Sleep(_) => {}
            other => panic!("expected cooldown, got {:?}", other),
        }
    }

    let event = expect_event(planner.next_action(0, &printer, &transfers));
    assert_eq!(event.kind, EventKind::Info);
}

// ── Scenario: reconnect ───────────────────────────────────────

#[test]
fn long_outage_reintroduces_the_printer() {
    let printer = MockPrinter::new();
    let transfers = MockTransfers::new();
    let mut planner = Planner::new();
    let now = settle(&mut planner, &printer, &transfers);

    // Silence past the reconnect threshold, then one more failure.
    let late = now + 10_100;
    assert_eq!(
        planner.next_action(late, &printer, &transfers),
        Action::SendTelemetry
    );
    planner.action_done(ActionResult::Failed, late);

    match planner.next_action(late, &printer, &transfers) {
        Action::Sleep(_) => {}
        other => panic!("expected cooldown, got {:?}", other),
    }
    let info = expect_event(planner.next_action(late + 100, &printer, &transfers));
    assert_eq!(info.kind, EventKind::Info);

    // Contact restored: Info acknowledged, trackers clean, telemetry next.
    planner.action_done(ActionResult::Ok, late + 200);
    assert_eq!(
        planner.next_action(late + 200, &printer, &transfers),
        Action::SendTelemetry
    );
}

// ── Command plumbing against the printer port ─────────────────

#[test]
fn job_control_commands_reach_the_printer() {
    use printlink::connect::ports::JobControl;

    let mut printer = MockPrinter::new();
    let mut transfers = MockTransfers::new();
    let mut planner = Planner::new();
    let mut now = settle(&mut planner, &printer, &transfers);

    for (data, expected) in [
        (CommandData::PausePrint, JobControl::Pause),
        (CommandData::ResumePrint, JobControl::Resume),
        (CommandData::StopPrint, JobControl::Stop),
    ] {
        planner.command(Command { id: 1, data }, &mut printer, &mut transfers);
        let event = expect_event(planner.next_action(now, &printer, &transfers));
        assert_eq!(event.kind, EventKind::Finished);
        planner.action_done(ActionResult::Ok, now);
        assert_eq!(printer.job_calls.last(), Some(&expected));

        // Drain the forced telemetry so the next command is legal.
        now += 1;
        assert_eq!(
            planner.next_action(now, &printer, &transfers),
            Action::SendTelemetry
        );
        planner.action_done(ActionResult::Ok, now);
    }
}

#[test]
fn start_print_passes_validated_path_to_printer() {
    let mut printer = MockPrinter::new();
    printer.existing_files.push("/usb/model.gco".to_string());
    let mut transfers = MockTransfers::new();
    let mut planner = Planner::new();
    let now = settle(&mut planner, &printer, &transfers);

    planner.command(
        Command {
            id: 2,
            data: CommandData::StartPrint {
                path: heapless::String::try_from("/usb/model.gco").unwrap(),
            },
        },
        &mut printer,
        &mut transfers,
    );
    let event = expect_event(planner.next_action(now, &printer, &transfers));
    assert_eq!(event.kind, EventKind::Finished);
    assert_eq!(printer.started_prints, vec!["/usb/model.gco".to_string()]);
}
