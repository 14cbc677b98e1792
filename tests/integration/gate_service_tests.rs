//! Integration tests for the GateService → scheduler / motion → actuator
//! pipeline.
//!
//! These run on the host (x86_64) and drive the control loop tick by tick
//! against recording servos, so every hardware call can be asserted on.

use super::mock_hw::{ActuatorCall, MemoryStore, MockServo, RecordingSink};

use coopgate::adapters::nvs::NvsAdapter;
use coopgate::app::commands::GateCommand;
use coopgate::app::events::AppEvent;
use coopgate::app::ports::{IndicatorState, StoragePort};
use coopgate::app::service::GateService;
use coopgate::config::ControllerConfig;
use coopgate::error::{ActuatorError, Error};
use coopgate::gate::GatePosition;
use coopgate::motion::MoveRequest;
use coopgate::persistence::{NvsGateStore, NAMESPACE, TABLE_KEY};

const STEP_MS: u64 = 10;

fn make_service(config: ControllerConfig) -> (GateService<MockServo>, RecordingSink) {
    (
        GateService::new(config, [MockServo::new(), MockServo::new()]),
        RecordingSink::new(),
    )
}

fn servo(svc: &GateService<MockServo>, id: u8) -> &MockServo {
    svc.registry().lookup(id).unwrap().actuator()
}

/// Tick `n` times at the step interval, starting after `*now`.
fn run(
    svc: &mut GateService<MockServo>,
    sink: &mut RecordingSink,
    now: &mut u64,
    n: usize,
    epoch: Option<u64>,
    link_up: bool,
) {
    for _ in 0..n {
        *now += STEP_MS;
        svc.tick(*now, epoch, link_up, sink);
    }
}

fn arrivals(sink: &RecordingSink, id: u8) -> usize {
    sink.count(|e| matches!(e, AppEvent::Arrived { gate, .. } if *gate == id))
}

fn power_downs(sink: &RecordingSink, id: u8) -> usize {
    sink.count(|e| matches!(e, AppEvent::PoweredDown { gate } if *gate == id))
}

// ── Full traversal ────────────────────────────────────────────

#[test]
fn open_from_closed_arrives_on_the_57th_tick() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut now = 0;

    svc.handle_command(GateCommand::Open { gate: 1 }, &mut sink).unwrap();
    assert_eq!(servo(&svc, 1).count(ActuatorCall::Enable), 1);

    run(&mut svc, &mut sink, &mut now, 56, None, true);
    assert_eq!(arrivals(&sink, 1), 0, "still travelling after 56 steps");
    assert_eq!(svc.gate_status(1).unwrap().position, 2);

    run(&mut svc, &mut sink, &mut now, 1, None, true);
    assert_eq!(arrivals(&sink, 1), 1);
    assert_eq!(servo(&svc, 1).drives(), 57);
    assert_eq!(servo(&svc, 1).last_drive(), Some(0));

    // Still powered inside the settle window.
    assert!(svc.gate_status(1).unwrap().powered);
    assert_eq!(svc.indicator_state(), IndicatorState::Moving);

    run(&mut svc, &mut sink, &mut now, 20, None, true);
    assert_eq!(power_downs(&sink, 1), 1);
    assert_eq!(servo(&svc, 1).count(ActuatorCall::Disable), 1);
    assert!(!svc.gate_status(1).unwrap().powered);
    assert_eq!(svc.indicator_state(), IndicatorState::Ready);

    // The other gate was never touched.
    assert!(servo(&svc, 2).calls.is_empty());
}

#[test]
fn close_after_open_returns_to_close_stop() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut now = 0;

    svc.handle_command(GateCommand::Open { gate: 2 }, &mut sink).unwrap();
    run(&mut svc, &mut sink, &mut now, 80, None, true);
    svc.handle_command(GateCommand::Close { gate: 2 }, &mut sink).unwrap();
    run(&mut svc, &mut sink, &mut now, 80, None, true);

    let status = svc.gate_status(2).unwrap();
    assert_eq!(status.position, 170);
    assert_eq!(status.state, 0);
    assert!(!status.powered);
    assert_eq!(servo(&svc, 2).count(ActuatorCall::Enable), 2);
    assert_eq!(servo(&svc, 2).count(ActuatorCall::Disable), 2);
}

#[test]
fn zero_settle_powers_down_in_the_arrival_tick() {
    let config = ControllerConfig {
        settle_ms: 0,
        ..ControllerConfig::default()
    };
    let (mut svc, mut sink) = make_service(config);
    let mut now = 0;

    svc.handle_command(GateCommand::Open { gate: 1 }, &mut sink).unwrap();
    run(&mut svc, &mut sink, &mut now, 57, None, true);

    assert_eq!(power_downs(&sink, 1), 1);
    assert!(!svc.gate_status(1).unwrap().powered);

    run(&mut svc, &mut sink, &mut now, 10, None, true);
    assert_eq!(power_downs(&sink, 1), 1, "power-down reported exactly once");
}

// ── Repeated and redirected commands ──────────────────────────

#[test]
fn repeated_open_while_moving_does_not_re_enable() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut now = 0;

    svc.handle_command(GateCommand::Open { gate: 1 }, &mut sink).unwrap();
    run(&mut svc, &mut sink, &mut now, 5, None, true);
    svc.handle_command(GateCommand::Open { gate: 1 }, &mut sink).unwrap();

    assert!(sink.events.contains(&AppEvent::MoveRequested {
        gate: 1,
        target: GatePosition::Open,
        request: MoveRequest::Refreshed,
    }));
    assert_eq!(servo(&svc, 1).count(ActuatorCall::Enable), 1);
}

#[test]
fn close_while_opening_reverses_without_power_cycle() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut now = 0;

    svc.handle_command(GateCommand::Open { gate: 1 }, &mut sink).unwrap();
    run(&mut svc, &mut sink, &mut now, 10, None, true);
    assert_eq!(svc.gate_status(1).unwrap().position, 140);

    svc.handle_command(GateCommand::Close { gate: 1 }, &mut sink).unwrap();
    assert!(sink.events.contains(&AppEvent::MoveRequested {
        gate: 1,
        target: GatePosition::Closed,
        request: MoveRequest::Redirected,
    }));

    run(&mut svc, &mut sink, &mut now, 40, None, true);
    assert_eq!(svc.gate_status(1).unwrap().position, 170);
    assert_eq!(servo(&svc, 1).count(ActuatorCall::Enable), 1);
    assert_eq!(servo(&svc, 1).count(ActuatorCall::Disable), 1);
}

// ── Scheduler ─────────────────────────────────────────────────

#[test]
fn cleared_schedule_never_fires() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut now = 0;

    svc.handle_command(GateCommand::SetSchedule { gate: 1, at: 1_000 }, &mut sink)
        .unwrap();
    svc.handle_command(GateCommand::ClearSchedule { gate: 1 }, &mut sink)
        .unwrap();
    run(&mut svc, &mut sink, &mut now, 50, Some(5_000), true);

    assert_eq!(svc.schedules_fired(), 0);
    assert!(servo(&svc, 1).calls.is_empty());
    let status = svc.gate_status(1).unwrap();
    assert_eq!(status.schedule, 0);
    assert!(!status.schedule_active);
}

#[test]
fn past_schedule_fires_exactly_once() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut now = 0;

    svc.handle_command(GateCommand::SetSchedule { gate: 2, at: 1_000 }, &mut sink)
        .unwrap();
    run(&mut svc, &mut sink, &mut now, 100, Some(9_999), true);

    assert_eq!(svc.schedules_fired(), 1);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::ScheduleFired { gate: 2, at: 1_000 })),
        1
    );
    let status = svc.gate_status(2).unwrap();
    assert_eq!(status.position, 0);
    assert!(!status.schedule_active);
    // The time stays visible after firing.
    assert_eq!(status.schedule, 1_000);

    // Closing again must not re-trigger the spent schedule.
    svc.handle_command(GateCommand::Close { gate: 2 }, &mut sink).unwrap();
    run(&mut svc, &mut sink, &mut now, 100, Some(10_500), true);
    assert_eq!(svc.schedules_fired(), 1);
    assert_eq!(svc.gate_status(2).unwrap().position, 170);
}

#[test]
fn future_schedule_waits_for_its_time() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut now = 0;

    svc.handle_command(GateCommand::SetSchedule { gate: 1, at: 2_000 }, &mut sink)
        .unwrap();
    run(&mut svc, &mut sink, &mut now, 10, Some(1_999), true);
    assert_eq!(svc.schedules_fired(), 0);

    run(&mut svc, &mut sink, &mut now, 1, Some(2_000), true);
    assert_eq!(svc.schedules_fired(), 1);
    assert_eq!(servo(&svc, 1).count(ActuatorCall::Enable), 1);
}

#[test]
fn schedule_is_ignored_until_clock_syncs() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut now = 0;

    svc.handle_command(GateCommand::SetSchedule { gate: 1, at: 1_000 }, &mut sink)
        .unwrap();
    run(&mut svc, &mut sink, &mut now, 20, None, true);
    assert_eq!(svc.schedules_fired(), 0);
    assert!(svc.gate_status(1).unwrap().schedule_active);
}

#[test]
fn zero_schedule_time_is_rejected() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    assert_eq!(
        svc.handle_command(GateCommand::SetSchedule { gate: 1, at: 0 }, &mut sink),
        Err(Error::MissingOrInvalidParameter("t"))
    );
    assert!(!svc.is_dirty());
    assert!(sink.events.is_empty());
}

// ── Invalid ids ───────────────────────────────────────────────

#[test]
fn invalid_gate_id_causes_no_mutation_or_hardware_call() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let before = svc.gate_statuses();

    for id in [0u8, 3, 7, 255] {
        for cmd in [
            GateCommand::Open { gate: id },
            GateCommand::Close { gate: id },
            GateCommand::SetSchedule { gate: id, at: 1_000 },
            GateCommand::ClearSchedule { gate: id },
        ] {
            assert_eq!(svc.handle_command(cmd, &mut sink), Err(Error::InvalidGateId(id)));
        }
        assert!(svc.gate_status(id).is_err());
    }

    assert_eq!(svc.gate_statuses(), before);
    assert!(servo(&svc, 1).calls.is_empty());
    assert!(servo(&svc, 2).calls.is_empty());
    assert!(sink.events.is_empty());
    assert!(!svc.is_dirty());
}

// ── Abort on disconnect ───────────────────────────────────────

#[test]
fn link_loss_snaps_to_target_when_enabled() {
    let config = ControllerConfig {
        abort_on_disconnect: true,
        ..ControllerConfig::default()
    };
    let (mut svc, mut sink) = make_service(config);
    let mut now = 0;

    svc.handle_command(GateCommand::Open { gate: 1 }, &mut sink).unwrap();
    run(&mut svc, &mut sink, &mut now, 3, None, true);
    run(&mut svc, &mut sink, &mut now, 1, None, false);

    assert!(sink.events.contains(&AppEvent::Arrived {
        gate: 1,
        aborted: true
    }));
    assert_eq!(servo(&svc, 1).drives(), 4);
    assert_eq!(servo(&svc, 1).last_drive(), Some(0));
}

#[test]
fn link_loss_is_ignored_by_default() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut now = 0;

    svc.handle_command(GateCommand::Open { gate: 1 }, &mut sink).unwrap();
    run(&mut svc, &mut sink, &mut now, 10, None, false);

    assert_eq!(arrivals(&sink, 1), 0);
    assert_eq!(svc.gate_status(1).unwrap().position, 140);
}

// ── Fault isolation ───────────────────────────────────────────

#[test]
fn one_gate_fault_does_not_block_the_other() {
    let faulty = MockServo {
        fail_drive: true,
        ..MockServo::default()
    };
    let mut svc = GateService::new(ControllerConfig::default(), [faulty, MockServo::new()]);
    let mut sink = RecordingSink::new();
    let mut now = 0;

    svc.handle_command(GateCommand::Open { gate: 1 }, &mut sink).unwrap();
    svc.handle_command(GateCommand::Open { gate: 2 }, &mut sink).unwrap();
    run(&mut svc, &mut sink, &mut now, 80, None, true);

    assert!(sink.events.contains(&AppEvent::GateFault {
        gate: 1,
        error: ActuatorError::PwmWriteFailed
    }));
    // Gate 1 stopped after its first failed step and was powered off.
    assert_eq!(servo(&svc, 1).drives(), 1);
    assert_eq!(servo(&svc, 1).count(ActuatorCall::Disable), 1);
    let g1 = svc.gate_status(1).unwrap();
    assert!(!g1.powered);
    assert_eq!(g1.position, 170);

    // Gate 2 completed normally.
    assert_eq!(svc.gate_status(2).unwrap().position, 0);
    assert_eq!(arrivals(&sink, 2), 1);
    assert_eq!(svc.indicator_state(), IndicatorState::Fault);

    // A later successful command clears the fault indication.
    svc.handle_command(GateCommand::ClearSchedule { gate: 2 }, &mut sink)
        .unwrap();
    assert_eq!(svc.indicator_state(), IndicatorState::Ready);
}

#[test]
fn enable_failure_is_reported_to_the_caller() {
    let faulty = MockServo {
        fail_enable: true,
        ..MockServo::default()
    };
    let mut svc = GateService::new(ControllerConfig::default(), [MockServo::new(), faulty]);
    let mut sink = RecordingSink::new();

    assert_eq!(
        svc.handle_command(GateCommand::Open { gate: 2 }, &mut sink),
        Err(Error::ActuatorFault {
            gate: 2,
            error: ActuatorError::PowerRailFailed
        })
    );
    let status = svc.gate_status(2).unwrap();
    assert!(!status.powered);
    assert_eq!(status.state, 0);
}

// ── Persistence ───────────────────────────────────────────────

#[test]
fn state_survives_a_reboot_through_nvs() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut store = NvsGateStore::new(NvsAdapter::new().unwrap(), svc.stops());
    let mut now = 0;

    assert!(!svc.restore_from(&store, &mut sink));

    svc.handle_command(GateCommand::Open { gate: 1 }, &mut sink).unwrap();
    svc.handle_command(GateCommand::SetSchedule { gate: 2, at: 1_900_000_000 }, &mut sink)
        .unwrap();
    run(&mut svc, &mut sink, &mut now, 80, None, true);
    assert!(svc.persist_if_dirty(&mut store, now, &mut sink));
    assert!(!svc.is_dirty());

    // "Reboot": fresh service and actuators, same flash.
    let (mut rebooted, mut sink2) = make_service(ControllerConfig::default());
    assert!(rebooted.restore_from(&store, &mut sink2));
    assert_eq!(sink2.events, vec![AppEvent::Started { restored: true }]);

    let g1 = rebooted.gate_status(1).unwrap();
    assert_eq!((g1.state, g1.position, g1.powered), (1, 0, false));
    let g2 = rebooted.gate_status(2).unwrap();
    assert_eq!(g2.schedule, 1_900_000_000);
    assert!(g2.schedule_active);
    assert_eq!(g2.position, 170);

    // Restoring never drives hardware.
    assert!(servo(&rebooted, 1).calls.is_empty());
}

#[test]
fn corrupted_table_falls_back_to_defaults() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut store = NvsGateStore::new(NvsAdapter::new().unwrap(), svc.stops());
    store
        .storage_mut()
        .write(NAMESPACE, TABLE_KEY, &[1, 0, 0, 0])
        .unwrap();

    assert!(!svc.restore_from(&store, &mut sink));
    assert_eq!(sink.events, vec![AppEvent::Started { restored: false }]);
    assert_eq!(svc.gate_status(1).unwrap().position, 170);
}

#[test]
fn failed_save_keeps_running_and_retries_later() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut store = MemoryStore {
        fail_saves: true,
        ..MemoryStore::default()
    };

    svc.handle_command(GateCommand::Open { gate: 1 }, &mut sink).unwrap();
    assert!(!svc.persist_if_dirty(&mut store, 1_000, &mut sink));
    assert!(svc.is_dirty());
    assert_eq!(sink.count(|e| matches!(e, AppEvent::SaveFailed(_))), 1);

    // Commands and motion keep working in memory.
    svc.handle_command(GateCommand::Close { gate: 2 }, &mut sink).unwrap();
    svc.tick(1_010, None, true, &mut sink);
    assert_eq!(svc.gate_status(1).unwrap().position, 167);

    store.fail_saves = false;
    assert!(!svc.persist_if_dirty(&mut store, 5_999, &mut sink), "retry is delayed");
    assert!(svc.persist_if_dirty(&mut store, 6_000, &mut sink));
    assert_eq!(store.saves, 1);
    assert!(!svc.is_dirty());
}

#[test]
fn bursts_of_changes_coalesce_into_one_write() {
    let (mut svc, mut sink) = make_service(ControllerConfig::default());
    let mut store = MemoryStore::default();

    svc.handle_command(GateCommand::Open { gate: 1 }, &mut sink).unwrap();
    svc.handle_command(GateCommand::SetSchedule { gate: 2, at: 42 }, &mut sink)
        .unwrap();
    svc.handle_command(GateCommand::ClearSchedule { gate: 2 }, &mut sink)
        .unwrap();

    assert!(svc.persist_if_dirty(&mut store, 10, &mut sink));
    assert!(!svc.persist_if_dirty(&mut store, 20, &mut sink));
    assert_eq!(store.saves, 1);
}
