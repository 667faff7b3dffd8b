//! Integration test: full-throttle start with a 3-gear mechanical box.
//!
//! Scenario: idle 300 RPM, max 1200 RPM, gears with max speeds 5/12/30 m/s,
//! throttle steps 0 → 100% at t = 0 while the train is held at a fixed low
//! speed. After 5 s the box must still be in gear 0 (speed below the
//! up-shift threshold) and the delivered tractive force must equal the
//! torque-table value at the instantaneous RPM scaled by gear 0's max
//! tractive force, capped by power over speed.

use ld_brakes::{BrakePipe, BrakePipeParams, CarBrakeParams, CarVacuumBrake};
use ld_sim::{Locomotive, TickInputs};
use ld_transmission::{DieselEngine, DieselEngineParams, GearBox, GearBoxOperation, GearBoxParams};

const GEAR0_MAX_FORCE_N: f64 = 100_000.0;

fn test_engine_params() -> DieselEngineParams {
    DieselEngineParams {
        idle_rpm: 300.0,
        max_rpm: 1200.0,
        starting_rpm: 200.0,
        max_rpm_change_rate: 100.0,
        max_power_w: 750_000.0,
        torque_curve: vec![300.0, 400.0, 700.0, 800.0, 1200.0, 1000.0],
        power_curve: None,
    }
}

fn test_gearbox_params() -> GearBoxParams {
    GearBoxParams {
        number_of_gears: 3,
        operation: GearBoxOperation::Automatic,
        max_speed_for_gears_mps: vec![5.0, 12.0, 30.0],
        min_speed_for_gears_mps: vec![5.0, 12.0, 30.0],
        free_wheel_for_gears: vec![false; 3],
        hydro_is_converter: vec![false; 3],
        max_tractive_force_for_gears_n: vec![GEAR0_MAX_FORCE_N, 60_000.0, 30_000.0],
        ..GearBoxParams::default()
    }
}

fn geared_locomotive() -> Locomotive {
    let mut engine = DieselEngine::new(&test_engine_params()).unwrap();
    engine.start();
    let gearbox = GearBox::new(&test_gearbox_params(), engine.max_rpm);
    let brake = CarVacuumBrake::new(CarBrakeParams {
        is_engine_or_tender: true,
        ..CarBrakeParams::default()
    })
    .unwrap();
    let pipe = BrakePipe::new(BrakePipeParams::default()).unwrap();
    Locomotive::new(engine, Some(gearbox), None, brake, Some(pipe))
}

fn init_logging() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn five_seconds_at_low_speed_stays_in_first_gear() {
    init_logging();
    let mut loco = geared_locomotive();
    let inputs = TickInputs {
        elapsed_s: 0.1,
        throttle_percent: 100.0,
        speed_mps: 2.0,
        wheel_speed_mps: 2.0,
        ..TickInputs::default()
    };

    for _ in 0..49 {
        loco.tick(&inputs).unwrap();
    }
    let outputs = loco.tick(&inputs).unwrap();

    // Up-shift threshold for gear 0 in simple mode:
    // max_rpm · up_proportion · ratio = 1200 · 0.85 · (5/1200) = 4.25 m/s,
    // so 2 m/s stays in gear 0.
    assert_eq!(outputs.gear_index, Some(0));

    // Delivered force equals the torque-table fraction of gear 0's max
    // tractive force at the instantaneous RPM.
    let rpm = outputs.engine_rpm;
    let torque_at = loco.engine.torque_at(rpm);
    let torque_max = loco.engine.torque_max();
    let expected = torque_at / torque_max * GEAR0_MAX_FORCE_N;
    let power_cap = loco.engine.output_power_w() / inputs.speed_mps;
    let expected = expected.min(power_cap);
    assert!(
        (outputs.tractive_force_n - expected).abs() < 1e-6,
        "force {} != expected {}",
        outputs.tractive_force_n,
        expected
    );
    assert!(outputs.tractive_force_n > 0.0);
    assert!(!outputs.overspeed_warning);
}

#[test]
fn gear_change_event_fires_on_commit() {
    let mut loco = geared_locomotive();
    let inputs = TickInputs {
        elapsed_s: 0.1,
        throttle_percent: 100.0,
        speed_mps: 2.0,
        wheel_speed_mps: 2.0,
        ..TickInputs::default()
    };
    let mut gear_events = 0;
    for _ in 0..20 {
        let outputs = loco.tick(&inputs).unwrap();
        gear_events += outputs
            .events
            .iter()
            .filter(|e| matches!(e, ld_sim::SimEvent::Gear(_)))
            .count();
    }
    // Exactly one commit: neutral → gear 0.
    assert_eq!(gear_events, 1);
}

#[test]
fn zero_throttle_delivers_no_force() {
    let mut loco = geared_locomotive();
    let inputs = TickInputs {
        elapsed_s: 0.1,
        throttle_percent: 0.0,
        speed_mps: 2.0,
        wheel_speed_mps: 2.0,
        ..TickInputs::default()
    };
    for _ in 0..20 {
        let outputs = loco.tick(&inputs).unwrap();
        assert_eq!(outputs.tractive_force_n, 0.0);
        assert_eq!(outputs.gear_index, None);
    }
}

#[test]
fn moving_start_seeds_gear_and_snapshot_round_trips() {
    let mut loco = geared_locomotive();
    loco.initialize_moving(8.0, 21.0);

    let snap = loco.snapshot();
    assert_eq!(snap.gearbox.as_ref().unwrap().current_gear_index, 1);

    let json = serde_json::to_string(&snap).unwrap();
    let restored_snap: ld_sim::LocomotiveSnapshot = serde_json::from_str(&json).unwrap();
    assert_eq!(restored_snap, snap);

    let mut other = geared_locomotive();
    other.restore(&restored_snap);
    assert_eq!(
        other.gearbox.as_ref().unwrap().current_gear_index(),
        Some(1)
    );
    assert_eq!(other.brake.cyl_pressure_psia, loco.brake.cyl_pressure_psia);
}

#[test]
fn invalid_tick_inputs_rejected() {
    let mut loco = geared_locomotive();
    let inputs = TickInputs {
        elapsed_s: 0.0,
        ..TickInputs::default()
    };
    assert!(loco.tick(&inputs).is_err());

    let inputs = TickInputs {
        speed_mps: -1.0,
        ..TickInputs::default()
    };
    assert!(loco.tick(&inputs).is_err());
}
