//! Host component tests: lifecycle, port batches and published outputs.

use s626_common::hal::config::PollerConfig;
use s626_hal::drivers::simulation::{SimBoard, SimulationDriver};
use s626_hal::{LifecycleState, S626Component};
use std::sync::Arc;
use std::time::Duration;

fn running_component() -> (S626Component, Arc<SimBoard>) {
    let driver = SimulationDriver::new();
    let board = driver.board();
    let mut component = S626Component::new("s626", Box::new(driver), PollerConfig::default());
    component.configure().unwrap();
    component.prepare_driver("analogy0", 0, 0).unwrap();
    component
        .set_initial_dio(&[65535.0, 0.0, 255.0, 0.0, 0.0, 0.0])
        .unwrap();
    component.set_initial_adc(0b1001);
    component.set_initial_enc(0b10);
    component.prepare_all_enc().unwrap();
    component.set_active_publishing(7);
    component.start().unwrap();
    (component, board)
}

#[test]
fn batches_reach_the_board_and_outputs_follow() {
    let (mut component, board) = running_component();
    board.pin_adc(0, Some(0x0111));
    board.pin_adc(3, Some(0x0333));

    component.push_dio_batch(vec![0b101, 0xFFFF, 0x1234, 0xFFFF, 0x0F0F]);
    component.push_dac_batch(vec![0b0101, 100, 99_999]);
    component.update().unwrap();

    assert_eq!(board.dio_lines(0), Some(0x1234));
    assert_eq!(board.dio_lines(1), Some(0));
    // Bank 2 has no output lines configured.
    assert_eq!(board.dio_lines(2), Some(0));
    assert_eq!(board.dac_value(0), Some(100));
    assert_eq!(board.dac_value(2), Some(0x3FFF));

    let mut published = None;
    for _ in 0..200 {
        std::thread::sleep(Duration::from_millis(5));
        let outputs = component.update().unwrap().clone();
        if outputs.dio[0] == 0x1234 && outputs.adc.as_slice() == [0x0111, 0x0333] {
            published = Some(outputs);
            break;
        }
    }
    let outputs = published.expect("poller never published the written values");
    assert_eq!(outputs.adc.len(), 2);
    assert_eq!(outputs.enc.len(), 1);
    assert!(outputs.enc[0] >= 0);

    component.stop().unwrap();
    component.cleanup().unwrap();
    assert_eq!(component.state(), LifecycleState::Unconfigured);
    assert_eq!(board.resources().handles, 0);
}

#[test]
fn update_drains_at_most_fifteen_batches_per_port() {
    let (mut component, _board) = running_component();
    for _ in 0..20 {
        component.push_dio_batch(vec![0b1, 0x0001, 0x0001]);
        component.push_dac_batch(vec![0b1, 7]);
    }

    component.update().unwrap();
    assert_eq!(component.pending_batches(), (5, 5));
    component.update().unwrap();
    assert_eq!(component.pending_batches(), (0, 0));
    component.stop().unwrap();
}

#[test]
fn malformed_batch_is_recorded_and_skipped() {
    let (mut component, board) = running_component();
    component.push_dac_batch(vec![0b11, 5]);
    component.push_dac_batch(vec![0b1, 9]);

    component.update().unwrap();
    assert_eq!(component.last_error(), s626_hal::component::NON_DRIVER_ERROR);
    assert_eq!(component.last_error(), 0);
    assert_eq!(board.dac_value(0), Some(9));
    component.stop().unwrap();
}

#[test]
fn write_dac_clamps_out_of_range_values() {
    let (mut component, board) = running_component();
    component.write_dac(1, -40).unwrap();
    assert_eq!(board.dac_value(1), Some(0));
    component.write_dac(1, 0x4000).unwrap();
    assert_eq!(board.dac_value(1), Some(0x3FFF));
    assert!(component.write_dac(4, 0).is_err());
    component.stop().unwrap();
}

#[test]
fn driver_failure_sets_driver_code() {
    let (mut component, board) = running_component();
    board.set_fail_writes(true);
    assert!(component.write_dio(0, 0x1, 0x1).is_err());
    assert_eq!(
        component.last_error(),
        s626_hal::drivers::simulation::SIM_FAULT_CODE
    );
    component.stop().unwrap();
}

#[test]
fn initial_dio_needs_six_numbers() {
    let (mut component, _board) = running_component();
    assert!(component.set_initial_dio(&[1.0, 2.0]).is_err());
    assert!(component.read_dio(3).is_err());
    assert!(component.read_adc(16).is_err());
    assert!(component.read_enc(6).is_err());
    component.stop().unwrap();
}
