//! Poll cycle benchmarks.
//!
//! Measures one full cycle against the simulation driver, and the cost of
//! the cached reads the control API serves between cycles.

use criterion::{Criterion, criterion_group, criterion_main};
use s626_common::hal::types::ActivityMask;
use s626_hal::drivers::simulation::SimulationDriver;
use s626_hal::{Interface, poll_cycle};
use std::hint::black_box;

fn opened_interface(adc_select: u16, enc_select: u8) -> Interface {
    let iface = Interface::with_driver(Box::new(SimulationDriver::new()));
    iface.reset_driver("analogy0", 0, 0).expect("open sim board");
    iface.prepare_encoders().expect("prepare encoders");
    iface.set_initial_adc(adc_select);
    iface.set_initial_enc(enc_select);
    iface.set_active_publishing(ActivityMask::all());
    iface
}

fn bench_full_cycle(c: &mut Criterion) {
    let iface = opened_interface(0xFFFF, 0x3F);
    c.bench_function("poll_cycle_all_channels", |b| {
        b.iter(|| black_box(poll_cycle(iface.store())));
    });
}

fn bench_sparse_cycle(c: &mut Criterion) {
    let iface = opened_interface(0x0001, 0x01);
    c.bench_function("poll_cycle_sparse", |b| {
        b.iter(|| black_box(poll_cycle(iface.store())));
    });
}

fn bench_cached_read(c: &mut Criterion) {
    let iface = opened_interface(0xFFFF, 0x3F);
    poll_cycle(iface.store());
    c.bench_function("get_analog_cached", |b| {
        b.iter(|| black_box(iface.get_analog(black_box(7)).unwrap()));
    });
}

criterion_group!(benches, bench_full_cycle, bench_sparse_cycle, bench_cached_read);
criterion_main!(benches);
