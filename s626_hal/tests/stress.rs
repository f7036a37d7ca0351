//! Concurrency stress test: one polling thread plus several caller threads.
//!
//! Every value the board can report is known in advance, so any cached read
//! outside that set would be a torn or invented value.

use s626_common::hal::config::PollerConfig;
use s626_common::hal::types::ActivityMask;
use s626_common::prelude::{ADC_CHANNELS, DIO_BANKS};
use s626_hal::drivers::simulation::SimulationDriver;
use s626_hal::{Interface, PollingEngine};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

const RUN_TIME: Duration = Duration::from_millis(400);
const CALLERS: usize = 4;
const BANK_PATTERNS: [u16; 4] = [0x0000, 0xFFFF, 0x00FF, 0xA5A5];

fn pinned_sample(channel: usize) -> u16 {
    0x0100 * channel as u16 + 0x0042
}

#[test]
fn polling_and_callers_do_not_deadlock_or_tear() {
    let driver = SimulationDriver::new();
    let board = driver.board();
    for ch in 0..ADC_CHANNELS {
        // Status bits above the sample must never leak into the cache.
        board.pin_adc(ch, Some(0xC000 | pinned_sample(ch)));
    }

    let iface = Arc::new(Interface::with_driver(Box::new(driver)));
    iface.reset_driver("analogy0", 0, 0).unwrap();
    iface
        .set_initial_digital(&[0xFFFF, 0, 0xFFFF, 0, 0xFFFF, 0])
        .unwrap();
    iface.set_initial_adc(0xFFFF);
    iface.set_initial_enc(0x3F);
    iface.prepare_encoders().unwrap();
    iface.set_active_publishing(ActivityMask::all());

    let mut engine = PollingEngine::new(
        Arc::clone(iface.store()),
        PollerConfig {
            cycle_time_us: 200,
            ..PollerConfig::default()
        },
    );
    engine.start().unwrap();

    let reads = AtomicU64::new(0);
    let deadline = Instant::now() + RUN_TIME;

    std::thread::scope(|scope| {
        for caller in 0..CALLERS {
            let iface = Arc::clone(&iface);
            let reads = &reads;
            scope.spawn(move || {
                let mut i = caller;
                while Instant::now() < deadline {
                    let bank = i % DIO_BANKS;
                    let pattern = BANK_PATTERNS[i % BANK_PATTERNS.len()];
                    iface.set_digital(bank, 0xFFFF, pattern).unwrap();

                    let ch = i % ADC_CHANNELS;
                    let sample = iface.get_analog(ch).unwrap();
                    assert!(
                        sample == 0 || sample == pinned_sample(ch),
                        "ADC {ch} read {sample:#06x}, never written"
                    );

                    let lines = iface.get_digital(bank).unwrap();
                    assert!(
                        BANK_PATTERNS.contains(&lines),
                        "DIO bank {bank} read {lines:#06x}, never written"
                    );

                    if i % 50 == 0 {
                        let mask = if i % 100 == 0 {
                            ActivityMask::empty()
                        } else {
                            ActivityMask::all()
                        };
                        iface.set_active_publishing(mask);
                    }

                    reads.fetch_add(1, Ordering::Relaxed);
                    i += CALLERS;
                }
            });
        }

        let iface = Arc::clone(&iface);
        scope.spawn(move || {
            while Instant::now() < deadline {
                iface.reset_driver("analogy0", 0, 0).unwrap();
                std::thread::sleep(Duration::from_millis(20));
            }
        });
    });

    let stats = engine.stop();
    assert!(!engine.is_running());
    assert!(stats.cycles > 0);
    assert_eq!(stats.aborted, 0);
    assert!(reads.load(Ordering::Relaxed) > 0);

    iface.stop_driver().unwrap();
    assert_eq!(board.resources().handles, 0);
}
