//! Threaded stress tests with randomly paced producer and consumer steps.
//!
//! Each side runs on its own OS thread and idles a random number of steps
//! between operations, so the relative rate drifts throughout the run.

#![cfg(not(feature = "loom"))]

use pixbridge_core::{bridge, BridgeSettings, CrossDomainQueue, FrameFormat, PixelEvent};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn idle<R: Rng>(rng: &mut R, max_steps: u32, mut tick: impl FnMut()) {
    for _ in 0..rng.gen_range(0..=max_steps) {
        tick();
    }
    if rng.gen_bool(0.05) {
        thread::yield_now();
    }
}

#[test]
fn dequeued_values_are_the_accepted_subsequence() {
    for (seed, capacity, stages) in [(1u64, 4usize, 2usize), (2, 16, 3), (3, 64, 1), (4, 2, 4)] {
        let (mut tx, mut rx) = CrossDomainQueue::<u32>::new(capacity, stages)
            .unwrap()
            .split();
        let done = Arc::new(AtomicBool::new(false));

        let producer_done = Arc::clone(&done);
        let producer = thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut accepted = Vec::new();
            for value in 0..20_000u32 {
                if tx.write(value) {
                    accepted.push(value);
                }
                idle(&mut rng, 3, || tx.tick());
            }
            producer_done.store(true, Ordering::Release);
            (accepted, tx.stats())
        });

        let mut rng = StdRng::seed_from_u64(seed ^ 0xFFFF);
        let mut received = Vec::new();
        let mut quiet_steps = 0;
        loop {
            match rx.read() {
                Some(v) => {
                    received.push(v);
                    quiet_steps = 0;
                }
                None if done.load(Ordering::Acquire) => {
                    quiet_steps += 1;
                    if quiet_steps > stages + 1 {
                        break;
                    }
                }
                None => {}
            }
            idle(&mut rng, 5, || rx.tick());
        }

        let (accepted, stats) = producer.join().unwrap();
        assert_eq!(received, accepted, "seed {seed}");
        assert_eq!(stats.accepted as usize, accepted.len());
        assert_eq!(stats.accepted + stats.dropped, 20_000);
        assert_eq!(rx.stats().delivered, stats.accepted);
    }
}

#[test]
fn occupancy_never_exceeds_capacity_under_contention() {
    let (mut tx, mut rx) = CrossDomainQueue::<u64>::new(8, 2).unwrap().split();
    let done = Arc::new(AtomicBool::new(false));

    let producer_done = Arc::clone(&done);
    let producer = thread::spawn(move || {
        let mut rng = StdRng::seed_from_u64(7);
        for value in 0..50_000u64 {
            tx.write(value);
            assert!(tx.occupancy() <= tx.capacity());
            idle(&mut rng, 2, || tx.tick());
        }
        producer_done.store(true, Ordering::Release);
    });

    let mut rng = StdRng::seed_from_u64(8);
    let mut last = None;
    while !done.load(Ordering::Acquire) {
        if let Some(v) = rx.read() {
            assert!(last.map_or(true, |prev| v > prev), "reordered at {v}");
            last = Some(v);
        }
        assert!(rx.occupancy() <= rx.capacity());
        idle(&mut rng, 2, || rx.tick());
    }

    producer.join().unwrap();
}

#[test]
fn consumer_never_sees_a_partially_written_first_frame() {
    const W: u32 = 16;
    const H: u32 = 12;
    let settings = BridgeSettings {
        queue_capacity: 16,
        format: FrameFormat {
            width: W,
            height: H,
            pixel_bits: 16,
            blank: 0,
        },
        ..Default::default()
    };
    let (mut capture, mut display) = bridge(&settings).unwrap();

    let producer = thread::spawn(move || {
        let (iw, ih) = capture.input_size();
        capture.clock(PixelEvent::default(), true);
        capture.clock(PixelEvent::default(), false);
        for y in 0..ih {
            for x in 0..iw {
                let event = PixelEvent {
                    x,
                    y,
                    value: 0x5A5A,
                    valid: true,
                };
                capture.clock(event, false);
            }
        }
        capture.clock(PixelEvent::default(), true);
        // Keep stepping without completing another frame.
        for _ in 0..10_000 {
            capture.clock(PixelEvent::default(), false);
        }
        capture.stats()
    });

    let mut rng = StdRng::seed_from_u64(11);
    while !display.step() {
        while display.dequeue().is_some() {}
        if rng.gen_bool(0.3) {
            thread::yield_now();
        }
    }

    assert!(display.frame_ready());
    assert_eq!(display.snapshot(), vec![0x5A5A; (W * H) as usize]);

    let stats = producer.join().unwrap();
    assert_eq!(stats.frames_completed, 1);
}
