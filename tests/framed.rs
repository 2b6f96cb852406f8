mod common;

use common::*;
use fresco::gpu::driver::*;
use fresco::gpu::{ContextInfo, FramedCommandBuffers};

#[test]
fn frames_cycle_and_wait_on_reuse() {
    let dev = MockDevice::default();
    let mut frames = FramedCommandBuffers::<MockApi>::new(&dev, 3).unwrap();
    assert_eq!(frames.frame_count(), 3);

    let mut seen = Vec::new();
    for cycle in 0..5usize {
        let idx = frames
            .record_enumerated(&dev, |cmd, idx| {
                assert!(cmd.is_recording());
                idx
            })
            .unwrap();
        assert_eq!(frames.current().state(), RecordState::Ended);
        seen.push(idx);
        frames.submit(&dev).unwrap();

        // Frames are only waited on when they come around again.
        let expected_waits = cycle.saturating_sub(2);
        assert_eq!(dev.waited.borrow().len(), expected_waits);
    }
    assert_eq!(seen, vec![0, 1, 2, 0, 1]);
    assert_eq!(frames.frame_id(), 2);
    assert_eq!(dev.submitted.borrow().len(), 5);

    frames.wait_all(&dev).unwrap();
    assert_eq!(dev.waited.borrow().len(), 5);
    // Nothing is left in flight.
    frames.wait_all(&dev).unwrap();
    assert_eq!(dev.waited.borrow().len(), 5);
}

#[test]
fn record_returns_the_closure_result() {
    let dev = MockDevice::default();
    let mut frames = FramedCommandBuffers::<MockApi>::new(&dev, 2).unwrap();
    let encoder = frames.record(&dev, |cmd| cmd.encoder()).unwrap();
    assert_eq!(encoder, EncoderKind::None);
    assert_eq!(frames.frame_id(), 0);
}

#[test]
fn record_all_fills_every_frame() {
    let dev = MockDevice::default();
    let mut frames = FramedCommandBuffers::<MockApi>::new(&dev, 3).unwrap();
    let mut visited = Vec::new();
    frames
        .record_all(&dev, |cmd, idx| {
            assert!(cmd.is_recording());
            visited.push(idx);
        })
        .unwrap();
    assert_eq!(visited, vec![0, 1, 2]);
    assert_eq!(frames.frame_id(), 0);

    for _ in 0..3 {
        frames.submit(&dev).unwrap();
    }
    assert_eq!(dev.submitted.borrow().len(), 3);
}

#[test]
fn zero_frames_means_one() {
    let dev = MockDevice::default();
    let mut frames = FramedCommandBuffers::<MockApi>::new(&dev, 0).unwrap();
    assert_eq!(frames.frame_count(), 1);
    frames.record(&dev, |_| ()).unwrap();
    frames.submit(&dev).unwrap();
    assert_eq!(frames.frame_id(), 0);
}

#[test]
fn submitting_an_unfinished_frame_fails() {
    let dev = MockDevice::default();
    let mut frames = FramedCommandBuffers::<MockApi>::new(&dev, 2).unwrap();
    assert!(frames.submit(&dev).is_err());
}

#[test]
fn ring_size_comes_from_context_info() {
    let dev = MockDevice::default();
    let info = ContextInfo {
        frames_in_flight: 4,
        ..Default::default()
    };
    let frames = FramedCommandBuffers::<MockApi>::from_info(&dev, &info).unwrap();
    assert_eq!(frames.frame_count(), 4);
}
