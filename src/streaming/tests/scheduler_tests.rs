//! Timing properties of the request-ahead loop.

use super::*;
use crate::playback::OutputSink;
use crate::time::DeviceTime;
use approx_eq::assert_approx_eq;

#[test]
fn test_consecutive_buffers_are_contiguous() {
    let mut harness = Harness::new(DacConfig::new(44100), ramp(441));
    harness.feed(SchedulerMessage::Start);
    for _ in 0..20 {
        assert!(harness.run_timer());
    }

    let scheduled = harness.sink.scheduled();
    assert!(scheduled.len() > 20);
    for pair in scheduled.windows(2) {
        assert_approx_eq!(pair[0].end().as_secs(), pair[1].start.as_secs(), 1e-9);
    }
}

#[test]
fn test_positions_do_not_drift() {
    // 1/3 of a millisecond per batch is not exactly representable; positions must still be
    // computed from the session start rather than accumulated.
    let mut harness = Harness::new(DacConfig::new(48000), ramp(16));
    harness.feed(SchedulerMessage::Start);
    for _ in 0..3000 {
        assert!(harness.run_timer());
    }

    let scheduled = harness.sink.scheduled();
    let last = scheduled.last().unwrap();
    let expected = DeviceTime::ZERO.offset_by_samples(16 * (scheduled.len() as u64 - 1), 48000);
    assert_eq!(last.start, expected);
}

#[test]
fn test_cursor_is_monotonic_and_counts_every_sample() {
    let mut sizes = [300usize, 7, 0, 1024, 1].into_iter().cycle();
    let producer = move |index: u64| vec![index as f32; sizes.next().unwrap_or(0)];

    let mut harness = Harness::new(DacConfig::new(8000), producer);
    harness.feed(SchedulerMessage::Start);

    let mut last_cursor = 0;
    for _ in 0..25 {
        assert!(harness.scheduler.sample_cursor() >= last_cursor);
        last_cursor = harness.scheduler.sample_cursor();
        harness.run_timer();
    }

    let total: u64 = harness
        .sink
        .scheduled()
        .iter()
        .map(|scheduled| scheduled.buffer.len() as u64)
        .sum();
    assert_eq!(harness.scheduler.sample_cursor(), total);
    assert_eq!(harness.scheduler.stats().samples_scheduled, total);
}

#[test]
fn test_request_index_matches_cursor_at_request_time() {
    let mut harness = Harness::new(DacConfig::new(1000), ramp(100));
    harness.feed(SchedulerMessage::Start);
    for _ in 0..4 {
        harness.run_timer();
    }
    assert_eq!(harness.requests, vec![0, 100, 200, 300, 400, 500]);
}

#[test]
fn test_one_request_awaited_per_session() {
    let mut scheduler = StreamScheduler::new(MemorySink::new(1000), DacConfig::new(1000)).unwrap();
    let count = |effects: &[Effect]| {
        effects
            .iter()
            .filter(|effect| matches!(effect, Effect::RequestSamples(_)))
            .count()
    };

    // Every session start asks for index 0, abandoning the previous session's request.
    assert_eq!(count(&scheduler.start().unwrap()), 1);
    assert_eq!(count(&scheduler.start().unwrap()), 1);
    assert_eq!(count(&scheduler.start().unwrap()), 1);
    assert_eq!(scheduler.outstanding_request(), Some(0));
    assert_eq!(scheduler.abandoned_replies(), 2);

    // Owed replies drain without scheduling or asking for more.
    assert_eq!(count(&scheduler.on_batch(vec![1.0; 10]).unwrap()), 0);
    assert_eq!(count(&scheduler.on_batch(vec![1.0; 10]).unwrap()), 0);
    assert_eq!(scheduler.sample_cursor(), 0);

    // Within the session, each reply releases exactly one request.
    assert_eq!(count(&scheduler.on_batch(vec![0.0; 10]).unwrap()), 1);
    assert_eq!(scheduler.outstanding_request(), Some(10));
    assert_eq!(scheduler.sample_cursor(), 10);
    assert_eq!(scheduler.stats().stale_replies, 2);
}

#[test]
fn test_rendered_output_is_gapless() {
    let source = GeneratorSource::sine(440.0, 8000).with_batch_size(160);
    let reference = source.clone();

    let mut harness = Harness::new(DacConfig::new(8000), source);
    harness.feed(SchedulerMessage::Start);
    for _ in 0..50 {
        harness.run_timer();
    }

    let rendered = harness.sink.rendered();
    assert!(rendered.len() >= 160 * 49);
    assert_eq!(rendered, reference.generate(0, rendered.len()));
}

#[test]
fn test_late_reply_scenario() {
    // Batch 2 is produced 5ms after its own start time has passed.
    let sink = MemorySink::new(48000);
    let mut scheduler = StreamScheduler::new(sink.clone(), DacConfig::new(48000)).unwrap();
    scheduler.start().unwrap();
    scheduler.on_batch(vec![0.0; 480]).unwrap();

    sink.advance_frames(720);
    let effects = scheduler.on_batch(vec![0.0; 480]).unwrap();

    assert!(matches!(
        effects[..],
        [Effect::RequestSamples(SampleRequest {
            sample_index: 960,
            ..
        })]
    ));
    let late = &sink.scheduled()[1];
    assert_approx_eq!(late.start.as_secs(), 0.01, 1e-9);
    assert_approx_eq!(scheduler.stats().max_lateness_ms, 5.0, 1e-9);

    // The third batch follows the second exactly, not the current time.
    scheduler.on_batch(vec![0.0; 480]).unwrap();
    assert_approx_eq!(sink.scheduled()[2].start.as_secs(), 0.02, 1e-9);
}

#[test]
fn test_restart_plays_new_session_from_index_zero() {
    let mut harness = Harness::new(DacConfig::new(1000), ramp(50));
    harness.feed(SchedulerMessage::Start);
    harness.run_timer();
    harness.run_timer();

    harness.feed(SchedulerMessage::Stop);
    assert!(harness.timer.is_none());
    let stopped_at = harness.sink.scheduled().len();

    harness.sink.advance_frames(500);
    let restart_time = harness.sink.now();
    harness.requests.clear();
    harness.feed(SchedulerMessage::Start);

    assert_eq!(harness.requests, vec![0, 50]);
    let scheduled = harness.sink.scheduled();
    assert_eq!(scheduled[stopped_at].start, restart_time);
    assert_eq!(scheduled[stopped_at].buffer.samples()[0], 0.0);
}

#[test]
fn test_stop_lets_scheduled_audio_finish() {
    let mut harness = Harness::new(DacConfig::new(1000), ramp(100));
    harness.feed(SchedulerMessage::Start);
    harness.feed(SchedulerMessage::Stop);

    harness.sink.advance_frames(300);
    let rendered = harness.sink.rendered();
    let expected: Vec<f32> = (0..200).map(|i| i as f32).collect();
    assert_eq!(&rendered[..200], &expected[..]);
    assert!(rendered[200..].iter().all(|&s| s == 0.0));
}
