//! Capture worker behaviour against an in-memory transport

mod common;

use common::*;
use multicam_node::channels::ChannelSet;
use multicam_node::health::CameraHealth;
use multicam_node::messages::OutboundMessage;
use multicam_node::shutdown::Shutdown;
use multicam_node::transport::{MemoryPublisher, MemoryTransport};
use multicam_node::worker::{CaptureWorker, Pacing, StepOutcome};
use std::sync::Arc;
use std::time::{Duration, Instant};

const RAW: &str = "/test/cam0/image_raw";
const COLOR: &str = "/test/cam0/image_color";
const TIME: &str = "/test/cam0/time_reference";
const META: &str = "/test/cam0/additional";

type TestWorker = CaptureWorker<ScriptedCamera, MemoryPublisher>;

fn worker(camera: ScriptedCamera, skip: u32) -> (TestWorker, MemoryTransport) {
    paced_worker(camera, skip, fast_pacing())
}

fn paced_worker(
    camera: ScriptedCamera,
    skip: u32,
    pacing: Pacing,
) -> (TestWorker, MemoryTransport) {
    let transport = MemoryTransport::new();
    let index = camera.index;
    let channels = ChannelSet::declare(&transport, &templates(), index, "test_machine").unwrap();
    let health = Arc::new(CameraHealth::new(index, channels.frame_id()));
    let worker = CaptureWorker::new(camera, channels, skip, pacing, health);
    (worker, transport)
}

/// Run `worker` on its own thread, trigger shutdown after `warmup` and return
/// how long the worker took to hand its camera back.
fn time_to_stop(worker: TestWorker, warmup: Duration) -> (ScriptedCamera, Duration) {
    let shutdown = Shutdown::new();
    let listener = shutdown.listener();
    let handle = std::thread::spawn(move || worker.run(listener));
    std::thread::sleep(warmup);

    let started = Instant::now();
    shutdown.trigger();
    let camera = handle.join().unwrap();
    (camera, started.elapsed())
}

fn counts(transport: &MemoryTransport) -> [usize; 4] {
    [
        transport.count_on(COLOR),
        transport.count_on(RAW),
        transport.count_on(META),
        transport.count_on(TIME),
    ]
}

#[test]
fn test_channels_declared_from_templates() {
    let log = event_log();
    let (_worker, transport) = worker(ScriptedCamera::new(0, &log), 0);
    assert_eq!(transport.declared(), vec![RAW, COLOR, TIME, META]);
}

#[test]
fn test_skip_publishes_first_then_every_third() {
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log).with_fallback(Some(full_frame(0)));
    let (mut worker, transport) = worker(camera, 2);

    let outcomes: Vec<StepOutcome> = (0..9).map(|_| worker.step()).collect();
    use StepOutcome::*;
    assert_eq!(
        outcomes,
        vec![
            Published, Throttled, Throttled, Published, Throttled, Throttled, Published,
            Throttled, Throttled
        ]
    );
    assert_eq!(counts(&transport), [3, 3, 3, 3]);

    let stats = worker.health().snapshot();
    assert_eq!(stats.published, 3);
    assert_eq!(stats.skipped, 6);
}

#[test]
fn test_publish_rate_matches_skip_count() {
    for skip in [0u32, 1, 4] {
        let log = event_log();
        let camera = ScriptedCamera::new(0, &log).with_fallback(Some(full_frame(0)));
        let (mut worker, transport) = worker(camera, skip);

        let n = 60;
        for _ in 0..n {
            worker.step();
        }
        let expected = n / (skip as usize + 1);
        assert_eq!(transport.count_on(META), expected, "skip={}", skip);
        assert_eq!(transport.count_on(TIME), expected, "skip={}", skip);
    }
}

#[test]
fn test_raw_only_frame_skips_color_channel() {
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log).with_script(vec![Some(raw_only_frame(1, 1))]);
    let (mut worker, transport) = worker(camera, 0);

    assert_eq!(worker.step(), StepOutcome::Published);
    assert_eq!(counts(&transport), [0, 1, 1, 1]);
}

#[test]
fn test_color_only_frame_skips_raw_channel() {
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log).with_script(vec![Some(color_only_frame(1))]);
    let (mut worker, transport) = worker(camera, 0);

    assert_eq!(worker.step(), StepOutcome::Published);
    assert_eq!(counts(&transport), [1, 0, 1, 1]);
}

#[test]
fn test_failed_grab_publishes_nothing() {
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log).with_script(vec![None, None]);
    let (mut worker, transport) = worker(camera, 0);

    assert_eq!(worker.step(), StepOutcome::NoFrame);
    assert_eq!(worker.step(), StepOutcome::NoFrame);
    assert!(transport.published().is_empty());

    let stats = worker.health().snapshot();
    assert_eq!(stats.failed_grabs, 2);
    assert_eq!(stats.consecutive_failures, 2);
}

#[test]
fn test_frame_without_images_publishes_nothing() {
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log).with_script(vec![Some(empty_frame(1))]);
    let (mut worker, transport) = worker(camera, 0);

    assert_eq!(worker.step(), StepOutcome::Empty);
    assert!(transport.published().is_empty());
}

#[test]
fn test_failed_grabs_do_not_advance_throttle() {
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log).with_script(vec![
        Some(full_frame(1)),
        None,
        None,
        Some(full_frame(2)),
        Some(full_frame(3)),
    ]);
    let (mut worker, transport) = worker(camera, 1);

    let outcomes: Vec<StepOutcome> = (0..5).map(|_| worker.step()).collect();
    assert_eq!(
        outcomes,
        vec![
            StepOutcome::Published,
            StepOutcome::NoFrame,
            StepOutcome::NoFrame,
            StepOutcome::Throttled,
            StepOutcome::Published,
        ]
    );
    assert_eq!(transport.count_on(META), 2);
}

fn image_encoding(message: &OutboundMessage) -> String {
    match message {
        OutboundMessage::Image(image) => image.encoding.clone(),
        other => panic!("expected image, got {:?}", other),
    }
}

#[test]
fn test_raw_encoding_follows_channel_count() {
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log).with_script(vec![
        Some(raw_only_frame(1, 1)),
        Some(raw_only_frame(2, 3)),
        Some(full_frame(3)),
    ]);
    let (mut worker, transport) = worker(camera, 0);
    for _ in 0..3 {
        worker.step();
    }

    let raw: Vec<String> = transport.published_on(RAW).iter().map(image_encoding).collect();
    assert_eq!(raw, vec!["mono8", "bgr8", "mono8"]);

    let color: Vec<String> = transport.published_on(COLOR).iter().map(image_encoding).collect();
    assert_eq!(color, vec!["bgr8"]);

    match &transport.published_on(RAW)[1] {
        OutboundMessage::Image(image) => {
            assert_eq!(image.width, 4);
            assert_eq!(image.height, 2);
            assert_eq!(image.step, 12);
            assert_eq!(image.data.len(), 24);
        }
        other => panic!("expected image, got {:?}", other),
    }
}

#[test]
fn test_cycle_messages_share_identity_and_order() {
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log).with_script(vec![Some(full_frame(5))]);
    let (mut worker, transport) = worker(camera, 0);
    worker.step();

    let published = transport.published();
    let channels: Vec<&str> = published.iter().map(|p| p.channel.as_str()).collect();
    assert_eq!(channels, vec![COLOR, RAW, META, TIME]);

    for p in &published {
        let header = p.message.header().expect("header");
        assert_eq!(header.frame_id, "flir_blackfly_cam0");
        assert_eq!(header.acq_time, BASE_SYSTEM_NS + 5);
        assert_eq!(header.sequence, 0);
        assert_eq!(header.machine_id, "test_machine");
    }

    let metadata = match &published[2].message {
        OutboundMessage::Metadata(m) => m.clone(),
        other => panic!("expected metadata, got {:?}", other),
    };
    let reference = match &published[3].message {
        OutboundMessage::TimeReference(t) => t.clone(),
        other => panic!("expected time reference, got {:?}", other),
    };
    assert_eq!(metadata.exposure, 5000.0);
    assert_eq!(metadata.gain, 1.5);
    assert_eq!(reference.time_ref, BASE_DEVICE_NS + 5);
    assert_eq!(reference.source, "hardware");
    assert_eq!(metadata.header, reference.header);
}

#[test]
fn test_sequence_counts_published_cycles_only() {
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log).with_fallback(Some(full_frame(0)));
    let (mut worker, transport) = worker(camera, 1);
    for _ in 0..6 {
        worker.step();
    }

    let sequences: Vec<u32> = transport
        .published_on(TIME)
        .iter()
        .filter_map(|m| m.header().map(|h| h.sequence))
        .collect();
    assert_eq!(sequences, vec![0, 1, 2]);
}

#[test]
fn test_run_stops_on_shutdown_and_returns_camera() {
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log)
        .with_fallback(Some(full_frame(0)))
        .with_grab_delay(Duration::from_millis(1));
    let (worker, transport) = worker(camera, 0);
    let shutdown = Shutdown::new();

    let listener = shutdown.listener();
    let handle = std::thread::spawn(move || worker.run(listener));

    std::thread::sleep(Duration::from_millis(50));
    assert!(shutdown.trigger());
    assert!(!shutdown.trigger());

    let camera = handle.join().unwrap();
    assert_eq!(camera.index, 0);

    let published = transport.count_on(META);
    assert!(published > 0);
    // every cycle that started was completed
    assert_eq!(transport.count_on(TIME), published);
    assert_eq!(transport.count_on(RAW), published);

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(transport.count_on(META), published);
}

#[test]
fn test_run_returns_immediately_if_already_shut_down() {
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log).with_fallback(Some(full_frame(0)));
    let (worker, transport) = worker(camera, 0);
    let shutdown = Shutdown::new();
    shutdown.trigger();

    let _camera = worker.run(shutdown.listener());
    assert!(transport.published().is_empty());
    assert!(events(&log).is_empty());
}

#[test]
fn test_stops_within_one_grab_and_publish_delay() {
    let grab_delay = Duration::from_millis(20);
    let pacing = Pacing {
        publish_delay: Duration::from_millis(80),
        failure_backoff: Duration::from_secs(5),
    };
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log)
        .with_fallback(Some(full_frame(0)))
        .with_grab_delay(grab_delay);
    let (worker, transport) = paced_worker(camera, 0, pacing);

    let (_camera, elapsed) = time_to_stop(worker, Duration::from_millis(150));

    let bound = grab_delay + pacing.publish_delay + Duration::from_millis(100);
    assert!(transport.count_on(META) > 0);
    assert!(elapsed < bound, "stopped after {:?}, bound {:?}", elapsed, bound);
}

#[test]
fn test_stops_within_one_grab_and_failure_backoff() {
    let grab_delay = Duration::from_millis(20);
    let pacing = Pacing {
        publish_delay: Duration::from_secs(5),
        failure_backoff: Duration::from_millis(80),
    };
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log).with_grab_delay(grab_delay);
    let (worker, transport) = paced_worker(camera, 0, pacing);
    let health = worker.health();

    let (_camera, elapsed) = time_to_stop(worker, Duration::from_millis(150));

    let bound = grab_delay + pacing.failure_backoff + Duration::from_millis(100);
    assert!(health.snapshot().failed_grabs > 0);
    assert!(transport.published().is_empty());
    assert!(elapsed < bound, "stopped after {:?}, bound {:?}", elapsed, bound);
}

#[test]
fn test_panic_in_grab_returns_camera() {
    let log = event_log();
    let camera = ScriptedCamera::new(0, &log)
        .with_fallback(Some(full_frame(0)))
        .panicking_on_grab(2);
    let (worker, transport) = worker(camera, 0);
    let shutdown = Shutdown::new();
    let listener = shutdown.listener();

    // the loop ends on its own, before any shutdown request
    let camera = std::thread::spawn(move || worker.run(listener))
        .join()
        .unwrap();
    assert!(!shutdown.is_triggered());
    assert_eq!(camera.index, 0);
    assert_eq!(transport.count_on(META), 1);
    assert_eq!(events(&log), vec![Event::Grab(0), Event::Grab(0)]);
}
