use crate::channels::ChannelSet;
use crate::frame::{Frame, ImageEncoding, PixelBuffer};
use crate::health::CameraHealth;
use crate::messages::{now_ns, FrameMetadata, Header, Image, OutboundMessage, TimeReference};
use crate::shutdown::ShutdownListener;
use crate::source::Camera;
use crate::transport::ChannelPublisher;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source label of published time references.
pub const TIME_REFERENCE_SOURCE: &str = "hardware";

const STATS_INTERVAL: Duration = Duration::from_secs(5);

/// Delays between grab attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Sleep after a published cycle
    pub publish_delay: Duration,
    /// Sleep after a failed grab
    pub failure_backoff: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            publish_delay: Duration::from_millis(10),
            failure_backoff: Duration::from_millis(100),
        }
    }
}

/// Frame-skip throttle.
///
/// The counter starts at `skip` so the first grabbed frame goes out; after
/// that `skip` frames are dropped between two published ones.
#[derive(Debug, Clone)]
pub struct Throttle {
    skip: u32,
    counter: u32,
}

impl Throttle {
    pub fn new(skip: u32) -> Self {
        Self {
            skip,
            counter: skip,
        }
    }

    /// Count one grabbed frame and decide whether it is published.
    pub fn admit(&mut self) -> bool {
        self.counter = self.counter.saturating_add(1);
        if self.counter <= self.skip {
            return false;
        }
        self.counter = 0;
        true
    }
}

/// What a single iteration of the capture loop did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Frame grabbed and fanned out to the channel set
    Published,
    /// Frame grabbed and dropped by the throttle
    Throttled,
    /// Frame grabbed but carried neither image
    Empty,
    /// Grab returned nothing
    NoFrame,
}

/// Drives one camera: grab, throttle, publish, pace.
pub struct CaptureWorker<C, P> {
    camera: C,
    channels: ChannelSet<P>,
    throttle: Throttle,
    pacing: Pacing,
    health: Arc<CameraHealth>,
    sequence: u32,
    last_stats: Instant,
}

impl<C: Camera, P: ChannelPublisher> CaptureWorker<C, P> {
    pub fn new(
        camera: C,
        channels: ChannelSet<P>,
        skip: u32,
        pacing: Pacing,
        health: Arc<CameraHealth>,
    ) -> Self {
        Self {
            camera,
            channels,
            throttle: Throttle::new(skip),
            pacing,
            health,
            sequence: 0,
            last_stats: Instant::now(),
        }
    }

    pub fn health(&self) -> Arc<CameraHealth> {
        self.health.clone()
    }

    /// Run until shutdown, then hand the camera back for release.
    ///
    /// Shutdown is only checked between iterations, an in-flight grab and
    /// its publishes always complete. A panic inside the loop ends capture for
    /// this camera only; the camera is still returned so it gets released.
    pub fn run(mut self, shutdown: ShutdownListener) -> C {
        log::info!(
            "[{}] capture started on {}",
            self.channels.frame_id(),
            self.camera.label()
        );

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.capture(&shutdown)));
        if let Err(payload) = outcome {
            log::error!(
                "[{}] capture panicked: {}",
                self.channels.frame_id(),
                panic_message(payload.as_ref())
            );
        }

        let stats = self.health.snapshot();
        log::info!(
            "[{}] capture stopped: {} published, {} skipped, {} failed grabs",
            self.channels.frame_id(),
            stats.published,
            stats.skipped,
            stats.failed_grabs
        );
        self.camera
    }

    fn capture(&mut self, shutdown: &ShutdownListener) {
        while !shutdown.is_triggered() {
            match self.step() {
                StepOutcome::Published | StepOutcome::Empty => {
                    std::thread::sleep(self.pacing.publish_delay)
                }
                StepOutcome::NoFrame => std::thread::sleep(self.pacing.failure_backoff),
                StepOutcome::Throttled => {}
            }
            self.log_stats();
        }
    }

    /// One grab and, if admitted, the publish fan-out.
    pub fn step(&mut self) -> StepOutcome {
        let Some(frame) = self.camera.grab() else {
            self.health.record_failure();
            return StepOutcome::NoFrame;
        };

        if !self.throttle.admit() {
            self.health.record_skipped();
            return StepOutcome::Throttled;
        }

        if self.publish(&frame) {
            self.health.record_published();
            StepOutcome::Published
        } else {
            // a grab with no image still proves the device is alive
            self.health.record_skipped();
            StepOutcome::Empty
        }
    }

    /// Publish color, raw, metadata and time reference, in that order.
    /// Returns whether any image was present.
    fn publish(&mut self, frame: &Frame) -> bool {
        if !frame.has_image() {
            return false;
        }
        let color = frame.color_image.as_ref().filter(|b| !b.is_empty());
        let raw = frame.raw_image.as_ref().filter(|b| !b.is_empty());

        let header = Header {
            acq_time: frame.system_timestamp,
            pub_time: now_ns(),
            sequence: self.sequence,
            frame_id: self.channels.frame_id().to_string(),
            machine_id: self.channels.machine_id.clone(),
        };
        self.sequence = self.sequence.wrapping_add(1);

        if let Some(buffer) = color {
            let msg = image_message(header.clone(), buffer, ImageEncoding::Bgr8);
            send(&self.channels.color, &msg);
        }

        if let Some(buffer) = raw {
            let msg = image_message(header.clone(), buffer, ImageEncoding::for_raw(buffer));
            send(&self.channels.raw, &msg);
        }

        let metadata = OutboundMessage::Metadata(FrameMetadata {
            header: Some(header.clone()),
            exposure: frame.exposure_time,
            gain: frame.gain,
        });
        send(&self.channels.metadata, &metadata);

        let reference = OutboundMessage::TimeReference(TimeReference {
            header: Some(header),
            time_ref: frame.device_timestamp,
            source: TIME_REFERENCE_SOURCE.to_string(),
        });
        send(&self.channels.time_reference, &reference);

        true
    }

    fn log_stats(&mut self) {
        if self.last_stats.elapsed() < STATS_INTERVAL {
            return;
        }
        let stats = self.health.snapshot();
        log::info!(
            "[{}] {} published, {} skipped, {} failed grabs ({} consecutive)",
            self.channels.frame_id(),
            stats.published,
            stats.skipped,
            stats.failed_grabs,
            stats.consecutive_failures
        );
        self.last_stats = Instant::now();
    }
}

fn image_message(header: Header, buffer: &PixelBuffer, encoding: ImageEncoding) -> OutboundMessage {
    OutboundMessage::Image(Image {
        header: Some(header),
        width: buffer.width,
        height: buffer.height,
        encoding: encoding.as_str().to_string(),
        step: buffer.step(),
        data: buffer.data.clone(),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Fire-and-forget publish; a failing channel never stops the worker.
fn send<P: ChannelPublisher>(publisher: &P, message: &OutboundMessage) {
    if let Err(e) = publisher.publish(message) {
        log::warn!("{}", e);
    }
}
