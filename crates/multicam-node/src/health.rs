use crate::messages::{now_ns, CameraHealthReport, Header, OutboundMessage};
use crate::shutdown::ShutdownListener;
use crate::transport::ChannelPublisher;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Counters for one camera. Written by its capture worker only.
#[derive(Debug)]
pub struct CameraHealth {
    camera_index: usize,
    frame_id: String,
    published: AtomicU64,
    skipped: AtomicU64,
    failed_grabs: AtomicU64,
    consecutive_failures: AtomicU64,
    /// 0 until the first successful grab
    last_success_ns: AtomicU64,
}

/// Point-in-time copy of [`CameraHealth`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSnapshot {
    pub published: u64,
    pub skipped: u64,
    pub failed_grabs: u64,
    pub consecutive_failures: u64,
    pub last_success_ns: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthState {
    /// No frame grabbed yet
    Waiting,
    Ok,
    /// Last successful grab is older than the stall timeout
    Stalled,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Waiting => "waiting",
            HealthState::Ok => "ok",
            HealthState::Stalled => "stalled",
        }
    }
}

impl CameraHealth {
    pub fn new(camera_index: usize, frame_id: impl Into<String>) -> Self {
        Self {
            camera_index,
            frame_id: frame_id.into(),
            published: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed_grabs: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            last_success_ns: AtomicU64::new(0),
        }
    }

    pub fn camera_index(&self) -> usize {
        self.camera_index
    }

    pub fn frame_id(&self) -> &str {
        &self.frame_id
    }

    fn record_success(&self) {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.last_success_ns.store(now_ns(), Ordering::Relaxed);
    }

    pub fn record_published(&self) {
        self.record_success();
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.record_success();
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_grabs.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            published: self.published.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed_grabs: self.failed_grabs.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            last_success_ns: self.last_success_ns.load(Ordering::Relaxed),
        }
    }
}

impl HealthSnapshot {
    pub fn state(&self, now_ns: u64, stall_timeout: Duration) -> HealthState {
        if self.last_success_ns == 0 {
            return HealthState::Waiting;
        }
        let age = now_ns.saturating_sub(self.last_success_ns);
        if age > stall_timeout.as_nanos() as u64 {
            HealthState::Stalled
        } else {
            HealthState::Ok
        }
    }
}

fn build_report(
    health: &CameraHealth,
    snapshot: &HealthSnapshot,
    state: HealthState,
    machine_id: &str,
    sequence: u32,
    now: u64,
) -> CameraHealthReport {
    CameraHealthReport {
        header: Some(Header {
            acq_time: now,
            pub_time: now,
            sequence,
            frame_id: health.frame_id.clone(),
            machine_id: machine_id.to_string(),
        }),
        camera_index: health.camera_index as u32,
        state: state.as_str().to_string(),
        published: snapshot.published,
        skipped: snapshot.skipped,
        failed_grabs: snapshot.failed_grabs,
        consecutive_failures: snapshot.consecutive_failures,
        last_success_ns: snapshot.last_success_ns,
    }
}

/// Spawn a task that publishes one [`CameraHealthReport`] per camera every
/// `interval` and logs transitions into and out of [`HealthState::Stalled`].
///
/// Stops when the shutdown signal fires.
pub fn spawn_health_reporter<P: ChannelPublisher>(
    publisher: P,
    cameras: Vec<Arc<CameraHealth>>,
    machine_id: String,
    interval: Duration,
    stall_timeout: Duration,
    mut shutdown: ShutdownListener,
) -> tokio::task::JoinHandle<()> {
    log::info!(
        "Health reports for {} cameras on '{}' every {:?}",
        cameras.len(),
        publisher.channel(),
        interval
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut states = vec![HealthState::Waiting; cameras.len()];
        let mut sequence: u32 = 0;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => {
                    log::debug!("Health reporter stopping");
                    break;
                }
                _ = ticker.tick() => {
                    let now = now_ns();
                    for (health, previous) in cameras.iter().zip(states.iter_mut()) {
                        let snapshot = health.snapshot();
                        let state = snapshot.state(now, stall_timeout);

                        match (*previous, state) {
                            (HealthState::Stalled, HealthState::Stalled) => {}
                            (_, HealthState::Stalled) => log::warn!(
                                "[{}] stalled: no frame for more than {:?} ({} consecutive failed grabs)",
                                health.frame_id,
                                stall_timeout,
                                snapshot.consecutive_failures
                            ),
                            (HealthState::Stalled, HealthState::Ok) => {
                                log::info!("[{}] recovered", health.frame_id)
                            }
                            _ => {}
                        }
                        *previous = state;

                        let report = build_report(health, &snapshot, state, &machine_id, sequence, now);
                        if let Err(e) = publisher.publish(&OutboundMessage::Health(report)) {
                            log::warn!("Health report failed: {}", e);
                        }
                    }
                    sequence = sequence.wrapping_add(1);
                }
            }
        }
    })
}
