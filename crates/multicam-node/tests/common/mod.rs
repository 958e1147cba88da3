//! Scripted cameras for capture and orchestration tests

#![allow(dead_code)]

use multicam_node::channels::ChannelTemplates;
use multicam_node::config::{HealthConfig, Setting};
use multicam_node::frame::{Frame, PixelBuffer};
use multicam_node::orchestrator::NodeSettings;
use multicam_node::source::{Camera, CameraRuntime};
use multicam_node::worker::Pacing;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_SYSTEM_NS: u64 = 1_700_000_000_000_000_000;
pub const BASE_DEVICE_NS: u64 = 42_000;

/// Hardware interactions in the order they happened, across all cameras.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Initialized(usize),
    Configured(usize, String),
    Grab(usize),
    Released(usize),
    RuntimeReleased,
}

pub type EventLog = Arc<Mutex<Vec<Event>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<Event> {
    log.lock().unwrap().clone()
}

fn buffer(channels: u8) -> PixelBuffer {
    PixelBuffer::new(4, 2, channels, vec![7; 4 * 2 * channels as usize])
}

/// Mono raw image plus a color-converted one.
pub fn full_frame(n: u64) -> Frame {
    Frame {
        raw_image: Some(buffer(1)),
        color_image: Some(buffer(3)),
        device_timestamp: BASE_DEVICE_NS + n,
        system_timestamp: BASE_SYSTEM_NS + n,
        exposure_time: 5000.0,
        gain: 1.5,
    }
}

pub fn raw_only_frame(n: u64, channels: u8) -> Frame {
    Frame {
        raw_image: Some(buffer(channels)),
        color_image: None,
        ..full_frame(n)
    }
}

pub fn color_only_frame(n: u64) -> Frame {
    Frame {
        raw_image: None,
        color_image: Some(buffer(3)),
        ..full_frame(n)
    }
}

pub fn empty_frame(n: u64) -> Frame {
    Frame {
        raw_image: None,
        color_image: None,
        ..full_frame(n)
    }
}

/// Camera replaying a fixed list of grab results, then `fallback` forever.
pub struct ScriptedCamera {
    pub index: usize,
    script: VecDeque<Option<Frame>>,
    fallback: Option<Frame>,
    grab_delay: Duration,
    init_ok: bool,
    rejected: Vec<String>,
    /// Panic on this grab (1-based)
    panic_on_grab: Option<usize>,
    grabs: usize,
    released: bool,
    events: EventLog,
}

impl ScriptedCamera {
    pub fn new(index: usize, events: &EventLog) -> Self {
        Self {
            index,
            script: VecDeque::new(),
            fallback: None,
            grab_delay: Duration::ZERO,
            init_ok: true,
            rejected: Vec::new(),
            panic_on_grab: None,
            grabs: 0,
            released: false,
            events: events.clone(),
        }
    }

    pub fn with_script(mut self, script: Vec<Option<Frame>>) -> Self {
        self.script = script.into();
        self
    }

    /// Result returned once the script is exhausted.
    pub fn with_fallback(mut self, frame: Option<Frame>) -> Self {
        self.fallback = frame;
        self
    }

    pub fn with_grab_delay(mut self, delay: Duration) -> Self {
        self.grab_delay = delay;
        self
    }

    pub fn failing_init(mut self) -> Self {
        self.init_ok = false;
        self
    }

    pub fn rejecting(mut self, field: &str) -> Self {
        self.rejected.push(field.to_string());
        self
    }

    pub fn panicking_on_grab(mut self, grab: usize) -> Self {
        self.panic_on_grab = Some(grab);
        self
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Camera for ScriptedCamera {
    fn label(&self) -> String {
        format!("scripted-{}", self.index)
    }

    fn default_initialize(&mut self) -> bool {
        if self.init_ok {
            self.push(Event::Initialized(self.index));
        }
        self.init_ok
    }

    fn configure(&mut self, setting: &Setting) -> bool {
        if self.rejected.contains(&setting.field) {
            return false;
        }
        self.push(Event::Configured(self.index, setting.field.clone()));
        true
    }

    fn grab(&mut self) -> Option<Frame> {
        assert!(!self.released, "grab on released camera {}", self.index);
        self.push(Event::Grab(self.index));
        self.grabs += 1;
        if self.panic_on_grab == Some(self.grabs) {
            panic!("camera {} driver fault", self.index);
        }
        if !self.grab_delay.is_zero() {
            std::thread::sleep(self.grab_delay);
        }
        match self.script.pop_front() {
            Some(result) => result,
            None => self.fallback.clone(),
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.push(Event::Released(self.index));
        }
    }
}

pub struct ScriptedRuntime {
    cameras: Vec<ScriptedCamera>,
    released: bool,
    events: EventLog,
}

impl ScriptedRuntime {
    pub fn new(cameras: Vec<ScriptedCamera>, events: &EventLog) -> Self {
        Self {
            cameras,
            released: false,
            events: events.clone(),
        }
    }
}

impl CameraRuntime for ScriptedRuntime {
    type Camera = ScriptedCamera;

    fn enumerate(&mut self) -> Vec<ScriptedCamera> {
        std::mem::take(&mut self.cameras)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.events.lock().unwrap().push(Event::RuntimeReleased);
        }
    }
}

pub fn templates() -> ChannelTemplates {
    ChannelTemplates {
        raw: "/test/cam%/image_raw".to_string(),
        color: "/test/cam%/image_color".to_string(),
        time_reference: "/test/cam%/time_reference".to_string(),
        metadata: "/test/cam%/additional".to_string(),
    }
}

pub fn fast_pacing() -> Pacing {
    Pacing {
        publish_delay: Duration::from_millis(1),
        failure_backoff: Duration::from_millis(5),
    }
}

pub fn settings(skip: u32) -> NodeSettings {
    NodeSettings {
        skip,
        templates: templates(),
        pacing: fast_pacing(),
        camera_settings: Vec::new(),
        per_camera: BTreeMap::new(),
        health: HealthConfig {
            enabled: false,
            ..HealthConfig::default()
        },
        machine_id: "test_machine".to_string(),
    }
}
