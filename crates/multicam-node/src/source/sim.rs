use super::{Camera, CameraRuntime};
use crate::config::{frame_period, Setting, SettingValue, SimulatedConfig};
use crate::frame::{Frame, PixelBuffer};
use crate::messages::now_ns;
use std::time::{Duration, Instant};

const DEFAULT_EXPOSURE_US: f64 = 10_000.0;
const DEFAULT_GAIN_DB: f64 = 0.0;
const DEFAULT_FRAME_PERIOD: Duration = Duration::from_micros(33_333);

/// Software stand-in for the vendor runtime, producing synthetic frames.
pub struct SimulatedRuntime {
    config: SimulatedConfig,
    enumerated: bool,
    released: bool,
}

impl SimulatedRuntime {
    pub fn acquire(config: SimulatedConfig) -> Self {
        log::info!(
            "Simulated camera runtime acquired ({} cameras, {}x{}, {} raw channels, {} fps)",
            config.cameras,
            config.width,
            config.height,
            config.raw_channels,
            config.fps
        );
        Self {
            config,
            enumerated: false,
            released: false,
        }
    }
}

impl CameraRuntime for SimulatedRuntime {
    type Camera = SimulatedCamera;

    fn enumerate(&mut self) -> Vec<SimulatedCamera> {
        if self.released {
            return Vec::new();
        }
        if self.enumerated {
            log::warn!("Simulated runtime enumerated twice, devices are handed out once");
            return Vec::new();
        }
        self.enumerated = true;
        (0..self.config.cameras)
            .map(|index| SimulatedCamera::new(index, &self.config))
            .collect()
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            log::info!("Simulated camera runtime released");
        }
    }
}

/// A synthetic camera producing a moving gradient at a fixed rate.
pub struct SimulatedCamera {
    index: usize,
    width: u32,
    height: u32,
    raw_channels: u8,
    color: bool,
    period: Duration,
    fail_every: u32,
    exposure: f64,
    gain: f64,
    initialized: bool,
    released: bool,
    grabs: u64,
    epoch: Instant,
    next_frame: Instant,
}

impl SimulatedCamera {
    fn new(index: usize, config: &SimulatedConfig) -> Self {
        let now = Instant::now();
        Self {
            index,
            width: config.width,
            height: config.height,
            raw_channels: config.raw_channels,
            color: config.color,
            period: frame_period(config.fps).unwrap_or(DEFAULT_FRAME_PERIOD),
            fail_every: config.fail_every,
            exposure: DEFAULT_EXPOSURE_US,
            gain: DEFAULT_GAIN_DB,
            initialized: false,
            released: false,
            grabs: 0,
            epoch: now,
            next_frame: now,
        }
    }

    pub fn exposure(&self) -> f64 {
        self.exposure
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }

    pub fn raw_channels(&self) -> u8 {
        self.raw_channels
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Block until the next frame is due, like a triggered sensor would.
    fn wait_for_exposure(&mut self) {
        let now = Instant::now();
        if self.next_frame > now {
            std::thread::sleep(self.next_frame - now);
            self.next_frame += self.period;
        } else {
            // fell behind, don't try to catch up with a burst
            self.next_frame = now + self.period;
        }
    }

    fn render_raw(&self) -> PixelBuffer {
        let channels = self.raw_channels as usize;
        let (w, h) = (self.width as usize, self.height as usize);
        let shift = self.grabs as usize;
        let mut data = Vec::with_capacity(w * h * channels);
        for y in 0..h {
            for x in 0..w {
                let v = ((x + y + shift) & 0xff) as u8;
                for c in 0..channels {
                    data.push(v.wrapping_add((c * 85) as u8));
                }
            }
        }
        PixelBuffer::new(self.width, self.height, self.raw_channels, data)
    }

    fn to_color(raw: &PixelBuffer) -> PixelBuffer {
        if raw.channels == 3 {
            return raw.clone();
        }
        let data = raw.data.iter().flat_map(|&v| [v, v, v]).collect();
        PixelBuffer::new(raw.width, raw.height, 3, data)
    }
}

impl Camera for SimulatedCamera {
    fn label(&self) -> String {
        format!("simulated-{}", self.index)
    }

    fn default_initialize(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.exposure = DEFAULT_EXPOSURE_US;
        self.gain = DEFAULT_GAIN_DB;
        self.initialized = true;
        true
    }

    fn configure(&mut self, setting: &Setting) -> bool {
        if !self.initialized || self.released {
            return false;
        }
        match (setting.field.as_str(), &setting.value) {
            ("ExposureTime", value) => match value.as_f64() {
                Some(v) if v > 0.0 => {
                    self.exposure = v;
                    true
                }
                _ => false,
            },
            ("Gain", value) => match value.as_f64() {
                Some(v) if v >= 0.0 => {
                    self.gain = v;
                    true
                }
                _ => false,
            },
            ("ExposureAuto" | "GainAuto", SettingValue::Bool(_)) => true,
            ("ExposureAuto" | "GainAuto", SettingValue::Text(mode)) => {
                matches!(mode.as_str(), "Off" | "Once" | "Continuous")
            }
            ("AcquisitionFrameRate", value) => match value.as_f64().and_then(frame_period) {
                Some(period) => {
                    self.period = period;
                    true
                }
                None => false,
            },
            ("PixelFormat", SettingValue::Text(format)) => match format.as_str() {
                "Mono8" => {
                    self.raw_channels = 1;
                    true
                }
                "BGR8" => {
                    self.raw_channels = 3;
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    fn grab(&mut self) -> Option<Frame> {
        if !self.initialized || self.released {
            return None;
        }

        self.wait_for_exposure();
        self.grabs += 1;

        if self.fail_every > 0 && self.grabs % self.fail_every as u64 == 0 {
            return None;
        }

        let raw = self.render_raw();
        let color = self.color.then(|| Self::to_color(&raw));

        Some(Frame {
            raw_image: Some(raw),
            color_image: color,
            device_timestamp: self.epoch.elapsed().as_nanos() as u64,
            system_timestamp: now_ns(),
            exposure_time: self.exposure,
            gain: self.gain,
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            log::debug!("Released {}", self.label());
        }
    }
}
