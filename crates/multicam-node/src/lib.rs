//! Multi-camera acquisition node.
//!
//! One capture worker per attached camera pulls frames, applies frame-skip
//! throttling and publishes on four channels per camera:
//! - color image (`bgr8`)
//! - raw image (`bgr8` or `mono8`, from the buffer's channel count)
//! - hardware time reference (device clock, source `"hardware"`)
//! - exposure / gain metadata
//!
//! All messages of one cycle share a header carrying the camera's `frame_id`
//! and the host acquisition timestamp.

pub mod channels;
pub mod config;
pub mod error;
pub mod frame;
pub mod health;
pub mod messages;
pub mod orchestrator;
pub mod shutdown;
pub mod source;
pub mod transport;
pub mod worker;
pub mod zenoh_session;

pub use channels::{frame_id_for, ChannelNames, ChannelSet, ChannelTemplates};
pub use config::{Config, ConfigError, Setting, SettingValue, SourceConfig};
pub use error::{BridgeError, TransportError};
pub use frame::{Frame, ImageEncoding, PixelBuffer};
pub use orchestrator::{NodeSettings, Orchestrator, RunSummary};
pub use shutdown::{Shutdown, ShutdownListener};
pub use source::{Camera, CameraRuntime};
pub use transport::{ChannelPublisher, LogTransport, MemoryTransport, Transport, ZenohTransport};
pub use worker::{CaptureWorker, Pacing, StepOutcome, Throttle};
