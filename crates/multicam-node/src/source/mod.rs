//! Frame source contract.
//!
//! A [`CameraRuntime`] stands for the vendor SDK's process-wide instance: it is
//! acquired once, hands out one [`Camera`] per attached device and is released
//! only after every camera has been released.

mod sim;

pub use sim::{SimulatedCamera, SimulatedRuntime};

use crate::config::Setting;
use crate::frame::Frame;

/// One physical camera.
pub trait Camera: Send + 'static {
    /// Human readable identity for logs (model, serial, ...).
    fn label(&self) -> String;

    /// Bring the device into a known state. `false` is fatal for the node.
    fn default_initialize(&mut self) -> bool;

    /// Apply one setting. `false` means the setting was not applied.
    fn configure(&mut self, setting: &Setting) -> bool;

    /// Pull the next frame. `None` on timeout or a transient device error.
    fn grab(&mut self) -> Option<Frame>;

    /// Stop acquisition and free the device. Must be idempotent.
    fn release(&mut self);
}

/// Process-wide camera runtime.
pub trait CameraRuntime: Send + 'static {
    type Camera: Camera;

    /// Cameras currently attached, in discovery order. May be empty.
    fn enumerate(&mut self) -> Vec<Self::Camera>;

    /// Tear the runtime down. Must be idempotent.
    fn release(&mut self);
}
