//! Lifecycle of the whole camera set.
//!
//! Startup: enumerate, default-initialize (fatal on failure), configure
//! (non-fatal), declare channels, spawn one blocking worker per camera.
//!
//! Shutdown: once the signal fires every worker finishes its iteration and
//! returns its camera; only after all of them are joined are the cameras and
//! then the runtime released.

use crate::channels::{ChannelSet, ChannelTemplates};
use crate::config::{Config, HealthConfig, Setting};
use crate::error::{BridgeError, Result};
use crate::health::{spawn_health_reporter, CameraHealth};
use crate::shutdown::Shutdown;
use crate::source::{Camera, CameraRuntime};
use crate::transport::Transport;
use crate::worker::{CaptureWorker, Pacing};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Process-wide parameters shared by every capture worker.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    pub skip: u32,
    pub templates: ChannelTemplates,
    pub pacing: Pacing,
    pub camera_settings: Vec<Setting>,
    pub per_camera: BTreeMap<usize, Vec<Setting>>,
    pub health: HealthConfig,
    pub machine_id: String,
}

impl NodeSettings {
    pub fn from_config(config: &Config, machine_id: impl Into<String>) -> Self {
        Self {
            skip: config.skip,
            templates: config.templates(),
            pacing: config.pacing(),
            camera_settings: config.camera_settings.clone(),
            per_camera: config.per_camera.clone(),
            health: config.health.clone(),
            machine_id: machine_id.into(),
        }
    }

    /// Settings for camera `index`: the shared list first, then its own.
    pub fn settings_for(&self, index: usize) -> impl Iterator<Item = &Setting> {
        self.camera_settings
            .iter()
            .chain(self.per_camera.get(&index).into_iter().flatten())
    }
}

/// Final counters of one camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraSummary {
    pub index: usize,
    pub frame_id: String,
    pub published: u64,
    pub skipped: u64,
    pub failed_grabs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cameras: Vec<CameraSummary>,
}

pub struct Orchestrator<R, T> {
    runtime: R,
    transport: T,
    settings: NodeSettings,
}

impl<R: CameraRuntime, T: Transport> Orchestrator<R, T> {
    /// `runtime` must already be acquired; the orchestrator owns it from here
    /// on and releases it last.
    pub fn new(runtime: R, transport: T, settings: NodeSettings) -> Self {
        Self {
            runtime,
            transport,
            settings,
        }
    }

    /// Start every camera and block until `shutdown` fires and all workers
    /// have stopped.
    pub async fn run(mut self, shutdown: Shutdown) -> Result<RunSummary> {
        let cameras = self.bring_up()?;

        if cameras.is_empty() {
            log::warn!("No cameras found, nothing to capture");
            self.runtime.release();
            return Ok(RunSummary::default());
        }

        // Declare everything before the first worker starts so a transport
        // failure never leaves workers running.
        let mut channel_sets = Vec::with_capacity(cameras.len());
        for index in 0..cameras.len() {
            match ChannelSet::declare(
                &self.transport,
                &self.settings.templates,
                index,
                &self.settings.machine_id,
            ) {
                Ok(set) => channel_sets.push(set),
                Err(e) => {
                    self.teardown(cameras);
                    return Err(e.into());
                }
            }
        }

        let health: Vec<Arc<CameraHealth>> = channel_sets
            .iter()
            .map(|set| Arc::new(CameraHealth::new(set.names.camera_index, set.frame_id())))
            .collect();

        let health_task = if self.settings.health.enabled {
            match self.transport.declare(&self.settings.health.topic) {
                Ok(publisher) => Some(spawn_health_reporter(
                    publisher,
                    health.clone(),
                    self.settings.machine_id.clone(),
                    Duration::from_secs(self.settings.health.interval_secs),
                    Duration::from_secs(self.settings.health.stall_timeout_secs),
                    shutdown.listener(),
                )),
                Err(e) => {
                    self.teardown(cameras);
                    return Err(e.into());
                }
            }
        } else {
            None
        };

        let mut workers = Vec::with_capacity(cameras.len());
        for ((camera, channels), health) in cameras.into_iter().zip(channel_sets).zip(&health) {
            let index = channels.names.camera_index;
            let worker = CaptureWorker::new(
                camera,
                channels,
                self.settings.skip,
                self.settings.pacing,
                health.clone(),
            );
            let listener = shutdown.listener();
            workers.push((index, tokio::task::spawn_blocking(move || worker.run(listener))));
        }

        log::info!(
            "{} capture workers running (skip={}), waiting for shutdown",
            workers.len(),
            self.settings.skip
        );

        // Join in any order; a worker only returns after observing shutdown.
        let mut stopped = Vec::with_capacity(workers.len());
        for (index, handle) in workers {
            match handle.await {
                Ok(camera) => stopped.push(camera),
                Err(e) => log::error!("Capture worker for camera {} failed: {}", index, e),
            }
        }
        log::info!("All capture workers stopped");

        if let Some(task) = health_task {
            if let Err(e) = task.await {
                log::error!("Health reporter failed: {}", e);
            }
        }

        self.teardown(stopped);

        let summary = RunSummary {
            cameras: health
                .iter()
                .map(|h| {
                    let stats = h.snapshot();
                    CameraSummary {
                        index: h.camera_index(),
                        frame_id: h.frame_id().to_string(),
                        published: stats.published,
                        skipped: stats.skipped,
                        failed_grabs: stats.failed_grabs,
                    }
                })
                .collect(),
        };
        Ok(summary)
    }

    /// Enumerate, default-initialize and configure every camera.
    fn bring_up(&mut self) -> Result<Vec<R::Camera>> {
        let mut cameras = self.runtime.enumerate();
        log::info!("Found {} cameras", cameras.len());

        if let Some(index) = cameras.iter_mut().position(|c| !c.default_initialize()) {
            let label = cameras[index].label();
            log::error!("Failed to initialize camera {} ({})", index, label);
            self.teardown(cameras);
            return Err(BridgeError::CameraInit { index, label });
        }

        for (index, camera) in cameras.iter_mut().enumerate() {
            for setting in self.settings.settings_for(index) {
                if camera.configure(setting) {
                    log::debug!(
                        "Camera {}: {} = {}",
                        index,
                        setting.field,
                        setting.value
                    );
                } else {
                    log::error!(
                        "Failed to configure camera {} ({}): {} = {}",
                        index,
                        camera.label(),
                        setting.field,
                        setting.value
                    );
                }
            }
        }

        Ok(cameras)
    }

    /// Release cameras, then the runtime.
    fn teardown(&mut self, cameras: Vec<R::Camera>) {
        let count = cameras.len();
        for mut camera in cameras {
            camera.release();
        }
        self.runtime.release();
        log::info!("Released {} cameras and the camera runtime", count);
    }
}
