use crate::config::ConfigError;
use crate::error::TransportError;
use crate::transport::Transport;

/// Placeholder replaced by the camera index in channel templates.
pub const INDEX_PLACEHOLDER: char = '%';

/// Frame identifier embedded in every header published for camera `index`.
pub fn frame_id_for(index: usize) -> String {
    format!("flir_blackfly_cam{}", index)
}

/// Substitute the camera index into a channel template.
pub fn resolve(template: &str, index: usize) -> String {
    template.replacen(INDEX_PLACEHOLDER, &index.to_string(), 1)
}

/// The four channel-name templates shared by all cameras.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelTemplates {
    pub raw: String,
    pub color: String,
    pub time_reference: String,
    pub metadata: String,
}

impl ChannelTemplates {
    /// Every template must carry exactly one index placeholder, otherwise
    /// cameras would collide on the same channel.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, template) in [
            ("topic_raw", &self.raw),
            ("topic_color", &self.color),
            ("topic_time", &self.time_reference),
            ("topic_metadata", &self.metadata),
        ] {
            let count = template.matches(INDEX_PLACEHOLDER).count();
            if count != 1 {
                return Err(ConfigError::ValidationError(format!(
                    "{} '{}' must contain exactly one '{}' placeholder, found {}",
                    name, template, INDEX_PLACEHOLDER, count
                )));
            }
        }
        Ok(())
    }
}

/// Resolved channel names and identity for one camera.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    pub camera_index: usize,
    pub frame_id: String,
    pub raw: String,
    pub color: String,
    pub time_reference: String,
    pub metadata: String,
}

impl ChannelNames {
    pub fn resolve(templates: &ChannelTemplates, index: usize) -> Self {
        Self {
            camera_index: index,
            frame_id: frame_id_for(index),
            raw: resolve(&templates.raw, index),
            color: resolve(&templates.color, index),
            time_reference: resolve(&templates.time_reference, index),
            metadata: resolve(&templates.metadata, index),
        }
    }
}

/// Declared output endpoints of one camera, owned by its capture worker.
pub struct ChannelSet<P> {
    pub names: ChannelNames,
    pub machine_id: String,
    pub raw: P,
    pub color: P,
    pub time_reference: P,
    pub metadata: P,
}

impl<P> ChannelSet<P> {
    /// Resolve the templates for camera `index` and declare its four channels.
    pub fn declare<T>(
        transport: &T,
        templates: &ChannelTemplates,
        index: usize,
        machine_id: &str,
    ) -> Result<Self, TransportError>
    where
        T: Transport<Publisher = P>,
    {
        let names = ChannelNames::resolve(templates, index);

        let raw = transport.declare(&names.raw)?;
        let color = transport.declare(&names.color)?;
        let time_reference = transport.declare(&names.time_reference)?;
        let metadata = transport.declare(&names.metadata)?;

        log::info!(
            "Camera {} ({}) publishing raw to '{}', color to '{}', time to '{}', metadata to '{}'",
            index,
            names.frame_id,
            names.raw,
            names.color,
            names.time_reference,
            names.metadata
        );

        Ok(Self {
            names,
            machine_id: machine_id.to_string(),
            raw,
            color,
            time_reference,
            metadata,
        })
    }

    pub fn frame_id(&self) -> &str {
        &self.names.frame_id
    }
}
