/// A packed 8-bit image buffer as handed over by a camera backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    /// Interleaved channels per pixel (1 for mono, 3 for BGR)
    pub channels: u8,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, channels: u8, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    /// Row stride in bytes.
    #[inline]
    pub fn step(&self) -> u32 {
        self.width * self.channels as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Pixel layout advertised in published image messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageEncoding {
    Bgr8,
    Mono8,
}

impl ImageEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageEncoding::Bgr8 => "bgr8",
            ImageEncoding::Mono8 => "mono8",
        }
    }

    /// Encoding of a raw buffer, decided only by its channel count.
    pub fn for_raw(buffer: &PixelBuffer) -> Self {
        if buffer.channels == 3 {
            ImageEncoding::Bgr8
        } else {
            ImageEncoding::Mono8
        }
    }
}

/// One successful grab. Either image may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    pub raw_image: Option<PixelBuffer>,
    pub color_image: Option<PixelBuffer>,
    /// Device clock, nanoseconds
    pub device_timestamp: u64,
    /// Host clock, nanoseconds since epoch
    pub system_timestamp: u64,
    pub exposure_time: f64,
    pub gain: f64,
}

impl Frame {
    pub fn has_image(&self) -> bool {
        self.raw_image.as_ref().is_some_and(|b| !b.is_empty())
            || self.color_image.as_ref().is_some_and(|b| !b.is_empty())
    }
}
