//! Protobuf messages published by the node.
//!
//! Field layout follows the bubbaloop camera schemas: every message carries a
//! `Header` at field 1 so recorders can pull acquisition time and `frame_id`
//! without knowing the concrete type.

use prost::Message;

/// Common header shared by all messages of one capture cycle.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Header {
    /// Host clock at acquisition (nanoseconds since epoch)
    #[prost(uint64, tag = "1")]
    pub acq_time: u64,
    /// Wall clock when the cycle was published (nanoseconds since epoch)
    #[prost(uint64, tag = "2")]
    pub pub_time: u64,
    /// Published cycle counter for this camera
    #[prost(uint32, tag = "3")]
    pub sequence: u32,
    #[prost(string, tag = "4")]
    pub frame_id: String,
    #[prost(string, tag = "5")]
    pub machine_id: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct Image {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    #[prost(uint32, tag = "2")]
    pub width: u32,
    #[prost(uint32, tag = "3")]
    pub height: u32,
    /// "bgr8" or "mono8"
    #[prost(string, tag = "4")]
    pub encoding: String,
    #[prost(uint32, tag = "5")]
    pub step: u32,
    #[prost(bytes = "vec", tag = "6")]
    pub data: Vec<u8>,
}

/// Device clock reading for a published cycle.
#[derive(Clone, PartialEq, prost::Message)]
pub struct TimeReference {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    /// Device clock (nanoseconds)
    #[prost(uint64, tag = "2")]
    pub time_ref: u64,
    #[prost(string, tag = "3")]
    pub source: String,
}

/// Exposure settings in effect when the frame was taken.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FrameMetadata {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    #[prost(double, tag = "2")]
    pub exposure: f64,
    #[prost(double, tag = "3")]
    pub gain: f64,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CameraHealthReport {
    #[prost(message, optional, tag = "1")]
    pub header: Option<Header>,
    #[prost(uint32, tag = "2")]
    pub camera_index: u32,
    /// "waiting", "ok" or "stalled"
    #[prost(string, tag = "3")]
    pub state: String,
    #[prost(uint64, tag = "4")]
    pub published: u64,
    #[prost(uint64, tag = "5")]
    pub skipped: u64,
    #[prost(uint64, tag = "6")]
    pub failed_grabs: u64,
    #[prost(uint64, tag = "7")]
    pub consecutive_failures: u64,
    #[prost(uint64, tag = "8")]
    pub last_success_ns: u64,
}

/// Anything a [`crate::transport::ChannelPublisher`] can put on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Image(Image),
    TimeReference(TimeReference),
    Metadata(FrameMetadata),
    Health(CameraHealthReport),
}

impl OutboundMessage {
    pub fn header(&self) -> Option<&Header> {
        match self {
            OutboundMessage::Image(m) => m.header.as_ref(),
            OutboundMessage::TimeReference(m) => m.header.as_ref(),
            OutboundMessage::Metadata(m) => m.header.as_ref(),
            OutboundMessage::Health(m) => m.header.as_ref(),
        }
    }

    /// Fully qualified type name, used in log lines.
    pub fn type_name(&self) -> &'static str {
        match self {
            OutboundMessage::Image(_) => "multicam.camera.v1.Image",
            OutboundMessage::TimeReference(_) => "multicam.camera.v1.TimeReference",
            OutboundMessage::Metadata(_) => "multicam.camera.v1.FrameMetadata",
            OutboundMessage::Health(_) => "multicam.camera.v1.CameraHealthReport",
        }
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        match self {
            OutboundMessage::Image(m) => m.encode_to_vec(),
            OutboundMessage::TimeReference(m) => m.encode_to_vec(),
            OutboundMessage::Metadata(m) => m.encode_to_vec(),
            OutboundMessage::Health(m) => m.encode_to_vec(),
        }
    }
}

/// Wall clock in nanoseconds since the Unix epoch.
pub fn now_ns() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
