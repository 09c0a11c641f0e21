//! Frame capture and video encoding
//!
//! Contains the capture pipeline:
//! - Recorder: Idle -> Recording -> Finalizing state machine
//! - Encoder: VideoEncoder collaborators (ffmpeg pipe, raw sequence)
//! - Trigger: timer/press policies that drive the recorder

pub mod encoder;
pub mod recorder;
pub mod trigger;

pub use encoder::{EncodingError, FfmpegEncoder, RawSequenceEncoder, VideoEncoder};
pub use recorder::{CaptureError, CaptureStateError, CaptureStatus, Recorder, RecordingArtifact};
pub use trigger::{CaptureCommand, TriggerSchedule};

/// One raster frame handed from the render loop to the capture pipeline.
///
/// Pixels are tightly packed RGBA8, row-major, `width * height * 4` bytes.
/// Frames carry no timestamp: the encoder assumes constant-framerate
/// playback, so wall-clock time between captures never affects output
/// timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl FrameImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(pixels.len(), (width * height * 4) as usize);
        Self {
            width,
            height,
            pixels,
        }
    }
}
