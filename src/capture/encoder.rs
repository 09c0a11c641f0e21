//! Video encoding collaborators.
//!
//! The capture pipeline's whole contract with an encoder is "append frame"
//! and "finalize -> bytes". [`FfmpegEncoder`] pipes raw RGBA frames into an
//! ffmpeg process at the session framerate; [`RawSequenceEncoder`] is an
//! ffmpeg-free fallback that concatenates raw frames behind a small header,
//! and is what the deterministic tests drive.

use std::io::Write;

use crate::capture::FrameImage;
use crate::config::VideoContainer;

/// Errors surfaced while encoding a capture session.
#[derive(Debug)]
pub enum EncodingError {
    /// `stop` was called on a session with zero captured frames
    EmptyFrameBuffer,
    /// A frame's dimensions differ from the session's first frame
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
    /// The encoder backend failed
    Backend(String),
    /// IO failure while writing or reading encoded data
    Io(std::io::Error),
}

impl std::fmt::Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EncodingError::EmptyFrameBuffer => {
                write!(f, "Cannot encode a session with zero frames")
            }
            EncodingError::DimensionMismatch { expected, actual } => {
                write!(
                    f,
                    "Frame dimensions {}x{} do not match session {}x{}",
                    actual.0, actual.1, expected.0, expected.1
                )
            }
            EncodingError::Backend(msg) => write!(f, "Encoder backend failed: {}", msg),
            EncodingError::Io(error) => write!(f, "Encoder IO error: {}", error),
        }
    }
}

impl std::error::Error for EncodingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EncodingError::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EncodingError {
    fn from(error: std::io::Error) -> Self {
        EncodingError::Io(error)
    }
}

/// A sequence-of-raster-frames to encoded-container collaborator.
///
/// Lifecycle: one `begin`, any number of `append`, one `finish`. The
/// recorder drives the whole cycle inside its finalization step.
pub trait VideoEncoder {
    /// Start an encoding run at fixed dimensions and framerate.
    fn begin(&mut self, width: u32, height: u32, framerate: u32) -> Result<(), EncodingError>;

    /// Append one RGBA frame.
    fn append(&mut self, frame: &FrameImage) -> Result<(), EncodingError>;

    /// Finalize and return the encoded container bytes.
    fn finish(&mut self) -> Result<Vec<u8>, EncodingError>;

    /// File extension of the produced container.
    fn extension(&self) -> &'static str;
}

/// Encodes via an external ffmpeg process: raw RGBA frames are piped to
/// stdin at the session framerate, ffmpeg writes the container to a
/// temporary file that `finish` reads back.
pub struct FfmpegEncoder {
    container: VideoContainer,
    child: Option<ffmpeg_sidecar::child::FfmpegChild>,
    stdin: Option<std::io::BufWriter<std::process::ChildStdin>>,
    output_path: Option<std::path::PathBuf>,
}

impl FfmpegEncoder {
    pub fn new(container: VideoContainer) -> Self {
        Self {
            container,
            child: None,
            stdin: None,
            output_path: None,
        }
    }

    fn codec(&self) -> &'static str {
        match self.container {
            VideoContainer::Webm => "libvpx-vp9",
            VideoContainer::Mp4 => "libx264",
        }
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn begin(&mut self, width: u32, height: u32, framerate: u32) -> Result<(), EncodingError> {
        use ffmpeg_sidecar::command::FfmpegCommand;

        let output_path = std::env::temp_dir().join(format!(
            "wavefield_encode_{}.{}",
            std::process::id(),
            self.container.extension()
        ));

        // rawvideo from stdin -> encoded container at constant framerate
        let mut cmd = FfmpegCommand::new();
        cmd.args(["-y"])
            .args(["-f", "rawvideo"])
            .args(["-pix_fmt", "rgba"])
            .args(["-s", &format!("{}x{}", width, height)])
            .args(["-r", &framerate.to_string()])
            .args(["-i", "pipe:0"])
            .args(["-c:v", self.codec()])
            .args(["-pix_fmt", "yuv420p"])
            .arg(output_path.to_string_lossy().as_ref());

        let mut child = cmd
            .spawn()
            .map_err(|e| EncodingError::Backend(format!("failed to spawn ffmpeg: {}", e)))?;
        let stdin = child
            .take_stdin()
            .ok_or_else(|| EncodingError::Backend("ffmpeg stdin unavailable".to_string()))?;

        self.stdin = Some(std::io::BufWriter::new(stdin));
        self.child = Some(child);
        self.output_path = Some(output_path);
        Ok(())
    }

    fn append(&mut self, frame: &FrameImage) -> Result<(), EncodingError> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EncodingError::Backend("append before begin".to_string()))?;
        stdin.write_all(&frame.pixels)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, EncodingError> {
        // Closing stdin signals end of stream
        drop(self.stdin.take());

        let mut child = self
            .child
            .take()
            .ok_or_else(|| EncodingError::Backend("finish before begin".to_string()))?;
        let status = child
            .wait()
            .map_err(|e| EncodingError::Backend(format!("ffmpeg wait failed: {}", e)))?;
        if !status.success() {
            return Err(EncodingError::Backend(format!(
                "ffmpeg exited with {}",
                status
            )));
        }

        let path = self
            .output_path
            .take()
            .ok_or_else(|| EncodingError::Backend("missing output path".to_string()))?;
        let bytes = std::fs::read(&path)?;
        let _ = std::fs::remove_file(&path);
        Ok(bytes)
    }

    fn extension(&self) -> &'static str {
        self.container.extension()
    }
}

/// Raw frame-sequence "container": a 16-byte header (width, height,
/// framerate, frame count as little-endian u32) followed by the
/// concatenated RGBA frames. No external process, fully deterministic.
pub struct RawSequenceEncoder {
    width: u32,
    height: u32,
    framerate: u32,
    frame_count: u32,
    data: Vec<u8>,
    active: bool,
}

impl RawSequenceEncoder {
    pub fn new() -> Self {
        Self {
            width: 0,
            height: 0,
            framerate: 0,
            frame_count: 0,
            data: Vec::new(),
            active: false,
        }
    }
}

impl Default for RawSequenceEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoEncoder for RawSequenceEncoder {
    fn begin(&mut self, width: u32, height: u32, framerate: u32) -> Result<(), EncodingError> {
        self.width = width;
        self.height = height;
        self.framerate = framerate;
        self.frame_count = 0;
        self.data.clear();
        self.active = true;
        Ok(())
    }

    fn append(&mut self, frame: &FrameImage) -> Result<(), EncodingError> {
        if !self.active {
            return Err(EncodingError::Backend("append before begin".to_string()));
        }
        if (frame.width, frame.height) != (self.width, self.height) {
            return Err(EncodingError::DimensionMismatch {
                expected: (self.width, self.height),
                actual: (frame.width, frame.height),
            });
        }
        self.data.extend_from_slice(&frame.pixels);
        self.frame_count += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<Vec<u8>, EncodingError> {
        if !self.active {
            return Err(EncodingError::Backend("finish before begin".to_string()));
        }
        self.active = false;

        let mut out = Vec::with_capacity(16 + self.data.len());
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        out.extend_from_slice(&self.framerate.to_le_bytes());
        out.extend_from_slice(&self.frame_count.to_le_bytes());
        out.append(&mut self.data);
        Ok(out)
    }

    fn extension(&self) -> &'static str {
        "rgba"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, fill: u8) -> FrameImage {
        FrameImage::new(width, height, vec![fill; (width * height * 4) as usize])
    }

    #[test]
    fn test_raw_sequence_header_and_payload() {
        let mut enc = RawSequenceEncoder::new();
        enc.begin(2, 2, 60).unwrap();
        enc.append(&frame(2, 2, 7)).unwrap();
        enc.append(&frame(2, 2, 9)).unwrap();
        let bytes = enc.finish().unwrap();

        assert_eq!(&bytes[0..4], &2u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &60u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &2u32.to_le_bytes());
        assert_eq!(bytes.len(), 16 + 2 * 16);
        assert_eq!(bytes[16], 7);
        assert_eq!(bytes[16 + 16], 9);
    }

    #[test]
    fn test_raw_sequence_rejects_dimension_change() {
        let mut enc = RawSequenceEncoder::new();
        enc.begin(4, 4, 60).unwrap();
        enc.append(&frame(4, 4, 0)).unwrap();
        let err = enc.append(&frame(8, 4, 0)).unwrap_err();
        assert!(matches!(err, EncodingError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_raw_sequence_append_before_begin() {
        let mut enc = RawSequenceEncoder::new();
        assert!(enc.append(&frame(2, 2, 0)).is_err());
    }

    #[test]
    fn test_raw_sequence_reusable_across_runs() {
        let mut enc = RawSequenceEncoder::new();
        enc.begin(2, 1, 30).unwrap();
        enc.append(&frame(2, 1, 1)).unwrap();
        enc.finish().unwrap();

        enc.begin(2, 1, 30).unwrap();
        enc.append(&frame(2, 1, 2)).unwrap();
        let bytes = enc.finish().unwrap();
        assert_eq!(&bytes[12..16], &1u32.to_le_bytes());
        assert_eq!(bytes[16], 2);
    }
}
