//! Capture pipeline state machine: Idle -> Recording -> Finalizing -> Idle.
//!
//! The recorder owns the frame buffer accumulated during a session; nothing
//! else reads or writes it. Exactly one session is ever active. Frames are
//! buffered raw during Recording and encoded in one pass at stop time, so
//! the render loop never waits on the encoder mid-session. The session
//! always returns to Idle after finalization, even when encoding fails, so
//! the next recording can be attempted.

use std::path::PathBuf;

use crate::capture::encoder::{EncodingError, VideoEncoder};
use crate::capture::trigger::CaptureCommand;
use crate::capture::FrameImage;
use crate::config::{CaptureParameters, StartPolicy};

/// Capture session status, owned and exposed by the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Idle,
    Recording,
    Finalizing,
}

impl std::fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CaptureStatus::Idle => "idle",
            CaptureStatus::Recording => "recording",
            CaptureStatus::Finalizing => "finalizing",
        };
        f.write_str(name)
    }
}

/// An operation was invoked in a status that does not permit it.
#[derive(Debug)]
pub struct CaptureStateError {
    pub operation: &'static str,
    pub status: CaptureStatus,
}

impl std::fmt::Display for CaptureStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Capture operation '{}' is invalid while {}",
            self.operation, self.status
        )
    }
}

impl std::error::Error for CaptureStateError {}

/// Errors reported to the capture pipeline's caller. These stay
/// caller-local: the render loop logs them and keeps running.
#[derive(Debug)]
pub enum CaptureError {
    State(CaptureStateError),
    Encoding(EncodingError),
}

impl std::fmt::Display for CaptureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureError::State(e) => e.fmt(f),
            CaptureError::Encoding(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::State(e) => Some(e),
            CaptureError::Encoding(e) => Some(e),
        }
    }
}

impl From<CaptureStateError> for CaptureError {
    fn from(e: CaptureStateError) -> Self {
        CaptureError::State(e)
    }
}

impl From<EncodingError> for CaptureError {
    fn from(e: EncodingError) -> Self {
        CaptureError::Encoding(e)
    }
}

/// One finalized recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingArtifact {
    pub path: PathBuf,
    pub frame_count: u32,
    pub framerate: u32,
}

impl RecordingArtifact {
    /// Playback duration implied by the constant-framerate container.
    pub fn duration_secs(&self) -> f64 {
        f64::from(self.frame_count) / f64::from(self.framerate)
    }
}

/// The capture pipeline. Trigger-agnostic: it only exposes start, capture,
/// stop, and the [`Recorder::handle`] command entry point that policies and
/// key bindings feed.
pub struct Recorder {
    status: CaptureStatus,
    framerate: u32,
    start_policy: StartPolicy,
    output_dir: PathBuf,
    encoder: Box<dyn VideoEncoder>,
    frames: Vec<FrameImage>,
    /// Fixed at the first captured frame; later frames must match
    session_dims: Option<(u32, u32)>,
    /// Capture-timebase start timestamp of the active session, seconds
    started_at: Option<f64>,
    session_index: u32,
}

impl Recorder {
    pub fn new(params: &CaptureParameters, encoder: Box<dyn VideoEncoder>) -> Self {
        Self {
            status: CaptureStatus::Idle,
            framerate: params.framerate,
            start_policy: params.start_policy,
            output_dir: PathBuf::from(&params.output_dir),
            encoder,
            frames: Vec::new(),
            session_dims: None,
            started_at: None,
            session_index: 0,
        }
    }

    pub fn status(&self) -> CaptureStatus {
        self.status
    }

    pub fn is_recording(&self) -> bool {
        self.status == CaptureStatus::Recording
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn framerate(&self) -> u32 {
        self.framerate
    }

    /// Capture-timebase timestamp of the active session's start, if any.
    pub fn started_at(&self) -> Option<f64> {
        self.started_at
    }

    /// Begin a session. Valid from Idle; while Recording the configured
    /// start policy decides: error, ignore, or act as a stop request.
    pub fn start(&mut self, now: f64) -> Result<Option<RecordingArtifact>, CaptureError> {
        match self.status {
            CaptureStatus::Idle => {
                self.frames.clear();
                self.session_dims = None;
                self.started_at = Some(now);
                self.status = CaptureStatus::Recording;
                log::info!("Recording started (t={:.2}s)", now);
                Ok(None)
            }
            CaptureStatus::Recording => match self.start_policy {
                StartPolicy::Error => Err(CaptureStateError {
                    operation: "start",
                    status: self.status,
                }
                .into()),
                StartPolicy::Ignore => Ok(None),
                StartPolicy::Toggle => self.stop().map(Some),
            },
            CaptureStatus::Finalizing => Err(CaptureStateError {
                operation: "start",
                status: self.status,
            }
            .into()),
        }
    }

    /// Append one rendered frame. Valid only while Recording; any other
    /// status is a state error and leaves the buffer untouched. A frame
    /// whose dimensions differ from the session's first frame is rejected
    /// (resize-during-capture policy: reject, do not pad or crop).
    pub fn capture_frame(&mut self, frame: FrameImage) -> Result<(), CaptureError> {
        if self.status != CaptureStatus::Recording {
            return Err(CaptureStateError {
                operation: "capture_frame",
                status: self.status,
            }
            .into());
        }

        let dims = (frame.width, frame.height);
        match self.session_dims {
            None => self.session_dims = Some(dims),
            Some(expected) if expected != dims => {
                return Err(EncodingError::DimensionMismatch {
                    expected,
                    actual: dims,
                }
                .into());
            }
            Some(_) => {}
        }

        self.frames.push(frame);
        Ok(())
    }

    /// End the session: encode every buffered frame at the session
    /// framerate and write one artifact file. The recorder transitions to
    /// Finalizing for the duration of the encode and returns to Idle no
    /// matter the outcome.
    pub fn stop(&mut self) -> Result<RecordingArtifact, CaptureError> {
        if self.status != CaptureStatus::Recording {
            return Err(CaptureStateError {
                operation: "stop",
                status: self.status,
            }
            .into());
        }

        self.status = CaptureStatus::Finalizing;
        let result = self.finalize();
        self.frames.clear();
        self.session_dims = None;
        self.started_at = None;
        self.status = CaptureStatus::Idle;
        result.map_err(CaptureError::from)
    }

    fn finalize(&mut self) -> Result<RecordingArtifact, EncodingError> {
        let (width, height) = match self.session_dims {
            Some(dims) if !self.frames.is_empty() => dims,
            _ => return Err(EncodingError::EmptyFrameBuffer),
        };

        self.encoder.begin(width, height, self.framerate)?;
        for frame in &self.frames {
            self.encoder.append(frame)?;
        }
        let bytes = self.encoder.finish()?;

        std::fs::create_dir_all(&self.output_dir)?;
        self.session_index += 1;
        let path = self.output_dir.join(format!(
            "recording_{:04}.{}",
            self.session_index,
            self.encoder.extension()
        ));
        std::fs::write(&path, &bytes)?;

        let artifact = RecordingArtifact {
            path,
            frame_count: self.frames.len() as u32,
            framerate: self.framerate,
        };
        log::info!(
            "Recording finished: {} frames, {:.2}s -> {}",
            artifact.frame_count,
            artifact.duration_secs(),
            artifact.path.display()
        );
        Ok(artifact)
    }

    /// Single message entry point for trigger policies and key bindings.
    pub fn handle(
        &mut self,
        command: CaptureCommand,
        now: f64,
    ) -> Result<Option<RecordingArtifact>, CaptureError> {
        match command {
            CaptureCommand::Start => self.start(now),
            CaptureCommand::Stop => self.stop().map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::encoder::RawSequenceEncoder;
    use crate::config::CaptureParameters;

    fn recorder_with(dir: &std::path::Path, start_policy: StartPolicy) -> Recorder {
        let params = CaptureParameters {
            output_dir: dir.to_string_lossy().into_owned(),
            start_policy,
            ..Default::default()
        };
        Recorder::new(&params, Box::new(RawSequenceEncoder::new()))
    }

    fn frame(fill: u8) -> FrameImage {
        FrameImage::new(4, 4, vec![fill; 64])
    }

    #[test]
    fn test_capture_outside_recording_is_error_and_leaves_buffer() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder_with(dir.path(), StartPolicy::Error);

        let err = rec.capture_frame(frame(0)).unwrap_err();
        assert!(matches!(err, CaptureError::State(_)));
        assert_eq!(rec.frame_count(), 0);
        assert_eq!(rec.status(), CaptureStatus::Idle);
    }

    #[test]
    fn test_stop_without_start_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder_with(dir.path(), StartPolicy::Error);
        assert!(matches!(rec.stop(), Err(CaptureError::State(_))));
    }

    #[test]
    fn test_full_session_produces_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder_with(dir.path(), StartPolicy::Error);

        rec.start(0.0).unwrap();
        for i in 0..10 {
            rec.capture_frame(frame(i)).unwrap();
        }
        let artifact = rec.stop().unwrap();

        assert_eq!(artifact.frame_count, 10);
        assert_eq!(artifact.framerate, 60);
        assert!(artifact.path.exists());
        assert_eq!(rec.status(), CaptureStatus::Idle);

        // Header carries the frame count
        let bytes = std::fs::read(&artifact.path).unwrap();
        assert_eq!(&bytes[12..16], &10u32.to_le_bytes());
    }

    #[test]
    fn test_double_start_policy_error_preserves_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder_with(dir.path(), StartPolicy::Error);

        rec.start(0.0).unwrap();
        rec.capture_frame(frame(1)).unwrap();
        rec.capture_frame(frame(2)).unwrap();

        let err = rec.start(1.0).unwrap_err();
        assert!(matches!(err, CaptureError::State(_)));
        assert_eq!(rec.frame_count(), 2, "first session untouched");
        assert_eq!(rec.status(), CaptureStatus::Recording);
    }

    #[test]
    fn test_double_start_policy_ignore() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder_with(dir.path(), StartPolicy::Ignore);

        rec.start(0.0).unwrap();
        rec.capture_frame(frame(1)).unwrap();
        assert!(rec.start(1.0).unwrap().is_none());
        assert_eq!(rec.frame_count(), 1);
        assert!(rec.is_recording());
    }

    #[test]
    fn test_double_start_policy_toggle_stops() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder_with(dir.path(), StartPolicy::Toggle);

        rec.start(0.0).unwrap();
        rec.capture_frame(frame(1)).unwrap();
        let artifact = rec.start(1.0).unwrap().expect("toggle yields an artifact");
        assert_eq!(artifact.frame_count, 1);
        assert_eq!(rec.status(), CaptureStatus::Idle);
    }

    #[test]
    fn test_stop_with_zero_frames_is_encoding_error_and_resets() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder_with(dir.path(), StartPolicy::Error);

        rec.start(0.0).unwrap();
        let err = rec.stop().unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Encoding(EncodingError::EmptyFrameBuffer)
        ));
        // Session still returned to Idle; a new recording works
        assert_eq!(rec.status(), CaptureStatus::Idle);
        rec.start(2.0).unwrap();
        rec.capture_frame(frame(3)).unwrap();
        assert!(rec.stop().is_ok());
    }

    #[test]
    fn test_resize_mid_session_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder_with(dir.path(), StartPolicy::Error);

        rec.start(0.0).unwrap();
        rec.capture_frame(frame(1)).unwrap();
        let odd = FrameImage::new(8, 4, vec![0; 128]);
        let err = rec.capture_frame(odd).unwrap_err();
        assert!(matches!(
            err,
            CaptureError::Encoding(EncodingError::DimensionMismatch { .. })
        ));
        // Session continues with matching frames
        rec.capture_frame(frame(2)).unwrap();
        assert_eq!(rec.frame_count(), 2);
    }

    #[test]
    fn test_sessions_number_artifacts_sequentially() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder_with(dir.path(), StartPolicy::Error);

        rec.start(0.0).unwrap();
        rec.capture_frame(frame(1)).unwrap();
        let first = rec.stop().unwrap();

        rec.start(1.0).unwrap();
        rec.capture_frame(frame(2)).unwrap();
        let second = rec.stop().unwrap();

        assert_ne!(first.path, second.path);
        assert!(second
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains("0002"));
    }

    #[test]
    fn test_handle_commands() {
        let dir = tempfile::tempdir().unwrap();
        let mut rec = recorder_with(dir.path(), StartPolicy::Error);

        assert!(rec.handle(CaptureCommand::Start, 0.0).unwrap().is_none());
        rec.capture_frame(frame(1)).unwrap();
        let artifact = rec.handle(CaptureCommand::Stop, 1.0).unwrap().unwrap();
        assert_eq!(artifact.frame_count, 1);
    }

    #[test]
    fn test_artifact_duration() {
        let artifact = RecordingArtifact {
            path: PathBuf::from("x.rgba"),
            frame_count: 300,
            framerate: 60,
        };
        assert!((artifact.duration_secs() - 5.0).abs() < 1e-12);
    }
}
