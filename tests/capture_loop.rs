//! End-to-end capture tests driven without a GPU.
//!
//! A stub draw target fabricates frames on demand and the raw-sequence
//! encoder keeps everything deterministic: each test asserts facts about
//! the artifact bytes, not about pixels.

use wavefield::anim::Scene;
use wavefield::capture::{FrameImage, RawSequenceEncoder, Recorder};
use wavefield::config::{SimulationConfig, StartPolicy, TriggerPolicy};
use wavefield::runloop::{DrawError, DrawTarget, RenderLoop};

/// Draw target that renders nothing and fabricates solid frames.
struct StubTarget {
    width: u32,
    height: u32,
    captures: u32,
}

impl StubTarget {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            captures: 0,
        }
    }
}

impl DrawTarget for StubTarget {
    fn draw(&mut self, scene: &mut Scene, capture: bool) -> Result<Option<FrameImage>, DrawError> {
        scene.mark_uploaded();
        if capture {
            self.captures += 1;
            let len = (self.width * self.height * 4) as usize;
            Ok(Some(FrameImage::new(self.width, self.height, vec![0; len])))
        } else {
            Ok(None)
        }
    }

    fn set_viewport_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn viewport_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

fn capture_loop(
    config: &SimulationConfig,
    dir: &std::path::Path,
    width: u32,
    height: u32,
) -> RenderLoop<StubTarget> {
    let mut config = config.clone();
    config.capture.output_dir = dir.to_string_lossy().into_owned();
    let recorder = Recorder::new(&config.capture, Box::new(RawSequenceEncoder::new()));
    RenderLoop::new(&config, StubTarget::new(width, height), recorder).unwrap()
}

/// Parse the raw-sequence artifact header: (width, height, framerate,
/// frame count).
fn read_header(path: &std::path::Path) -> (u32, u32, u32, u32) {
    let bytes = std::fs::read(path).unwrap();
    let word = |i: usize| u32::from_le_bytes(bytes[i..i + 4].try_into().unwrap());
    (word(0), word(4), word(8), word(12))
}

fn artifacts(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    paths.sort();
    paths
}

#[test]
fn test_five_second_session_records_exact_frame_count() {
    // 5 seconds at 60 fps on the tick timebase -> exactly 300 frames
    let dir = tempfile::tempdir().unwrap();
    let mut config = SimulationConfig::default();
    config.capture.trigger = TriggerPolicy::PressWithTimeout { duration: 5.0 };
    let mut rl = capture_loop(&config, dir.path(), 32, 32);
    rl.start();

    rl.press_record();
    for _ in 0..320 {
        rl.tick().unwrap();
    }

    let paths = artifacts(dir.path());
    assert_eq!(paths.len(), 1);
    let (w, h, fps, frames) = read_header(&paths[0]);
    assert_eq!((w, h), (32, 32));
    assert_eq!(fps, 60);
    assert_eq!(frames, 300);
}

#[test]
fn test_every_recorded_tick_produces_one_frame() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = SimulationConfig::default();
    config.capture.trigger = TriggerPolicy::Toggle;
    let mut rl = capture_loop(&config, dir.path(), 16, 16);
    rl.start();

    for _ in 0..10 {
        rl.tick().unwrap(); // pre-roll, no capture
    }
    rl.press_record();
    for _ in 0..42 {
        rl.tick().unwrap();
    }
    rl.press_record();

    assert_eq!(rl.target().captures, 42);
    let paths = artifacts(dir.path());
    let (_, _, _, frames) = read_header(&paths[0]);
    assert_eq!(frames, 42);
}

#[test]
fn test_auto_start_trigger_needs_no_key_press() {
    // Start after 0.5s, record 1s: frames land in ticks 30..90
    let dir = tempfile::tempdir().unwrap();
    let mut config = SimulationConfig::default();
    config.capture.trigger = TriggerPolicy::AutoStart {
        delay: 0.5,
        duration: 1.0,
    };
    let mut rl = capture_loop(&config, dir.path(), 16, 16);
    rl.start();

    for _ in 0..120 {
        rl.tick().unwrap();
    }

    let paths = artifacts(dir.path());
    assert_eq!(paths.len(), 1);
    let (_, _, _, frames) = read_header(&paths[0]);
    assert_eq!(frames, 60);
}

#[test]
fn test_resize_mid_session_drops_mismatched_frames_only() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = SimulationConfig::default();
    config.capture.trigger = TriggerPolicy::Toggle;
    let mut rl = capture_loop(&config, dir.path(), 24, 24);
    rl.start();

    rl.press_record();
    for _ in 0..10 {
        rl.tick().unwrap();
    }
    // Viewport changes under an active session; the session keeps its
    // original dimensions and rejects the rest
    rl.resize(48, 48);
    for _ in 0..10 {
        rl.tick().unwrap();
    }
    rl.press_record();

    let paths = artifacts(dir.path());
    let (w, h, _, frames) = read_header(&paths[0]);
    assert_eq!((w, h), (24, 24));
    assert_eq!(frames, 10);
}

#[test]
fn test_start_while_recording_preserves_session() {
    // A second start under the default policy is an error, and the error
    // must leave the in-flight session untouched.
    let dir = tempfile::tempdir().unwrap();
    let mut config = SimulationConfig::default();
    config.capture.output_dir = dir.path().to_string_lossy().into_owned();
    config.capture.start_policy = StartPolicy::Error;
    let mut recorder = Recorder::new(&config.capture, Box::new(RawSequenceEncoder::new()));

    recorder.start(0.0).unwrap();
    let len = 16 * 16 * 4;
    for _ in 0..5 {
        recorder
            .capture_frame(FrameImage::new(16, 16, vec![0; len]))
            .unwrap();
    }
    assert!(recorder.start(0.1).is_err());
    assert_eq!(recorder.frame_count(), 5);

    let artifact = recorder.stop().unwrap();
    assert_eq!(artifact.frame_count, 5);
    let (_, _, _, frames) = read_header(&artifact.path);
    assert_eq!(frames, 5);
}

#[test]
fn test_sequential_sessions_get_distinct_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = SimulationConfig::default();
    config.capture.trigger = TriggerPolicy::Toggle;
    let mut rl = capture_loop(&config, dir.path(), 16, 16);
    rl.start();

    for session_frames in [3u32, 7u32] {
        rl.press_record();
        for _ in 0..session_frames {
            rl.tick().unwrap();
        }
        rl.press_record();
    }

    let paths = artifacts(dir.path());
    assert_eq!(paths.len(), 2);
    let (_, _, _, first) = read_header(&paths[0]);
    let (_, _, _, second) = read_header(&paths[1]);
    assert_eq!(first, 3);
    assert_eq!(second, 7);
}

#[test]
fn test_animation_state_unaffected_by_recording() {
    // Recording must not perturb the deterministic animation: the same
    // tick count yields the same clock time with and without capture.
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    let mut config = SimulationConfig::default();
    config.capture.trigger = TriggerPolicy::Toggle;

    let mut plain = capture_loop(&config, dir_a.path(), 16, 16);
    plain.start();
    for _ in 0..50 {
        plain.tick().unwrap();
    }

    let mut recorded = capture_loop(&config, dir_b.path(), 16, 16);
    recorded.start();
    recorded.press_record();
    for _ in 0..50 {
        recorded.tick().unwrap();
    }
    recorded.press_record();

    assert_eq!(
        plain.scene().time.to_bits(),
        recorded.scene().time.to_bits()
    );
    assert_eq!(
        plain.scene().particles.rotation().to_bits(),
        recorded.scene().particles.rotation().to_bits()
    );
}
