//! Render loop: the single driver of animation and capture.
//!
//! One tick = one drawn frame. The loop owns the whole application state
//! (scene, clock, recorder, trigger schedule, draw target) — no ambient
//! globals. Each tick drains due trigger commands, advances the clock,
//! updates every mutable buffer, issues exactly one draw, and hands the
//! rendered frame to the recorder iff a session is recording. Capture
//! failures are logged and never stop the loop.
//!
//! The loop is cooperative and single-threaded: ticks are driven externally
//! (a winit redraw callback, or a test harness calling [`RenderLoop::tick`]
//! directly), and nothing overlaps — a stop command delivered by the
//! trigger schedule always lands between two ticks.

use crate::anim::{AnimationClock, Scene};
use crate::capture::{FrameImage, Recorder, TriggerSchedule};
use crate::config::{ConfigError, SimulationConfig};

/// Errors from the rendering collaborator.
#[derive(Debug)]
pub enum DrawError {
    /// The presentation surface failed (lost, outdated, out of memory)
    Surface(wgpu::SurfaceError),
    /// Frame pixel readback failed
    Readback(String),
}

impl std::fmt::Display for DrawError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrawError::Surface(e) => write!(f, "Surface error: {}", e),
            DrawError::Readback(msg) => write!(f, "Frame readback failed: {}", msg),
        }
    }
}

impl std::error::Error for DrawError {}

/// The rendering collaborator: turns the scene into a displayable frame.
///
/// `draw` uploads any dirty buffers, issues one draw call, and returns the
/// rendered pixels only when `capture` is requested — readback is the
/// expensive path and is skipped otherwise. Implemented by the windowed
/// pipeline, the headless pipeline, and test doubles.
pub trait DrawTarget {
    fn draw(&mut self, scene: &mut Scene, capture: bool)
        -> Result<Option<FrameImage>, DrawError>;

    /// Resize the output surface and camera aspect. Idempotent for a
    /// repeated identical size.
    fn set_viewport_size(&mut self, width: u32, height: u32);

    fn viewport_size(&self) -> (u32, u32);
}

/// Render loop states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// The application state machine driving animation and capture.
pub struct RenderLoop<T: DrawTarget> {
    state: LoopState,
    clock: AnimationClock,
    scene: Scene,
    target: T,
    recorder: Recorder,
    trigger: TriggerSchedule,
    ticks: u64,
    screenshot_requested: bool,
    screenshot_counter: u32,
}

impl<T: DrawTarget> RenderLoop<T> {
    /// Build the loop from a configuration. Validation failures are fatal
    /// here: an invalid config never produces a startable loop.
    pub fn new(config: &SimulationConfig, target: T, recorder: Recorder) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: LoopState::Stopped,
            clock: AnimationClock::new(config.clock),
            scene: Scene::new(config),
            target,
            recorder,
            trigger: TriggerSchedule::new(config.capture.trigger),
            ticks: 0,
            screenshot_requested: false,
            screenshot_counter: 0,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Transition Stopped -> Running. The caller schedules the first tick.
    pub fn start(&mut self) {
        if self.state == LoopState::Stopped {
            self.state = LoopState::Running;
            log::info!("Render loop running");
        }
    }

    pub fn stop(&mut self) {
        self.state = LoopState::Stopped;
    }

    /// Current position on the capture timebase, in seconds.
    fn capture_now(&self) -> f64 {
        self.ticks as f64 / f64::from(self.recorder.framerate())
    }

    /// The record trigger was pressed (button, key binding).
    pub fn press_record(&mut self) {
        let now = self.capture_now();
        if let Some(command) = self.trigger.press(now) {
            self.dispatch(command, now);
        }
    }

    /// Ask the next tick to export a PNG of its frame.
    pub fn request_screenshot(&mut self) {
        self.screenshot_requested = true;
    }

    fn dispatch(&mut self, command: crate::capture::CaptureCommand, now: f64) {
        match self.recorder.handle(command, now) {
            Ok(Some(artifact)) => {
                log::info!(
                    "Capture artifact ready: {} ({:.2}s)",
                    artifact.path.display(),
                    artifact.duration_secs()
                );
            }
            Ok(None) => {}
            // Caller-local: capture problems never reach the loop state
            Err(e) => log::warn!("Capture command failed: {}", e),
        }
    }

    /// One tick: trigger drain, clock advance, buffer update, draw, and —
    /// when recording — the unconditional capture handoff. No-op while
    /// Stopped.
    pub fn tick(&mut self) -> Result<(), DrawError> {
        if self.state != LoopState::Running {
            return Ok(());
        }

        // Deferred trigger commands land between ticks
        let now = self.capture_now();
        while let Some(command) = self.trigger.poll(now) {
            self.dispatch(command, now);
        }

        let t = self.clock.advance();
        self.scene.update(t);

        let capture = self.recorder.is_recording() || self.screenshot_requested;
        let frame = self.target.draw(&mut self.scene, capture)?;

        if let Some(frame) = frame {
            if self.screenshot_requested {
                self.screenshot_requested = false;
                self.export_screenshot(&frame);
            }
            if self.recorder.is_recording() {
                // Paired with the draw above for every tick of the session
                if let Err(e) = self.recorder.capture_frame(frame) {
                    log::warn!("Dropped capture frame: {}", e);
                }
            }
        }

        self.ticks += 1;
        Ok(())
    }

    fn export_screenshot(&mut self, frame: &FrameImage) {
        let _ = std::fs::create_dir_all("screenshots");
        self.screenshot_counter += 1;
        let path = format!("screenshots/screenshot_{:04}.png", self.screenshot_counter);
        match crate::export::image_export::export_frame(
            &path,
            frame.width,
            frame.height,
            &frame.pixels,
        ) {
            Ok(()) => log::info!("Saved: {}", path),
            Err(e) => log::error!("Failed to export screenshot: {}", e),
        }
    }

    /// External resize: new output dimensions and camera aspect. Does not
    /// pause the loop or an active capture session; the recorder rejects
    /// mismatched frames on its own.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.target.set_viewport_size(width, height);
        }
    }
}
