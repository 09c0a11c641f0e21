//! Wavefield
//!
//! Animated 3D wave surface with a drifting particle field and on-demand
//! video capture.

use std::sync::Arc;

use clap::Parser;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

use wavefield::anim::Scene;
use wavefield::capture::{FfmpegEncoder, Recorder};
use wavefield::config::{SimulationConfig, TriggerPolicy};
use wavefield::render::{HeadlessRenderPipeline, RenderPipeline};
use wavefield::runloop::{DrawError, DrawTarget, RenderLoop};

/// Animated wave surface and particle field renderer
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override wave amplitude
    #[arg(long)]
    amplitude: Option<f32>,

    /// Override wave frequency
    #[arg(long)]
    frequency: Option<f32>,

    /// Override particle count
    #[arg(long)]
    particles: Option<u32>,

    /// Render offscreen and record one clip, then exit
    #[arg(long)]
    headless: bool,

    /// Headless output width
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Headless output height
    #[arg(long, default_value_t = 720)]
    height: u32,
}

/// Application state
struct App {
    window: Option<Arc<Window>>,
    render_loop: Option<RenderLoop<RenderPipeline>>,
    config: SimulationConfig,
    mouse_pressed: bool,
    last_mouse_pos: Option<(f64, f64)>,
}

impl App {
    fn new(config: SimulationConfig) -> Self {
        Self {
            window: None,
            render_loop: None,
            config,
            mouse_pressed: false,
            last_mouse_pos: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = Window::default_attributes()
            .with_title("Wavefield")
            .with_inner_size(LogicalSize::new(1280, 720));

        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .expect("Failed to create window"),
        );
        self.window = Some(window.clone());

        let scene = Scene::new(&self.config);
        let pipeline = pollster::block_on(RenderPipeline::new(window, &self.config, &scene));
        let recorder = Recorder::new(
            &self.config.capture,
            Box::new(FfmpegEncoder::new(self.config.capture.container)),
        );

        match RenderLoop::new(&self.config, pipeline, recorder) {
            Ok(mut render_loop) => {
                render_loop.start();
                self.render_loop = Some(render_loop);
                log::info!("Window created, rendering started");
            }
            Err(e) => {
                log::error!("Invalid configuration: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(ref mut render_loop) = self.render_loop {
                    render_loop.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.mouse_pressed = state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if self.mouse_pressed {
                    if let Some((last_x, last_y)) = self.last_mouse_pos {
                        let delta_x = position.x - last_x;
                        let delta_y = position.y - last_y;
                        if let Some(ref mut render_loop) = self.render_loop {
                            render_loop
                                .target_mut()
                                .camera
                                .orbit(delta_x as f32, delta_y as f32);
                        }
                    }
                }
                self.last_mouse_pos = Some((position.x, position.y));
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 * 0.1,
                };
                if let Some(ref mut render_loop) = self.render_loop {
                    render_loop.target_mut().camera.zoom(scroll);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed {
                    use winit::keyboard::{Key, NamedKey};
                    match event.logical_key {
                        Key::Named(NamedKey::Escape) => {
                            event_loop.exit();
                        }
                        Key::Named(NamedKey::F12) => {
                            if let Some(ref mut render_loop) = self.render_loop {
                                render_loop.request_screenshot();
                            }
                        }
                        Key::Named(NamedKey::F11) => {
                            if let Some(ref mut render_loop) = self.render_loop {
                                render_loop.press_record();
                            }
                        }
                        _ => {}
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(ref mut render_loop) = self.render_loop {
                    match render_loop.tick() {
                        Ok(()) => {}
                        Err(DrawError::Surface(wgpu::SurfaceError::Lost))
                        | Err(DrawError::Surface(wgpu::SurfaceError::Outdated)) => {
                            let (w, h) = render_loop.target().viewport_size();
                            render_loop.resize(w, h);
                        }
                        Err(DrawError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                            log::error!("Out of memory!");
                            event_loop.exit();
                        }
                        Err(e) => log::warn!("Render error: {}", e),
                    }
                }

                if let Some(ref window) = self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Offscreen capture run: record exactly one clip via the auto-start
/// trigger, then exit.
fn run_headless(mut config: SimulationConfig, width: u32, height: u32) {
    if !matches!(config.capture.trigger, TriggerPolicy::AutoStart { .. }) {
        log::info!("Headless run: switching trigger to auto-start");
        config.capture.trigger = TriggerPolicy::AutoStart {
            delay: 0.0,
            duration: 5.0,
        };
    }

    let scene = Scene::new(&config);
    let pipeline = match pollster::block_on(HeadlessRenderPipeline::new(
        width, height, &config, &scene,
    )) {
        Some(p) => p,
        None => {
            log::error!("No GPU adapter available for headless rendering");
            std::process::exit(1);
        }
    };
    let recorder = Recorder::new(
        &config.capture,
        Box::new(FfmpegEncoder::new(config.capture.container)),
    );

    let mut render_loop = match RenderLoop::new(&config, pipeline, recorder) {
        Ok(rl) => rl,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    render_loop.start();

    let (delay, duration) = match config.capture.trigger {
        TriggerPolicy::AutoStart { delay, duration } => (delay, duration),
        _ => unreachable!(),
    };
    // Two extra ticks: one for the start command to land, one for the stop
    let total_ticks =
        ((f64::from(delay) + f64::from(duration)) * f64::from(config.capture.framerate)).ceil()
            as u64
            + 2;

    for _ in 0..total_ticks {
        if let Err(e) = render_loop.tick() {
            log::error!("Headless tick failed: {}", e);
            std::process::exit(1);
        }
    }
    log::info!("Headless capture finished after {} ticks", total_ticks);
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = if let Some(ref path) = args.config {
        match SimulationConfig::from_file(path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path);
                cfg
            }
            Err(e) => {
                // An explicitly requested config that fails to load is a
                // setup error, not a fallback case
                log::error!("Failed to load config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        SimulationConfig::default()
    };

    if let Some(amplitude) = args.amplitude {
        config.wave.amplitude = amplitude;
    }
    if let Some(frequency) = args.frequency {
        config.wave.frequency = frequency;
    }
    if let Some(particles) = args.particles {
        config.particles.count = particles;
    }

    if let Err(e) = config.validate() {
        log::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    log::info!(
        "Starting wavefield: amplitude {}, frequency {}, {} particles",
        config.wave.amplitude,
        config.wave.frequency,
        config.particles.count
    );

    if args.headless {
        run_headless(config, args.width, args.height);
        return;
    }

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app).expect("Event loop failed");
}
