//! Resonograph - real-time audio spectrum visualizer
//!
//! Music files or the microphone are analyzed on a background thread while
//! the window redraws the spectrum as a glowing shape at a fixed frame rate.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Window, WindowId},
};

use resonograph::audio::{Session, SessionQueue, SessionSettings, SessionSource};
use resonograph::cli::{scan_music_dir, Args};
use resonograph::config::{resolve_config, Config};
use resonograph::controls::{Control, FrameClock, VisualState};
use resonograph::params::{CompositorParams, ShapeParams};
use resonograph::rendering::{load_background, RenderSystem};
use resonograph::visual::{Compositor, Palette, RenderPoint, ShapeMapper};

/// Main application state
struct App {
    // Window and rendering
    window: Option<Arc<Window>>,
    render_system: Option<RenderSystem>,
    background: Option<image::RgbaImage>,
    title: String,

    // Audio sessions
    queue: SessionQueue,
    /// None while idle
    session: Option<Session>,
    settings: SessionSettings,

    // Visual pipeline
    visual: VisualState,
    mapper: ShapeMapper,
    compositor: Compositor,
    palette: Palette,
    clock: FrameClock,

    // Per-frame scratch
    spectrum: Vec<f32>,
    points: Vec<RenderPoint>,

    config: Config,
}

impl App {
    fn new(
        config: Config,
        visual: VisualState,
        queue: SessionQueue,
        settings: SessionSettings,
        background: Option<image::RgbaImage>,
    ) -> Self {
        let mapper = ShapeMapper::new(
            ShapeParams::default(),
            config.window.width,
            config.window.height,
        );

        Self {
            window: None,
            render_system: None,
            background,
            title: String::new(),
            queue,
            session: None,
            settings,
            visual,
            mapper,
            compositor: Compositor::new(CompositorParams::default()),
            palette: config.palette.clone(),
            clock: FrameClock::new(config.window.frame_interval(), Instant::now()),
            spectrum: Vec::new(),
            points: Vec::new(),
            config,
        }
    }

    /// Stop the current session and start the next queued source that opens
    ///
    /// An exhausted queue leaves the app idle with the window open.
    fn advance_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
        let settings = &self.settings;
        self.session = self.queue.start_next(|source| Session::start(source, settings));
        if self.session.is_none() {
            log::info!("Queue finished, idle (R: replay, Q: quit)");
        }
        self.refresh_title();
    }

    fn refresh_title(&mut self) {
        let label = self.session.as_ref().map_or("Idle", |s| s.label());
        let title = self.visual.describe(label);
        if title != self.title {
            if let Some(window) = &self.window {
                window.set_title(&title);
            }
            self.title = title;
        }
    }

    fn handle_control(&mut self, control: Control, event_loop: &ActiveEventLoop) {
        match control {
            Control::Quit => event_loop.exit(),
            Control::StopSession => {
                if self.session.is_some() {
                    self.advance_session();
                }
            }
            Control::Replay => {
                self.queue.replay();
                self.advance_session();
            }
            display => {
                if self.visual.apply(display) {
                    self.refresh_title();
                }
            }
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(render_system) = &mut self.render_system {
            render_system.resize(width, height);
        }
        self.mapper.resize(width, height);
    }

    /// Render a single frame
    fn render_frame(&mut self, event_loop: &ActiveEventLoop) {
        let Some(render_system) = self.render_system.as_mut() else {
            return;
        };

        let beat = match &self.session {
            Some(session) => {
                let buffer = session.buffer();
                buffer.decay_beat(self.compositor.params().beat_decay);
                buffer.read_into(&mut self.spectrum)
            }
            None => {
                self.spectrum.clear();
                0.0
            }
        };

        self.mapper.map(
            &self.spectrum,
            beat,
            self.visual.shape,
            self.visual.distribution(),
            &self.palette,
            &mut self.points,
        );
        let vertices =
            self.compositor
                .compose(&self.points, beat, self.visual.flash, render_system.size());

        match render_system.render(vertices) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                render_system.reconfigure();
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory, exiting");
                event_loop.exit();
            }
            Err(e) => log::warn!("Dropped frame: {:?}", e),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized
        }

        let window_attributes = Window::default_attributes()
            .with_title("Resonograph")
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let fade = self.compositor.fade_rgba();
        let render_system = match pollster::block_on(RenderSystem::new(
            Arc::clone(&window),
            fade,
            self.background.as_ref(),
        )) {
            Ok(render_system) => render_system,
            Err(e) => {
                log::error!("Failed to initialize rendering: {}", e);
                event_loop.exit();
                return;
            }
        };

        let (width, height) = render_system.size();
        self.mapper.resize(width, height);

        self.window = Some(window);
        self.render_system = Some(render_system);
        self.title.clear();

        // Audio starts once there is something to draw it on
        self.advance_session();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => self.resize(size.width, size.height),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(key),
                        repeat: false,
                        ..
                    },
                ..
            } => {
                if let Some(control) = Control::from_key(key) {
                    self.handle_control(control, event_loop);
                }
            }
            WindowEvent::RedrawRequested => self.render_frame(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.session.as_ref().is_some_and(|s| s.is_finished()) {
            log::info!("Track finished");
            self.advance_session();
        }

        if self.clock.tick(Instant::now()) {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.clock.next_frame()));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut session) = self.session.take() {
            session.stop();
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = Args::parse();

    let mut config = resolve_config(args.config.as_deref());
    if let Some(width) = args.width {
        config.window.width = width;
    }
    if let Some(height) = args.height {
        config.window.height = height;
    }

    let discovered = scan_music_dir(&args.music_dir);

    if args.list {
        if discovered.is_empty() {
            println!("No .wav tracks found in {}", args.music_dir.display());
        }
        for (i, track) in discovered.iter().enumerate() {
            println!("{:>3}. {}", i + 1, SessionSource::File(track.clone()).label());
        }
        return Ok(());
    }

    let visual = VisualState {
        shape: args.shape.unwrap_or(config.display.shape),
        flash: config.display.flash,
        logarithmic: args.logarithmic || config.display.logarithmic,
        log_scale: config.display.log_scale,
    };

    let (width, height) = (config.window.width, config.window.height);
    let background = config
        .window
        .background_image
        .as_deref()
        .and_then(|path| match load_background(path, width, height) {
            Ok(image) => Some(image),
            Err(e) => {
                log::warn!(
                    "Background image {} unavailable ({}), using fade color",
                    path.display(),
                    e
                );
                None
            }
        });

    let queue = SessionQueue::new(args.session_queue(&discovered));
    log::info!("{} source(s) queued", queue.len());

    let settings = config.analysis.session_settings(!args.mute);
    let mut app = App::new(config, visual, queue, settings, background);

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop
        .run_app(&mut app)
        .context("Event loop terminated with an error")?;

    Ok(())
}
