pub mod camera;
pub mod config;
pub mod environment;
pub mod error;
pub mod geodesic;
pub mod metric;
pub mod ray;
pub mod recording;
pub mod renderer;
pub mod trace;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use wgpu::SurfaceError;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{CursorGrabMode, Window, WindowId},
};

use crate::camera::{FlyCamera, MoveAxis};
use crate::config::ViewerConfig;
use crate::environment::{load_environment, EnvironmentMap};
use crate::error::{Result, WormholeError};
use crate::recording::{default_file_name, export_animation, frame_duration_ms, FrameRecorder};
use crate::renderer::Renderer;

/// Longest simulated step per frame, so a stall does not teleport the camera.
const MAX_FRAME_DT: f32 = 0.1;

/// Movement axis and direction bound to a key.
pub fn movement_key(code: KeyCode) -> Option<(MoveAxis, f32)> {
    match code {
        KeyCode::KeyW => Some((MoveAxis::Forward, 1.0)),
        KeyCode::KeyS => Some((MoveAxis::Forward, -1.0)),
        KeyCode::KeyA => Some((MoveAxis::Strafe, -1.0)),
        KeyCode::KeyD => Some((MoveAxis::Strafe, 1.0)),
        KeyCode::KeyE => Some((MoveAxis::Vertical, 1.0)),
        KeyCode::KeyQ => Some((MoveAxis::Vertical, -1.0)),
        _ => None,
    }
}

/// Wall-clock frame timing with a smoothed FPS estimate.
struct FrameClock {
    start: Instant,
    last: Instant,
    fps: f32,
}

impl FrameClock {
    fn new() -> Self {
        let now = Instant::now();
        Self { start: now, last: now, fps: 0.0 }
    }

    fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = (now - self.last).as_secs_f32();
        self.last = now;
        if dt > 0.0 {
            let instant = 1.0 / dt;
            self.fps = if self.fps > 0.0 { self.fps * 0.9 + instant * 0.1 } else { instant };
        }
        dt.min(MAX_FRAME_DT)
    }

    fn elapsed(&self) -> f32 {
        self.start.elapsed().as_secs_f32()
    }
}

struct App {
    config: ViewerConfig,
    skyboxes: Option<(EnvironmentMap, EnvironmentMap)>,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    camera: FlyCamera,
    recorder: FrameRecorder,
    clock: FrameClock,
    error: Option<WormholeError>,
}

impl App {
    fn new(config: ViewerConfig, skybox_a: EnvironmentMap, skybox_b: EnvironmentMap) -> Self {
        Self {
            camera: config.camera(),
            config,
            skyboxes: Some((skybox_a, skybox_b)),
            window: None,
            renderer: None,
            recorder: FrameRecorder::new(),
            clock: FrameClock::new(),
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attrs = Window::default_attributes()
            .with_title("Wormhole Free-Fly")
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));

        let window = Arc::new(
            event_loop
                .create_window(window_attrs)
                .map_err(|e| WormholeError::Window(e.to_string()))?,
        );
        window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
            .unwrap_or_else(|e| log::warn!("Cursor grab unavailable: {}", e));
        window.set_cursor_visible(false);

        let (skybox_a, skybox_b) = self
            .skyboxes
            .take()
            .ok_or_else(|| WormholeError::Window("renderer already initialised".into()))?;
        let size = window.inner_size();
        let renderer = pollster::block_on(Renderer::new(
            window.clone(),
            size.width,
            size.height,
            self.config.wormhole,
            &skybox_a,
            &skybox_b,
        ))?;

        self.window = Some(window);
        self.renderer = Some(renderer);
        Ok(())
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, code: KeyCode, state: ElementState) {
        if let Some((axis, dir)) = movement_key(code) {
            match state {
                ElementState::Pressed => self.camera.press(axis, dir),
                ElementState::Released => self.camera.release(axis, dir),
            }
            return;
        }
        match (code, state) {
            (KeyCode::Escape, ElementState::Pressed) => event_loop.exit(),
            (KeyCode::Space, ElementState::Released) => self.toggle_recording(),
            _ => {}
        }
    }

    fn toggle_recording(&mut self) {
        let Some(frames) = self.recorder.toggle() else { return };
        let path = PathBuf::from(default_file_name(chrono::Local::now()));
        if let Err(e) = export_animation(&frames, frame_duration_ms(self.clock.fps), &path) {
            log::error!("Failed to save recording: {}", e);
        }
    }

    fn redraw(&mut self) {
        let dt = self.clock.tick();
        self.camera.advance(dt);
        let pose = self.camera.pose();
        let time = self.clock.elapsed();

        let Some(renderer) = &mut self.renderer else { return };
        match renderer.render(&pose, time) {
            Ok(()) => {}
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                let (width, height) = renderer.size();
                log::warn!("Surface lost, reconfiguring");
                renderer.resize(width, height);
            }
            Err(e) => log::error!("Render error: {:?}", e),
        }

        if self.recorder.is_recording() {
            match renderer.capture() {
                Ok(frame) => self.recorder.capture(frame),
                Err(e) => log::error!("Frame capture failed: {}", e),
            }
        }

        if let Some(window) = &self.window {
            let p = self.camera.position;
            let rec = if self.recorder.is_recording() { "[REC]" } else { "" };
            window.set_title(&format!(
                "Wormhole Free-Fly {} - Pos:({:.1}, {:.1}, {:.1}) - FPS: {:.2}",
                rec, p.x, p.y, p.z, self.clock.fps
            ));
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() { return; }
        if let Err(e) = self.init(event_loop) {
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(size.width, size.height);
                }
            }
            WindowEvent::KeyboardInput {
                event: KeyEvent { physical_key: PhysicalKey::Code(code), state, repeat: false, .. },
                ..
            } => self.handle_key(event_loop, code, state),
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn device_event(&mut self, _: &ActiveEventLoop, _: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.camera.look(dx as f32, dy as f32);
        }
    }

    fn about_to_wait(&mut self, _: &ActiveEventLoop) {
        if let Some(window) = &self.window { window.request_redraw(); }
    }
}

/// Load both skyboxes and run the interactive viewer until the window closes.
/// Asset errors surface before any window is opened.
pub fn run(config: ViewerConfig) -> Result<()> {
    log::info!("Loading skybox for Universe A from {}", config.skybox_a.display());
    let skybox_a = load_environment(&config.skybox_a)?;
    log::info!("Loading skybox for Universe B from {}", config.skybox_b.display());
    let skybox_b = load_environment(&config.skybox_b)?;

    let event_loop = EventLoop::new().map_err(|e| WormholeError::Window(e.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Poll);
    let mut app = App::new(config, skybox_a, skybox_b);
    event_loop
        .run_app(&mut app)
        .map_err(|e| WormholeError::Window(e.to_string()))?;

    if app.recorder.is_recording() {
        app.toggle_recording();
    }
    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
