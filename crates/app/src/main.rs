//! vkengine viewer.
//!
//! Opens a window, renders the demo scene and exits when the window closes.
//! W/A/S/D/Q/E move the camera, Space cycles the shading mode, Escape quits.

use anyhow::{Result, anyhow};
use tracing::{error, info};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::PhysicalKey;
use winit::window::WindowId;

use vkengine_core::{EngineConfig, FrameClock};
use vkengine_platform::{InputEvent, InputState, KeyCode};
use vkengine_renderer::Engine;

struct App {
    config: EngineConfig,
    engine: Option<Engine>,
    pending: Vec<InputEvent>,
    input: InputState,
    clock: FrameClock,
    fatal: Option<String>,
}

impl App {
    fn new(config: EngineConfig) -> Self {
        Self {
            config,
            engine: None,
            pending: Vec::new(),
            input: InputState::new(),
            clock: FrameClock::new(),
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, message: String) {
        error!("{}", message);
        self.fatal = Some(message);
        event_loop.exit();
    }

    /// One loop iteration: apply queued input, then update and draw.
    fn iterate(&mut self, event_loop: &ActiveEventLoop) {
        self.input.begin_frame();
        self.input.apply_all(self.pending.drain(..));
        if self.input.quit_requested() {
            info!("Quit requested");
            event_loop.exit();
            return;
        }

        let dt = self.clock.tick();
        let Some(engine) = self.engine.as_mut() else {
            return;
        };
        engine.update(&self.input, dt);

        if let Err(e) = engine.draw_frame() {
            let frame = engine.frame_number();
            self.fail(event_loop, format!("Fatal error on frame {}: {}", frame, e));
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.engine.is_some() || self.fatal.is_some() {
            return;
        }
        match Engine::new(event_loop, &self.config) {
            Ok(engine) => {
                info!("Initialization complete, entering main loop");
                self.engine = Some(engine);
            }
            Err(e) => self.fail(event_loop, format!("Failed to initialize engine: {}", e)),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.pending.push(InputEvent::Quit),
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    if key == KeyCode::Escape {
                        self.pending.push(InputEvent::Quit);
                    } else if event.state.is_pressed() {
                        self.pending.push(InputEvent::KeyDown(key));
                    } else {
                        self.pending.push(InputEvent::KeyUp(key));
                    }
                }
            }
            WindowEvent::RedrawRequested => self.iterate(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        match &self.engine {
            Some(engine) => engine.window().request_redraw(),
            // Quit before the first frame, e.g. a close during startup.
            None if self.pending.contains(&InputEvent::Quit) => event_loop.exit(),
            None => {}
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(engine) = self.engine.take() {
            engine.shutdown();
        }
    }
}

fn main() -> Result<()> {
    vkengine_core::init_logging();
    info!("Starting vkengine");

    let config = EngineConfig::from_env()?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.fatal {
        Some(message) => Err(anyhow!(message)),
        None => Ok(()),
    }
}
