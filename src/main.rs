use std::any::Any;
use std::env;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use glam::{Vec2, Vec4};
use log::{info, warn};
use pollster::block_on;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{DeviceEvent, DeviceId, ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

use sandplane::{Movement, PassKind, Renderer, Scene, SceneState, WindowInitError};

/// Aspect ratio used for the CPU probe when no window exists.
const HEADLESS_ASPECT: f32 = 16.0 / 9.0;
const PROBE_UV: Vec2 = Vec2::splat(0.5);

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let scene = match &options.path {
        Some(path) => Scene::open(path)?,
        None => Scene::builtin(),
    };

    println!(
        "Loaded scene with {} objects ({} lights)",
        scene.objects.len(),
        scene.lights.len()
    );
    for object in &scene.objects {
        println!(" - {} ({})", object.name, object.object_type.as_str());
    }

    let state = SceneState::from_scene(&scene);
    if options.summary_only {
        return run_headless(&state);
    }

    match run_interactive(state.clone()) {
        Ok(()) => Ok(()),
        Err(err) => {
            if err.downcast_ref::<WindowInitError>().is_some() {
                eprintln!(
                    "{err}. Falling back to --summary-only mode (set DISPLAY or WAYLAND_DISPLAY to enable rendering)."
                );
                run_headless(&state)
            } else {
                Err(err)
            }
        }
    }
}

fn run_headless(state: &SceneState) -> Result<()> {
    for entity in state.entities.iter().filter(|e| e.pass == PassKind::Surface) {
        let Some(color) = state.surface_probe(entity, PROBE_UV, HEADLESS_ASPECT) else {
            continue;
        };
        println!(
            "Surface probe {} ({:.2}, {:.2}): color=({:.3}, {:.3}, {:.3})",
            entity.name, PROBE_UV.x, PROBE_UV.y, color.x, color.y, color.z
        );
    }
    print_final_state(state);
    Ok(())
}

fn run_interactive(state: SceneState) -> Result<()> {
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|_| {}));
    let event_loop = panic::catch_unwind(AssertUnwindSafe(EventLoop::new));
    panic::set_hook(default_hook);
    let event_loop = event_loop
        .map_err(|panic| WindowInitError::new("event loop", panic_message(panic)))?
        .map_err(|err| WindowInitError::new("event loop", err.to_string()))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut viewer = Viewer::new(state);
    event_loop
        .run_app(&mut viewer)
        .context("event loop exited with an error")?;

    if let Some(err) = viewer.last_error.take() {
        return Err(err);
    }
    print_final_state(&viewer.state);
    Ok(())
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(msg) => *msg,
        Err(panic) => match panic.downcast::<&'static str>() {
            Ok(msg) => (*msg).to_string(),
            Err(_) => "unknown panic".into(),
        },
    }
}

struct Viewer {
    state: SceneState,
    renderer: Option<Renderer>,
    last_frame: Instant,
    last_error: Option<anyhow::Error>,
}

impl Viewer {
    fn new(state: SceneState) -> Self {
        Self {
            state,
            renderer: None,
            last_frame: Instant::now(),
            last_error: None,
        }
    }

    fn create_renderer(&self, event_loop: &ActiveEventLoop) -> Result<Renderer> {
        let attributes = Window::default_attributes()
            .with_title("Sandplane")
            .with_inner_size(LogicalSize::new(1280.0, 720.0));
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| WindowInitError::new("window", err.to_string()))?,
        );
        if let Err(err) = window
            .set_cursor_grab(CursorGrabMode::Confined)
            .or_else(|_| window.set_cursor_grab(CursorGrabMode::Locked))
        {
            warn!("cursor grab unavailable: {err}");
        }
        window.set_cursor_visible(false);

        block_on(Renderer::new(window, &self.state))
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.last_error = Some(err);
        event_loop.exit();
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let now = Instant::now();
        self.state.update(now - self.last_frame);
        self.last_frame = now;

        renderer.update(&self.state);
        match renderer.render() {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = renderer.window().inner_size();
                renderer.resize(size);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                self.fail(event_loop, anyhow!("GPU is out of memory"));
            }
            Err(err) => warn!("skipping frame: {err}"),
        }
    }
}

impl ApplicationHandler for Viewer {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.renderer.is_some() {
            return;
        }
        match self.create_renderer(event_loop) {
            Ok(renderer) => {
                info!("renderer ready with {} entities", self.state.entities.len());
                self.renderer = Some(renderer);
                self.last_frame = Instant::now();
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        if window_id != renderer.window_id() {
            return;
        }
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => renderer.resize(size),
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state,
                        ..
                    },
                ..
            } => {
                if code == KeyCode::Escape && state == ElementState::Pressed {
                    event_loop.exit();
                } else if let Some(movement) = movement_for(code) {
                    self.state
                        .controller
                        .set_movement(movement, state == ElementState::Pressed);
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _device_id: DeviceId, event: DeviceEvent) {
        if let DeviceEvent::MouseMotion { delta: (dx, dy) } = event {
            self.state.controller.mouse_motion(dx, dy);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(renderer) = &self.renderer {
            renderer.window().request_redraw();
        }
    }
}

fn movement_for(code: KeyCode) -> Option<Movement> {
    Some(match code {
        KeyCode::KeyW | KeyCode::ArrowUp => Movement::Forward,
        KeyCode::KeyS | KeyCode::ArrowDown => Movement::Backward,
        KeyCode::KeyA | KeyCode::ArrowLeft => Movement::Left,
        KeyCode::KeyD | KeyCode::ArrowRight => Movement::Right,
        _ => return None,
    })
}

fn print_final_state(state: &SceneState) {
    println!("Final object states:");
    for entity in &state.entities {
        let position = entity.transform.position;
        print_state_line(&entity.name, position.to_array(), entity.color);
    }
    print_state_line(
        "light",
        state.light.position.to_array(),
        state.light.color.extend(state.light.intensity),
    );
}

fn print_state_line(name: &str, [x, y, z]: [f32; 3], color: Vec4) {
    println!(
        " - {name} pos=({x:.2}, {y:.2}, {z:.2}) color=({:.2}, {:.2}, {:.2})",
        color.x, color.y, color.z
    );
}

#[derive(Debug, PartialEq)]
struct CliOptions {
    path: Option<String>,
    summary_only: bool,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut path = None;
        let mut summary_only = false;
        for arg in args {
            match arg.as_str() {
                "--summary-only" => summary_only = true,
                "-h" | "--help" => {
                    return Err(anyhow!("Usage: sandplane [scene.xml] [--summary-only]"));
                }
                other if other.starts_with('-') => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --summary-only"
                    ));
                }
                other => {
                    if path.replace(other.to_string()).is_some() {
                        return Err(anyhow!("Usage: sandplane [scene.xml] [--summary-only]"));
                    }
                }
            }
        }
        Ok(Self { path, summary_only })
    }
}
