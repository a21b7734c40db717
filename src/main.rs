use clap::Parser;
use glam::Vec3;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;
use winit::{
    application::ApplicationHandler,
    event::*,
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use lumen_viewer::assets::{self, LoadEvent, LoadState};
use lumen_viewer::camera::OrbitCamera;
use lumen_viewer::cli::Cli;
use lumen_viewer::photometry::{FrameLighting, LightingParams};
use lumen_viewer::renderer::Renderer;
use lumen_viewer::scene::Scene;
use lumen_viewer::ui;

const FPS_UPDATE_INTERVAL: f32 = 1.0;

struct App {
    cli: Cli,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    scene: Scene,
    camera: OrbitCamera,
    params: LightingParams,
    load_state: LoadState,
    loader: Option<Receiver<LoadEvent>>,
    last_frame_time: Instant,
    frame_count: u32,
    fps: f32,
    fps_update_timer: f32,
}

impl App {
    fn new(cli: Cli) -> Self {
        let aspect = cli.width as f32 / cli.height as f32;
        Self {
            cli,
            window: None,
            renderer: None,
            scene: Scene::stage(),
            camera: OrbitCamera::looking_from(Vec3::new(-4.0, 2.0, 4.0), Vec3::ZERO, aspect),
            params: LightingParams::default(),
            load_state: LoadState::Idle,
            loader: None,
            last_frame_time: Instant::now(),
            frame_count: 0,
            fps: 0.0,
            fps_update_timer: 0.0,
        }
    }

    fn update_fps(&mut self, delta: f32) {
        self.frame_count += 1;
        self.fps_update_timer += delta;

        if self.fps_update_timer >= FPS_UPDATE_INTERVAL {
            self.fps = self.frame_count as f32 / self.fps_update_timer;
            self.frame_count = 0;
            self.fps_update_timer = 0.0;
        }
    }

    /// Drains loader events: advances the load state and, on success,
    /// attaches the loaded subtree to the scene.
    fn drain_loader(&mut self) {
        let Some(rx) = &self.loader else {
            return;
        };
        let mut received = Vec::new();
        while let Ok(event) = rx.try_recv() {
            received.push(event);
        }
        for event in received {
            self.load_state.apply(&event);
            if let LoadEvent::Loaded(document) = event {
                self.scene.attach(document.scene);
            }
        }
    }

    fn redraw(&mut self) {
        let now = Instant::now();
        let delta = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;
        self.update_fps(delta);

        self.drain_loader();

        // Per-frame lighting: photometric params -> renderer quantities.
        let frame = FrameLighting::derive(&self.params);
        self.scene.apply_lighting(&frame);

        let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) else {
            return;
        };

        let params = &mut self.params;
        let load_state = &self.load_state;
        let fps = self.fps;
        let show_panel = !self.cli.no_ui;
        let result = renderer.render(window, &self.scene, &self.camera, &frame, |ctx| {
            ui::draw(ctx, params, load_state, fps, show_panel)
        });

        match result {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                renderer.resize(window.inner_size());
            }
            Err(e) => log::error!("render error: {e}"),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            let window = match event_loop.create_window(
                Window::default_attributes()
                    .with_title("Lumen Viewer")
                    .with_inner_size(winit::dpi::LogicalSize::new(
                        self.cli.width,
                        self.cli.height,
                    )),
            ) {
                Ok(w) => Arc::new(w),
                Err(e) => {
                    log::error!("failed to create window: {e}");
                    event_loop.exit();
                    return;
                }
            };

            let renderer = match pollster::block_on(Renderer::new(window.clone())) {
                Ok(r) => r,
                Err(e) => {
                    log::error!("failed to initialize renderer: {e:#}");
                    event_loop.exit();
                    return;
                }
            };

            let size = window.inner_size();
            self.camera.set_viewport(size.width, size.height);
            self.window = Some(window);
            self.renderer = Some(renderer);
        }

        // One-shot: the archive is fetched exactly once per process.
        if self.loader.is_none() {
            self.loader = Some(assets::spawn_loader(
                self.cli.url.clone(),
                self.cli.entry.clone(),
            ));
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        // Let egui handle the event first
        if let (Some(renderer), Some(window)) = (&mut self.renderer, &self.window) {
            if renderer.handle_event(window, &event) {
                return;
            }
        }

        if self.camera.process_event(&event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested
            | WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        state: ElementState::Pressed,
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        ..
                    },
                ..
            } => event_loop.exit(),
            WindowEvent::Resized(size) => {
                self.camera.set_viewport(size.width, size.height);
                if let Some(renderer) = &mut self.renderer {
                    renderer.resize(size);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    log::info!("controls: drag to orbit, wheel to zoom, Escape to quit");

    let event_loop = EventLoop::new()?;
    let mut app = App::new(cli);
    event_loop.run_app(&mut app)?;

    Ok(())
}
