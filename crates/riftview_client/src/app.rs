use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use riftview_core::camera::CameraPose;
use riftview_core::frame::FrameDriver;
use riftview_core::pool::{PoolError, TargetResolution};
use riftview_core::renderer::PortalRenderer;
use riftview_core::settings::{ViewerSettings, MAX_ANISOTROPY, MIN_ANISOTROPY};
use tracing::{debug, error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, ElementState, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{CursorGrabMode, Window, WindowId};

use crate::controls::FlyControls;
use crate::input::InputState;
use crate::renderer::Renderer;
use crate::scene_builder::{build_demo_scene, DemoAssets, DemoScene};
use crate::settings::{load_or_create_settings, save, SETTINGS_PATH};

const MAX_FRAME_DT: f32 = 0.05;
const PIXELS_PER_SCROLL_LINE: f64 = 10.0;
const FIXED_TARGET_SIZE: u32 = 512;

struct ViewerApp {
    window: Option<Arc<Window>>,
    renderer: Option<Renderer>,
    demo: Option<DemoScene>,
    camera: CameraPose,
    driver: FrameDriver,
    input: InputState,
    controls: FlyControls,
    settings: ViewerSettings,
    settings_path: PathBuf,
    cursor_grabbed: bool,
    last_frame: Option<Instant>,
}

impl ViewerApp {
    fn new() -> Result<Self, PoolError> {
        let settings_path = PathBuf::from(SETTINGS_PATH);
        let settings = load_or_create_settings(&settings_path);
        let pool = settings.target_pool()?;
        let driver = FrameDriver::new(PortalRenderer::new(settings.render_settings(), pool));
        let controls = FlyControls::new(settings.mouse_sensitivity, settings.move_speed);

        Ok(Self {
            window: None,
            renderer: None,
            demo: None,
            camera: CameraPose::default(),
            driver,
            input: InputState::default(),
            controls,
            settings,
            settings_path,
            cursor_grabbed: false,
            last_frame: None,
        })
    }

    fn set_cursor_grab(&mut self, enabled: bool) {
        let Some(window) = self.window.as_ref() else {
            self.cursor_grabbed = false;
            return;
        };

        let grabbed = if enabled {
            window
                .set_cursor_grab(CursorGrabMode::Locked)
                .or_else(|_| window.set_cursor_grab(CursorGrabMode::Confined))
                .is_ok()
        } else {
            let _ = window.set_cursor_grab(CursorGrabMode::None);
            false
        };

        window.set_cursor_visible(!grabbed);
        self.cursor_grabbed = grabbed;
    }

    fn save_settings(&self) {
        if let Err(err) = save(&self.settings, &self.settings_path) {
            warn!(
                "Failed to save settings to {}: {err}",
                self.settings_path.display()
            );
        }
    }

    fn update_title(&self) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        window.set_title(&format!(
            "Riftview | depth {} | {}x anisotropy",
            self.settings.recursion_depth, self.settings.anisotropy
        ));
    }

    fn respawn(&mut self) {
        let Some(demo) = self.demo.as_mut() else {
            return;
        };
        if let Err(err) = demo.scene.set_viewpoint(demo.courtyard) {
            warn!("Failed to reset viewpoint: {err}");
            return;
        }
        self.camera = demo.spawn;
        self.camera.fov = self.settings.fov.to_radians();
        self.driver.reset_crossing();
        debug!("Camera returned to spawn");
    }

    fn adjust_recursion_depth(&mut self, step: i32) {
        let depth = self.driver.renderer().recursion_depth().saturating_add_signed(step);
        self.driver.renderer_mut().set_recursion_depth(depth);
        self.settings.recursion_depth = self.driver.renderer().recursion_depth();
        info!("Portal recursion depth set to {}", self.settings.recursion_depth);
        self.save_settings();
        self.update_title();
    }

    fn adjust_anisotropy(&mut self, increase: bool) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let current = renderer.anisotropy();
        let requested = if increase {
            current.saturating_mul(2)
        } else {
            current / 2
        };
        let level = renderer.set_anisotropy(requested.clamp(MIN_ANISOTROPY, MAX_ANISOTROPY));
        self.settings.anisotropy = level;
        info!("Texture anisotropy set to {level}x");
        self.save_settings();
        self.update_title();
    }

    fn cycle_target_resolution(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        let next = match self.settings.target_resolution {
            TargetResolution::MatchScreen => TargetResolution::Scaled { factor: 0.5 },
            TargetResolution::Scaled { .. } => TargetResolution::Fixed {
                width: FIXED_TARGET_SIZE,
                height: FIXED_TARGET_SIZE,
            },
            TargetResolution::Fixed { .. } => TargetResolution::MatchScreen,
        };
        let settings = ViewerSettings {
            target_resolution: next,
            ..self.settings.clone()
        };
        let pool = match settings.target_pool() {
            Ok(pool) => pool,
            Err(err) => {
                warn!("Rejected portal target resolution {next:?}: {err}");
                return;
            }
        };
        if let Err(err) = renderer.replace_pool(&mut self.driver, pool) {
            warn!("Failed to reallocate portal targets: {err}");
            return;
        }
        info!("Portal target resolution set to {next:?}");
        self.settings = settings;
        self.save_settings();
    }

    fn handle_key_pressed(&mut self, event_loop: &ActiveEventLoop, code: KeyCode, repeat: bool) {
        match code {
            KeyCode::Escape if !repeat => {
                if self.cursor_grabbed {
                    self.set_cursor_grab(false);
                } else {
                    info!("Escape pressed; shutting down");
                    self.save_settings();
                    event_loop.exit();
                }
            }
            KeyCode::Digit1 if !repeat => {
                self.set_cursor_grab(!self.cursor_grabbed);
            }
            KeyCode::BracketLeft => self.adjust_recursion_depth(-1),
            KeyCode::BracketRight => self.adjust_recursion_depth(1),
            KeyCode::Minus => self.adjust_anisotropy(false),
            KeyCode::Equal => self.adjust_anisotropy(true),
            KeyCode::KeyR if !repeat => self.respawn(),
            KeyCode::KeyT if !repeat => self.cycle_target_resolution(),
            _ => {}
        }
    }

    fn update_and_render(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.as_ref().cloned() else {
            return;
        };
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return;
        }

        let now = Instant::now();
        let dt = self
            .last_frame
            .map(|last| (now - last).as_secs_f32())
            .unwrap_or(1.0 / 60.0)
            .min(MAX_FRAME_DT);
        self.last_frame = Some(now);

        self.controls.update(&mut self.camera, &self.input, dt);
        self.input.clear_frame();

        let (Some(renderer), Some(demo)) = (self.renderer.as_mut(), self.demo.as_mut()) else {
            return;
        };
        match renderer.render(&mut demo.scene, &mut self.camera, &mut self.driver, dt) {
            Ok(report) => {
                if report.crossing.is_some() {
                    // Controls rebuild the basis from yaw and pitch every frame.
                    self.camera.sync_angles_from_front();
                }
            }
            Err(wgpu::SurfaceError::Outdated | wgpu::SurfaceError::Lost) => {
                renderer.resize(&mut self.driver, size.width, size.height);
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("Out of GPU memory; shutting down");
                event_loop.exit();
            }
            Err(wgpu::SurfaceError::Timeout | wgpu::SurfaceError::Other) => {}
        }
    }
}

impl ApplicationHandler for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes().with_title("Riftview");
        let window = match event_loop.create_window(attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                error!("failed to create viewer window: {err}");
                event_loop.exit();
                return;
            }
        };

        let mut renderer = match Renderer::new(window.clone(), self.settings.anisotropy) {
            Ok(renderer) => renderer,
            Err(err) => {
                error!("failed to initialize renderer: {err}");
                event_loop.exit();
                return;
            }
        };

        let assets = DemoAssets::load(renderer.registry_mut());
        let demo = match build_demo_scene(&assets) {
            Ok(demo) => demo,
            Err(err) => {
                error!("failed to build scene: {err}");
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        renderer.resize(&mut self.driver, size.width, size.height);
        self.camera = demo.spawn;
        self.camera.fov = self.settings.fov.to_radians();

        info!("Viewer window and renderer initialized");
        self.window = Some(window);
        self.renderer = Some(renderer);
        self.demo = Some(demo);
        self.last_frame = Some(Instant::now());
        self.set_cursor_grab(true);
        self.update_title();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window.as_ref().map(|window| window.id()) != Some(window_id) {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested; shutting down viewer event loop");
                self.save_settings();
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                info!("Window resized to {}x{}", size.width, size.height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.resize(&mut self.driver, size.width, size.height);
                }
            }
            WindowEvent::Focused(false) => {
                self.input.release_all();
                self.set_cursor_grab(false);
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let PhysicalKey::Code(code) = event.physical_key else {
                    return;
                };
                match event.state {
                    ElementState::Pressed => {
                        self.input.press_key(code);
                        self.handle_key_pressed(event_loop, code, event.repeat);
                    }
                    ElementState::Released => self.input.release_key(code),
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => {
                        if pos.y > PIXELS_PER_SCROLL_LINE {
                            1.0
                        } else if pos.y < -PIXELS_PER_SCROLL_LINE {
                            -1.0
                        } else {
                            0.0
                        }
                    }
                };
                self.input.add_scroll(lines);
            }
            WindowEvent::RedrawRequested => {
                self.update_and_render(event_loop);
            }
            _ => {}
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: winit::event::DeviceId,
        event: DeviceEvent,
    ) {
        if !self.cursor_grabbed {
            return;
        }

        if let DeviceEvent::MouseMotion { delta } = event {
            self.input
                .add_mouse_delta(Vec2::new(delta.0 as f32, delta.1 as f32));
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

pub fn run() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();
    info!("Riftview starting");

    let mut app = match ViewerApp::new() {
        Ok(app) => app,
        Err(err) => {
            eprintln!("Failed to configure portal targets: {err}");
            return;
        }
    };

    let event_loop = match EventLoop::new() {
        Ok(loop_handle) => loop_handle,
        Err(err) => {
            eprintln!("Failed to create event loop: {err}");
            return;
        }
    };

    if let Err(err) = event_loop.run_app(&mut app) {
        eprintln!("Event loop exited with error: {err}");
    }
}
