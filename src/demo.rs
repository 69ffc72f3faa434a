use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{Key, NamedKey},
    window::{Window, WindowId},
};

use particle_lab::prelude::*;

const PARTICLE_COUNT: ParticleCount = ParticleCount::QuarterMillion;
const ORBIT_SPEED: f32 = 0.02;
const CAPTURE_PATH: &str = "particle-lab.png";

/// Input state shared between the window handler and the engine delegate.
struct DemoInput {
    preset: Preset,
    pointer: Vec2,
    pressed: bool,
    angle: f32,
    image_size: Vec2,
    rng: SmallRng,
}

struct DemoDelegate {
    input: Rc<RefCell<DemoInput>>,
}

impl LabDelegate for DemoDelegate {
    fn frame_completed(&mut self, _frame: &FrameInfo, wells: &mut AttractorSet) {
        let mut input = self.input.borrow_mut();
        if input.preset == Preset::Random {
            input.angle += ORBIT_SPEED;
        }
        let pointer = input.pressed.then_some(input.pointer);
        input.preset.drive_wells(wells, pointer, input.angle);
    }

    fn device_unavailable(&mut self) {
        log::error!("This demo needs a GPU with compute support");
    }

    fn positions_for_reset(&mut self, count: usize) -> Vec<Vec2> {
        let mut input = self.input.borrow_mut();
        let size = input.image_size;
        let rect = Rect::from_size(size.x, size.y);
        let preset = input.preset;
        match preset {
            Preset::Text => {
                let ring = Circle {
                    center: size * 0.5,
                    radius: size.min_element() * 0.3,
                };
                rect.generate_points_inside(Some(&ring), count)
            }
            _ => rect.generate_random_points_inside(None, count, &mut input.rng),
        }
    }
}

pub struct App {
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    lab: Option<ParticleLab>,
    input: Rc<RefCell<DemoInput>>,
}

impl App {
    pub fn new() -> Self {
        Self {
            window: None,
            surface: None,
            lab: None,
            input: Rc::new(RefCell::new(DemoInput {
                preset: Preset::Random,
                pointer: Vec2::splat(0.5),
                pressed: false,
                angle: 0.0,
                image_size: Vec2::ZERO,
                rng: SmallRng::from_entropy(),
            })),
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), Box<dyn std::error::Error>> {
        let window_attrs = Window::default_attributes()
            .with_title("Particle Lab")
            .with_inner_size(winit::dpi::LogicalSize::new(1024, 768));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let logical = window.inner_size().to_logical::<u32>(window.scale_factor());
        let config = LabConfig::for_logical_size(logical.width, logical.height, window.scale_factor() >= 2.0)
            .with_particle_count(PARTICLE_COUNT);
        self.input.borrow_mut().image_size =
            Vec2::new(config.image_width as f32, config.image_height as f32);

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;

        let delegate = DemoDelegate {
            input: self.input.clone(),
        };
        let mut lab = ParticleLab::create_for_surface(instance, Some(&surface), config, Some(Box::new(delegate)))?;

        if let Some(engine) = lab.as_gpu() {
            let size = window.inner_size();
            engine.configure_surface(&surface, size.width, size.height);
        }
        self.apply_preset(&mut lab, Preset::Random);

        self.window = Some(window);
        self.surface = Some(surface);
        self.lab = Some(lab);
        Ok(())
    }

    fn apply_preset(&self, lab: &mut ParticleLab, preset: Preset) {
        log::info!("Preset: {:?}", preset);
        self.input.borrow_mut().preset = preset;
        preset.apply(lab.settings_mut());
        lab.reset_all_gravity_wells();
        lab.reset_particles(true);
    }

    fn reconfigure(&self) {
        if let (Some(window), Some(surface), Some(lab)) = (&self.window, &self.surface, &self.lab) {
            if let Some(engine) = lab.as_gpu() {
                let size = window.inner_size();
                engine.configure_surface(surface, size.width, size.height);
            }
        }
    }

    fn handle_key(&mut self, event: KeyEvent, event_loop: &ActiveEventLoop) {
        if event.state != ElementState::Pressed {
            return;
        }
        let Some(mut lab) = self.lab.take() else {
            return;
        };
        match event.logical_key.as_ref() {
            Key::Named(NamedKey::Escape) => event_loop.exit(),
            Key::Named(NamedKey::Space) => {
                let next = self.input.borrow().preset.next();
                self.apply_preset(&mut lab, next);
            }
            Key::Character("r") => {
                lab.reset_particles(false);
            }
            Key::Character("c") => {
                let settings = lab.settings_mut();
                settings.clear_on_step = !settings.clear_on_step;
            }
            Key::Character("s") => {
                if let Some(engine) = lab.as_gpu() {
                    match engine.capture_image() {
                        Ok(image) => match image.save(Path::new(CAPTURE_PATH)) {
                            Ok(()) => log::info!("Saved {}", CAPTURE_PATH),
                            Err(e) => log::error!("Failed to save capture: {}", e),
                        },
                        Err(e) => log::error!("Capture failed: {}", e),
                    }
                }
            }
            _ => {}
        }
        self.lab = Some(lab);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.init(event_loop) {
                log::error!("Failed to start particle lab: {}", e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(lab) = &mut self.lab {
                    lab.teardown();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(_) => self.reconfigure(),
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    self.input.borrow_mut().pressed = state == ElementState::Pressed;
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let Some(window) = &self.window {
                    let size = window.inner_size();
                    self.input.borrow_mut().pointer = Vec2::new(
                        position.x as f32 / size.width.max(1) as f32,
                        position.y as f32 / size.height.max(1) as f32,
                    );
                }
            }
            WindowEvent::KeyboardInput { event, .. } => self.handle_key(event, event_loop),
            WindowEvent::RedrawRequested => {
                if let (Some(lab), Some(surface)) = (&mut self.lab, &self.surface) {
                    match lab.step(RenderTarget::Surface(surface)) {
                        FrameOutcome::Skipped(SkipReason::Surface(
                            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                        )) => self.reconfigure(),
                        FrameOutcome::Skipped(SkipReason::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                            event_loop.exit()
                        }
                        FrameOutcome::Inactive => event_loop.exit(),
                        _ => {}
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}
