//! Wave Viewer
//!
//! Interactive front end for the wave engine.
//!
//! Controls:
//! - 1/2/3/4: Free particle, potential well, harmonic oscillator, hydrogen
//! - Up/Down: Energy level
//! - B: Toggle the tunneling barrier (free particle)
//! - Space: Animate on/off
//! - C: Cycle color scheme
//! - V: Cycle the displayed quantity (probability, real, imaginary, phase)
//! - Left/Right: Rotate the view
//! - R: Reset time

use common::{Camera2D, GraphicsContext};
use wave_sim::constants::ELECTRON_VOLT;
use wave_sim::params::MAX_ENERGY_LEVEL;
use wave_sim::renderer::MeshRenderer;
use wave_sim::{EngineConfig, EngineError, SystemType, WaveVisualizer};
use winit::{
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::ControlFlow,
    keyboard::{KeyCode, PhysicalKey},
};

const ROTATION_STEP: f32 = 0.1;
const BARRIER_HEIGHT: f64 = 0.5 * ELECTRON_VOLT;

struct App {
    ctx: GraphicsContext,
    renderer: MeshRenderer,
    visualizer: WaveVisualizer,
    camera: Camera2D,
}

impl App {
    fn new(ctx: GraphicsContext) -> Result<Self, EngineError> {
        let config = EngineConfig::default();
        let params = wave_sim::SimulationParameters::for_system(SystemType::PotentialWell);
        let device = Some((ctx.device.clone(), ctx.queue.clone()));

        let mut visualizer = WaveVisualizer::from_config(params, config, device)?;
        visualizer.set_animating(true);

        let initial = wave_sim::MeshBuilder::vertex_count(visualizer.parameters().grid_points as usize);
        let renderer = MeshRenderer::new(&ctx, initial, config.mesh.growth_factor);
        let camera = Camera2D::new(ctx.aspect_ratio());

        Ok(Self {
            ctx,
            renderer,
            visualizer,
            camera,
        })
    }

    fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        self.ctx.resize(new_size);
        self.camera.update_aspect_ratio(self.ctx.aspect_ratio());
    }

    fn update(&mut self) {
        self.visualizer.update();
        self.camera.rotation = self.visualizer.rotation();

        let exchange = self.visualizer.exchange();
        if let Err(err) = self.renderer.sync(&self.ctx.device, &self.ctx.queue, &exchange) {
            log::warn!("skipping mesh upload: {err}");
        }
    }

    fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.ctx.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.renderer.update_camera(&self.ctx.queue, &self.camera);

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        self.renderer.render(&mut encoder, &view, true);

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    fn handle_key(&mut self, key: KeyCode, state: ElementState) {
        if state != ElementState::Pressed {
            return;
        }

        let params = self.visualizer.parameters().clone();
        let result = match key {
            KeyCode::Digit1 => self.switch_system(SystemType::FreeParticle),
            KeyCode::Digit2 => self.switch_system(SystemType::PotentialWell),
            KeyCode::Digit3 => self.switch_system(SystemType::HarmonicOscillator),
            KeyCode::Digit4 => self.switch_system(SystemType::HydrogenAtom),
            KeyCode::ArrowUp if params.energy_level < MAX_ENERGY_LEVEL => self.visualizer.set_parameters(
                params.system,
                params.energy_level + 1,
                params.particle_mass,
                params.potential_height,
            ),
            KeyCode::ArrowDown if params.energy_level > 1 => self.visualizer.set_parameters(
                params.system,
                params.energy_level - 1,
                params.particle_mass,
                params.potential_height,
            ),
            KeyCode::KeyB => {
                let height = if params.potential_height > 0.0 { 0.0 } else { BARRIER_HEIGHT };
                self.visualizer.set_parameters(
                    params.system,
                    params.energy_level,
                    params.particle_mass,
                    height,
                )
            }
            KeyCode::Space => {
                let animating = !self.visualizer.is_animating();
                self.visualizer.set_animating(animating);
                Ok(false)
            }
            KeyCode::KeyC => {
                let scheme = self.visualizer.color_scheme().next();
                log::info!("color scheme: {}", scheme.name());
                self.visualizer.set_color_scheme(scheme);
                Ok(false)
            }
            KeyCode::KeyV => {
                let mode = self.visualizer.visualization_mode().next();
                log::info!("showing {}", mode.name());
                self.visualizer.set_visualization_mode(mode);
                Ok(false)
            }
            KeyCode::KeyR => {
                self.visualizer.set_time(0.0);
                Ok(false)
            }
            KeyCode::ArrowLeft => {
                self.visualizer.rotate(-ROTATION_STEP);
                Ok(false)
            }
            KeyCode::ArrowRight => {
                self.visualizer.rotate(ROTATION_STEP);
                Ok(false)
            }
            _ => Ok(false),
        };

        match result {
            Ok(true) => {
                let wavelength = self.visualizer.wavelength();
                let energy = self.visualizer.energy();
                let p = self.visualizer.parameters();
                log::info!(
                    "{} n={} E={:.4} eV, wavelength {:.3e} m",
                    p.system.name(),
                    p.energy_level,
                    energy / ELECTRON_VOLT,
                    wavelength
                );
            }
            Ok(false) => {}
            Err(err) => log::warn!("{err}"),
        }
    }

    fn switch_system(&mut self, system: SystemType) -> Result<bool, EngineError> {
        let params = self.visualizer.parameters();
        let (mass, level) = (params.particle_mass, params.energy_level);
        self.visualizer.set_time(0.0);
        self.visualizer.set_parameters(system, level, mass, 0.0)
    }
}

fn main() {
    env_logger::init();

    let (ctx, event_loop) = match pollster::block_on(GraphicsContext::new(
        "Wave Viewer - Quantum State Engine",
        1280,
        720,
    )) {
        Ok(pair) => pair,
        Err(err) => {
            log::error!("graphics initialization failed: {err}");
            std::process::exit(1);
        }
    };

    let mut app = match App::new(ctx) {
        Ok(app) => app,
        Err(err) => {
            log::error!("engine initialization failed: {err}");
            std::process::exit(1);
        }
    };

    let result = event_loop.run(move |event, elwt| {
        elwt.set_control_flow(ControlFlow::Poll);

        match event {
            Event::WindowEvent { event, .. } => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(size) => app.resize(size),
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(key),
                            state,
                            ..
                        },
                    ..
                } => app.handle_key(key, state),
                WindowEvent::RedrawRequested => {
                    app.update();
                    match app.render() {
                        Ok(_) => {}
                        Err(wgpu::SurfaceError::Lost) => app.resize(app.ctx.size),
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("surface out of memory");
                            elwt.exit();
                        }
                        Err(e) => log::warn!("render error: {e:?}"),
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                app.ctx.window.request_redraw();
            }
            _ => {}
        }
    });

    if let Err(err) = result {
        log::error!("event loop error: {err}");
        std::process::exit(1);
    }
}
