use anyhow::{Context as _, Result};
use clap::Parser;
use egui::Context as EguiContext;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing_subscriber::EnvFilter;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use drivekit_control::Key;
use drivekit_sim::{ServerLink, SimConfig};

mod session;

use session::{FrameClock, LoopControl, Session, SessionOptions};

#[derive(Parser)]
#[command(
    name = "drivekit-desktop",
    about = "Keyboard driving client for the vehicle simulator"
)]
struct Cli {
    /// Simulator host
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Simulator TCP port
    #[arg(short, long, default_value_t = 2000)]
    port: u16,

    /// Window resolution as WIDTHxHEIGHT
    #[arg(long, default_value = "1280x720")]
    res: String,

    /// Actor blueprint filter
    #[arg(long, default_value = "vehicle.*")]
    filter: String,

    /// Role name of the actor to control
    #[arg(long, default_value = "hero")]
    rolename: String,

    /// Camera gamma correction
    #[arg(long, default_value_t = 2.2)]
    gamma: f32,

    /// Start with autopilot engaged
    #[arg(short, long)]
    autopilot: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_resolution(res: &str) -> Result<(u32, u32)> {
    let (w, h) = res
        .split_once('x')
        .context("resolution must look like 1280x720")?;
    Ok((
        w.parse().context("bad resolution width")?,
        h.parse().context("bad resolution height")?,
    ))
}

/// Maps a physical key to the driving key set. Keys with no driving
/// meaning return `None` and are left to the windowing layer.
fn translate_key(code: KeyCode) -> Option<Key> {
    Some(match code {
        KeyCode::KeyW => Key::W,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyD => Key::D,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyM => Key::M,
        KeyCode::KeyP => Key::P,
        KeyCode::KeyR => Key::R,
        KeyCode::KeyL => Key::L,
        KeyCode::KeyZ => Key::Z,
        KeyCode::KeyX => Key::X,
        KeyCode::KeyI => Key::I,
        KeyCode::KeyG => Key::G,
        KeyCode::KeyV => Key::V,
        KeyCode::KeyB => Key::B,
        KeyCode::KeyN => Key::N,
        KeyCode::KeyH => Key::H,
        KeyCode::KeyK => Key::K,
        KeyCode::KeyJ => Key::J,
        KeyCode::Comma => Key::Comma,
        KeyCode::Period => Key::Period,
        KeyCode::Slash => Key::Slash,
        KeyCode::Minus => Key::Minus,
        KeyCode::Equal => Key::Equals,
        KeyCode::Space => Key::Space,
        KeyCode::Tab => Key::Tab,
        KeyCode::Backquote => Key::Backquote,
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Escape => Key::Escape,
        KeyCode::F1 => Key::F1,
        KeyCode::Digit1 => Key::Digit(1),
        KeyCode::Digit2 => Key::Digit(2),
        KeyCode::Digit3 => Key::Digit(3),
        KeyCode::Digit4 => Key::Digit(4),
        KeyCode::Digit5 => Key::Digit(5),
        KeyCode::Digit6 => Key::Digit(6),
        KeyCode::Digit7 => Key::Digit(7),
        KeyCode::Digit8 => Key::Digit(8),
        KeyCode::Digit9 => Key::Digit(9),
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
        KeyCode::ControlLeft | KeyCode::ControlRight => Key::Ctrl,
        _ => return None,
    })
}

/// Draws the HUD overlay: camera feed underneath, info panel on the
/// left, fading notification at the bottom, help panel centered.
fn draw_ui(
    ctx: &EguiContext,
    session: &mut Session<ServerLink>,
    camera_tex: Option<&egui::TextureHandle>,
) {
    if let Some(tex) = camera_tex {
        let screen = ctx.screen_rect();
        let painter = ctx.layer_painter(egui::LayerId::background());
        painter.image(
            tex.id(),
            screen,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
    }

    let panel_bg = egui::Color32::from_black_alpha(160);

    if session.hud.show_info() {
        let lines = session
            .hud
            .info_lines(session.telemetry(), &session.mapper().command());
        egui::Area::new(egui::Id::new("hud_info"))
            .anchor(egui::Align2::LEFT_TOP, [0.0, 0.0])
            .show(ctx, |ui| {
                egui::Frame::NONE
                    .fill(panel_bg)
                    .inner_margin(8)
                    .show(ui, |ui| {
                        // Full-height side bar, like the classic HUD layout.
                        ui.set_min_width(220.0);
                        ui.set_min_height(session.hud.height as f32);
                        for line in lines {
                            ui.label(
                                egui::RichText::new(line)
                                    .monospace()
                                    .color(egui::Color32::WHITE),
                            );
                        }
                    });
            });
    }

    let alpha = session.hud.notification.alpha();
    if let Some(text) = session.hud.notification.visible() {
        let text = text.to_string();
        egui::Area::new(egui::Id::new("hud_notification"))
            .anchor(egui::Align2::LEFT_BOTTOM, [0.0, 0.0])
            .show(ctx, |ui| {
                egui::Frame::NONE
                    .fill(panel_bg)
                    .inner_margin(8)
                    .show(ui, |ui| {
                        // Strip across the bottom edge of the window.
                        ui.set_min_width(session.hud.width as f32);
                        ui.label(
                            egui::RichText::new(text)
                                .monospace()
                                .size(16.0)
                                .color(egui::Color32::from_white_alpha((alpha * 255.0) as u8)),
                        );
                    });
            });
    }

    if session.hud.help.visible {
        let help = session.hud.help.text().to_string();
        egui::Area::new(egui::Id::new("hud_help"))
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                egui::Frame::NONE
                    .fill(panel_bg)
                    .inner_margin(12)
                    .show(ui, |ui| {
                        ui.label(
                            egui::RichText::new(help)
                                .monospace()
                                .color(egui::Color32::WHITE),
                        );
                    });
            });
    }
}

struct GpuApp {
    session: Session<ServerLink>,
    width: u32,
    height: u32,
    clock: FrameClock,
    window: Option<Arc<Window>>,
    surface: Option<wgpu::Surface<'static>>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    config: Option<wgpu::SurfaceConfiguration>,
    egui_ctx: EguiContext,
    egui_winit: Option<egui_winit::State>,
    egui_renderer: Option<egui_wgpu::Renderer>,
    camera_tex: Option<egui::TextureHandle>,
    last_camera_frame: u64,
}

impl GpuApp {
    fn new(session: Session<ServerLink>, width: u32, height: u32) -> Self {
        Self {
            session,
            width,
            height,
            clock: FrameClock::new(60),
            window: None,
            surface: None,
            device: None,
            queue: None,
            config: None,
            egui_ctx: EguiContext::default(),
            egui_winit: None,
            egui_renderer: None,
            camera_tex: None,
            last_camera_frame: 0,
        }
    }

    /// Uploads the newest camera frame into the egui texture, if one
    /// arrived since the last upload.
    fn refresh_camera_texture(&mut self) {
        let Some(frame) = self.session.take_frame() else {
            return;
        };
        if self.camera_tex.is_some() && frame.frame == self.last_camera_frame {
            return;
        }
        self.last_camera_frame = frame.frame;
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [frame.width as usize, frame.height as usize],
            &frame.rgba,
        );
        match &mut self.camera_tex {
            Some(tex) => tex.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.camera_tex =
                    Some(
                        self.egui_ctx
                            .load_texture("camera_feed", image, egui::TextureOptions::LINEAR),
                    )
            }
        }
    }
}

impl ApplicationHandler for GpuApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let attrs = Window::default_attributes()
            .with_title("drivekit")
            .with_inner_size(PhysicalSize::new(self.width, self.height));
        let window = Arc::new(event_loop.create_window(attrs).expect("create window"));

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("create surface");

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .expect("find adapter");

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("drivekit_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .expect("create device");

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let egui_winit = egui_winit::State::new(
            self.egui_ctx.clone(),
            egui::ViewportId::ROOT,
            &window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(&device, surface_format, None, 1, false);

        self.window = Some(window);
        self.surface = Some(surface);
        self.device = Some(device);
        self.queue = Some(queue);
        self.config = Some(config);
        self.egui_winit = Some(egui_winit);
        self.egui_renderer = Some(egui_renderer);

        tracing::info!(
            "GPU initialized with {} backend",
            adapter.get_info().backend.to_str()
        );
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(egui_winit) = &mut self.egui_winit {
            let response = egui_winit.on_window_event(self.window.as_ref().unwrap(), &event);
            if response.consumed {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                self.session.shutdown();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let (Some(surface), Some(device), Some(config)) =
                    (&self.surface, &self.device, &mut self.config)
                {
                    config.width = new_size.width.max(1);
                    config.height = new_size.height.max(1);
                    surface.configure(device, config);
                }
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: key_state,
                        repeat: false,
                        ..
                    },
                ..
            } => {
                let Some(key) = translate_key(code) else {
                    return;
                };
                if key_state == ElementState::Pressed {
                    self.session.key_pressed(key);
                } else {
                    match self.session.key_released(key) {
                        Ok(LoopControl::Quit) => {
                            self.session.shutdown();
                            event_loop.exit();
                        }
                        Ok(LoopControl::Continue) => {}
                        Err(e) => {
                            tracing::error!("action failed: {e:#}");
                            self.session.shutdown();
                            event_loop.exit();
                        }
                    }
                }
            }
            WindowEvent::RedrawRequested => {
                self.clock.tick();
                match self.session.frame() {
                    Ok(LoopControl::Continue) => {}
                    Ok(LoopControl::Quit) => {
                        event_loop.exit();
                        return;
                    }
                    Err(e) => {
                        tracing::error!("simulation step failed: {e:#}");
                        self.session.shutdown();
                        event_loop.exit();
                        return;
                    }
                }
                self.refresh_camera_texture();

                let (Some(surface), Some(device), Some(queue)) =
                    (&self.surface, &self.device, &self.queue)
                else {
                    return;
                };

                let output = match surface.get_current_texture() {
                    Ok(t) => t,
                    Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                        if let Some(config) = &self.config {
                            surface.configure(device, config);
                        }
                        return;
                    }
                    Err(e) => {
                        tracing::error!("surface error: {e}");
                        return;
                    }
                };

                let view = output
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());

                let raw_input = self
                    .egui_winit
                    .as_mut()
                    .unwrap()
                    .take_egui_input(self.window.as_ref().unwrap());
                let session = &mut self.session;
                let camera_tex = self.camera_tex.as_ref();
                let full_output = self.egui_ctx.run(raw_input, |ctx| {
                    draw_ui(ctx, session, camera_tex);
                });

                self.egui_winit.as_mut().unwrap().handle_platform_output(
                    self.window.as_ref().unwrap(),
                    full_output.platform_output,
                );

                let paint_jobs = self
                    .egui_ctx
                    .tessellate(full_output.shapes, full_output.pixels_per_point);

                let screen_descriptor = egui_wgpu::ScreenDescriptor {
                    size_in_pixels: [
                        self.config.as_ref().unwrap().width,
                        self.config.as_ref().unwrap().height,
                    ],
                    pixels_per_point: full_output.pixels_per_point,
                };

                {
                    let egui_renderer = self.egui_renderer.as_mut().unwrap();
                    for (id, image_delta) in &full_output.textures_delta.set {
                        egui_renderer.update_texture(device, queue, *id, image_delta);
                    }
                    let mut encoder =
                        device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("egui_encoder"),
                        });
                    egui_renderer.update_buffers(
                        device,
                        queue,
                        &mut encoder,
                        &paint_jobs,
                        &screen_descriptor,
                    );
                    {
                        let mut pass = encoder
                            .begin_render_pass(&wgpu::RenderPassDescriptor {
                                label: Some("egui_pass"),
                                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                    view: &view,
                                    resolve_target: None,
                                    ops: wgpu::Operations {
                                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                                        store: wgpu::StoreOp::Store,
                                    },
                                })],
                                depth_stencil_attachment: None,
                                ..Default::default()
                            })
                            .forget_lifetime();
                        egui_renderer.render(&mut pass, &paint_jobs, &screen_descriptor);
                    }
                    queue.submit(std::iter::once(encoder.finish()));
                    for id in &full_output.textures_delta.free {
                        egui_renderer.free_texture(id);
                    }
                }

                output.present();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let (width, height) = parse_resolution(&cli.res)?;

    tracing::info!("listening to server {}:{}", cli.host, cli.port);
    let link = ServerLink::connect(&SimConfig::new(cli.host.clone(), cli.port))
        .with_context(|| format!("cannot reach simulator at {}:{}", cli.host, cli.port))?;

    let session = Session::start(
        link,
        &SessionOptions {
            filter: cli.filter,
            rolename: cli.rolename,
            width,
            height,
            gamma: cli.gamma,
            autopilot: cli.autopilot,
        },
    )?;

    // Ctrl+C must still run the session teardown, so it only raises a
    // flag that the frame loop turns into an orderly quit.
    let interrupt = session.interrupt_flag();
    ctrlc::set_handler(move || interrupt.store(true, Ordering::Relaxed))
        .context("failed to install interrupt handler")?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = GpuApp::new(session, width, height);
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parses_width_and_height() {
        assert_eq!(parse_resolution("1280x720").unwrap(), (1280, 720));
        assert!(parse_resolution("1280").is_err());
        assert!(parse_resolution("axb").is_err());
    }

    #[test]
    fn modifier_keys_translate_to_the_driving_set() {
        assert_eq!(translate_key(KeyCode::ShiftRight), Some(Key::Shift));
        assert_eq!(translate_key(KeyCode::ControlLeft), Some(Key::Ctrl));
        assert_eq!(translate_key(KeyCode::F2), None);
    }

    #[test]
    fn digits_map_to_sensor_slots() {
        assert_eq!(translate_key(KeyCode::Digit1), Some(Key::Digit(1)));
        assert_eq!(translate_key(KeyCode::Digit9), Some(Key::Digit(9)));
    }
}
