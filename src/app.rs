use std::sync::Arc;
use std::time::Instant;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::fs::{DiskSource, FileSource};
use crate::gpu::GpuContext;
use crate::hot_reload::{ChangeFeed, DirMonitor, NullFeed};
use crate::renderer::Renderer;

/// Context handed to the frame closure once per redraw.
pub struct Frame<'a> {
    pub renderer: &'a mut Renderer<GpuContext>,
    /// Seconds since the renderer booted.
    pub time: f32,
    /// Seconds since the previous frame.
    pub dt: f32,
}

/// Opens a window, boots a [`Renderer`] on it and runs the event loop.
///
/// `setup` runs once after boot and returns the application state; `frame`
/// runs on every redraw, before the renderer records and presents. The
/// window's close button ends the loop.
///
/// # Errors
///
/// Startup failures (no window, no suitable GPU, a bad document, a shader
/// that does not compile) and fatal frame errors are logged with their kind
/// string and returned once the loop has exited.
///
/// # Example
/// ```ignore
/// kiln::run(
///     EngineConfig::new().title("Spinning cube"),
///     |renderer| {
///         renderer.set_camera(Some(Camera::new().at(0.0, 0.0, 5.0)));
///         Ok((renderer.create_mesh(&MeshData::cube())?, renderer.material("red")))
///     },
///     |(cube, red), frame| {
///         if let Some(red) = *red {
///             let spin = Transform::new().rotation(Vec3::new(0.0, frame.time * 45.0, 0.0));
///             frame.renderer.draw_mesh(*cube, spin, red);
///         }
///     },
/// )
/// ```
pub fn run<T, S, F>(config: EngineConfig, setup: S, frame: F) -> Result<()>
where
    T: 'static,
    S: FnOnce(&mut Renderer<GpuContext>) -> Result<T> + 'static,
    F: FnMut(&mut T, &mut Frame<'_>) + 'static,
{
    let event_loop = EventLoop::new()
        .map_err(|err| Error::Library(format!("failed to create event loop: {err}")))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = KilnApp {
        phase: Phase::Pending {
            config,
            setup,
            frame,
        },
        failure: None,
    };

    event_loop
        .run_app(&mut app)
        .map_err(|err| Error::Library(format!("event loop failed: {err}")))?;

    match app.failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct Running<T, F> {
    window: Arc<Window>,
    renderer: Renderer<GpuContext>,
    state: T,
    frame: F,
    start_time: Instant,
    last_frame: Instant,
}

enum Phase<T, S, F> {
    Pending {
        config: EngineConfig,
        setup: S,
        frame: F,
    },
    Running(Box<Running<T, F>>),
    Stopped,
}

struct KilnApp<T, S, F> {
    phase: Phase<T, S, F>,
    failure: Option<Error>,
}

impl<T, S, F> KilnApp<T, S, F> {
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Error) {
        log::error!("fatal [{}]: {err}", err.kind());
        self.failure = Some(err);
        self.phase = Phase::Stopped;
        event_loop.exit();
    }
}

fn start<T, S, F>(
    event_loop: &ActiveEventLoop,
    config: EngineConfig,
    setup: S,
    frame: F,
) -> Result<Running<T, F>>
where
    S: FnOnce(&mut Renderer<GpuContext>) -> Result<T>,
{
    let window_attrs = WindowAttributes::default()
        .with_title(&config.window.title)
        .with_inner_size(winit::dpi::LogicalSize::new(
            config.window.width,
            config.window.height,
        ));
    let window = Arc::new(
        event_loop
            .create_window(window_attrs)
            .map_err(|err| Error::Library(format!("failed to create window: {err}")))?,
    );

    let gpu = GpuContext::new(window.clone(), &config.renderer)?;
    let files: Arc<dyn FileSource> = Arc::new(DiskSource::new(&config.assets.root));
    let feed: Box<dyn ChangeFeed> = if config.renderer.hot_reload {
        match DirMonitor::new(config.shader_root()) {
            Ok(monitor) => Box::new(monitor),
            Err(err) => {
                log::warn!("shader hot reload disabled: {err}");
                Box::new(NullFeed)
            }
        }
    } else {
        Box::new(NullFeed)
    };

    let mut renderer = Renderer::boot(gpu, &config, files, feed)?;
    let state = setup(&mut renderer)?;
    log::info!("renderer ready");

    let now = Instant::now();
    Ok(Running {
        window,
        renderer,
        state,
        frame,
        start_time: now,
        last_frame: now,
    })
}

impl<T, S, F> ApplicationHandler for KilnApp<T, S, F>
where
    S: FnOnce(&mut Renderer<GpuContext>) -> Result<T>,
    F: FnMut(&mut T, &mut Frame<'_>),
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !matches!(self.phase, Phase::Pending { .. }) {
            return;
        }
        let Phase::Pending {
            config,
            setup,
            frame,
        } = std::mem::replace(&mut self.phase, Phase::Stopped)
        else {
            return;
        };

        match start(event_loop, config, setup, frame) {
            Ok(running) => {
                running.window.request_redraw();
                self.phase = Phase::Running(Box::new(running));
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Phase::Running(running) = &mut self.phase else {
            return;
        };

        let result = match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
                Ok(())
            }
            WindowEvent::Resized(size) => running.renderer.resize(size.width, size.height),
            WindowEvent::RedrawRequested => {
                let now = Instant::now();
                let time = running.start_time.elapsed().as_secs_f32();
                let dt = now.duration_since(running.last_frame).as_secs_f32();
                running.last_frame = now;

                let mut frame = Frame {
                    renderer: &mut running.renderer,
                    time,
                    dt,
                };
                (running.frame)(&mut running.state, &mut frame);

                let result = running.renderer.draw_frame().map(|_| ());
                running.window.request_redraw();
                result
            }
            _ => Ok(()),
        };

        if let Err(err) = result {
            self.fail(event_loop, err);
        }
    }
}
