//! Window host: owns the winit event loop and the GPU backend and ticks a
//! [`FrameLoop`] once per redraw.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use lyon::math::point;
use tracing::{debug, error, info, warn};
use wgpu::SurfaceError;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{ElementState, MouseButton as WinitButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowAttributes, WindowId},
};

use super::gpu::{FrameProvider, Gpu};
use super::{Color, MouseButton, PointerTracker, RenderingProvider};
use crate::tasks::session::{FrameLoop, LoopState, SessionOptions};

/// Pixel scroll deltas are converted to wheel notches at this rate.
const PIXELS_PER_NOTCH: f64 = 40.0;

struct ViewerApp<F> {
    title: String,
    size: PhysicalSize<u32>,
    background: Color,
    make_loop: Option<F>,
    frame_loop: Option<Box<dyn FrameLoop>>,
    window: Option<Arc<Window>>,
    gpu: Option<Gpu>,
    pointer: PointerTracker,
    frame: u64,
    failure: Option<anyhow::Error>,
}

impl<F> ViewerApp<F>
where
    F: FnOnce(&mut dyn RenderingProvider) -> Box<dyn FrameLoop>,
{
    fn new(options: &SessionOptions, make_loop: F) -> Self {
        Self {
            title: options.title.clone(),
            size: PhysicalSize::new(options.width.max(1), options.height.max(1)),
            background: options.background,
            make_loop: Some(make_loop),
            frame_loop: None,
            window: None,
            gpu: None,
            pointer: PointerTracker::default(),
            frame: 0,
            failure: None,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let attrs = WindowAttributes::default()
            .with_title(self.title.clone())
            .with_inner_size(self.size);
        match event_loop.create_window(attrs) {
            Ok(window) => {
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                self.failure = Some(anyhow!(err).context("failed to create viewer window"));
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let mut gpu = Gpu::new(window)?;
        if self.make_loop.is_some() {
            // The loop uploads its first resources before any frame runs.
            let mut ui = FrameProvider::new(&mut gpu, self.frame, self.pointer.begin_frame());
            self.install_loop(&mut ui);
        }
        self.gpu = Some(gpu);
        Ok(())
    }

    fn install_loop(&mut self, ui: &mut dyn RenderingProvider) {
        if let Some(make_loop) = self.make_loop.take() {
            self.frame_loop = Some(make_loop(ui));
            // Construction owns its frame index; the first tick gets the next one.
            self.frame = ui.frame_index() + 1;
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        gpu.resize(new_size.width, new_size.height);
        debug!(
            width = new_size.width,
            height = new_size.height,
            "viewer surface resized",
        );
        self.request_redraw();
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let (Some(gpu), Some(frame_loop)) = (self.gpu.as_mut(), self.frame_loop.as_mut()) else {
            return;
        };

        let mut ui = FrameProvider::new(gpu, self.frame, self.pointer.begin_frame());
        let state = frame_loop.tick(&mut ui);
        let rendered = ui.finish(self.background);
        self.frame += 1;

        if state == LoopState::Terminated {
            self.frame_loop = None;
            event_loop.exit();
            return;
        }

        match rendered {
            Ok(()) => {}
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                gpu.reconfigure();
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("viewer surface out of memory; exiting event loop");
                self.failure = Some(anyhow!("GPU surface out of memory"));
                event_loop.exit();
            }
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
            }
            Err(SurfaceError::Other) => {
                warn!("viewer surface reported an unknown error; retrying");
                gpu.reconfigure();
            }
        }
    }

    fn request_redraw(&self) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn pointer_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer
                    .moved(point(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => self.pointer.left(),
            WindowEvent::MouseInput { state, button, .. } => {
                let button = match button {
                    WinitButton::Left => MouseButton::Left,
                    WinitButton::Right => MouseButton::Right,
                    WinitButton::Middle => MouseButton::Middle,
                    _ => return,
                };
                self.pointer
                    .button(button, *state == ElementState::Pressed);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let notches = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => (pos.y / PIXELS_PER_NOTCH) as f32,
                };
                self.pointer.scrolled(notches);
            }
            _ => {}
        }
    }
}

impl<F> ApplicationHandler for ViewerApp<F>
where
    F: FnOnce(&mut dyn RenderingProvider) -> Box<dyn FrameLoop>,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.gpu.is_none()
            && let Err(err) = self.init_gpu(window)
        {
            error!(error = ?err, "failed to initialize GPU state");
            self.failure = Some(err);
            event_loop.exit();
            return;
        }

        self.request_redraw();
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                self.frame_loop = None;
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size);
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            other => self.pointer_event(&other),
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        // Live content changes without input, so every frame is redrawn.
        if self.frame_loop.is_some() {
            self.request_redraw();
        }
    }
}

/// Opens a window and ticks the loop built by `make_loop` once per frame
/// until the loop terminates or the window is closed.
///
/// Must be called from the main thread, once per process.
pub fn run<F>(options: &SessionOptions, make_loop: F) -> Result<()>
where
    F: FnOnce(&mut dyn RenderingProvider) -> Box<dyn FrameLoop>,
{
    let event_loop = EventLoop::new().context("failed to build viewer event loop")?;
    let mut app = ViewerApp::new(options, make_loop);
    let run_result = event_loop.run_app(&mut app);
    // Drop the loop (and the receivers it owns) before reporting.
    app.frame_loop = None;
    run_result.context("viewer event loop failed")?;
    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::RecordingProvider;
    use crate::tasks::session::{ImageContent, ImageLoop};
    use crossbeam_channel::bounded;

    #[test]
    fn first_tick_runs_on_a_fresh_frame_index() {
        let options = SessionOptions::new(100, 100);
        let (data_tx, data_rx) = bounded(1);
        let (_quit_tx, quit_rx) = bounded(1);
        let loop_options = options.clone();
        let mut app = ViewerApp::new(&options, move |ui: &mut dyn RenderingProvider| {
            let first = ImageContent {
                pixels: None,
                overlay: None,
            };
            Box::new(ImageLoop::new(ui, first, data_rx, quit_rx, &loop_options)) as Box<dyn FrameLoop>
        });

        let mut ui = RecordingProvider::new(100.0, 100.0);
        app.install_loop(&mut ui);
        assert_eq!(app.frame, ui.frame_index() + 1);

        data_tx
            .send(ImageContent {
                pixels: None,
                overlay: None,
            })
            .unwrap();
        ui.next_frame();
        assert_eq!(ui.frame_index(), app.frame);
        let frame_loop = app.frame_loop.as_mut().unwrap();
        assert_eq!(frame_loop.tick(&mut ui), LoopState::Active);
        assert_eq!(ui.uploads(), 2);
    }
}
