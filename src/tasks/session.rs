//! Live display sessions: a producer thread feeding one of three frame loops.

use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam_channel::Receiver;
use tracing::{debug, info, trace};

use crate::config::{Configuration, PanZoomOptions, PlotOptions};
use crate::events::{FrameEvent, ImageEvent};
use crate::render::headless::RecordingProvider;
use crate::render::{Color, RenderingProvider, viewer};
use crate::resource::Image;
use crate::resource::pixels::PixelArray;
use crate::tasks::bridge::{self, Bridge};
use crate::widget::{Listen, Progress, Widget, listen, parallel_union};
use crate::widgets::overlay::{Overlay, OverlayCtx, overlay_fn};
use crate::widgets::{DisplayImage, PlotFrame, display_image};

/// Plot content: drawn in data coordinates inside a y-up frame.
pub type PlotContent = Box<dyn Overlay<(), Output = ()> + Send>;

/// Window content: an arbitrary widget filling the window.
pub type WindowContent = Box<dyn Widget<Output = ()> + Send>;

/// Image content: pixels to show (a black placeholder when `None`) and an
/// overlay drawn in image coordinates.
pub struct ImageContent {
    pub pixels: Option<PixelArray>,
    pub overlay: Option<PlotContent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Active,
    Terminated,
}

/// One frame of a live session.
pub trait FrameLoop {
    /// Polls the quit listener, the active content and the data listener,
    /// then applies everything they produced. Ticking a terminated loop is a
    /// caller bug.
    fn tick(&mut self, ui: &mut dyn RenderingProvider) -> LoopState;
}

/// Window and timing settings for a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub background: Color,
    pub max_fps: Option<f64>,
    pub shutdown_grace: Duration,
    pub pan_zoom: PanZoomOptions,
    pub plot: PlotOptions,
}

impl SessionOptions {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::from(&Configuration::default())
        }
    }

    #[must_use]
    pub fn with_max_fps(mut self, max_fps: f64) -> Self {
        self.max_fps = Some(max_fps);
        self
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }
}

impl From<&Configuration> for SessionOptions {
    fn from(cfg: &Configuration) -> Self {
        Self {
            title: cfg.window.title.clone(),
            width: cfg.window.width,
            height: cfg.window.height,
            background: Color::from_rgb8(cfg.window.background),
            max_fps: Some(cfg.max_fps),
            shutdown_grace: cfg.shutdown_grace,
            pan_zoom: cfg.pan_zoom,
            plot: cfg.plot,
        }
    }
}

/// Quit and data listeners shared by every loop variant.
struct Inbox<T> {
    quit: Listen<()>,
    data: Listen<T>,
    terminated: bool,
}

impl<T> Inbox<T> {
    fn new(data: Receiver<T>, quit: Receiver<()>) -> Self {
        Self {
            quit: listen(quit),
            data: listen(data),
            terminated: false,
        }
    }

    fn enter(&self) {
        debug_assert!(!self.terminated, "ticked a terminated frame loop");
    }

    fn leave(&mut self, quit: bool) -> LoopState {
        if quit {
            info!("producer finished; closing session");
            self.terminated = true;
            LoopState::Terminated
        } else {
            LoopState::Active
        }
    }
}

enum Tick<D, C> {
    Quit,
    Data(D),
    Content(C),
}

fn blank_overlay() -> PlotContent {
    Box::new(overlay_fn(|_ctx: &mut OverlayCtx<'_>| Progress::<()>::Suspended))
}

pub struct PlotLoop {
    inbox: Inbox<PlotContent>,
    frame: PlotFrame<PlotContent>,
}

impl PlotLoop {
    pub fn new(
        first: PlotContent,
        data: Receiver<PlotContent>,
        quit: Receiver<()>,
        options: &SessionOptions,
    ) -> Self {
        Self {
            inbox: Inbox::new(data, quit),
            frame: PlotFrame::new("plot", &options.plot, first).pan_zoom_options(options.pan_zoom),
        }
    }

    #[must_use]
    pub const fn frame(&self) -> &PlotFrame<PlotContent> {
        &self.frame
    }
}

impl FrameLoop for PlotLoop {
    fn tick(&mut self, ui: &mut dyn RenderingProvider) -> LoopState {
        self.inbox.enter();
        let events = parallel_union::<Tick<PlotContent, FrameEvent<()>>>(
            ui,
            &mut [
                &mut (&mut self.inbox.quit).map(|()| Tick::Quit),
                &mut (&mut self.frame).map(Tick::Content),
                &mut (&mut self.inbox.data).map(Tick::Data),
            ],
        );
        let mut quit = false;
        for event in events {
            match event {
                Tick::Quit => quit = true,
                Tick::Data(content) => self.frame.set_overlay(content),
                Tick::Content(FrameEvent::View(view)) => self.frame.set_view(view),
                Tick::Content(FrameEvent::Overlay(())) => trace!("plot content completed"),
            }
        }
        self.inbox.leave(quit)
    }
}

pub struct WindowLoop {
    inbox: Inbox<WindowContent>,
    content: WindowContent,
}

impl WindowLoop {
    pub fn new(first: WindowContent, data: Receiver<WindowContent>, quit: Receiver<()>) -> Self {
        Self {
            inbox: Inbox::new(data, quit),
            content: first,
        }
    }
}

impl FrameLoop for WindowLoop {
    fn tick(&mut self, ui: &mut dyn RenderingProvider) -> LoopState {
        self.inbox.enter();
        let events = parallel_union::<Tick<WindowContent, ()>>(
            ui,
            &mut [
                &mut (&mut self.inbox.quit).map(|()| Tick::Quit),
                &mut (&mut self.content).map(Tick::Content),
                &mut (&mut self.inbox.data).map(Tick::Data),
            ],
        );
        let mut quit = false;
        for event in events {
            match event {
                Tick::Quit => quit = true,
                Tick::Data(content) => self.content = content,
                Tick::Content(()) => debug!("window content completed; ignoring"),
            }
        }
        self.inbox.leave(quit)
    }
}

pub struct ImageLoop {
    inbox: Inbox<ImageContent>,
    display: DisplayImage<PlotContent>,
}

impl ImageLoop {
    /// Uploads the first content's pixels through `ui`.
    pub fn new(
        ui: &mut dyn RenderingProvider,
        first: ImageContent,
        data: Receiver<ImageContent>,
        quit: Receiver<()>,
        options: &SessionOptions,
    ) -> Self {
        let image = Image::new(ui, first.pixels);
        let display = display_image("image", image)
            .pan_zoom_options(options.pan_zoom)
            .overlay(first.overlay.unwrap_or_else(blank_overlay));
        Self {
            inbox: Inbox::new(data, quit),
            display,
        }
    }

    /// Current image snapshot.
    #[must_use]
    pub fn image(&self) -> &Image {
        self.display.image()
    }
}

impl FrameLoop for ImageLoop {
    fn tick(&mut self, ui: &mut dyn RenderingProvider) -> LoopState {
        self.inbox.enter();
        let events = parallel_union::<Tick<ImageContent, ImageEvent<()>>>(
            ui,
            &mut [
                &mut (&mut self.inbox.quit).map(|()| Tick::Quit),
                &mut (&mut self.display).map(Tick::Content),
                &mut (&mut self.inbox.data).map(Tick::Data),
            ],
        );
        let mut quit = false;
        for event in events {
            match event {
                Tick::Quit => quit = true,
                Tick::Data(content) => {
                    self.display
                        .set_overlay(content.overlay.unwrap_or_else(blank_overlay));
                    self.display.image_mut().change_image(ui, content.pixels);
                }
                Tick::Content(ImageEvent::View { image, .. }) => self.display.set_image(image),
                Tick::Content(ImageEvent::Overlay(())) => trace!("image overlay completed"),
            }
        }
        self.inbox.leave(quit)
    }
}

/// Boxed producer sequence.
pub type Producer<T> = Box<dyn Iterator<Item = T> + Send>;

pub enum LiveProducer {
    Plot(Producer<PlotContent>),
    Window(Producer<WindowContent>),
    Image(Producer<ImageContent>),
}

/// Runs `producer` on a background thread and shows what it produces in a
/// window until the producer ends or the window is closed.
///
/// Blocks the calling thread, which must be the main thread. A producer that
/// ends without producing anything returns without opening a window.
pub fn run_live_session(producer: LiveProducer, options: &SessionOptions) -> Result<()> {
    match producer {
        LiveProducer::Plot(seq) => {
            let bridge = bridge::start(seq, options.max_fps).context("starting plot producer")?;
            run_bridged(bridge, options, |_ui, first, data, quit| {
                Box::new(PlotLoop::new(first, data, quit, options))
            })
        }
        LiveProducer::Window(seq) => {
            let bridge =
                bridge::start(seq, options.max_fps).context("starting window producer")?;
            run_bridged(bridge, options, |_ui, first, data, quit| {
                Box::new(WindowLoop::new(first, data, quit))
            })
        }
        LiveProducer::Image(seq) => {
            let bridge = bridge::start(seq, options.max_fps).context("starting image producer")?;
            run_bridged(bridge, options, |ui, first, data, quit| {
                Box::new(ImageLoop::new(ui, first, data, quit, options))
            })
        }
    }
}

fn run_bridged<T: Send + 'static>(
    bridge: Bridge<T>,
    options: &SessionOptions,
    make: impl FnOnce(&mut dyn RenderingProvider, T, Receiver<T>, Receiver<()>) -> Box<dyn FrameLoop>,
) -> Result<()> {
    let Bridge {
        data,
        quit,
        first,
        producer,
    } = bridge;
    let Some(first) = first else {
        info!("producer ended before its first value; not opening a window");
        producer.finish(options.shutdown_grace);
        return Ok(());
    };
    info!(title = %options.title, width = options.width, height = options.height, "starting live session");
    let result = viewer::run(options, move |ui| make(ui, first, data, quit));
    producer.finish(options.shutdown_grace);
    info!("live session ended");
    result
}

pub fn quick_plot<I>(producer: I, options: &SessionOptions) -> Result<()>
where
    I: IntoIterator<Item = PlotContent>,
    I::IntoIter: Send + 'static,
{
    run_live_session(LiveProducer::Plot(Box::new(producer.into_iter())), options)
}

pub fn quick_window<I>(producer: I, options: &SessionOptions) -> Result<()>
where
    I: IntoIterator<Item = WindowContent>,
    I::IntoIter: Send + 'static,
{
    run_live_session(LiveProducer::Window(Box::new(producer.into_iter())), options)
}

pub fn quick_image<I>(producer: I, options: &SessionOptions) -> Result<()>
where
    I: IntoIterator<Item = ImageContent>,
    I::IntoIter: Send + 'static,
{
    run_live_session(LiveProducer::Image(Box::new(producer.into_iter())), options)
}

/// Ticks `frame_loop` against a headless provider until it terminates or
/// `max_frames` have run. Returns the number of frames ticked.
pub fn drive(frame_loop: &mut dyn FrameLoop, ui: &mut RecordingProvider, max_frames: usize) -> usize {
    for frame in 0..max_frames {
        let state = frame_loop.tick(ui);
        ui.next_frame();
        if state == LoopState::Terminated {
            return frame + 1;
        }
    }
    max_frames
}
