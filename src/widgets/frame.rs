//! Y-up plot frame: grid, axes and a pannable data view hosting an overlay.

use lyon::math::{Box2D, Point, point};

use crate::config::{PanZoomOptions, PlotOptions};
use crate::events::FrameEvent;
use crate::render::{Color, RenderingProvider, draw};
use crate::view::ViewTransform;
use crate::widget::{Progress, ResumeStamp, Widget};

use super::overlay::{Overlay, OverlayCtx};
use super::pan_zoom::PanZoom;

const GRID: Color = Color::rgba(1.0, 1.0, 1.0, 0.12);
const AXIS: Color = Color::rgba(1.0, 1.0, 1.0, 0.45);
const TARGET_LINES: f32 = 8.0;

/// Hosts `overlay` in data coordinates. Completes with
/// [`FrameEvent::View`] when the user pans or zooms (the caller applies it
/// with [`PlotFrame::set_view`]) or with [`FrameEvent::Overlay`].
pub struct PlotFrame<O> {
    name: String,
    view: ViewTransform,
    grid: bool,
    overlay: O,
    pan_zoom: PanZoom,
    stamp: ResumeStamp,
}

impl<O: Overlay> PlotFrame<O> {
    pub fn new(name: impl Into<String>, options: &PlotOptions, overlay: O) -> Self {
        let [x0, y0, x1, y1] = options.bounds;
        Self {
            name: name.into(),
            view: ViewTransform::fitted(
                Box2D::new(point(x0, y0), point(x1, y1)),
                crate::view::DEFAULT_VIEWPORT,
                true,
            ),
            grid: options.grid,
            overlay,
            pan_zoom: PanZoom::default(),
            stamp: ResumeStamp::default(),
        }
    }

    #[must_use]
    pub fn pan_zoom_options(mut self, options: PanZoomOptions) -> Self {
        self.pan_zoom.set_options(options);
        self
    }

    #[must_use]
    pub const fn view(&self) -> ViewTransform {
        self.view
    }

    pub fn set_view(&mut self, view: ViewTransform) {
        self.view = view;
    }

    pub fn set_overlay(&mut self, overlay: O) {
        self.overlay = overlay;
    }

    fn draw_grid(&self, ui: &mut dyn RenderingProvider, view: &ViewTransform, origin: Point) {
        let tf = view.to_screen(origin);
        let visible = view.visible();
        if self.grid {
            let step_x = nice_step(visible.width() / TARGET_LINES);
            let step_y = nice_step(visible.height() / TARGET_LINES);
            for x in ticks(visible.min.x, visible.max.x, step_x) {
                draw::line(ui, point(x, visible.min.y), point(x, visible.max.y), GRID, 1.0, &tf);
            }
            for y in ticks(visible.min.y, visible.max.y, step_y) {
                draw::line(ui, point(visible.min.x, y), point(visible.max.x, y), GRID, 1.0, &tf);
            }
        }
        if (visible.min.y..=visible.max.y).contains(&0.0) {
            draw::line(ui, point(visible.min.x, 0.0), point(visible.max.x, 0.0), AXIS, 1.5, &tf);
        }
        if (visible.min.x..=visible.max.x).contains(&0.0) {
            draw::line(ui, point(0.0, visible.min.y), point(0.0, visible.max.y), AXIS, 1.5, &tf);
        }
    }
}

impl<O: Overlay> Widget for PlotFrame<O> {
    type Output = FrameEvent<O::Output>;

    fn poll(&mut self, ui: &mut dyn RenderingProvider) -> Progress<Self::Output> {
        self.stamp.enter(ui.frame_index());
        let region = ui.begin_child(&self.name, None);
        let pointer = ui.pointer();
        let changed = self.pan_zoom.step(&pointer, region, self.view, true);
        let view = changed.unwrap_or(self.view);

        self.draw_grid(ui, &view, region.min);
        let overlay = self.overlay.poll(&mut OverlayCtx {
            ui: &mut *ui,
            view,
            transform: view.to_screen(region.min),
            events: None,
        });
        ui.end_child();

        match changed {
            Some(view) => Progress::Completed(FrameEvent::View(view)),
            None => overlay.map(FrameEvent::Overlay),
        }
    }
}

/// Smallest of 1, 2 or 5 times a power of ten that is at least `raw`.
fn nice_step(raw: f32) -> f32 {
    if !raw.is_finite() || raw <= 0.0 {
        return 1.0;
    }
    let magnitude = 10f32.powf(raw.log10().floor());
    [1.0, 2.0, 5.0, 10.0]
        .into_iter()
        .map(|m| m * magnitude)
        .find(|step| *step >= raw)
        .unwrap_or(10.0 * magnitude)
}

fn ticks(from: f32, to: f32, step: f32) -> impl Iterator<Item = f32> {
    let first = (from / step).ceil() as i64;
    let last = (to / step).floor() as i64;
    (first..=last).map(move |k| k as f32 * step)
}
