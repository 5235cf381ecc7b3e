//! Overlays: content drawn on top of an image or plot in its coordinate
//! space, optionally listening to tagged pointer events.

use std::convert::Infallible;

use lyon::math::{Box2D, Point, Transform};

use crate::events::PointerEvent;
use crate::render::{Color, RenderingProvider, draw};
use crate::view::ViewTransform;
use crate::widget::Progress;

/// This frame's tagged pointer events.
#[derive(Debug, Clone)]
pub struct PointerEvents<T> {
    events: Vec<(T, PointerEvent)>,
}

impl<T> Default for PointerEvents<T> {
    fn default() -> Self {
        Self { events: Vec::new() }
    }
}

impl<T> PointerEvents<T> {
    pub fn push(&mut self, tag: T, event: PointerEvent) {
        self.events.push((tag, event));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(T, PointerEvent)> {
        self.events.iter()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl<T: PartialEq> PointerEvents<T> {
    /// Events carrying `tag`.
    pub fn tagged<'a>(&'a self, tag: &'a T) -> impl Iterator<Item = PointerEvent> + 'a {
        self.events
            .iter()
            .filter(move |(t, _)| t == tag)
            .map(|(_, e)| *e)
    }
}

/// Everything an overlay may use during one frame.
pub struct OverlayCtx<'a, T = ()> {
    pub ui: &'a mut dyn RenderingProvider,
    pub view: ViewTransform,
    /// Content space to screen space.
    pub transform: Transform,
    /// Present only when the host was given at least one event tag.
    pub events: Option<&'a PointerEvents<T>>,
}

impl<'a, T> OverlayCtx<'a, T> {
    pub fn line(&mut self, from: Point, to: Point, color: Color, width: f32) {
        draw::line(self.ui, from, to, color, width, &self.transform);
    }

    pub fn polyline(&mut self, points: &[Point], color: Color, width: f32) {
        draw::polyline(self.ui, points, color, width, &self.transform);
    }

    pub fn rect(&mut self, rect: Box2D, color: Color, stroke: Option<f32>) {
        draw::rect(self.ui, rect, color, stroke, &self.transform);
    }

    pub fn circle(&mut self, center: Point, radius: f32, color: Color, stroke: Option<f32>) {
        draw::circle(self.ui, center, radius, color, stroke, &self.transform);
    }

    pub fn events(&self) -> impl Iterator<Item = &'a (T, PointerEvent)> + use<'a, T> {
        self.events.into_iter().flat_map(|events| events.iter())
    }
}

pub trait Overlay<T = ()> {
    type Output;

    fn poll(&mut self, ctx: &mut OverlayCtx<'_, T>) -> Progress<Self::Output>;
}

impl<T, O: Overlay<T> + ?Sized> Overlay<T> for Box<O> {
    type Output = O::Output;

    fn poll(&mut self, ctx: &mut OverlayCtx<'_, T>) -> Progress<Self::Output> {
        (**self).poll(ctx)
    }
}

/// Overlay that draws nothing and never completes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOverlay;

impl<T> Overlay<T> for NoOverlay {
    type Output = Infallible;

    fn poll(&mut self, _ctx: &mut OverlayCtx<'_, T>) -> Progress<Infallible> {
        Progress::Suspended
    }
}

/// Overlay backed by a closure called once per frame.
pub fn overlay_fn<T, U, F>(f: F) -> FnOverlay<F>
where
    F: FnMut(&mut OverlayCtx<'_, T>) -> Progress<U>,
{
    FnOverlay(f)
}

pub struct FnOverlay<F>(F);

impl<T, U, F> Overlay<T> for FnOverlay<F>
where
    F: FnMut(&mut OverlayCtx<'_, T>) -> Progress<U>,
{
    type Output = U;

    fn poll(&mut self, ctx: &mut OverlayCtx<'_, T>) -> Progress<U> {
        (self.0)(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::RecordingProvider;
    use crate::render::DrawCmd;
    use lyon::math::point;

    #[test]
    fn tagged_filters_by_label() {
        let mut events = PointerEvents::default();
        events.push("a", PointerEvent::Down(point(1.0, 2.0)));
        events.push("b", PointerEvent::Hover(point(3.0, 4.0)));
        let a: Vec<_> = events.tagged(&"a").collect();
        assert_eq!(a, vec![PointerEvent::Down(point(1.0, 2.0))]);
    }

    #[test]
    fn ctx_draws_through_its_transform() {
        let mut ui = RecordingProvider::new(100.0, 100.0);
        let mut ctx: OverlayCtx<'_> = OverlayCtx {
            ui: &mut ui,
            view: ViewTransform::default(),
            transform: Transform::translation(10.0, 20.0),
            events: None,
        };
        ctx.line(point(0.0, 0.0), point(1.0, 1.0), Color::WHITE, 2.0);
        assert_eq!(ctx.events().count(), 0);
        assert!(matches!(
            ui.draws()[0],
            DrawCmd::Line { from, .. } if from == point(10.0, 20.0)
        ));
    }
}
