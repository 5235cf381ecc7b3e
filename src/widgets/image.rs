//! Pannable, zoomable image display with an optional overlay.

use lyon::math::{Box2D, Size, point};

use crate::config::PanZoomOptions;
use crate::events::{ImageEvent, PointerEvent};
use crate::render::{MouseButton, PointerState, RenderingProvider, draw};
use crate::resource::Image;
use crate::view::ViewTransform;
use crate::widget::{Progress, ResumeStamp, Widget};

use super::overlay::{NoOverlay, Overlay, OverlayCtx, PointerEvents};
use super::pan_zoom::PanZoom;

/// Displays `image` in a child region named `name`.
///
/// The widget completes with [`ImageEvent::View`] when the user pans or zooms
/// (carrying a copy of the image with the new view; the caller stores it and
/// hands it back through [`DisplayImage::set_image`]) or with
/// [`ImageEvent::Overlay`] when the overlay completes. A view change wins if
/// both happen in the same frame.
pub fn display_image<T: Clone>(name: impl Into<String>, image: Image) -> DisplayImage<NoOverlay, T> {
    DisplayImage {
        name: name.into(),
        image,
        width: None,
        height: None,
        overlay: NoOverlay,
        drag_tag: None,
        down_tag: None,
        hover_tag: None,
        pan_zoom: PanZoom::default(),
        left_drag: false,
        stamp: ResumeStamp::default(),
    }
}

pub struct DisplayImage<O = NoOverlay, T = ()> {
    name: String,
    image: Image,
    width: Option<f32>,
    height: Option<f32>,
    overlay: O,
    drag_tag: Option<T>,
    down_tag: Option<T>,
    hover_tag: Option<T>,
    pan_zoom: PanZoom,
    left_drag: bool,
    stamp: ResumeStamp,
}

impl<O, T: Clone> DisplayImage<O, T> {
    #[must_use]
    pub fn size(self, width: f32, height: f32) -> Self {
        self.width(width).height(height)
    }

    #[must_use]
    pub fn width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    #[must_use]
    pub fn height(mut self, height: f32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn overlay<P: Overlay<T>>(self, overlay: P) -> DisplayImage<P, T> {
        DisplayImage {
            name: self.name,
            image: self.image,
            width: self.width,
            height: self.height,
            overlay,
            drag_tag: self.drag_tag,
            down_tag: self.down_tag,
            hover_tag: self.hover_tag,
            pan_zoom: self.pan_zoom,
            left_drag: self.left_drag,
            stamp: self.stamp,
        }
    }

    /// Tag for [`PointerEvent::Drag`]. Claims the left button from panning.
    #[must_use]
    pub fn drag_tag(mut self, tag: T) -> Self {
        self.drag_tag = Some(tag);
        self
    }

    /// Tag for [`PointerEvent::Down`]. Claims the left button from panning.
    #[must_use]
    pub fn down_tag(mut self, tag: T) -> Self {
        self.down_tag = Some(tag);
        self
    }

    #[must_use]
    pub fn hover_tag(mut self, tag: T) -> Self {
        self.hover_tag = Some(tag);
        self
    }

    #[must_use]
    pub fn pan_zoom_options(mut self, options: PanZoomOptions) -> Self {
        self.pan_zoom.set_options(options);
        self
    }

    #[must_use]
    pub const fn image(&self) -> &Image {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut Image {
        &mut self.image
    }

    /// Installs the snapshot to display from the next poll on.
    pub fn set_image(&mut self, image: Image) {
        self.image = image;
    }

    pub fn set_overlay(&mut self, overlay: O) {
        self.overlay = overlay;
    }

    fn has_tags(&self) -> bool {
        self.drag_tag.is_some() || self.down_tag.is_some() || self.hover_tag.is_some()
    }

    fn requested_size(&self, parent: Size) -> Option<Size> {
        if self.width.is_none() && self.height.is_none() {
            return None;
        }
        Some(Size::new(
            self.width.unwrap_or(parent.width),
            self.height.unwrap_or(parent.height),
        ))
    }

    fn pointer_events(
        &mut self,
        pointer: &PointerState,
        region: Box2D,
        view: &ViewTransform,
    ) -> PointerEvents<T> {
        let mut events = PointerEvents::default();
        let hovered = pointer.is_over(&region);
        let local = pointer.position.map(|p| view.from_local(p - region.min.to_vector()));

        if !pointer.is_down(MouseButton::Left) {
            self.left_drag = false;
        }
        if hovered && pointer.was_pressed(MouseButton::Left) {
            self.left_drag = true;
            if let (Some(tag), Some(at)) = (&self.down_tag, local) {
                events.push(tag.clone(), PointerEvent::Down(at));
            }
        }
        if self.left_drag
            && let Some(tag) = &self.drag_tag
        {
            events.push(tag.clone(), PointerEvent::Drag(view.delta_from_local(pointer.delta)));
        }
        if hovered
            && !pointer.any_down()
            && let (Some(tag), Some(at)) = (&self.hover_tag, local)
        {
            events.push(tag.clone(), PointerEvent::Hover(at));
        }
        events
    }
}

impl<O, T> Widget for DisplayImage<O, T>
where
    O: Overlay<T>,
    T: Clone,
{
    type Output = ImageEvent<O::Output>;

    fn poll(&mut self, ui: &mut dyn RenderingProvider) -> Progress<Self::Output> {
        self.stamp.enter(ui.frame_index());
        self.image.collect_garbage(ui);

        let size = self.requested_size(ui.region().size());
        let region = ui.begin_child(&self.name, size);
        let pointer = ui.pointer();

        let left_pans = self.drag_tag.is_none() && self.down_tag.is_none();
        let changed = self
            .pan_zoom
            .step(&pointer, region, self.image.view(), left_pans);
        let view = changed.unwrap_or_else(|| self.image.view());
        let transform = view.to_screen(region.min);

        if let Some(texture) = self.image.texture() {
            let dest = Box2D::from_origin_and_size(point(0.0, 0.0), self.image.logical_extent());
            draw::image(ui, texture.id, dest, self.image.crop().uv_rect(), &transform);
        }

        let events = self
            .has_tags()
            .then(|| self.pointer_events(&pointer, region, &view));
        let overlay = self.overlay.poll(&mut OverlayCtx {
            ui: &mut *ui,
            view,
            transform,
            events: events.as_ref(),
        });
        ui.end_child();

        if let Some(view) = changed {
            return Progress::Completed(ImageEvent::View {
                name: self.name.clone(),
                image: self.image.with_view(view),
            });
        }
        overlay.map(ImageEvent::Overlay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::DrawCmd;
    use crate::render::headless::RecordingProvider;
    use crate::resource::pixels::PixelArray;
    use crate::widgets::overlay::overlay_fn;
    use lyon::math::vector;
    use ndarray::Array3;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Tag {
        Down,
        Drag,
        Hover,
    }

    fn rgb(w: usize, h: usize) -> PixelArray {
        PixelArray::try_from(Array3::<u8>::zeros((h, w, 3))).unwrap()
    }

    #[test]
    fn draws_image_quad_with_cropped_uvs() {
        let mut ui = RecordingProvider::new(500.0, 500.0);
        let image = Image::new(&mut ui, Some(rgb(10, 6)));
        let mut widget = display_image::<()>("img", image);
        assert!(matches!(widget.poll(&mut ui), Progress::Suspended));
        let DrawCmd::Image { uv, dest, .. } = &ui.draws()[0] else {
            panic!("expected an image quad");
        };
        assert!((uv.max.x - 10.0 / 12.0).abs() < 1e-6);
        assert!((uv.max.y - 0.75).abs() < 1e-6);
        assert!((dest.width() - 500.0).abs() < 1e-3);
    }

    #[test]
    fn down_and_hover_events_reach_the_overlay() {
        let mut ui = RecordingProvider::new(500.0, 500.0);
        let image = Image::new(&mut ui, Some(rgb(100, 100)));
        let mut widget = display_image("img", image)
            .down_tag(Tag::Down)
            .hover_tag(Tag::Hover)
            .overlay(overlay_fn(|ctx: &mut OverlayCtx<'_, Tag>| {
                let seen: Vec<_> = ctx.events().cloned().collect();
                if seen.is_empty() {
                    Progress::Suspended
                } else {
                    Progress::Completed(seen)
                }
            }));

        ui.set_pointer(PointerState {
            position: Some(point(250.0, 100.0)),
            ..PointerState::default()
        });
        let Progress::Completed(ImageEvent::Overlay(seen)) = widget.poll(&mut ui) else {
            panic!("expected hover event");
        };
        assert_eq!(seen, vec![(Tag::Hover, PointerEvent::Hover(point(50.0, 20.0)))]);

        ui.next_frame();
        let mut pressed = PointerState {
            position: Some(point(250.0, 100.0)),
            ..PointerState::default()
        };
        pressed.down[0] = true;
        pressed.pressed[0] = true;
        ui.set_pointer(pressed);
        let Progress::Completed(ImageEvent::Overlay(seen)) = widget.poll(&mut ui) else {
            panic!("expected down event");
        };
        assert_eq!(seen, vec![(Tag::Down, PointerEvent::Down(point(50.0, 20.0)))]);
    }

    #[test]
    fn wheel_completes_with_new_snapshot_and_leaves_original_alone() {
        let mut ui = RecordingProvider::new(500.0, 500.0);
        let image = Image::new(&mut ui, Some(rgb(100, 100)));
        let before = image.view();
        let mut widget = display_image::<()>("img", image.clone());
        ui.set_pointer(PointerState {
            position: Some(point(100.0, 100.0)),
            scroll: 1.0,
            ..PointerState::default()
        });
        let Progress::Completed(ImageEvent::View { name, image: zoomed }) = widget.poll(&mut ui)
        else {
            panic!("expected view change");
        };
        assert_eq!(name, "img");
        assert!(zoomed.view().scale > before.scale);
        assert_eq!(image.view(), before);
        assert_eq!(widget.image().view(), before);
        assert_eq!(zoomed.texture(), image.texture());
    }

    #[test]
    fn drag_reports_image_space_deltas_until_release() {
        let mut ui = RecordingProvider::new(500.0, 500.0);
        let image = Image::new(&mut ui, Some(rgb(100, 100)));
        let fitted = image.view();
        assert!((fitted.scale - 5.0).abs() < 1e-6);
        let mut widget = display_image("img", image)
            .drag_tag(Tag::Drag)
            .overlay(overlay_fn(|ctx: &mut OverlayCtx<'_, Tag>| {
                let seen: Vec<_> = ctx.events().cloned().collect();
                if seen.is_empty() {
                    Progress::Suspended
                } else {
                    Progress::Completed(seen)
                }
            }));

        let mut held = PointerState {
            position: Some(point(250.0, 100.0)),
            ..PointerState::default()
        };
        held.down[0] = true;
        held.pressed[0] = true;
        ui.set_pointer(held);
        let Progress::Completed(ImageEvent::Overlay(seen)) = widget.poll(&mut ui) else {
            panic!("expected drag start");
        };
        assert_eq!(seen, vec![(Tag::Drag, PointerEvent::Drag(vector(0.0, 0.0)))]);

        held.pressed[0] = false;
        for (moved, expected) in [
            (vector(10.0, 5.0), vector(2.0, 1.0)),
            (vector(-20.0, 15.0), vector(-4.0, 3.0)),
        ] {
            ui.next_frame();
            held.delta = moved;
            ui.set_pointer(held);
            let Progress::Completed(ImageEvent::Overlay(seen)) = widget.poll(&mut ui) else {
                panic!("expected a drag delta, not a pan");
            };
            assert_eq!(seen, vec![(Tag::Drag, PointerEvent::Drag(expected))]);
        }
        assert_eq!(widget.image().view(), fitted);

        ui.next_frame();
        ui.set_pointer(PointerState {
            position: Some(point(300.0, 120.0)),
            delta: vector(8.0, 8.0),
            ..PointerState::default()
        });
        assert!(matches!(widget.poll(&mut ui), Progress::Suspended));
    }
}
