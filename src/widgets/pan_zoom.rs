//! Mouse pan and zoom over a [`ViewTransform`].

use lyon::math::{Box2D, vector};

use crate::config::PanZoomOptions;
use crate::render::{MouseButton, PointerState};
use crate::view::ViewTransform;

/// Per-widget pan/zoom state. Reports a new view whenever the user moved it
/// or the viewport changed size; it never writes the view back itself.
#[derive(Debug, Clone, Default)]
pub struct PanZoom {
    options: PanZoomOptions,
    panning: Option<MouseButton>,
}

impl PanZoom {
    #[must_use]
    pub fn new(options: PanZoomOptions) -> Self {
        Self {
            options,
            panning: None,
        }
    }

    pub fn set_options(&mut self, options: PanZoomOptions) {
        self.options = options;
    }

    /// Runs one frame for a widget occupying `region`.
    ///
    /// `left_pans` lets the left button pan as well as the right and middle
    /// buttons; hosts turn it off when the left button is claimed by pointer
    /// events.
    pub fn step(
        &mut self,
        pointer: &PointerState,
        region: Box2D,
        view: ViewTransform,
        left_pans: bool,
    ) -> Option<ViewTransform> {
        let mut next = if view.viewport == region.size() {
            view
        } else {
            view.with_viewport(region.size())
        };

        let hovered = pointer.is_over(&region);
        if let Some(button) = self.panning
            && !pointer.is_down(button)
        {
            self.panning = None;
        }
        if self.panning.is_none() && hovered {
            self.panning = [MouseButton::Right, MouseButton::Middle, MouseButton::Left]
                .into_iter()
                .filter(|b| left_pans || *b != MouseButton::Left)
                .find(|b| pointer.was_pressed(*b));
        }
        if self.panning.is_some() && pointer.delta != vector(0.0, 0.0) {
            next = next.panned(pointer.delta);
        }

        if hovered
            && pointer.scroll != 0.0
            && let Some(position) = pointer.position
        {
            let factor = self.options.zoom_step.powf(pointer.scroll);
            next = next.zoomed_about(
                factor,
                position - region.min.to_vector(),
                self.options.min_scale,
                self.options.max_scale,
            );
        }

        (next != view).then_some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyon::math::{Size, point};

    fn square_view() -> ViewTransform {
        ViewTransform::fitted(
            Box2D::new(point(0.0, 0.0), point(100.0, 100.0)),
            Size::new(100.0, 100.0),
            false,
        )
    }

    fn region() -> Box2D {
        Box2D::new(point(0.0, 0.0), point(100.0, 100.0))
    }

    #[test]
    fn idle_pointer_reports_nothing() {
        let mut pz = PanZoom::default();
        let pointer = PointerState {
            position: Some(point(50.0, 50.0)),
            ..PointerState::default()
        };
        assert_eq!(pz.step(&pointer, region(), square_view(), true), None);
    }

    #[test]
    fn right_drag_pans_until_release() {
        let mut pz = PanZoom::default();
        let mut pointer = PointerState {
            position: Some(point(50.0, 50.0)),
            ..PointerState::default()
        };
        pointer.down[1] = true;
        pointer.pressed[1] = true;
        let view = square_view();
        assert_eq!(pz.step(&pointer, region(), view, false), None);

        pointer.pressed[1] = false;
        pointer.delta = vector(5.0, -2.0);
        let panned = pz.step(&pointer, region(), view, false).unwrap();
        assert_eq!(panned.offset, vector(5.0, -2.0));

        pointer.down[1] = false;
        assert_eq!(pz.step(&pointer, region(), panned, false), None);
    }

    #[test]
    fn left_drag_pans_only_when_allowed() {
        let mut pz = PanZoom::default();
        let mut pointer = PointerState {
            position: Some(point(50.0, 50.0)),
            delta: vector(3.0, 3.0),
            ..PointerState::default()
        };
        pointer.down[0] = true;
        pointer.pressed[0] = true;
        assert_eq!(pz.step(&pointer, region(), square_view(), false), None);
        assert!(pz.step(&pointer, region(), square_view(), true).is_some());
    }

    #[test]
    fn wheel_zooms_about_pointer() {
        let mut pz = PanZoom::new(PanZoomOptions {
            zoom_step: 2.0,
            ..PanZoomOptions::default()
        });
        let pointer = PointerState {
            position: Some(point(20.0, 40.0)),
            scroll: 1.0,
            ..PointerState::default()
        };
        let view = square_view();
        let zoomed = pz.step(&pointer, region(), view, true).unwrap();
        assert!((zoomed.scale - 2.0).abs() < 1e-6);
        let pinned = zoomed.from_local(point(20.0, 40.0));
        assert!((pinned - point(20.0, 40.0)).length() < 1e-3);
    }

    #[test]
    fn resized_region_refits_auto_fitted_view() {
        let mut pz = PanZoom::default();
        let pointer = PointerState::default();
        let bigger = Box2D::new(point(0.0, 0.0), point(200.0, 300.0));
        let refit = pz.step(&pointer, bigger, square_view(), true).unwrap();
        assert_eq!(refit.viewport, Size::new(200.0, 300.0));
        assert!((refit.scale - 2.0).abs() < 1e-6);
    }
}
