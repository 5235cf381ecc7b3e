//! Persisted pan/zoom state mapping content space to widget-local pixels.

use lyon::math::{Box2D, Point, Size, Transform, Vector, point, vector};

/// Viewport assumed before a widget has reported its real size.
pub const DEFAULT_VIEWPORT: Size = Size::new(500.0, 500.0);

/// Pan offset plus uniform zoom scale.
///
/// Content point `p` lands at widget-local `(p.x * scale, ±p.y * scale) +
/// offset`; the y axis is negated for y-up content such as plots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub offset: Vector,
    pub scale: f32,
    pub flip_y: bool,
    /// Last viewport size the view was computed for.
    pub viewport: Size,
    /// Content rectangle the view fits when reset.
    pub content: Box2D,
    /// Set by a reset, cleared by any user pan or zoom. While set, viewport
    /// changes refit the content.
    pub auto_fit: bool,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::fitted(
            Box2D::new(point(0.0, 0.0), point(1.0, 1.0)),
            DEFAULT_VIEWPORT,
            false,
        )
    }
}

impl ViewTransform {
    /// View in which `content` is fully visible inside `viewport`.
    #[must_use]
    pub fn fitted(content: Box2D, viewport: Size, flip_y: bool) -> Self {
        let mut view = Self {
            offset: vector(0.0, 0.0),
            scale: 1.0,
            flip_y,
            viewport,
            content,
            auto_fit: true,
        };
        view.reset();
        view
    }

    /// Refits the stored content rectangle into the stored viewport.
    pub fn reset(&mut self) {
        let (w, h) = (self.content.width(), self.content.height());
        self.scale = if w > 0.0 && h > 0.0 && self.viewport.width > 0.0 && self.viewport.height > 0.0
        {
            (self.viewport.width / w).min(self.viewport.height / h)
        } else {
            1.0
        };
        let anchor = if self.flip_y {
            point(self.content.min.x, self.content.max.y)
        } else {
            self.content.min
        };
        let scaled = self.scaled(anchor);
        self.offset = -scaled;
        self.auto_fit = true;
    }

    /// Replaces the content rectangle and refits.
    pub fn reset_to(&mut self, content: Box2D) {
        self.content = content;
        self.reset();
    }

    /// Copy adjusted to a new viewport size; refits while auto-fitted.
    #[must_use]
    pub fn with_viewport(&self, viewport: Size) -> Self {
        let mut view = *self;
        view.viewport = viewport;
        if view.auto_fit {
            view.reset();
        }
        view
    }

    fn scaled(&self, p: Point) -> Vector {
        let y = if self.flip_y { -p.y } else { p.y };
        vector(p.x * self.scale, y * self.scale)
    }

    /// Content space to widget-local pixels.
    #[must_use]
    pub fn to_local(&self, p: Point) -> Point {
        (self.scaled(p) + self.offset).to_point()
    }

    /// Widget-local pixels to content space.
    #[must_use]
    pub fn from_local(&self, q: Point) -> Point {
        let v = (q.to_vector() - self.offset) / self.scale;
        if self.flip_y {
            point(v.x, -v.y)
        } else {
            v.to_point()
        }
    }

    /// Widget-local delta to content-space delta.
    #[must_use]
    pub fn delta_from_local(&self, d: Vector) -> Vector {
        let v = d / self.scale;
        if self.flip_y { vector(v.x, -v.y) } else { v }
    }

    /// Content space to screen space for a widget whose top-left corner is at
    /// `origin`.
    #[must_use]
    pub fn to_screen(&self, origin: Point) -> Transform {
        let sy = if self.flip_y { -self.scale } else { self.scale };
        Transform::scale(self.scale, sy).then_translate(self.offset + origin.to_vector())
    }

    /// Content rectangle currently visible in the viewport.
    #[must_use]
    pub fn visible(&self) -> Box2D {
        let a = self.from_local(point(0.0, 0.0));
        let b = self.from_local(point(self.viewport.width, self.viewport.height));
        Box2D::from_points([a, b])
    }

    /// Copy panned by a widget-local delta.
    #[must_use]
    pub fn panned(&self, delta: Vector) -> Self {
        let mut view = *self;
        view.offset += delta;
        view.auto_fit = false;
        view
    }

    /// Copy zoomed by `factor` keeping the content under the widget-local
    /// `anchor` fixed.
    #[must_use]
    pub fn zoomed_about(&self, factor: f32, anchor: Point, min_scale: f32, max_scale: f32) -> Self {
        let pinned = self.from_local(anchor);
        let mut view = *self;
        view.scale = (self.scale * factor).clamp(min_scale, max_scale);
        view.offset = anchor.to_vector() - view.scaled(pinned);
        view.auto_fit = false;
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point, b: Point) -> bool {
        (a - b).length() < 1e-3
    }

    #[test]
    fn fit_keeps_origin_and_whole_content_visible() {
        let view = ViewTransform::fitted(
            Box2D::new(point(0.0, 0.0), point(200.0, 100.0)),
            Size::new(500.0, 400.0),
            false,
        );
        assert_eq!(view.offset, vector(0.0, 0.0));
        assert!((view.scale - 2.5).abs() < 1e-6);
        let corner = view.to_local(point(200.0, 100.0));
        assert!(corner.x <= 500.0 && corner.y <= 400.0);
    }

    #[test]
    fn flipped_view_puts_top_of_content_at_top() {
        let view = ViewTransform::fitted(
            Box2D::new(point(-1.0, -1.0), point(1.0, 1.0)),
            Size::new(400.0, 400.0),
            true,
        );
        assert!(close(view.to_local(point(-1.0, 1.0)), point(0.0, 0.0)));
        assert!(close(view.to_local(point(1.0, -1.0)), point(400.0, 400.0)));
        assert!(close(view.from_local(point(200.0, 200.0)), point(0.0, 0.0)));
    }

    #[test]
    fn zoom_keeps_anchor_fixed() {
        let view = ViewTransform::fitted(
            Box2D::new(point(0.0, 0.0), point(100.0, 100.0)),
            Size::new(100.0, 100.0),
            false,
        );
        let anchor = point(30.0, 60.0);
        let before = view.from_local(anchor);
        let zoomed = view.zoomed_about(2.0, anchor, 0.01, 100.0);
        assert!((zoomed.scale - 2.0).abs() < 1e-6);
        assert!(close(zoomed.from_local(anchor), before));
        assert!(!zoomed.auto_fit);
    }

    #[test]
    fn viewport_change_refits_only_while_auto_fitted() {
        let view = ViewTransform::fitted(
            Box2D::new(point(0.0, 0.0), point(100.0, 100.0)),
            Size::new(100.0, 100.0),
            false,
        );
        let grown = view.with_viewport(Size::new(300.0, 200.0));
        assert!((grown.scale - 2.0).abs() < 1e-6);

        let panned = view.panned(vector(5.0, 5.0));
        let kept = panned.with_viewport(Size::new(300.0, 200.0));
        assert!((kept.scale - 1.0).abs() < 1e-6);
        assert_eq!(kept.offset, vector(5.0, 5.0));
    }

    #[test]
    fn screen_transform_matches_local_mapping() {
        let view = ViewTransform::fitted(
            Box2D::new(point(0.0, 0.0), point(10.0, 10.0)),
            Size::new(50.0, 50.0),
            true,
        );
        let origin = point(20.0, 30.0);
        let p = point(3.0, 4.0);
        let via_tf = view.to_screen(origin).transform_point(p);
        let via_local = view.to_local(p) + origin.to_vector();
        assert!(close(via_tf, via_local));
    }
}
