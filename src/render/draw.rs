//! Transform-aware draw helpers.
//!
//! Geometry is given in content space and mapped to screen space with the
//! caller's transform before it is queued. Line and stroke widths stay in
//! screen pixels so they look the same at every zoom level.

use lyon::math::{Box2D, Point, Transform};

use super::{Color, DrawCmd, RenderingProvider, TextureId};

fn map_rect(rect: &Box2D, transform: &Transform) -> Box2D {
    // A flipped transform swaps min/max on y; rebuild from both corners.
    Box2D::from_points([
        transform.transform_point(rect.min),
        transform.transform_point(rect.max),
    ])
}

/// Queues `texture` stretched over `dest`, sampling only `uv`.
pub fn image(
    ui: &mut dyn RenderingProvider,
    texture: TextureId,
    dest: Box2D,
    uv: Box2D,
    transform: &Transform,
) {
    ui.draw(DrawCmd::Image {
        texture,
        dest: map_rect(&dest, transform),
        uv,
    });
}

pub fn line(
    ui: &mut dyn RenderingProvider,
    from: Point,
    to: Point,
    color: Color,
    width: f32,
    transform: &Transform,
) {
    ui.draw(DrawCmd::Line {
        from: transform.transform_point(from),
        to: transform.transform_point(to),
        color,
        width,
    });
}

pub fn polyline(
    ui: &mut dyn RenderingProvider,
    points: &[Point],
    color: Color,
    width: f32,
    transform: &Transform,
) {
    if points.len() < 2 {
        return;
    }
    ui.draw(DrawCmd::Polyline {
        points: points.iter().map(|p| transform.transform_point(*p)).collect(),
        color,
        width,
    });
}

/// `stroke: None` fills.
pub fn rect(
    ui: &mut dyn RenderingProvider,
    rect: Box2D,
    color: Color,
    stroke: Option<f32>,
    transform: &Transform,
) {
    ui.draw(DrawCmd::Rect {
        rect: map_rect(&rect, transform),
        color,
        stroke,
    });
}

/// Circle of content-space `radius`. `stroke: None` fills.
pub fn circle(
    ui: &mut dyn RenderingProvider,
    center: Point,
    radius: f32,
    color: Color,
    stroke: Option<f32>,
    transform: &Transform,
) {
    ui.draw(DrawCmd::Circle {
        center: transform.transform_point(center),
        radius: radius * transform.m11.abs(),
        color,
        stroke,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::RecordingProvider;
    use lyon::math::point;

    #[test]
    fn flipped_rect_stays_well_formed() {
        let mut ui = RecordingProvider::new(100.0, 100.0);
        let tf = Transform::scale(10.0, -10.0).then_translate(lyon::math::vector(50.0, 50.0));
        rect(
            &mut ui,
            Box2D::new(point(0.0, 0.0), point(1.0, 2.0)),
            Color::WHITE,
            None,
            &tf,
        );
        let DrawCmd::Rect { rect, .. } = &ui.draws()[0] else {
            panic!("expected a rect");
        };
        assert_eq!(*rect, Box2D::new(point(50.0, 30.0), point(60.0, 50.0)));
    }

    #[test]
    fn circle_radius_follows_zoom_but_stroke_does_not() {
        let mut ui = RecordingProvider::new(100.0, 100.0);
        circle(
            &mut ui,
            point(1.0, 1.0),
            2.0,
            Color::BLACK,
            Some(1.5),
            &Transform::scale(3.0, 3.0),
        );
        assert_eq!(
            ui.draws()[0],
            DrawCmd::Circle {
                center: point(3.0, 3.0),
                radius: 6.0,
                color: Color::BLACK,
                stroke: Some(1.5),
            }
        );
    }

    #[test]
    fn degenerate_polyline_is_skipped() {
        let mut ui = RecordingProvider::new(10.0, 10.0);
        polyline(&mut ui, &[point(0.0, 0.0)], Color::WHITE, 1.0, &Transform::identity());
        assert!(ui.draws().is_empty());
    }
}
