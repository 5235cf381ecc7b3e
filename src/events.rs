use lyon::math::{Point, Vector};

use crate::resource::Image;
use crate::view::ViewTransform;

/// Pointer activity over a displayed image, in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerEvent {
    /// Movement since the previous frame while the left button is held.
    Drag(Vector),
    /// Left button pressed at this position.
    Down(Point),
    /// Pointer over the image with no button held.
    Hover(Point),
}

/// Completion value of a display-image widget.
#[derive(Debug, Clone)]
pub enum ImageEvent<O> {
    /// The user panned or zoomed; `image` carries the new view.
    View { name: String, image: Image },
    /// The overlay completed with this value.
    Overlay(O),
}

/// Completion value of a plot frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameEvent<O> {
    View(ViewTransform),
    Overlay(O),
}
