//! Rendering provider contract shared by the window backend and the headless
//! recorder.
//!
//! Widgets never talk to wgpu directly: every frame they receive a
//! `&mut dyn RenderingProvider`, queue [`DrawCmd`]s into it, read the pointer
//! snapshot and upload/remove textures. All coordinates are physical screen
//! pixels with the origin in the top-left corner.

pub mod draw;
pub(crate) mod gpu;
pub mod headless;
pub mod viewer;

use lyon::math::{Box2D, Point, Size, Vector, point, vector};

/// Opaque handle of a texture owned by a rendering provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

/// Tightly packed RGBA8 pixels ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    /// RGBA value at column `x`, row `y`.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        let px = self.rgba.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

/// Linear RGBA color, components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Self = Self::rgba(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::rgba(1.0, 1.0, 1.0, 1.0);

    #[must_use]
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[must_use]
    pub fn from_rgb8(rgb: [u8; 3]) -> Self {
        Self::rgba(
            f32::from(rgb[0]) / 255.0,
            f32::from(rgb[1]) / 255.0,
            f32::from(rgb[2]) / 255.0,
            1.0,
        )
    }

    #[must_use]
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    const fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
            Self::Middle => 2,
        }
    }
}

/// Per-frame pointer snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    /// Cursor position, `None` while the cursor is outside the window.
    pub position: Option<Point>,
    /// Cursor movement since the previous frame.
    pub delta: Vector,
    /// Wheel movement this frame in notches; positive scrolls away from the user.
    pub scroll: f32,
    pub down: [bool; 3],
    /// Buttons that went down during this frame.
    pub pressed: [bool; 3],
}

impl PointerState {
    #[must_use]
    pub const fn is_down(&self, button: MouseButton) -> bool {
        self.down[button.index()]
    }

    #[must_use]
    pub const fn was_pressed(&self, button: MouseButton) -> bool {
        self.pressed[button.index()]
    }

    #[must_use]
    pub fn any_down(&self) -> bool {
        self.down.iter().any(|d| *d)
    }

    /// Whether the cursor is inside `region`.
    #[must_use]
    pub fn is_over(&self, region: &Box2D) -> bool {
        self.position.is_some_and(|p| region.contains(p))
    }
}

/// Accumulates raw input between frames and hands out one [`PointerState`]
/// per frame.
#[derive(Debug, Default)]
pub struct PointerTracker {
    position: Option<Point>,
    last_position: Option<Point>,
    down: [bool; 3],
    pressed: [bool; 3],
    scroll: f32,
}

impl PointerTracker {
    pub fn moved(&mut self, position: Point) {
        self.position = Some(position);
    }

    pub fn left(&mut self) {
        self.position = None;
    }

    pub fn button(&mut self, button: MouseButton, down: bool) {
        let idx = button.index();
        if down && !self.down[idx] {
            self.pressed[idx] = true;
        }
        self.down[idx] = down;
    }

    pub fn scrolled(&mut self, notches: f32) {
        self.scroll += notches;
    }

    /// Snapshot for the frame about to run; resets per-frame accumulators.
    pub fn begin_frame(&mut self) -> PointerState {
        let delta = match (self.last_position, self.position) {
            (Some(prev), Some(cur)) => cur - prev,
            _ => vector(0.0, 0.0),
        };
        let state = PointerState {
            position: self.position,
            delta,
            scroll: self.scroll,
            down: self.down,
            pressed: self.pressed,
        };
        self.last_position = self.position;
        self.pressed = [false; 3];
        self.scroll = 0.0;
        state
    }
}

/// A single queued draw operation in screen space.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    Image {
        texture: TextureId,
        dest: Box2D,
        uv: Box2D,
    },
    Line {
        from: Point,
        to: Point,
        color: Color,
        width: f32,
    },
    Polyline {
        points: Vec<Point>,
        color: Color,
        width: f32,
    },
    /// `stroke: None` fills the rectangle.
    Rect {
        rect: Box2D,
        color: Color,
        stroke: Option<f32>,
    },
    /// `stroke: None` fills the circle.
    Circle {
        center: Point,
        radius: f32,
        color: Color,
        stroke: Option<f32>,
    },
}

/// Immediate-mode backend: draw primitives, one frame boundary per tick,
/// texture upload/removal and pointer queries.
///
/// Implementations are used from the render thread only.
pub trait RenderingProvider {
    /// Monotonic index of the frame currently being built.
    fn frame_index(&self) -> u64;

    /// Region of the innermost open container.
    fn region(&self) -> Box2D;

    /// Opens a child container at the current region's origin. `None` fills
    /// the parent. Returns the (clipped) child region.
    fn begin_child(&mut self, name: &str, size: Option<Size>) -> Box2D;

    fn end_child(&mut self);

    fn pointer(&self) -> PointerState;

    fn upload_texture(&mut self, data: TextureData) -> TextureId;

    fn remove_texture(&mut self, id: TextureId);

    fn draw(&mut self, cmd: DrawCmd);
}

/// Nested container regions for one frame.
#[derive(Debug, Clone)]
pub struct RegionStack {
    stack: Vec<Box2D>,
}

impl RegionStack {
    #[must_use]
    pub fn new(root: Size) -> Self {
        Self {
            stack: vec![Box2D::from_origin_and_size(point(0.0, 0.0), root)],
        }
    }

    #[must_use]
    pub fn current(&self) -> Box2D {
        self.stack[self.stack.len() - 1]
    }

    pub fn push_child(&mut self, size: Option<Size>) -> Box2D {
        let parent = self.current();
        let size = size.unwrap_or_else(|| parent.size());
        let child = Box2D::from_origin_and_size(parent.min, size)
            .intersection(&parent)
            .unwrap_or(Box2D::from_origin_and_size(parent.min, Size::zero()));
        self.stack.push(child);
        child
    }

    pub fn pop(&mut self) {
        debug_assert!(self.stack.len() > 1, "end_child without matching begin_child");
        if self.stack.len() > 1 {
            self.stack.pop();
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }
}
