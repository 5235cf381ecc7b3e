//! Headless rendering provider that records everything it is asked to do.
//!
//! Used by the test-suite and by [`crate::tasks::session::drive`] to run
//! session loops without a window or GPU.

use std::collections::BTreeMap;

use lyon::math::{Box2D, Size};
use tracing::warn;

use super::{DrawCmd, PointerState, RegionStack, RenderingProvider, TextureData, TextureId};

#[derive(Debug)]
pub struct RecordingProvider {
    size: Size,
    frame: u64,
    regions: RegionStack,
    pointer: PointerState,
    next_texture: u64,
    textures: BTreeMap<TextureId, TextureData>,
    uploads: usize,
    removals: usize,
    draws: Vec<DrawCmd>,
}

impl RecordingProvider {
    #[must_use]
    pub fn new(width: f32, height: f32) -> Self {
        let size = Size::new(width, height);
        Self {
            size,
            frame: 0,
            regions: RegionStack::new(size),
            pointer: PointerState::default(),
            next_texture: 1,
            textures: BTreeMap::new(),
            uploads: 0,
            removals: 0,
            draws: Vec::new(),
        }
    }

    /// Crosses a frame boundary: bumps the frame index, drops the previous
    /// frame's draw list and clears one-shot pointer state.
    pub fn next_frame(&mut self) {
        debug_assert_eq!(self.regions.depth(), 0, "frame ended with open child regions");
        self.frame += 1;
        self.draws.clear();
        self.regions = RegionStack::new(self.size);
        self.pointer.pressed = [false; 3];
        self.pointer.scroll = 0.0;
        self.pointer.delta = lyon::math::vector(0.0, 0.0);
    }

    pub fn set_pointer(&mut self, pointer: PointerState) {
        self.pointer = pointer;
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.size = Size::new(width, height);
        self.regions = RegionStack::new(self.size);
    }

    #[must_use]
    pub const fn uploads(&self) -> usize {
        self.uploads
    }

    #[must_use]
    pub const fn removals(&self) -> usize {
        self.removals
    }

    /// Textures uploaded and not yet removed.
    #[must_use]
    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    #[must_use]
    pub fn texture(&self, id: TextureId) -> Option<&TextureData> {
        self.textures.get(&id)
    }

    /// Draw commands queued during the current frame.
    #[must_use]
    pub fn draws(&self) -> &[DrawCmd] {
        &self.draws
    }
}

impl RenderingProvider for RecordingProvider {
    fn frame_index(&self) -> u64 {
        self.frame
    }

    fn region(&self) -> Box2D {
        self.regions.current()
    }

    fn begin_child(&mut self, _name: &str, size: Option<Size>) -> Box2D {
        self.regions.push_child(size)
    }

    fn end_child(&mut self) {
        self.regions.pop();
    }

    fn pointer(&self) -> PointerState {
        self.pointer
    }

    fn upload_texture(&mut self, data: TextureData) -> TextureId {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.uploads += 1;
        self.textures.insert(id, data);
        id
    }

    fn remove_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_some() {
            self.removals += 1;
        } else {
            warn!(texture = id.0, "removing unknown texture");
            debug_assert!(false, "texture {} removed twice or never uploaded", id.0);
        }
    }

    fn draw(&mut self, cmd: DrawCmd) {
        self.draws.push(cmd);
    }
}
