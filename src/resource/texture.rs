//! GPU texture ownership with one-frame-late reclamation.

use tracing::trace;

use crate::render::{RenderingProvider, TextureId};

/// One uploaded texture and its padded dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureResource {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Retired {
    texture: TextureResource,
    frame: u64,
}

/// Two-slot owner: the texture on screen and at most one retired texture
/// waiting for the frame that may still reference it to finish.
#[derive(Debug, Default)]
pub struct TextureSlots {
    current: Option<TextureResource>,
    garbage: Option<Retired>,
}

impl TextureSlots {
    #[must_use]
    pub fn current(&self) -> Option<TextureResource> {
        self.current
    }

    #[must_use]
    pub fn garbage(&self) -> Option<TextureResource> {
        self.garbage.map(|r| r.texture)
    }

    /// Installs `texture` as current. Any pending garbage is reclaimed
    /// immediately and the previous current texture becomes garbage.
    pub fn install(&mut self, ui: &mut dyn RenderingProvider, texture: TextureResource) {
        self.reclaim(ui);
        let frame = ui.frame_index();
        self.garbage = self
            .current
            .replace(texture)
            .map(|texture| Retired { texture, frame });
    }

    /// Frees the garbage texture now, whatever frame retired it.
    pub fn reclaim(&mut self, ui: &mut dyn RenderingProvider) {
        if let Some(retired) = self.garbage.take() {
            trace!(texture = retired.texture.id.0, "reclaiming retired texture");
            ui.remove_texture(retired.texture.id);
        }
    }

    /// Frees the garbage texture once the frame that retired it has passed.
    pub fn collect(&mut self, ui: &mut dyn RenderingProvider) {
        if self
            .garbage
            .is_some_and(|retired| retired.frame < ui.frame_index())
        {
            self.reclaim(ui);
        }
    }

    /// Frees both slots.
    pub fn release(&mut self, ui: &mut dyn RenderingProvider) {
        self.reclaim(ui);
        if let Some(texture) = self.current.take() {
            ui.remove_texture(texture.id);
        }
    }
}
