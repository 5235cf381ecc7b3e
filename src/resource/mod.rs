//! Image state: GPU texture lifecycle plus the persisted pan/zoom view.
//!
//! The texture half of an [`Image`] is shared by every snapshot cloned from
//! it and lives on the render thread only; the view half is a plain value per
//! snapshot, so handing out a snapshot with a new view never changes one
//! somebody else already holds.

pub mod pixels;
pub mod texture;

use std::cell::RefCell;
use std::rc::Rc;

use lyon::math::{Box2D, Size, point};
use tracing::{debug, warn};

use crate::error::Error;
use crate::render::{RenderingProvider, TextureId};
use crate::view::{DEFAULT_VIEWPORT, ViewTransform};
use pixels::{CropFraction, PixelArray};
use texture::{TextureResource, TextureSlots};

#[derive(Debug, Default)]
struct Textures {
    slots: TextureSlots,
    logical: (u32, u32),
    crop: CropFraction,
    last_changed: Option<u64>,
}

/// Pannable, zoomable image state.
#[derive(Debug, Clone)]
pub struct Image {
    textures: Rc<RefCell<Textures>>,
    last_dims: Option<(u32, u32)>,
    view: ViewTransform,
}

impl Image {
    /// Uploads `pixels` (or a black placeholder) and fits the view to it.
    pub fn new(ui: &mut dyn RenderingProvider, pixels: Option<PixelArray>) -> Self {
        let mut image = Self {
            textures: Rc::default(),
            last_dims: None,
            view: ViewTransform::fitted(
                Box2D::new(point(0.0, 0.0), point(1.0, 1.0)),
                DEFAULT_VIEWPORT,
                false,
            ),
        };
        image.change_image(ui, pixels);
        image
    }

    /// Replaces the displayed pixels.
    ///
    /// The previous texture is kept alive as garbage for one more frame; any
    /// older garbage is freed right away. If the logical size changed the
    /// view is refitted. Call at most once per frame.
    pub fn change_image(&mut self, ui: &mut dyn RenderingProvider, pixels: Option<PixelArray>) {
        let frame = ui.frame_index();
        let mut textures = self.textures.borrow_mut();
        if textures.last_changed == Some(frame) {
            warn!(frame, "change_image called more than once in one frame");
        }
        textures.last_changed = Some(frame);

        let (logical, crop, data) = match pixels {
            None => ((1, 1), CropFraction::FULL, PixelArray::placeholder().to_texture_data()),
            Some(pixels) => {
                let logical = (pixels.width() as u32, pixels.height() as u32);
                let (padded, crop) = pixels.padded();
                (logical, crop, padded.to_texture_data())
            }
        };
        let (width, height) = (data.width, data.height);
        let id = ui.upload_texture(data);
        textures.slots.install(
            ui,
            TextureResource {
                id,
                width,
                height,
            },
        );
        textures.logical = logical;
        textures.crop = crop;
        drop(textures);

        if self.last_dims != Some(logical) {
            debug!(
                width = logical.0,
                height = logical.1,
                "image size changed; refitting view"
            );
            self.last_dims = Some(logical);
            self.view.reset_to(Box2D::new(
                point(0.0, 0.0),
                point(logical.0 as f32, logical.1 as f32),
            ));
        }
    }

    /// Validating variant of [`Image::change_image`] for foreign arrays.
    /// Fails before touching any texture.
    pub fn try_change_image<A>(&mut self, ui: &mut dyn RenderingProvider, array: A) -> Result<(), Error>
    where
        A: TryInto<PixelArray, Error = Error>,
    {
        let pixels = array.try_into()?;
        self.change_image(ui, Some(pixels));
        Ok(())
    }

    /// Fits the whole image into the last known viewport.
    pub fn reset_view(&mut self) {
        self.view.reset();
    }

    /// Frees the retired texture once its frame has passed.
    pub fn collect_garbage(&self, ui: &mut dyn RenderingProvider) {
        self.textures.borrow_mut().slots.collect(ui);
    }

    /// Frees both textures. Every snapshot sharing them becomes blank.
    pub fn destroy(self, ui: &mut dyn RenderingProvider) {
        self.textures.borrow_mut().slots.release(ui);
    }

    #[must_use]
    pub const fn view(&self) -> ViewTransform {
        self.view
    }

    /// Snapshot sharing this image's textures with a different view.
    #[must_use]
    pub fn with_view(&self, view: ViewTransform) -> Self {
        Self {
            textures: Rc::clone(&self.textures),
            last_dims: self.last_dims,
            view,
        }
    }

    #[must_use]
    pub fn texture(&self) -> Option<TextureResource> {
        self.textures.borrow().slots.current()
    }

    #[must_use]
    pub fn garbage(&self) -> Option<TextureId> {
        self.textures.borrow().slots.garbage().map(|t| t.id)
    }

    /// Width and height of the displayed pixels, before padding.
    #[must_use]
    pub fn logical_size(&self) -> (u32, u32) {
        self.textures.borrow().logical
    }

    #[must_use]
    pub fn logical_extent(&self) -> Size {
        let (w, h) = self.logical_size();
        Size::new(w as f32, h as f32)
    }

    #[must_use]
    pub fn crop(&self) -> CropFraction {
        self.textures.borrow().crop
    }
}
