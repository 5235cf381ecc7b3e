//! Canonical pixel arrays: validation, padding and RGBA expansion.

use std::borrow::Cow;

use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use lyon::math::{Box2D, point};
use ndarray::{Array2, Array3, ArrayD, IxDyn, Slice};
use tracing::warn;

use crate::error::Error;
use crate::render::TextureData;

/// Fill value for cells added by padding.
pub const PAD_FILL: u8 = 255;

/// Texture dimensions are padded to a multiple of this.
pub const PAD_MULTIPLE: usize = 4;

/// Dense, C-ordered pixel array: `h × w` greyscale or `h × w × c`
/// channel-last with `c` in `1..=4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelArray(ArrayD<u8>);

/// Portion of a padded texture covered by the logical image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropFraction {
    pub x: f32,
    pub y: f32,
}

impl CropFraction {
    pub const FULL: Self = Self { x: 1.0, y: 1.0 };

    /// Texture-coordinate rectangle for this crop.
    #[must_use]
    pub fn uv_rect(self) -> Box2D {
        Box2D::new(point(0.0, 0.0), point(self.x, self.y))
    }
}

impl Default for CropFraction {
    fn default() -> Self {
        Self::FULL
    }
}

impl PixelArray {
    /// Validates rank, channel count and extent and converts to standard
    /// layout.
    pub fn new(array: ArrayD<u8>) -> Result<Self, Error> {
        let shape = array.shape();
        let channels = match shape.len() {
            2 => 1,
            3 => shape[2],
            _ => 0,
        };
        if !(1..=4).contains(&channels) {
            return Err(Error::InvalidShape {
                rank: shape.len(),
                channels,
            });
        }
        if shape[0] == 0 || shape[1] == 0 {
            return Err(Error::EmptyImage {
                width: shape[1],
                height: shape[0],
            });
        }
        let array = if array.is_standard_layout() {
            array
        } else {
            array.as_standard_layout().into_owned()
        };
        Ok(Self(array))
    }

    /// Float input, rounded and clamped to `0..=255`.
    pub fn from_f32(array: ArrayD<f32>) -> Result<Self, Error> {
        Self::new(array.mapv(|v| v.round().clamp(0.0, 255.0) as u8))
    }

    /// 1×1 black RGB placeholder shown for absent content.
    #[must_use]
    pub fn placeholder() -> Self {
        Self(ArrayD::zeros(IxDyn(&[1, 1, 3])))
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.0.shape()[1]
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.0.shape()[0]
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        self.0.shape().get(2).copied().unwrap_or(1)
    }

    #[must_use]
    pub fn as_array(&self) -> &ArrayD<u8> {
        &self.0
    }

    /// Pads both axes up to [`PAD_MULTIPLE`] with [`PAD_FILL`]. Returns the
    /// padded array and the fraction covered by the original pixels.
    #[must_use]
    pub fn padded(&self) -> (Cow<'_, Self>, CropFraction) {
        let (w, h) = (self.width(), self.height());
        let (nw, nh) = (w.next_multiple_of(PAD_MULTIPLE), h.next_multiple_of(PAD_MULTIPLE));
        if (nw, nh) == (w, h) {
            return (Cow::Borrowed(self), CropFraction::FULL);
        }
        let mut shape = self.0.shape().to_vec();
        shape[0] = nh;
        shape[1] = nw;
        let mut out = ArrayD::from_elem(IxDyn(&shape), PAD_FILL);
        out.slice_each_axis_mut(|ax| match ax.axis.index() {
            0 => Slice::from(0..h),
            1 => Slice::from(0..w),
            _ => Slice::from(..),
        })
        .assign(&self.0);
        let crop = CropFraction {
            x: w as f32 / nw as f32,
            y: h as f32 / nh as f32,
        };
        (Cow::Owned(Self(out)), crop)
    }

    /// Expands to tightly packed RGBA8.
    #[must_use]
    pub fn to_texture_data(&self) -> TextureData {
        let channels = self.channels();
        let flat: Cow<'_, [u8]> = match self.0.as_slice() {
            Some(slice) => Cow::Borrowed(slice),
            None => Cow::Owned(self.0.iter().copied().collect()),
        };
        let mut rgba = Vec::with_capacity(self.width() * self.height() * 4);
        for px in flat.chunks_exact(channels) {
            match *px {
                [g] => rgba.extend_from_slice(&[g, g, g, 255]),
                [g, a] => rgba.extend_from_slice(&[g, g, g, a]),
                [r, g, b] => rgba.extend_from_slice(&[r, g, b, 255]),
                [r, g, b, a] => rgba.extend_from_slice(&[r, g, b, a]),
                _ => unreachable!("channel count validated at construction"),
            }
        }
        TextureData {
            width: self.width() as u32,
            height: self.height() as u32,
            rgba,
        }
    }
}

impl TryFrom<ArrayD<u8>> for PixelArray {
    type Error = Error;

    fn try_from(array: ArrayD<u8>) -> Result<Self, Error> {
        Self::new(array)
    }
}

impl TryFrom<Array3<u8>> for PixelArray {
    type Error = Error;

    fn try_from(array: Array3<u8>) -> Result<Self, Error> {
        Self::new(array.into_dyn())
    }
}

/// Greyscale arrays cannot fail the channel check; an empty one becomes the
/// placeholder.
impl From<Array2<u8>> for PixelArray {
    fn from(array: Array2<u8>) -> Self {
        Self::new(array.into_dyn()).unwrap_or_else(|err| {
            warn!(error = %err, "greyscale array replaced by placeholder");
            Self::placeholder()
        })
    }
}

// Image buffers are row-major with interleaved channels, exactly this shape.
fn from_buffer(shape: &[usize], raw: Vec<u8>) -> PixelArray {
    let array = match ArrayD::from_shape_vec(IxDyn(shape), raw) {
        Ok(array) => array,
        Err(err) => {
            warn!(?shape, error = %err, "image buffer does not match its dimensions");
            return PixelArray::placeholder();
        }
    };
    PixelArray::new(array).unwrap_or_else(|err| {
        warn!(error = %err, "image buffer replaced by placeholder");
        PixelArray::placeholder()
    })
}

impl From<GrayImage> for PixelArray {
    fn from(img: GrayImage) -> Self {
        let (w, h) = img.dimensions();
        from_buffer(&[h as usize, w as usize], img.into_raw())
    }
}

impl From<RgbImage> for PixelArray {
    fn from(img: RgbImage) -> Self {
        let (w, h) = img.dimensions();
        from_buffer(&[h as usize, w as usize, 3], img.into_raw())
    }
}

impl From<RgbaImage> for PixelArray {
    fn from(img: RgbaImage) -> Self {
        let (w, h) = img.dimensions();
        from_buffer(&[h as usize, w as usize, 4], img.into_raw())
    }
}

impl From<DynamicImage> for PixelArray {
    fn from(img: DynamicImage) -> Self {
        match img {
            DynamicImage::ImageLuma8(g) => g.into(),
            DynamicImage::ImageRgb8(rgb) => rgb.into(),
            other if other.color().has_alpha() => other.to_rgba8().into(),
            other => other.to_rgb8().into(),
        }
    }
}
