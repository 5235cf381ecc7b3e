pub mod frame;
pub mod image;
pub mod overlay;
pub mod pan_zoom;

pub use frame::PlotFrame;
pub use image::{DisplayImage, display_image};
pub use overlay::{NoOverlay, Overlay, OverlayCtx, PointerEvents, overlay_fn};
pub use pan_zoom::PanZoom;
