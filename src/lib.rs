pub mod config;
pub mod error;
pub mod events;
pub mod render;
pub mod resource;
pub mod view;
pub mod widget;
pub mod widgets;
pub mod tasks {
    pub mod bridge;
    pub mod session;
}

pub use config::Configuration;
pub use error::Error;
pub use resource::Image;
pub use resource::pixels::PixelArray;
pub use tasks::session::{
    ImageContent, LiveProducer, PlotContent, SessionOptions, WindowContent, quick_image,
    quick_plot, quick_window, run_live_session,
};
pub use view::ViewTransform;
