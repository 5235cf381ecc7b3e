use thiserror::Error;

/// Library error type for live-view operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Pixel array rank is not 2 (greyscale) or 3 (channel-last), or the
    /// channel axis holds an unsupported number of channels.
    #[error("invalid pixel array shape: rank {rank}, {channels} channel(s)")]
    InvalidShape { rank: usize, channels: usize },

    /// Pixel array has a zero-length height or width axis.
    #[error("empty pixel array: {width}x{height}")]
    EmptyImage { width: usize, height: usize },

    /// Producer throttle rate must be finite and positive.
    #[error("invalid max fps: {0}")]
    InvalidMaxFps(f64),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}
