use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WindowOptions {
    pub title: String,
    /// Initial inner width in physical pixels.
    pub width: u32,
    /// Initial inner height in physical pixels.
    pub height: u32,
    /// Clear color behind all content.
    pub background: [u8; 3],
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "Live View".to_owned(),
            width: 500,
            height: 500,
            background: [30, 30, 30],
        }
    }
}

/// Mouse-driven pan and zoom tuning.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PanZoomOptions {
    /// Zoom factor applied per wheel notch.
    pub zoom_step: f32,
    pub min_scale: f32,
    pub max_scale: f32,
}

impl Default for PanZoomOptions {
    fn default() -> Self {
        Self {
            zoom_step: 1.2,
            min_scale: 0.01,
            max_scale: 256.0,
        }
    }
}

impl PanZoomOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.zoom_step.is_finite() && self.zoom_step > 1.0,
            "pan-zoom.zoom-step must be greater than 1"
        );
        ensure!(
            self.min_scale > 0.0 && self.min_scale < self.max_scale,
            "pan-zoom.min-scale must be positive and below max-scale"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PlotOptions {
    /// Initial data bounds as `[min-x, min-y, max-x, max-y]`.
    pub bounds: [f32; 4],
    /// Draw grid lines at tick positions.
    pub grid: bool,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            bounds: [-1.0, -1.0, 1.0, 1.0],
            grid: true,
        }
    }
}

impl PlotOptions {
    fn validate(&self) -> Result<()> {
        let [x0, y0, x1, y1] = self.bounds;
        ensure!(
            self.bounds.iter().all(|v| v.is_finite()) && x0 < x1 && y0 < y1,
            "plot.bounds must be finite with min < max on both axes"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    pub window: WindowOptions,
    /// Upper bound on values forwarded per second from the producer thread.
    pub max_fps: f64,
    /// How long to wait for the producer thread after the window closes.
    #[serde(with = "humantime_serde")]
    pub shutdown_grace: Duration,
    pub pan_zoom: PanZoomOptions,
    pub plot: PlotOptions,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            window: WindowOptions::default(),
            max_fps: 60.0,
            shutdown_grace: Duration::from_millis(250),
            pan_zoom: PanZoomOptions::default(),
            plot: PlotOptions::default(),
        }
    }
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(Error::from)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_yaml_str(&s).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            self.window.width > 0 && self.window.height > 0,
            "window width and height must be greater than zero"
        );
        ensure!(
            self.max_fps.is_finite() && self.max_fps > 0.0,
            "max-fps must be positive and finite"
        );
        self.pan_zoom.validate()?;
        self.plot.validate()?;
        Ok(self)
    }
}
