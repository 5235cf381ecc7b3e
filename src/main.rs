//! Demo launcher for the live-view library.
//!
//! Each subcommand runs a synthetic producer against one session variant.

use std::f32::consts::TAU;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use lyon::math::{Box2D, Size, point, vector};
use image::{Rgb, RgbImage};
use rand::Rng;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use rust_live_view::render::{Color, DrawCmd, RenderingProvider};
use rust_live_view::widget::{Progress, widget_fn};
use rust_live_view::widgets::{OverlayCtx, overlay_fn};
use rust_live_view::{
    Configuration, ImageContent, PixelArray, PlotContent, SessionOptions, WindowContent,
    quick_image, quick_plot, quick_window,
};

/// Simple CLI
#[derive(Debug, Parser)]
#[command(name = "rust-live-view", about = "Live display of streamed plots and images")]
struct Cli {
    /// Path to YAML config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the producer rate limit (values per second)
    #[arg(long, value_name = "FPS")]
    max_fps: Option<f64>,

    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    demo: Demo,
}

#[derive(Debug, Subcommand)]
enum Demo {
    /// Animated sine waves in a pannable plot
    Plot,
    /// A free-form widget bouncing around the window
    Window,
    /// A streamed image with a moving marker overlay
    Image {
        /// Show this picture instead of generated noise
        #[arg(long, value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

fn init_tracing(verbosity: u8) -> Result<()> {
    // map -v to log level
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::from_default_env()
        .add_directive(
            format!("rust_live_view={level}")
                .parse()
                .context("building log filter")?,
        )
        .add_directive("wgpu=warn".parse().context("building log filter")?)
        .add_directive("winit=warn".parse().context("building log filter")?);
    fmt().with_env_filter(filter).with_target(true).init();
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let cfg = match cli.config.as_ref() {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Configuration::default(),
    }
    .validated()
    .context("validating configuration")?;

    let mut options = SessionOptions::from(&cfg);
    if let Some(fps) = cli.max_fps {
        options = options.with_max_fps(fps);
    }
    info!(demo = ?cli.demo, max_fps = ?options.max_fps, "starting demo");

    match cli.demo {
        Demo::Plot => quick_plot((0u64..).map(sine_frame).inspect(|_| pace()), &options),
        Demo::Window => quick_window((0u64..).map(bouncing_box).inspect(|_| pace()), &options),
        Demo::Image { file } => {
            let still = match file {
                Some(path) => {
                    let img = image::open(&path)
                        .with_context(|| format!("opening image {}", path.display()))?;
                    Some(PixelArray::from(img))
                }
                None => None,
            };
            quick_image(
                (0u64..)
                    .map(move |i| image_frame(i, still.clone()))
                    .inspect(|_| pace()),
                &options,
            )
        }
    }
}

/// Producers run faster than the display; the bridge drops what it cannot show.
fn pace() {
    thread::sleep(Duration::from_millis(4));
}

fn sine_frame(i: u64) -> PlotContent {
    let phase = i as f32 * 0.02;
    Box::new(overlay_fn(move |ctx: &mut OverlayCtx<'_>| {
        for (k, color) in [
            (1.0, Color::rgba(0.35, 0.7, 1.0, 1.0)),
            (2.0, Color::rgba(1.0, 0.55, 0.25, 1.0)),
        ] {
            let points: Vec<_> = (0..=200)
                .map(|n| {
                    let x = -1.0 + n as f32 / 100.0;
                    point(x, 0.8 * (k * TAU * x / 2.0 + phase * k).sin() / k)
                })
                .collect();
            ctx.polyline(&points, color, 2.0);
        }
        Progress::<()>::Suspended
    }))
}

fn bouncing_box(i: u64) -> WindowContent {
    let t = i as f32 * 0.01;
    Box::new(widget_fn(move |ui: &mut dyn RenderingProvider| {
        let region = ui.region();
        let side = 40.0_f32.min(region.width()).min(region.height());
        let span = Size::new(region.width() - side, region.height() - side);
        let origin = region.min
            + vector(
                triangle(t * 0.7) * span.width,
                triangle(t * 1.1) * span.height,
            );
        ui.draw(DrawCmd::Rect {
            rect: Box2D::from_origin_and_size(origin, Size::new(side, side)),
            color: Color::rgba(0.9, 0.8, 0.2, 1.0),
            stroke: None,
        });
        Progress::<()>::Suspended
    }))
}

/// Periodic 0..1..0 ramp.
fn triangle(t: f32) -> f32 {
    let f = t.fract();
    if f < 0.5 { f * 2.0 } else { 2.0 - f * 2.0 }
}

fn image_frame(i: u64, still: Option<PixelArray>) -> ImageContent {
    let pixels = still.unwrap_or_else(|| noise(i));
    let (w, h) = (pixels.width() as f32, pixels.height() as f32);
    let t = i as f32 * 0.01;
    let center = point(w * (0.5 + 0.35 * (t * TAU).cos()), h * (0.5 + 0.35 * (t * TAU).sin()));
    let radius = w.min(h) * 0.05;
    ImageContent {
        pixels: Some(pixels),
        overlay: Some(Box::new(overlay_fn(move |ctx: &mut OverlayCtx<'_>| {
            ctx.circle(center, radius, Color::rgba(1.0, 0.2, 0.2, 1.0), Some(2.0));
            Progress::<()>::Suspended
        }))),
    }
}

/// Horizontal gradient drifting with `i`, with random speckle.
fn noise(i: u64) -> PixelArray {
    const W: u32 = 160;
    const H: u32 = 120;
    let mut rng = rand::rng();
    let shift = (i % u64::from(W)) as u32;
    let img = RgbImage::from_fn(W, H, |x, y| {
        let base = (((x + shift) % W) * 255 / W) as u8;
        Rgb([base, (y * 255 / H) as u8, base.saturating_add(rng.random_range(0..32))])
    });
    PixelArray::from(img)
}
