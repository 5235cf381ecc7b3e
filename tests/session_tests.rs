use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;
use lyon::math::point;
use ndarray::Array3;
use rust_live_view::events::FrameEvent;
use rust_live_view::render::headless::RecordingProvider;
use rust_live_view::render::{Color, DrawCmd, PointerState, RenderingProvider};
use rust_live_view::resource::pixels::PixelArray;
use rust_live_view::tasks::bridge;
use rust_live_view::tasks::session::{
    FrameLoop, ImageContent, ImageLoop, LoopState, PlotContent, PlotLoop, SessionOptions,
    WindowContent, WindowLoop, drive, quick_plot,
};
use rust_live_view::widget::{Progress, widget_fn};
use rust_live_view::widgets::{OverlayCtx, overlay_fn};

fn rgb(w: usize, h: usize) -> PixelArray {
    PixelArray::try_from(Array3::<u8>::zeros((h, w, 3))).unwrap()
}

fn image_content(w: usize, h: usize) -> ImageContent {
    ImageContent {
        pixels: Some(rgb(w, h)),
        overlay: None,
    }
}

fn diagonal() -> PlotContent {
    Box::new(overlay_fn(|ctx: &mut OverlayCtx<'_>| {
        ctx.line(point(-1.0, -1.0), point(1.0, 1.0), Color::WHITE, 1.0);
        Progress::<()>::Suspended
    }))
}

fn counting(polls: Arc<AtomicUsize>) -> WindowContent {
    Box::new(widget_fn(move |_ui: &mut dyn RenderingProvider| {
        polls.fetch_add(1, Ordering::SeqCst);
        Progress::<()>::Suspended
    }))
}

fn options() -> SessionOptions {
    SessionOptions::new(500, 500)
}

#[test]
fn image_loop_keeps_view_across_same_size_content() {
    let (data_tx, data_rx) = bounded(1);
    let (quit_tx, quit_rx) = bounded(1);
    let mut ui = RecordingProvider::new(500.0, 500.0);
    let mut frame_loop = ImageLoop::new(&mut ui, image_content(100, 100), data_rx, quit_rx, &options());
    assert_eq!(frame_loop.tick(&mut ui), LoopState::Active);
    assert!(matches!(ui.draws()[0], DrawCmd::Image { .. }));
    ui.next_frame();

    let fitted = frame_loop.image().view();
    ui.set_pointer(PointerState {
        position: Some(point(250.0, 250.0)),
        scroll: 1.0,
        ..PointerState::default()
    });
    assert_eq!(frame_loop.tick(&mut ui), LoopState::Active);
    ui.next_frame();
    let zoomed = frame_loop.image().view();
    assert!(zoomed.scale > fitted.scale);

    data_tx.send(image_content(100, 100)).unwrap();
    frame_loop.tick(&mut ui);
    ui.next_frame();
    assert_eq!(frame_loop.image().view(), zoomed);
    assert_eq!(ui.uploads(), 2);

    data_tx.send(image_content(50, 20)).unwrap();
    frame_loop.tick(&mut ui);
    ui.next_frame();
    let refit = frame_loop.image().view();
    assert!(refit.auto_fit);
    assert!((refit.scale - 10.0).abs() < 1e-4);

    quit_tx.send(()).unwrap();
    assert_eq!(frame_loop.tick(&mut ui), LoopState::Terminated);
}

#[test]
fn image_loop_frees_replaced_textures() {
    let (data_tx, data_rx) = bounded(1);
    let (_quit_tx, quit_rx) = bounded(1);
    let mut ui = RecordingProvider::new(500.0, 500.0);
    let mut frame_loop = ImageLoop::new(&mut ui, image_content(8, 8), data_rx, quit_rx, &options());
    for _ in 0..10 {
        data_tx.send(image_content(8, 8)).unwrap();
        frame_loop.tick(&mut ui);
        ui.next_frame();
        assert!(ui.live_textures() <= 2);
    }
    frame_loop.tick(&mut ui);
    assert_eq!(ui.live_textures(), 1);
    assert_eq!(ui.uploads(), 11);
}

#[test]
fn plot_loop_swaps_content_and_keeps_view() {
    let (data_tx, data_rx) = bounded(1);
    let (quit_tx, quit_rx) = bounded(1);
    let mut ui = RecordingProvider::new(500.0, 500.0);
    let mut frame_loop = PlotLoop::new(diagonal(), data_rx, quit_rx, &options());
    assert_eq!(frame_loop.tick(&mut ui), LoopState::Active);
    assert!(ui.draws().iter().any(|cmd| matches!(cmd, DrawCmd::Line { color, .. } if *color == Color::WHITE)));
    ui.next_frame();

    ui.set_pointer(PointerState {
        position: Some(point(100.0, 100.0)),
        scroll: -2.0,
        ..PointerState::default()
    });
    frame_loop.tick(&mut ui);
    ui.next_frame();
    let view = frame_loop.frame().view();
    assert!(!view.auto_fit);

    let empty: PlotContent = Box::new(overlay_fn(|_ctx: &mut OverlayCtx<'_>| Progress::<()>::Suspended));
    data_tx.send(empty).unwrap();
    frame_loop.tick(&mut ui);
    ui.next_frame();
    frame_loop.tick(&mut ui);
    assert!(!ui.draws().iter().any(|cmd| matches!(cmd, DrawCmd::Line { color, .. } if *color == Color::WHITE)));
    assert_eq!(frame_loop.frame().view(), view);
    ui.next_frame();

    quit_tx.send(()).unwrap();
    assert_eq!(frame_loop.tick(&mut ui), LoopState::Terminated);
}

#[test]
fn plot_frame_reports_view_changes() {
    use rust_live_view::widget::Widget;
    use rust_live_view::widgets::PlotFrame;

    let mut ui = RecordingProvider::new(500.0, 500.0);
    let mut frame = PlotFrame::new("p", &Default::default(), diagonal());
    assert_eq!(frame.poll(&mut ui), Progress::Suspended);
    ui.next_frame();
    ui.set_pointer(PointerState {
        position: Some(point(250.0, 250.0)),
        scroll: 1.0,
        ..PointerState::default()
    });
    let Progress::Completed(FrameEvent::View(view)) = frame.poll(&mut ui) else {
        panic!("expected a view change");
    };
    assert!(view.scale > frame.view().scale);
}

#[test]
fn window_loop_polls_the_newest_content() {
    let (data_tx, data_rx) = bounded(1);
    let (quit_tx, quit_rx) = bounded(1);
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let mut ui = RecordingProvider::new(300.0, 200.0);
    let mut frame_loop = WindowLoop::new(counting(first.clone()), data_rx, quit_rx);

    for _ in 0..3 {
        assert_eq!(frame_loop.tick(&mut ui), LoopState::Active);
        ui.next_frame();
    }
    assert_eq!(first.load(Ordering::SeqCst), 3);

    data_tx.send(counting(second.clone())).unwrap();
    frame_loop.tick(&mut ui);
    ui.next_frame();
    frame_loop.tick(&mut ui);
    ui.next_frame();
    assert_eq!(first.load(Ordering::SeqCst), 4);
    assert_eq!(second.load(Ordering::SeqCst), 1);

    drop(data_tx);
    quit_tx.send(()).unwrap();
    assert_eq!(frame_loop.tick(&mut ui), LoopState::Terminated);
}

#[test]
fn bridged_plot_loop_terminates_when_the_producer_ends() {
    let producer: Vec<PlotContent> = vec![diagonal(), diagonal(), diagonal()];
    let bridge = bridge::start(producer, None).unwrap();
    let first = bridge.first.unwrap();

    let started = Instant::now();
    while !bridge.producer.is_finished() && started.elapsed() < Duration::from_secs(2) {
        thread::sleep(Duration::from_millis(1));
    }

    let mut ui = RecordingProvider::new(500.0, 500.0);
    let mut frame_loop = PlotLoop::new(first, bridge.data, bridge.quit, &options());
    assert_eq!(drive(&mut frame_loop, &mut ui, 10), 1);
    bridge.producer.finish(Duration::from_secs(1));
}

#[test]
fn drive_stops_at_the_frame_limit() {
    let (_data_tx, data_rx) = bounded::<WindowContent>(1);
    let (_quit_tx, quit_rx) = bounded(1);
    let polls = Arc::new(AtomicUsize::new(0));
    let mut frame_loop = WindowLoop::new(counting(polls.clone()), data_rx, quit_rx);
    let mut ui = RecordingProvider::new(100.0, 100.0);
    assert_eq!(drive(&mut frame_loop, &mut ui, 5), 5);
    assert_eq!(polls.load(Ordering::SeqCst), 5);
    assert_eq!(ui.frame_index(), 5);
}

#[test]
fn empty_producer_never_opens_a_window() {
    let options = options().with_max_fps(30.0);
    quick_plot(Vec::<PlotContent>::new(), &options).unwrap();
}
