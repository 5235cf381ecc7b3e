//! Resumable widgets and their combinators.
//!
//! A widget is a state machine polled once per frame. Each poll draws into the
//! rendering provider and either suspends until the next frame or completes
//! with a value. Composition is explicit: combinators own their children and
//! poll every one of them each frame.

use std::marker::PhantomData;

use crossbeam_channel::{Receiver, TryRecvError};

use crate::render::RenderingProvider;

/// Result of polling a widget for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress<T> {
    Suspended,
    Completed(T),
}

impl<T> Progress<T> {
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Progress<U> {
        match self {
            Self::Suspended => Progress::Suspended,
            Self::Completed(v) => Progress::Completed(f(v)),
        }
    }

    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Suspended => None,
            Self::Completed(v) => Some(v),
        }
    }
}

impl<T> From<Option<T>> for Progress<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Suspended, Self::Completed)
    }
}

pub trait Widget {
    type Output;

    /// Advances the widget by one frame.
    fn poll(&mut self, ui: &mut dyn RenderingProvider) -> Progress<Self::Output>;

    fn map<F, U>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
        F: FnMut(Self::Output) -> U,
    {
        Map { inner: self, f }
    }
}

impl<W: Widget + ?Sized> Widget for Box<W> {
    type Output = W::Output;

    fn poll(&mut self, ui: &mut dyn RenderingProvider) -> Progress<Self::Output> {
        (**self).poll(ui)
    }
}

impl<W: Widget + ?Sized> Widget for &mut W {
    type Output = W::Output;

    fn poll(&mut self, ui: &mut dyn RenderingProvider) -> Progress<Self::Output> {
        (**self).poll(ui)
    }
}

pub struct Map<W, F> {
    inner: W,
    f: F,
}

impl<W, F, U> Widget for Map<W, F>
where
    W: Widget,
    F: FnMut(W::Output) -> U,
{
    type Output = U;

    fn poll(&mut self, ui: &mut dyn RenderingProvider) -> Progress<U> {
        match self.inner.poll(ui) {
            Progress::Suspended => Progress::Suspended,
            Progress::Completed(v) => Progress::Completed((self.f)(v)),
        }
    }
}

/// Pairs every completion of `widget` with `label`.
pub fn tag<L: Clone, W: Widget>(label: L, widget: W) -> Tagged<L, W> {
    Tagged { label, widget }
}

pub struct Tagged<L, W> {
    label: L,
    widget: W,
}

impl<L: Clone, W: Widget> Widget for Tagged<L, W> {
    type Output = (L, W::Output);

    fn poll(&mut self, ui: &mut dyn RenderingProvider) -> Progress<Self::Output> {
        let label = &self.label;
        self.widget.poll(ui).map(|v| (label.clone(), v))
    }
}

/// Completes with the next value waiting on `receiver`, without blocking.
///
/// A disconnected channel keeps the listener suspended forever.
pub fn listen<T>(receiver: Receiver<T>) -> Listen<T> {
    Listen { receiver }
}

#[derive(Debug)]
pub struct Listen<T> {
    receiver: Receiver<T>,
}

impl<T> Widget for Listen<T> {
    type Output = T;

    fn poll(&mut self, _ui: &mut dyn RenderingProvider) -> Progress<T> {
        match self.receiver.try_recv() {
            Ok(value) => Progress::Completed(value),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Progress::Suspended,
        }
    }
}

/// Widget that never completes and draws nothing.
pub fn nothing<T>() -> Nothing<T> {
    Nothing(PhantomData)
}

#[derive(Debug)]
pub struct Nothing<T>(PhantomData<fn() -> T>);

impl<T> Widget for Nothing<T> {
    type Output = T;

    fn poll(&mut self, _ui: &mut dyn RenderingProvider) -> Progress<T> {
        Progress::Suspended
    }
}

/// Widget backed by a closure called once per frame.
pub fn widget_fn<T, F>(f: F) -> FnWidget<F>
where
    F: FnMut(&mut dyn RenderingProvider) -> Progress<T>,
{
    FnWidget(f)
}

pub struct FnWidget<F>(F);

impl<T, F> Widget for FnWidget<F>
where
    F: FnMut(&mut dyn RenderingProvider) -> Progress<T>,
{
    type Output = T;

    fn poll(&mut self, ui: &mut dyn RenderingProvider) -> Progress<T> {
        (self.0)(ui)
    }
}

/// Polls every widget each frame and completes with the value of the first
/// one, in list order, that completed during that frame.
pub fn sequential_all<W: Widget>(widgets: Vec<W>) -> SequentialAll<W> {
    SequentialAll { widgets }
}

pub struct SequentialAll<W> {
    widgets: Vec<W>,
}

impl<W: Widget> Widget for SequentialAll<W> {
    type Output = W::Output;

    fn poll(&mut self, ui: &mut dyn RenderingProvider) -> Progress<W::Output> {
        let mut first = None;
        for widget in &mut self.widgets {
            if let Progress::Completed(v) = widget.poll(ui) {
                first.get_or_insert(v);
            }
        }
        first.into()
    }
}

/// Polls every widget once and returns this frame's completions in list
/// order. The union itself never completes; callers loop over frames.
pub fn parallel_union<E>(
    ui: &mut dyn RenderingProvider,
    widgets: &mut [&mut dyn Widget<Output = E>],
) -> Vec<E> {
    widgets
        .iter_mut()
        .filter_map(|w| w.poll(ui).completed())
        .collect()
}

/// Remembers the last frame a widget was polled in.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResumeStamp(Option<u64>);

impl ResumeStamp {
    /// Records a poll in `frame`. Polling twice in one frame is a caller bug.
    pub fn enter(&mut self, frame: u64) {
        debug_assert_ne!(
            self.0,
            Some(frame),
            "widget polled twice in frame {frame}"
        );
        self.0 = Some(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::headless::RecordingProvider;

    fn after(frames: u32, value: i32) -> impl Widget<Output = i32> {
        let mut left = frames;
        widget_fn(move |_ui| {
            if left == 0 {
                Progress::Completed(value)
            } else {
                left -= 1;
                Progress::Suspended
            }
        })
    }

    #[test]
    fn map_and_tag_transform_completion() {
        let mut ui = RecordingProvider::new(10.0, 10.0);
        let mut w = tag("answer", after(1, 20).map(|v| v + 1));
        assert_eq!(w.poll(&mut ui), Progress::Suspended);
        ui.next_frame();
        assert_eq!(w.poll(&mut ui), Progress::Completed(("answer", 21)));
    }

    #[test]
    fn listen_drains_one_value_per_frame() {
        let mut ui = RecordingProvider::new(10.0, 10.0);
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut w = listen(rx);
        assert_eq!(w.poll(&mut ui), Progress::Suspended);
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        drop(tx);
        assert_eq!(w.poll(&mut ui), Progress::Completed(1));
        assert_eq!(w.poll(&mut ui), Progress::Completed(2));
        assert_eq!(w.poll(&mut ui), Progress::Suspended);
    }

    #[test]
    fn sequential_all_polls_everyone_and_prefers_list_order() {
        let mut ui = RecordingProvider::new(10.0, 10.0);
        let polled = std::cell::Cell::new(0);
        let counted = |value| {
            let polled = &polled;
            widget_fn(move |_ui| {
                polled.set(polled.get() + 1);
                Progress::Completed(value)
            })
        };
        let mut all = sequential_all(vec![counted(1), counted(2), counted(3)]);
        assert_eq!(all.poll(&mut ui), Progress::Completed(1));
        assert_eq!(polled.get(), 3);
    }

    #[test]
    fn parallel_union_returns_every_completion_in_order() {
        let mut ui = RecordingProvider::new(10.0, 10.0);
        let mut a = after(0, 1);
        let mut b = nothing::<i32>();
        let mut c = after(0, 3);
        let events = parallel_union::<i32>(&mut ui, &mut [&mut a, &mut b, &mut c]);
        assert_eq!(events, vec![1, 3]);
    }
}
