//! Background producer thread feeding the render thread.
//!
//! The producer runs the caller's sequence on its own thread and hands values
//! over through a one-slot mailbox that drops values while it is full, so the
//! render thread only ever sees the freshest value and the producer never
//! waits on it. A second one-slot channel carries a single quit signal once
//! the sequence ends for any reason.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use tracing::{debug, warn};

use crate::error::Error;

pub const DEFAULT_MAX_FPS: f64 = 60.0;

/// Admits at most one value per `1 / max_fps` seconds.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(max_fps: f64) -> Result<Self, Error> {
        if !max_fps.is_finite() || max_fps <= 0.0 {
            return Err(Error::InvalidMaxFps(max_fps));
        }
        Ok(Self {
            interval: Duration::from_secs_f64(1.0 / max_fps),
            last: None,
        })
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a value produced at `now` is due. The first value always is;
    /// after that a value is due once `interval` has passed since the last
    /// admitted one.
    pub fn admit(&mut self, now: Instant) -> bool {
        let due = self
            .last
            .is_none_or(|last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last = Some(now);
        }
        due
    }
}

/// Sends exactly one quit signal when dropped, however the producer ends.
struct QuitSignal(Sender<()>);

impl Drop for QuitSignal {
    fn drop(&mut self) {
        // Nobody else sends on this channel, so the slot is free unless the
        // receiver is already gone.
        let _ = self.0.try_send(());
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct ForwardStats {
    forwarded: u64,
    throttled: u64,
    dropped_full: u64,
}

/// Render-side ends of a running producer.
#[derive(Debug)]
pub struct Bridge<T> {
    pub data: Receiver<T>,
    pub quit: Receiver<()>,
    /// First forwarded value, `None` if the producer ended without one.
    pub first: Option<T>,
    pub producer: ProducerHandle,
}

#[derive(Debug)]
pub struct ProducerHandle {
    handle: JoinHandle<()>,
}

impl ProducerHandle {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits up to `grace` for the producer thread to end and joins it;
    /// otherwise leaves it running detached. Drop the receivers first so a
    /// live producer notices the hang-up on its next value.
    pub fn finish(self, grace: Duration) {
        let deadline = Instant::now() + grace;
        while !self.handle.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        if self.handle.is_finished() {
            if self.handle.join().is_err() {
                warn!("producer thread panicked outside its sequence");
            }
        } else {
            debug!(grace = ?grace, "producer still running; detaching");
        }
    }
}

/// Launches `producer` on a thread named `producer` and blocks until it
/// forwards its first value or ends.
///
/// `max_fps` defaults to [`DEFAULT_MAX_FPS`].
pub fn start<I>(producer: I, max_fps: Option<f64>) -> Result<Bridge<I::Item>, Error>
where
    I: IntoIterator + Send + 'static,
    I::Item: Send + 'static,
{
    let throttle = Throttle::new(max_fps.unwrap_or(DEFAULT_MAX_FPS))?;
    let (data_tx, data_rx) = bounded(1);
    let (quit_tx, quit_rx) = bounded(1);

    let handle = thread::Builder::new()
        .name("producer".into())
        .spawn(move || {
            let _quit = QuitSignal(quit_tx);
            let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
                forward(producer, data_tx, throttle)
            }));
            match outcome {
                Ok(stats) => debug!(
                    forwarded = stats.forwarded,
                    throttled = stats.throttled,
                    dropped_full = stats.dropped_full,
                    "producer finished"
                ),
                Err(payload) => warn!(
                    message = panic_message(payload.as_ref()),
                    "producer panicked; ending session"
                ),
            }
        })?;

    // The sender lives on the producer thread, so this returns once a value
    // arrives or the producer ends.
    let first = data_rx.recv().ok();
    Ok(Bridge {
        data: data_rx,
        quit: quit_rx,
        first,
        producer: ProducerHandle { handle },
    })
}

fn forward<I: IntoIterator>(producer: I, data: Sender<I::Item>, mut throttle: Throttle) -> ForwardStats {
    let mut stats = ForwardStats::default();
    for value in producer {
        let now = Instant::now();
        thread::yield_now();
        if !throttle.admit(now) {
            stats.throttled += 1;
            continue;
        }
        match data.try_send(value) {
            Ok(()) => stats.forwarded += 1,
            Err(TrySendError::Full(_)) => stats.dropped_full += 1,
            Err(TrySendError::Disconnected(_)) => {
                debug!("render side hung up; stopping producer");
                break;
            }
        }
    }
    stats
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_admits_first_then_waits_one_interval() {
        let mut throttle = Throttle::new(10.0).unwrap();
        let t0 = Instant::now();
        assert!(throttle.admit(t0));
        assert!(!throttle.admit(t0 + Duration::from_millis(50)));
        assert!(throttle.admit(t0 + Duration::from_millis(100)));
        assert!(!throttle.admit(t0 + Duration::from_millis(150)));
    }

    #[test]
    fn rejects_bad_rates() {
        for rate in [0.0, -5.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(Throttle::new(rate), Err(Error::InvalidMaxFps(_))));
        }
        assert!(start(0..3, Some(0.0)).is_err());
    }

    #[test]
    fn panic_payloads_are_readable() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
    }
}
