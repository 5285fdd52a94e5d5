//! Time-boxed enrollment capture.
//!
//! The scheduler polls a [`FrameSource`] in a single cooperative loop and
//! accepts a frame as sample `n` only once `n * min_spacing` has elapsed
//! since the session started. Frames are sampled as soon as the cadence
//! allows rather than on a fixed timer, so the policy is independent of
//! the source's frame rate.

use crate::error::{CoreError, ExtractError};
use crate::types::Embedding;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Non-blocking source of frames. `None` means nothing is ready on this poll.
pub trait FrameSource {
    type Frame;

    fn next_frame(&mut self) -> Option<Self::Frame>;
}

/// Converts a frame into an embedding, using the first detected face.
pub trait Extractor<F> {
    fn extract(&mut self, frame: &F) -> Result<Embedding, ExtractError>;
}

/// Monotonic time since an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall-clock [`Clock`] backed by [`Instant`].
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Shared cancellation flag, checked on every poll.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Fixed sampling policy for one enrollment session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturePolicy {
    window: Duration,
    max_samples: usize,
    min_spacing: Duration,
}

impl CapturePolicy {
    pub fn new(
        window: Duration,
        max_samples: usize,
        min_spacing: Duration,
    ) -> Result<Self, CoreError> {
        if window.is_zero() {
            return Err(CoreError::InvalidPolicy("capture window must be positive"));
        }
        if max_samples == 0 {
            return Err(CoreError::InvalidPolicy("max samples must be positive"));
        }
        Ok(Self {
            window,
            max_samples,
            min_spacing,
        })
    }

    /// Build a policy from second-valued settings.
    pub fn from_secs(
        window_secs: f64,
        max_samples: usize,
        min_spacing_secs: f64,
    ) -> Result<Self, CoreError> {
        let window = Duration::try_from_secs_f64(window_secs)
            .map_err(|_| CoreError::InvalidPolicy("capture window must be a finite duration"))?;
        let spacing = Duration::try_from_secs_f64(min_spacing_secs).map_err(|_| {
            CoreError::InvalidPolicy("sample spacing must be a finite, non-negative duration")
        })?;
        Self::new(window, max_samples, spacing)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn max_samples(&self) -> usize {
        self.max_samples
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Earliest session time at which sample `index` may be taken.
    fn due_at(&self, index: usize) -> Duration {
        u32::try_from(index)
            .ok()
            .and_then(|n| self.min_spacing.checked_mul(n))
            .unwrap_or(Duration::MAX)
    }

    /// Run one capture session.
    ///
    /// Stops when the window elapses, `max_samples` embeddings have been
    /// collected, or `cancel` fires. Frames where no face is detected are
    /// dropped without counting; any other extraction failure aborts the
    /// session. An empty result is not an error here.
    pub fn run<S, E, C>(
        &self,
        source: &mut S,
        extractor: &mut E,
        clock: &C,
        cancel: &CancelToken,
    ) -> Result<Capture, CoreError>
    where
        S: FrameSource + ?Sized,
        E: Extractor<S::Frame> + ?Sized,
        C: Clock + ?Sized,
    {
        let start = clock.now();
        let elapsed = || clock.now().saturating_sub(start);
        let mut embeddings = Vec::with_capacity(self.max_samples.min(64));

        let stopped = loop {
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if embeddings.len() >= self.max_samples {
                break StopReason::SamplesFull;
            }
            if elapsed() >= self.window {
                break StopReason::WindowElapsed;
            }

            let Some(frame) = source.next_frame() else {
                continue;
            };

            let at = elapsed();
            if at >= self.window || at < self.due_at(embeddings.len()) {
                continue;
            }

            match extractor.extract(&frame) {
                Ok(embedding) => embeddings.push(embedding),
                Err(ExtractError::NoFaceDetected) => {}
                Err(e) => return Err(e.into()),
            }
        };

        Ok(Capture {
            embeddings,
            stopped,
            elapsed: elapsed(),
        })
    }
}

impl Default for CapturePolicy {
    /// 20 second window, up to 40 samples, at most one every 0.5 seconds.
    fn default() -> Self {
        Self {
            window: Duration::from_secs(20),
            max_samples: 40,
            min_spacing: Duration::from_millis(500),
        }
    }
}

/// Why a capture session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    WindowElapsed,
    SamplesFull,
    Cancelled,
}

/// Embeddings collected by one session, in capture order.
#[derive(Debug)]
pub struct Capture {
    pub embeddings: Vec<Embedding>,
    pub stopped: StopReason,
    pub elapsed: Duration,
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    const FRAME_PERIOD: Duration = Duration::from_millis(33);

    fn source(clock: &ManualClock) -> TickingSource<impl FnMut(u64) -> bool> {
        TickingSource {
            clock: clock.clone(),
            period: FRAME_PERIOD,
            ready: |_: u64| true,
            polls: 0,
        }
    }

    #[test]
    fn test_fills_samples_before_window() {
        let clock = ManualClock::default();
        let mut src = source(&clock);
        let policy = CapturePolicy::from_secs(20.0, 40, 0.5).unwrap();

        let capture = policy
            .run(&mut src, &mut FnExtractor(face), &clock, &CancelToken::new())
            .unwrap();

        assert_eq!(capture.embeddings.len(), 40);
        assert_eq!(capture.stopped, StopReason::SamplesFull);
        assert!(capture.elapsed < Duration::from_secs(20));
    }

    #[test]
    fn test_no_faces_runs_full_window() {
        let clock = ManualClock::default();
        let mut src = source(&clock);
        let policy = CapturePolicy::default();

        let capture = policy
            .run(
                &mut src,
                &mut FnExtractor(|_: u64| Err(ExtractError::NoFaceDetected)),
                &clock,
                &CancelToken::new(),
            )
            .unwrap();

        assert!(capture.embeddings.is_empty());
        assert_eq!(capture.stopped, StopReason::WindowElapsed);
        assert!(capture.elapsed >= Duration::from_secs(20));
        assert!(capture.elapsed < Duration::from_secs(20) + FRAME_PERIOD * 2);
    }

    #[test]
    fn test_samples_respect_min_spacing() {
        let clock = ManualClock::default();
        let mut src = source(&clock);
        let policy = CapturePolicy::from_secs(20.0, 10, 0.5).unwrap();
        let stamps = std::cell::RefCell::new(Vec::new());

        policy
            .run(
                &mut src,
                &mut FnExtractor(|f: u64| {
                    stamps.borrow_mut().push(clock.now());
                    face(f)
                }),
                &clock,
                &CancelToken::new(),
            )
            .unwrap();

        let stamps = stamps.into_inner();
        assert_eq!(stamps.len(), 10);
        for (i, t) in stamps.iter().enumerate() {
            assert!(*t >= Duration::from_millis(500) * i as u32, "sample {i} at {t:?}");
            // Opportunistic: taken on the first frame after the cadence allows it.
            assert!(*t < Duration::from_millis(500) * i as u32 + FRAME_PERIOD * 2);
        }
    }

    #[test]
    fn test_empty_polls_do_not_count() {
        let clock = ManualClock::default();
        let mut src = TickingSource {
            clock: clock.clone(),
            period: FRAME_PERIOD,
            ready: |poll: u64| poll % 3 == 0,
            polls: 0,
        };
        let policy = CapturePolicy::from_secs(1.0, 100, 0.0).unwrap();

        let capture = policy
            .run(&mut src, &mut FnExtractor(face), &clock, &CancelToken::new())
            .unwrap();

        assert_eq!(capture.stopped, StopReason::WindowElapsed);
        assert_eq!(capture.embeddings.len() as u64, src.polls / 3);
    }

    #[test]
    fn test_no_face_frames_are_skipped() {
        let clock = ManualClock::default();
        let mut src = source(&clock);
        let policy = CapturePolicy::from_secs(20.0, 5, 0.0).unwrap();

        let capture = policy
            .run(
                &mut src,
                &mut FnExtractor(|f: u64| {
                    if f % 2 == 0 {
                        face(f)
                    } else {
                        Err(ExtractError::NoFaceDetected)
                    }
                }),
                &clock,
                &CancelToken::new(),
            )
            .unwrap();

        let frames: Vec<f64> = capture.embeddings.iter().map(|e| e.values()[0]).collect();
        assert_eq!(frames, [2.0, 4.0, 6.0, 8.0, 10.0]);
    }

    #[test]
    fn test_invalid_image_aborts() {
        let clock = ManualClock::default();
        let mut src = source(&clock);
        let err = CapturePolicy::default()
            .run(
                &mut src,
                &mut FnExtractor(|_: u64| Err(ExtractError::InvalidImage("truncated".into()))),
                &clock,
                &CancelToken::new(),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::Extract(ExtractError::InvalidImage(_))));
    }

    #[test]
    fn test_cancel_stops_on_next_poll() {
        let clock = ManualClock::default();
        let mut src = source(&clock);
        let cancel = CancelToken::new();
        let policy = CapturePolicy::from_secs(20.0, 40, 0.0).unwrap();

        let capture = policy
            .run(
                &mut src,
                &mut FnExtractor(|f: u64| {
                    if f == 20 {
                        cancel.cancel();
                    }
                    face(f)
                }),
                &clock,
                &cancel,
            )
            .unwrap();

        assert_eq!(capture.stopped, StopReason::Cancelled);
        assert_eq!(src.polls, 20);
        assert!(capture.elapsed < Duration::from_secs(1));
    }

    #[test]
    fn test_pre_cancelled_never_polls() {
        let clock = ManualClock::default();
        let mut src = source(&clock);
        let cancel = CancelToken::new();
        cancel.cancel();

        let capture = CapturePolicy::default()
            .run(&mut src, &mut FnExtractor(face), &clock, &cancel)
            .unwrap();
        assert_eq!(src.polls, 0);
        assert!(capture.embeddings.is_empty());

        cancel.reset();
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_frame_at_window_end_is_dropped() {
        let clock = ManualClock::default();
        let mut src = TickingSource {
            clock: clock.clone(),
            period: Duration::from_secs(10),
            ready: |_: u64| true,
            polls: 0,
        };
        let policy = CapturePolicy::from_secs(20.0, 40, 0.0).unwrap();

        let capture = policy
            .run(&mut src, &mut FnExtractor(face), &clock, &CancelToken::new())
            .unwrap();

        // Poll 1 lands at 10 s, poll 2 exactly at 20 s.
        assert_eq!(src.polls, 2);
        assert_eq!(capture.embeddings.len(), 1);
        assert_eq!(capture.embeddings[0].values()[0], 1.0);
        assert_eq!(capture.stopped, StopReason::WindowElapsed);
    }

    #[test]
    fn test_frame_past_window_is_dropped() {
        let clock = ManualClock::default();
        let mut src = TickingSource {
            clock: clock.clone(),
            period: Duration::from_secs(25),
            ready: |_: u64| true,
            polls: 0,
        };
        let extracted = std::cell::Cell::new(0);

        let capture = CapturePolicy::default()
            .run(
                &mut src,
                &mut FnExtractor(|f: u64| {
                    extracted.set(extracted.get() + 1);
                    face(f)
                }),
                &clock,
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(src.polls, 1);
        assert_eq!(extracted.get(), 0);
        assert!(capture.embeddings.is_empty());
        assert_eq!(capture.stopped, StopReason::WindowElapsed);
        assert_eq!(capture.elapsed, Duration::from_secs(25));
    }

    #[test]
    fn test_policy_validation() {
        assert!(matches!(
            CapturePolicy::from_secs(0.0, 40, 0.5),
            Err(CoreError::InvalidPolicy(_))
        ));
        assert!(CapturePolicy::from_secs(20.0, 0, 0.5).is_err());
        assert!(CapturePolicy::from_secs(20.0, 40, -0.1).is_err());
        assert!(CapturePolicy::from_secs(f64::INFINITY, 40, 0.5).is_err());
        assert!(CapturePolicy::from_secs(20.0, 40, 0.0).is_ok());
        assert_eq!(
            CapturePolicy::from_secs(20.0, 40, 0.5).unwrap(),
            CapturePolicy::default()
        );
    }
}
