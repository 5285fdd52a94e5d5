//! Enrollment: capture, average, store.

use crate::capture::{CancelToken, CapturePolicy, Clock, Extractor, FrameSource, StopReason};
use crate::error::{CoreError, ExtractError};
use crate::store::TemplateStore;
use crate::template;
use crate::types::{Identity, Template};

/// A completed enrollment.
#[derive(Debug, Clone)]
pub struct Enrollment {
    pub identity: Identity,
    pub template: Template,
    /// Number of embeddings averaged into the template.
    pub samples: usize,
}

/// Enroll `identity` from a live frame source.
///
/// Either exactly one template is written to `store` or nothing is: a
/// session that yields no usable samples fails with
/// [`CoreError::InsufficientSamples`], and a cancelled session fails with
/// [`CoreError::Cancelled`] regardless of what it collected.
pub fn enroll<T, S, E, C>(
    store: &T,
    identity: Identity,
    policy: &CapturePolicy,
    source: &mut S,
    extractor: &mut E,
    clock: &C,
    cancel: &CancelToken,
) -> Result<Enrollment, CoreError>
where
    T: TemplateStore + ?Sized,
    S: FrameSource + ?Sized,
    E: Extractor<S::Frame> + ?Sized,
    C: Clock + ?Sized,
{
    let capture = policy.run(source, extractor, clock, cancel)?;

    if capture.stopped == StopReason::Cancelled {
        return Err(CoreError::Cancelled);
    }
    if capture.embeddings.is_empty() {
        return Err(CoreError::InsufficientSamples);
    }

    let template = template::build(&capture.embeddings)?;
    store.put(&identity, &template)?;

    Ok(Enrollment {
        identity,
        template,
        samples: capture.embeddings.len(),
    })
}

/// Enroll `identity` from a fixed set of still frames, such as uploaded
/// photos.
///
/// Unlike live capture every frame must yield an embedding: a frame that
/// failed to load or shows no face aborts the enrollment with that error
/// and nothing is stored.
pub fn enroll_frames<T, F, I, E>(
    store: &T,
    identity: Identity,
    frames: I,
    extractor: &mut E,
) -> Result<Enrollment, CoreError>
where
    T: TemplateStore + ?Sized,
    I: IntoIterator<Item = Result<F, ExtractError>>,
    E: Extractor<F> + ?Sized,
{
    let embeddings = frames
        .into_iter()
        .map(|frame| extractor.extract(&frame?))
        .collect::<Result<Vec<_>, _>>()?;

    let template = template::build(&embeddings)?;
    store.put(&identity, &template)?;

    Ok(Enrollment {
        identity,
        template,
        samples: embeddings.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::testing::*;
    use crate::matcher::{MatchEngine, Threshold};
    use crate::store::MemoryTemplateStore;
    use crate::types::Embedding;
    use std::time::Duration;

    fn source(clock: &ManualClock) -> TickingSource<impl FnMut(u64) -> bool> {
        TickingSource {
            clock: clock.clone(),
            period: Duration::from_millis(40),
            ready: |_: u64| true,
            polls: 0,
        }
    }

    #[test]
    fn test_enroll_stores_mean_template() {
        let store = MemoryTemplateStore::new();
        let clock = ManualClock::default();
        let policy = CapturePolicy::from_secs(20.0, 4, 0.0).unwrap();

        let enrollment = enroll(
            &store,
            Identity::new("alice"),
            &policy,
            &mut source(&clock),
            &mut FnExtractor(face),
            &clock,
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(enrollment.samples, 4);
        // frames 1..=4 → mean of [f, 1.0]
        assert_eq!(enrollment.template.values(), &[2.5, 1.0]);

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, Identity::new("alice"));
        assert_eq!(all[0].1, enrollment.template);
    }

    #[test]
    fn test_enroll_without_faces_stores_nothing() {
        let store = MemoryTemplateStore::new();
        let clock = ManualClock::default();

        let err = enroll(
            &store,
            Identity::new("bob"),
            &CapturePolicy::default(),
            &mut source(&clock),
            &mut FnExtractor(|_: u64| Err(ExtractError::NoFaceDetected)),
            &clock,
            &CancelToken::new(),
        )
        .unwrap_err();

        assert!(matches!(err, CoreError::InsufficientSamples));
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_cancelled_enroll_stores_nothing() {
        let store = MemoryTemplateStore::new();
        let clock = ManualClock::default();
        let cancel = CancelToken::new();

        let err = enroll(
            &store,
            Identity::new("carol"),
            &CapturePolicy::from_secs(20.0, 40, 0.0).unwrap(),
            &mut source(&clock),
            &mut FnExtractor(|f: u64| {
                if f == 3 {
                    cancel.cancel();
                }
                face(f)
            }),
            &clock,
            &cancel,
        )
        .unwrap_err();

        assert!(matches!(err, CoreError::Cancelled));
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_enroll_then_recognize() {
        let store = MemoryTemplateStore::new();
        let clock = ManualClock::default();
        let policy = CapturePolicy::from_secs(20.0, 3, 0.0).unwrap();

        for (name, direction) in [("east", [1.0, 0.0]), ("north", [0.0, 1.0])] {
            enroll(
                &store,
                Identity::new(name),
                &policy,
                &mut source(&clock),
                &mut FnExtractor(move |_: u64| Ok(Embedding::new(direction.to_vec()))),
                &clock,
                &CancelToken::new(),
            )
            .unwrap();
        }

        let engine = MatchEngine::new(&store, Threshold::default());
        let result = engine.recognize(&Embedding::new(vec![0.8, 0.6])).unwrap();
        assert_eq!(result.identity, Some(Identity::new("east")));
        assert!((result.score.unwrap() - 0.8).abs() < 1e-12);

        let result = engine.recognize(&Embedding::new(vec![0.6, 0.8])).unwrap();
        assert_eq!(result.identity, Some(Identity::new("north")));
    }

    #[test]
    fn test_enroll_frames_averages_every_image() {
        let store = MemoryTemplateStore::new();
        let frames = [Ok(1u64), Ok(3u64)];

        let enrollment =
            enroll_frames(&store, Identity::new("dave"), frames, &mut FnExtractor(face)).unwrap();

        assert_eq!(enrollment.samples, 2);
        assert_eq!(enrollment.template.values(), &[2.0, 1.0]);
        assert_eq!(store.get_all().unwrap()[0].1, enrollment.template);
    }

    #[test]
    fn test_enroll_frames_surfaces_missing_face() {
        let store = MemoryTemplateStore::new();
        let frames = [Ok(1u64), Ok(2u64)];

        let err = enroll_frames(
            &store,
            Identity::new("erin"),
            frames,
            &mut FnExtractor(|f: u64| {
                if f == 2 {
                    Err(ExtractError::NoFaceDetected)
                } else {
                    face(f)
                }
            }),
        )
        .unwrap_err();

        assert!(matches!(err, CoreError::Extract(ExtractError::NoFaceDetected)));
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_enroll_frames_rejects_unreadable_image() {
        let store = MemoryTemplateStore::new();
        let frames = [
            Ok(1u64),
            Err(ExtractError::ImageTooLarge {
                size: 9 << 20,
                limit: 8 << 20,
            }),
        ];

        let err =
            enroll_frames(&store, Identity::new("frank"), frames, &mut FnExtractor(face)).unwrap_err();

        assert!(matches!(
            err,
            CoreError::Extract(ExtractError::ImageTooLarge { .. })
        ));
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_enroll_frames_without_images() {
        let store = MemoryTemplateStore::new();
        let frames: [Result<u64, ExtractError>; 0] = [];

        let err =
            enroll_frames(&store, Identity::new("gina"), frames, &mut FnExtractor(face)).unwrap_err();

        assert!(matches!(err, CoreError::InsufficientSamples));
        assert!(store.get_all().unwrap().is_empty());
    }
}
