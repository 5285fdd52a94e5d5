//! Best-match search over the enrolled gallery.

use crate::error::CoreError;
use crate::similarity::{self, ZERO_MAGNITUDE_SCORE};
use crate::store::TemplateStore;
use crate::types::{Embedding, Identity, MatchResult, Template};

/// Default minimum similarity for accepting a match.
pub const DEFAULT_THRESHOLD: f64 = 0.75;

/// Accept threshold, validated to lie in [-1, 1] when configured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> Result<Self, CoreError> {
        if !(-1.0..=1.0).contains(&value) {
            return Err(CoreError::InvalidThreshold(value));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Inclusive: a score equal to the threshold is accepted.
    pub fn accepts(self, score: f64) -> bool {
        score >= self.0
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(DEFAULT_THRESHOLD)
    }
}

/// Strategy for comparing a query embedding against a gallery of templates.
pub trait Matcher {
    fn identify(
        &self,
        query: &Embedding,
        gallery: &[(Identity, Template)],
        threshold: Threshold,
    ) -> Result<MatchResult, CoreError>;
}

/// Cosine similarity matcher.
///
/// Scans the gallery in the order given and keeps the running best with a
/// strict greater-than, so the earliest of several equally scoring
/// templates wins. The running best starts at the zero-magnitude score, so
/// a template scoring -1.0 is never a candidate even at threshold -1.0.
pub struct CosineMatcher;

impl Matcher for CosineMatcher {
    fn identify(
        &self,
        query: &Embedding,
        gallery: &[(Identity, Template)],
        threshold: Threshold,
    ) -> Result<MatchResult, CoreError> {
        if gallery.is_empty() {
            return Ok(MatchResult::no_enrolled_identities());
        }

        // Nothing at the zero-magnitude floor can become the best match.
        let mut best: Option<usize> = None;
        let mut best_sim = ZERO_MAGNITUDE_SCORE;

        for (i, (_, template)) in gallery.iter().enumerate() {
            let sim = similarity::score(query.values(), template.values())?;
            if sim > best_sim {
                best = Some(i);
                best_sim = sim;
            }
        }

        let Some(idx) = best else {
            return Ok(MatchResult {
                identity: None,
                score: Some(best_sim),
                accepted: false,
            });
        };

        let accepted = threshold.accepts(best_sim);
        Ok(MatchResult {
            identity: accepted.then(|| gallery[idx].0.clone()),
            score: Some(best_sim),
            accepted,
        })
    }
}

/// Recognition entry point: reads the full gallery from the store on every
/// call and delegates to a [`Matcher`].
///
/// Holds no mutable state, so one engine can serve concurrent callers.
pub struct MatchEngine<S, M = CosineMatcher> {
    store: S,
    matcher: M,
    threshold: Threshold,
}

impl<S: TemplateStore> MatchEngine<S> {
    pub fn new(store: S, threshold: Threshold) -> Self {
        Self::with_matcher(store, CosineMatcher, threshold)
    }
}

impl<S: TemplateStore, M: Matcher> MatchEngine<S, M> {
    pub fn with_matcher(store: S, matcher: M, threshold: Threshold) -> Self {
        Self {
            store,
            matcher,
            threshold,
        }
    }

    pub fn threshold(&self) -> Threshold {
        self.threshold
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Identify `query` against every template currently in the store.
    pub fn recognize(&self, query: &Embedding) -> Result<MatchResult, CoreError> {
        let gallery = self.store.get_all()?;
        self.matcher.identify(query, &gallery, self.threshold)
    }
}
