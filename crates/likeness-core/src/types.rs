use serde::{Deserialize, Serialize};
use std::fmt;

/// Face embedding vector produced by an external extractor.
///
/// Dimensionality is fixed by the extractor (128 for dlib-style models,
/// 512 for ArcFace). Values are never modified after extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    values: Vec<f64>,
}

impl Embedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }
}

impl From<Vec<f64>> for Embedding {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

impl AsRef<[f64]> for Embedding {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

/// The stored representative embedding for one identity: the
/// element-wise mean of its enrollment samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    values: Vec<f64>,
}

impl Template {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }
}

impl AsRef<[f64]> for Template {
    fn as_ref(&self) -> &[f64] {
        &self.values
    }
}

/// Name of an enrolled person.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Outcome of matching one query embedding against the gallery.
///
/// `identity` is `None` ("Unknown") whenever the match is rejected, but
/// `score` still carries the best similarity seen. `score` is `None` only
/// when there was nothing enrolled to compare against.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    pub identity: Option<Identity>,
    pub score: Option<f64>,
    pub accepted: bool,
}

impl MatchResult {
    /// Result for an empty gallery.
    pub fn no_enrolled_identities() -> Self {
        Self {
            identity: None,
            score: None,
            accepted: false,
        }
    }

    /// True when the gallery was empty and no comparison happened.
    pub fn is_no_enrolled_identities(&self) -> bool {
        self.score.is_none()
    }
}
