//! likeness-core — Enrollment and recognition matching engine.
//!
//! Collects embeddings during a time-boxed enrollment window, averages
//! them into one template per identity, and scores query embeddings
//! against every stored template with cosine similarity.
//!
//! Embedding extraction, frame acquisition and persistence are consumed
//! through the [`Extractor`], [`FrameSource`] and [`TemplateStore`] traits.
//! Nothing in this crate logs; every failure is returned as a value.

pub mod capture;
pub mod codec;
pub mod enroll;
pub mod error;
pub mod matcher;
pub mod similarity;
pub mod store;
pub mod template;
pub mod types;

pub use capture::{
    CancelToken, Capture, CapturePolicy, Clock, Extractor, FrameSource, StopReason, SystemClock,
};
pub use codec::{decode_template, encode_template};
pub use enroll::{enroll, enroll_frames, Enrollment};
pub use error::{CodecError, CoreError, ExtractError, StorageError};
pub use matcher::{CosineMatcher, MatchEngine, Matcher, Threshold};
pub use similarity::score;
pub use store::{MemoryTemplateStore, TemplateStore};
pub use template::build;
pub use types::{Embedding, Identity, MatchResult, Template};
