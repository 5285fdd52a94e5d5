use crate::config::Config;
use crate::engine::EngineError;
use likeness_core::{Enrollment, Extractor, Identity, MatchEngine, MatchResult};
use likeness_models::FaceEmbedder;
use likeness_store::SqliteTemplateStore;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Still-image pipeline: its own embedder session, independent of the
/// camera engine thread, so image requests never queue behind a capture.
pub struct Stills {
    embedder: Mutex<FaceEmbedder>,
    matcher: MatchEngine<Arc<SqliteTemplateStore>>,
    max_image_bytes: usize,
}

impl Stills {
    pub fn load(config: &Config, store: Arc<SqliteTemplateStore>) -> Result<Arc<Self>, EngineError> {
        let embedder = FaceEmbedder::load(&config.model_path)?;
        Ok(Arc::new(Self {
            embedder: Mutex::new(embedder),
            matcher: MatchEngine::new(store, config.threshold),
            max_image_bytes: config.max_image_bytes,
        }))
    }

    /// Identify the face in an image file.
    pub async fn identify(self: &Arc<Self>, path: PathBuf) -> Result<MatchResult, EngineError> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.identify_blocking(&path)).await?
    }

    /// Enroll `identity` from one or more image files. Every image must
    /// contain a face.
    pub async fn enroll(
        self: &Arc<Self>,
        identity: Identity,
        paths: Vec<PathBuf>,
    ) -> Result<Enrollment, EngineError> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.enroll_blocking(identity, &paths)).await?
    }

    fn identify_blocking(&self, path: &Path) -> Result<MatchResult, EngineError> {
        let frame = likeness_hw::read_image(path, self.max_image_bytes)?;
        let query = self.lock_embedder().extract(&frame)?;
        let result = self.matcher.recognize(&query)?;
        tracing::info!(
            path = %path.display(),
            identity = ?result.identity.as_ref().map(Identity::name),
            score = ?result.score,
            accepted = result.accepted,
            "identify_image: verdict"
        );
        Ok(result)
    }

    fn enroll_blocking(
        &self,
        identity: Identity,
        paths: &[PathBuf],
    ) -> Result<Enrollment, EngineError> {
        let frames = paths
            .iter()
            .map(|p| likeness_hw::read_image(p, self.max_image_bytes));
        let enrollment = likeness_core::enroll_frames(
            self.matcher.store(),
            identity,
            frames,
            &mut *self.lock_embedder(),
        )?;
        tracing::info!(
            identity = %enrollment.identity,
            images = enrollment.samples,
            dim = enrollment.template.dim(),
            "enroll_image: template stored"
        );
        Ok(enrollment)
    }

    fn lock_embedder(&self) -> std::sync::MutexGuard<'_, FaceEmbedder> {
        // A panic mid-inference leaves the session itself usable.
        self.embedder.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
