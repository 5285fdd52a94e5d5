use crate::config::Config;
use likeness_core::{
    CancelToken, CapturePolicy, CoreError, Enrollment, Extractor, FrameSource, Identity,
    MatchEngine, MatchResult, SystemClock,
};
use likeness_hw::Camera;
use likeness_models::FaceEmbedder;
use likeness_store::SqliteTemplateStore;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] likeness_hw::CameraError),
    #[error("model error: {0}")]
    Model(#[from] likeness_models::ModelError),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("no frame available from camera after {0} polls")]
    NoFrame(usize),
    #[error("failed to start engine thread: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("engine thread exited")]
    ChannelClosed,
    #[error("image worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl From<likeness_core::ExtractError> for EngineError {
    fn from(e: likeness_core::ExtractError) -> Self {
        Self::Core(e.into())
    }
}

/// Messages sent from D-Bus handlers to the engine thread.
enum EngineRequest {
    Enroll {
        identity: Identity,
        cancel: CancelToken,
        reply: oneshot::Sender<Result<Enrollment, EngineError>>,
    },
    Identify {
        reply: oneshot::Sender<Result<MatchResult, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
    /// Token of the most recently requested enrollment.
    enrolling: Arc<Mutex<CancelToken>>,
}

impl EngineHandle {
    fn new(tx: mpsc::Sender<EngineRequest>) -> Self {
        Self {
            tx,
            enrolling: Arc::default(),
        }
    }

    /// Capture an enrollment window from the camera and store one template.
    ///
    /// The session gets a fresh cancel token at request time, so a cancel
    /// issued while it is still queued aborts it and a stale cancel from an
    /// earlier session does not.
    pub async fn enroll(&self, identity: Identity) -> Result<Enrollment, EngineError> {
        let cancel = CancelToken::new();
        *self.lock_enrolling() = cancel.clone();
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Enroll {
            identity,
            cancel,
            reply,
        })
        .await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Abort the latest enrollment, queued or running. Returns immediately;
    /// the capture loop stops on its next poll.
    pub fn cancel_enroll(&self) {
        self.lock_enrolling().cancel();
    }

    /// Identify the person currently in front of the camera.
    pub async fn identify(&self) -> Result<MatchResult, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineRequest::Identify { reply }).await?;
        rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    async fn send(&self, req: EngineRequest) -> Result<(), EngineError> {
        self.tx.send(req).await.map_err(|_| EngineError::ChannelClosed)
    }

    fn lock_enrolling(&self) -> std::sync::MutexGuard<'_, CancelToken> {
        self.enrolling
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Everything the engine thread owns.
struct Engine {
    camera: Camera,
    embedder: FaceEmbedder,
    matcher: MatchEngine<Arc<SqliteTemplateStore>>,
    policy: CapturePolicy,
    identify_attempts: usize,
}

/// Spawn the camera engine on a dedicated OS thread.
///
/// Opens the camera and loads the embedding model synchronously so the
/// daemon fails fast at startup if either is unavailable.
pub fn spawn_engine(
    config: &Config,
    store: Arc<SqliteTemplateStore>,
) -> Result<EngineHandle, EngineError> {
    let camera = Camera::open(&config.camera_device)?;
    let embedder = FaceEmbedder::load(&config.model_path)?;

    let mut engine = Engine {
        camera,
        embedder,
        matcher: MatchEngine::new(store, config.threshold),
        policy: config.capture,
        identify_attempts: config.identify_attempts,
    };

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("likeness-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Enroll {
                        identity,
                        cancel,
                        reply,
                    } => {
                        let _ = reply.send(engine.enroll(identity, &cancel));
                    }
                    EngineRequest::Identify { reply } => {
                        let _ = reply.send(engine.identify_live());
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .map_err(EngineError::Spawn)?;

    Ok(EngineHandle::new(tx))
}

impl Engine {
    fn enroll(
        &mut self,
        identity: Identity,
        cancel: &CancelToken,
    ) -> Result<Enrollment, EngineError> {
        let mut stream = self.camera.stream()?;
        tracing::info!(
            identity = %identity,
            window = ?self.policy.window(),
            max_samples = self.policy.max_samples(),
            "enroll: capture started"
        );

        let enrollment = likeness_core::enroll(
            self.matcher.store(),
            identity,
            &self.policy,
            &mut stream,
            &mut self.embedder,
            &SystemClock::new(),
            cancel,
        )?;

        tracing::info!(
            identity = %enrollment.identity,
            samples = enrollment.samples,
            dim = enrollment.template.dim(),
            "enroll: template stored"
        );
        Ok(enrollment)
    }

    fn identify_live(&mut self) -> Result<MatchResult, EngineError> {
        let frame = {
            let mut stream = self.camera.stream()?;
            (0..self.identify_attempts)
                .find_map(|_| stream.next_frame())
                .ok_or(EngineError::NoFrame(self.identify_attempts))?
        };
        let query = self.embedder.extract(&frame)?;
        let result = self.matcher.recognize(&query)?;
        tracing::info!(
            identity = ?result.identity.as_ref().map(Identity::name),
            score = ?result.score,
            accepted = result.accepted,
            "identify: verdict"
        );
        Ok(result)
    }
}
